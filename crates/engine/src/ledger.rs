use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::RwLock;

use common::{clock, ClosedTrade, Outcome};

/// Append-only record of closed trades, shared between the scheduler
/// (writer) and the dashboard API (reader). Entries are never mutated
/// after append.
#[derive(Debug, Clone, Default)]
pub struct PerformanceLedger {
    trades: Arc<RwLock<Vec<ClosedTrade>>>,
}

/// Read-only aggregates derived from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub expired: usize,
    /// `wins / total`, 0 when the ledger is empty.
    pub win_rate: f64,
    /// Sum of per-trade R multiples.
    pub total_r: f64,
}

impl PerformanceStats {
    fn compute(trades: &[ClosedTrade]) -> Self {
        let total = trades.len();
        let wins = trades.iter().filter(|t| t.outcome == Outcome::Win).count();
        let losses = trades.iter().filter(|t| t.outcome == Outcome::Loss).count();
        let breakevens = trades
            .iter()
            .filter(|t| t.outcome == Outcome::Breakeven)
            .count();
        let expired = trades
            .iter()
            .filter(|t| t.outcome == Outcome::Expired)
            .count();
        let win_rate = if total > 0 {
            wins as f64 / total as f64
        } else {
            0.0
        };
        let total_r = trades.iter().map(|t| t.r_multiple).sum();

        Self {
            total,
            wins,
            losses,
            breakevens,
            expired,
            win_rate,
            total_r,
        }
    }
}

impl PerformanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, trade: ClosedTrade) {
        self.trades.write().await.push(trade);
    }

    pub async fn all(&self) -> Vec<ClosedTrade> {
        self.trades.read().await.clone()
    }

    pub async fn stats(&self) -> PerformanceStats {
        PerformanceStats::compute(&self.trades.read().await)
    }

    /// Trades whose exit fell on `day` in the session zone.
    pub async fn trades_for_day(&self, day: NaiveDate, tz: Tz) -> Vec<ClosedTrade> {
        self.trades
            .read()
            .await
            .iter()
            .filter(|t| clock::trading_day(t.exit_time, tz) == day)
            .cloned()
            .collect()
    }

    pub async fn stats_for_day(&self, day: NaiveDate, tz: Tz) -> PerformanceStats {
        PerformanceStats::compute(&self.trades_for_day(day, tz).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::New_York;
    use common::Side;

    fn trade(symbol: &str, outcome: Outcome, r: f64, exit_hour_utc: u32) -> ClosedTrade {
        ClosedTrade {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side: Side::Long,
            entry_price: 100.0,
            stop_price: 98.0,
            target_price: 103.0,
            exit_price: 103.0,
            opened_at: Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 6, 3, exit_hour_utc, 0, 0).unwrap(),
            outcome,
            r_multiple: r,
        }
    }

    #[tokio::test]
    async fn empty_ledger_has_zero_win_rate() {
        let ledger = PerformanceLedger::new();
        let stats = ledger.stats().await;
        assert_eq!(stats.total, 0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.total_r, 0.0);
    }

    #[tokio::test]
    async fn aggregates_count_by_outcome() {
        let ledger = PerformanceLedger::new();
        ledger.append(trade("BTC_USDT", Outcome::Win, 1.5, 15)).await;
        ledger.append(trade("BTC_USDT", Outcome::Loss, -1.0, 16)).await;
        ledger.append(trade("ETH_USDT", Outcome::Breakeven, 0.0, 17)).await;
        ledger.append(trade("ETH_USDT", Outcome::Expired, 0.0, 18)).await;

        let stats = ledger.stats().await;
        assert_eq!(stats.total, 4);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.breakevens, 1);
        assert_eq!(stats.expired, 1);
        assert!((stats.win_rate - 0.25).abs() < 1e-12);
        assert!((stats.total_r - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn day_filter_uses_session_zone() {
        let ledger = PerformanceLedger::new();
        // 18:00 UTC on June 3 = 14:00 in New York, same session day.
        ledger.append(trade("BTC_USDT", Outcome::Win, 1.5, 18)).await;
        // 03:00 UTC on June 3 = the evening of June 2 in New York.
        ledger.append(trade("BTC_USDT", Outcome::Loss, -1.0, 3)).await;

        let day = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let stats = ledger.stats_for_day(day, New_York).await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.wins, 1);
    }
}
