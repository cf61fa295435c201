use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{ExecutionVenue, Result, Side};

/// Simulated execution venue for paper trading.
///
/// Orders always fill; the venue keeps its own mirror of what it believes
/// is open so that reduce-only closes against nothing can be flagged.
/// No real orders are ever sent to the exchange.
pub struct PaperVenue {
    positions: Arc<RwLock<Vec<PaperPosition>>>,
}

#[derive(Debug, Clone, PartialEq)]
struct PaperPosition {
    symbol: String,
    side: Side,
    size: f64,
}

impl PaperVenue {
    pub fn new() -> Self {
        info!("PaperVenue initialized");
        Self {
            positions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of positions the simulator believes are open.
    pub async fn open_count(&self) -> usize {
        self.positions.read().await.len()
    }
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    async fn open_market(&self, symbol: &str, side: Side, size: f64) -> Result<()> {
        debug!(symbol, side = %side, size, "paper fill simulated");
        self.positions.write().await.push(PaperPosition {
            symbol: symbol.to_string(),
            side,
            size,
        });
        Ok(())
    }

    async fn close_market(&self, symbol: &str, side: Side, size: f64) -> Result<()> {
        let mut positions = self.positions.write().await;
        match positions
            .iter()
            .position(|p| p.symbol == symbol && p.side == side)
        {
            Some(idx) => {
                positions.remove(idx);
                debug!(symbol, side = %side, size, "paper close simulated");
            }
            None => {
                // Reduce-only semantics: nothing to reduce is not an error,
                // but it means the caller's book has drifted from ours.
                warn!(symbol, side = %side, "paper close against no open position");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_then_close_leaves_book_flat() {
        let venue = PaperVenue::new();
        venue.open_market("BTC_USDT", Side::Long, 0.05).await.unwrap();
        assert_eq!(venue.open_count().await, 1);

        venue.close_market("BTC_USDT", Side::Long, 0.05).await.unwrap();
        assert_eq!(venue.open_count().await, 0);
    }

    #[tokio::test]
    async fn close_without_position_is_ok() {
        let venue = PaperVenue::new();
        assert!(venue.close_market("BTC_USDT", Side::Long, 0.05).await.is_ok());
    }

    #[tokio::test]
    async fn positions_are_tracked_per_symbol_and_side() {
        let venue = PaperVenue::new();
        venue.open_market("BTC_USDT", Side::Long, 0.05).await.unwrap();
        venue.open_market("ETH_USDT", Side::Short, 0.5).await.unwrap();
        assert_eq!(venue.open_count().await, 2);

        venue.close_market("ETH_USDT", Side::Short, 0.5).await.unwrap();
        assert_eq!(venue.open_count().await, 1);
    }
}
