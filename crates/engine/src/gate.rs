use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use common::clock;

/// Session and frequency rules applied to every detected signal.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub tz: Tz,
    pub window: SessionWindow,
    pub max_trades_per_day: u32,
}

/// Trading-session window in local session time.
/// Inclusive start, exclusive end.
#[derive(Debug, Clone, Copy)]
pub struct SessionWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl SessionWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.open <= t && t < self.close
    }
}

/// Verdict on whether a signal may open a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Execute,
    SkipOutOfSession,
    SkipDailyLimit,
}

#[derive(Debug, Default, Clone)]
struct SymbolGate {
    last_trade_day: Option<NaiveDate>,
    trades_today: u32,
    last_signal_candle: Option<DateTime<Utc>>,
}

/// Per-symbol gate state. Owned exclusively by the scheduler worker, so no
/// locking is needed; the day watermark resets implicitly when the
/// session-zone calendar day advances.
#[derive(Debug)]
pub struct SessionGate {
    cfg: GateConfig,
    states: HashMap<String, SymbolGate>,
}

impl SessionGate {
    pub fn new(cfg: GateConfig) -> Self {
        Self {
            cfg,
            states: HashMap::new(),
        }
    }

    /// Returns true when `candle_time` identifies a bar not yet evaluated
    /// for this symbol, and records it as seen. Repeated polls within the
    /// same closed candle come back false, making detection idempotent.
    pub fn observe_candle(&mut self, symbol: &str, candle_time: DateTime<Utc>) -> bool {
        let state = self.states.entry(symbol.to_string()).or_default();
        if state.last_signal_candle == Some(candle_time) {
            return false;
        }
        state.last_signal_candle = Some(candle_time);
        true
    }

    /// Decide whether a signal detected at `now` may execute.
    pub fn check(&mut self, symbol: &str, now: DateTime<Utc>) -> GateDecision {
        let local = clock::to_session(now, self.cfg.tz);
        if !self.cfg.window.contains(local.time()) {
            debug!(symbol, time = %local.time(), "signal outside session window");
            return GateDecision::SkipOutOfSession;
        }

        let today = clock::trading_day(now, self.cfg.tz);
        let state = self.states.entry(symbol.to_string()).or_default();
        if state.last_trade_day == Some(today) && state.trades_today >= self.cfg.max_trades_per_day
        {
            return GateDecision::SkipDailyLimit;
        }
        GateDecision::Execute
    }

    /// Consume one daily-limit slot. Called only after the venue accepted
    /// the opening order, within the scheduler's single evaluation of the
    /// symbol; a failed execution leaves the limit untouched.
    pub fn record_execution(&mut self, symbol: &str, now: DateTime<Utc>) {
        let today = clock::trading_day(now, self.cfg.tz);
        let state = self.states.entry(symbol.to_string()).or_default();
        if state.last_trade_day != Some(today) {
            state.last_trade_day = Some(today);
            state.trades_today = 0;
        }
        state.trades_today += 1;
    }
}
