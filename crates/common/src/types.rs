use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single closed OHLC bar returned by the market data feed.
/// Timestamps are UTC; sequences are always ordered oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Upper edge of the open/close body.
    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Lower edge of the open/close body.
    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Entry signal emitted by the three-candle detector.
///
/// `candle_time` is the close timestamp of the third candle and serves as
/// the de-duplication key: one evaluation per closed bar per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
    pub entry_ref: f64,
    pub stop_ref: f64,
    pub target_ref: f64,
    pub candle_time: DateTime<Utc>,
}

/// Why a detected signal did or did not turn into a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Executed,
    SkippedOutOfSession,
    SkippedDailyLimit,
    ExecutionFailed,
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStatus::Executed => write!(f, "EXECUTED"),
            SignalStatus::SkippedOutOfSession => write!(f, "SKIPPED (out of session)"),
            SignalStatus::SkippedDailyLimit => write!(f, "SKIPPED (limit reached)"),
            SignalStatus::ExecutionFailed => write!(f, "FAILED (execution error)"),
        }
    }
}

/// Journal entry for every detected signal, executed or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub time: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub entry_ref: f64,
    pub stop_ref: f64,
    pub target_ref: f64,
    pub status: SignalStatus,
}

impl SignalRecord {
    pub fn from_signal(signal: &Signal, time: DateTime<Utc>, status: SignalStatus) -> Self {
        Self {
            time,
            symbol: signal.symbol.clone(),
            side: signal.side,
            entry_ref: signal.entry_ref,
            stop_ref: signal.stop_ref,
            target_ref: signal.target_ref,
            status,
        }
    }
}

/// An open position managed by the lifecycle state machine.
///
/// Invariants: at most one open position per symbol; `one_r` is the stop
/// distance fixed at open time and never rescales, even after the stop is
/// moved to entry on breakeven arming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub one_r: f64,
    pub breakeven_armed: bool,
    /// Monitoring ticks survived so far; drives expiry.
    pub bars_held: u32,
    pub opened_at: DateTime<Utc>,
}

/// What triggered a position close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Stop,
    Target,
    Expiry,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Stop => write!(f, "SL"),
            ExitReason::Target => write!(f, "TP"),
            ExitReason::Expiry => write!(f, "EXPIRY"),
        }
    }
}

/// Final classification of a closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
    Expired,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
            Outcome::Breakeven => write!(f, "BREAKEVEN"),
            Outcome::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Immutable record appended to the performance ledger, created exactly
/// once per position at closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub exit_price: f64,
    pub opened_at: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub outcome: Outcome,
    pub r_multiple: f64,
}

/// Whether orders go to the real venue or to the in-memory simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}
