use async_trait::async_trait;

use crate::{Candle, Result, Side};

/// Read side of the market: closed candles and the latest traded price.
///
/// `MexcClient` implements this for live data. Implementations must return
/// closed bars only (no in-progress candle), ordered oldest first.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Candle>>;

    async fn last_price(&self, symbol: &str) -> Result<f64>;
}

/// Order placement. `MexcClient` implements this for live trading,
/// `PaperVenue` for simulation.
///
/// Only the scheduler holds a reference to a `dyn ExecutionVenue`; every
/// order goes through the session gate first.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Open a market position of `size` base units.
    async fn open_market(&self, symbol: &str, side: Side, size: f64) -> Result<()>;

    /// Close a position with a reduce-only market order. Best effort: a
    /// failure here never blocks recording the trade outcome.
    async fn close_market(&self, symbol: &str, side: Side, size: f64) -> Result<()>;
}

/// Outbound text notifications. Fire-and-forget: implementations log
/// failures and never propagate them into trading state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}
