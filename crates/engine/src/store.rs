use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use common::{Position, SignalRecord};

use crate::ledger::PerformanceLedger;

/// In-process state shared between the scheduler and the dashboard API:
/// open positions, the signal journal, and the trade ledger. Everything
/// lives in memory; a restart starts flat.
#[derive(Debug, Clone, Default)]
pub struct BotStore {
    positions: Arc<RwLock<HashMap<String, Position>>>,
    signals: Arc<RwLock<Vec<SignalRecord>>>,
    pub ledger: PerformanceLedger,
}

impl BotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an open position, enforcing at most one per symbol.
    /// Returns false (and leaves the existing position alone) when the
    /// symbol already has one.
    pub async fn insert_position(&self, pos: Position) -> bool {
        let mut positions = self.positions.write().await;
        if positions.contains_key(&pos.symbol) {
            warn!(symbol = %pos.symbol, "position already open, refusing duplicate");
            return false;
        }
        positions.insert(pos.symbol.clone(), pos);
        true
    }

    /// Run `f` against the open position for `symbol`, if any.
    pub async fn with_position_mut<R>(
        &self,
        symbol: &str,
        f: impl FnOnce(&mut Position) -> R,
    ) -> Option<R> {
        self.positions.write().await.get_mut(symbol).map(f)
    }

    pub async fn remove_position(&self, symbol: &str) -> Option<Position> {
        self.positions.write().await.remove(symbol)
    }

    pub async fn has_position(&self, symbol: &str) -> bool {
        self.positions.read().await.contains_key(symbol)
    }

    pub async fn position_symbols(&self) -> Vec<String> {
        self.positions.read().await.keys().cloned().collect()
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.positions.read().await.values().cloned().collect()
    }

    pub async fn record_signal(&self, record: SignalRecord) {
        self.signals.write().await.push(record);
    }

    pub async fn signals(&self) -> Vec<SignalRecord> {
        self.signals.read().await.clone()
    }
}
