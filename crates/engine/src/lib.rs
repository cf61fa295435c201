pub mod gate;
pub mod ledger;
pub mod lifecycle;
pub mod mexc;
pub mod scheduler;
pub mod store;

pub use gate::{GateConfig, GateDecision, SessionGate, SessionWindow};
pub use ledger::{PerformanceLedger, PerformanceStats};
pub use lifecycle::{LifecycleConfig, PositionManager, Tick};
pub use mexc::MexcClient;
pub use scheduler::{Scheduler, SchedulerConfig, SymbolSpec};
pub use store::BotStore;
