pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::{BotFileConfig, Config};
pub use error::{Error, Result};
pub use exchange::{ExecutionVenue, MarketData, Notifier};
pub use types::*;
