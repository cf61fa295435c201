use serde::{Deserialize, Serialize};

use crate::TradingMode;

/// Secrets and process-level settings loaded from environment variables at
/// startup. Missing required variables cause an immediate panic with a
/// clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials
    pub mexc_api_key: String,
    pub mexc_api_secret: String,

    // Telegram
    pub telegram_token: String,
    pub telegram_chat_id: String,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Trading
    pub trading_mode: TradingMode,

    // Bot config file path
    pub bot_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = match required_env("TRADING_MODE").to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => panic!("ERROR: TRADING_MODE must be 'paper' or 'live', got: '{other}'"),
        };

        Config {
            mexc_api_key: required_env("MEXC_API_KEY"),
            mexc_api_secret: required_env("MEXC_API_SECRET"),
            telegram_token: required_env("TELEGRAM_TOKEN"),
            telegram_chat_id: required_env("TELEGRAM_CHAT_ID"),
            dashboard_token: required_env("DASHBOARD_TOKEN"),
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            trading_mode,
            bot_config_path: optional_env("BOT_CONFIG_PATH")
                .unwrap_or_else(|| "config/bot.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Trading parameters loaded from a TOML file (`config/bot.toml`).
///
/// ```toml
/// [session]
/// timezone = "America/New_York"
/// open = "09:30"
/// close = "16:00"
/// report = "16:01"
///
/// [strategy]
/// risk_reward = 1.5
/// body_quality_min = 0.70
///
/// [limits]
/// max_trades_per_day = 1
/// breakeven_arm_r = 1.0
/// expiry_bars = 96
///
/// [scheduler]
/// poll_secs = 30
/// candle_interval = "Min15"
/// call_timeout_secs = 10
///
/// [[symbol]]
/// name = "BTC_USDT"
/// size = 0.05
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotFileConfig {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub strategy: StrategySection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(rename = "symbol")]
    pub symbols: Vec<SymbolSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSection {
    /// IANA zone name of the trading session.
    pub timezone: String,
    /// Session open, "HH:MM", inclusive.
    pub open: String,
    /// Session close, "HH:MM", exclusive.
    pub close: String,
    /// Earliest local time for the daily report.
    pub report: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            open: "09:30".to_string(),
            close: "16:00".to_string(),
            report: "16:01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategySection {
    /// Target distance as a multiple of the stop distance.
    pub risk_reward: f64,
    /// Minimum C3 body/range ratio; 0 disables the filter.
    pub body_quality_min: f64,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            risk_reward: 1.5,
            body_quality_min: 0.70,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsSection {
    pub max_trades_per_day: u32,
    /// Favorable excursion, in R, that moves the stop to entry.
    pub breakeven_arm_r: f64,
    /// Monitoring ticks before an open position is force-closed as EXPIRED.
    pub expiry_bars: u32,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_trades_per_day: 1,
            breakeven_arm_r: 1.0,
            expiry_bars: 96,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerSection {
    pub poll_secs: u64,
    /// Kline interval identifier passed to the market data feed.
    pub candle_interval: String,
    /// Upper bound for every external call.
    pub call_timeout_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_secs: 30,
            candle_interval: "Min15".to_string(),
            call_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SymbolSection {
    /// Venue symbol, e.g. "BTC_USDT".
    pub name: String,
    /// Fixed order size in base units.
    pub size: f64,
}

impl BotFileConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read bot config at '{path}': {e}"));
        toml::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse bot config at '{path}': {e}"))
    }
}
