use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{BotFileConfig, Config, ExecutionVenue, MarketData, Notifier, TradingMode};
use engine::{BotStore, MexcClient, Scheduler, SchedulerConfig};
use notify::TelegramNotifier;
use paper::PaperVenue;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(mode = %cfg.trading_mode, "Tricandle starting");

    let bot_file = BotFileConfig::load(&cfg.bot_config_path);
    let scheduler_cfg = SchedulerConfig::from_file(&bot_file)
        .unwrap_or_else(|e| panic!("Invalid bot config: {e}"));

    // ── Exchange (injected based on TRADING_MODE) ─────────────────────────────
    let mexc = Arc::new(MexcClient::new(&cfg.mexc_api_key, &cfg.mexc_api_secret));
    let data: Arc<dyn MarketData> = mexc.clone();
    let venue: Arc<dyn ExecutionVenue> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode — orders go to MEXC");
            mexc
        }
        TradingMode::Paper => {
            info!("Paper trading mode — orders are simulated");
            Arc::new(PaperVenue::new())
        }
    };

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        &cfg.telegram_token,
        &cfg.telegram_chat_id,
    ));

    // ── Shared state ──────────────────────────────────────────────────────────
    let store = BotStore::new();

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let scheduler = Scheduler::new(scheduler_cfg, store.clone(), data, venue, notifier);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        store,
        mode: cfg.trading_mode,
        dashboard_token: cfg.dashboard_token.clone(),
        started_at: chrono::Utc::now(),
    };
    tokio::spawn(api::serve(api_state, cfg.dashboard_port));

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Stopping scheduler.");

    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    info!("Scheduler stopped. Exiting.");
}
