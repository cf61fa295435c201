use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{
    clock, BotFileConfig, Error, ExecutionVenue, ExitReason, MarketData, Notifier, Position,
    Result, Signal, SignalRecord, SignalStatus,
};
use strategy::{DetectorParams, ThreeCandleDetector};

use crate::gate::{GateConfig, GateDecision, SessionGate, SessionWindow};
use crate::lifecycle::{LifecycleConfig, PositionManager, Tick};
use crate::store::BotStore;

/// One tradable instrument with its fixed order size.
#[derive(Debug, Clone)]
pub struct SymbolSpec {
    pub name: String,
    pub size: f64,
}

/// Everything the polling loop needs, assembled from `config/bot.toml`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub candle_interval: String,
    /// Upper bound applied to every market-data and venue call.
    pub call_timeout: Duration,
    pub symbols: Vec<SymbolSpec>,
    pub gate: GateConfig,
    pub detector: DetectorParams,
    pub lifecycle: LifecycleConfig,
    /// Earliest local time for the daily report.
    pub report_time: NaiveTime,
}

impl SchedulerConfig {
    pub fn from_file(file: &BotFileConfig) -> Result<Self> {
        let tz: Tz = file
            .session
            .timezone
            .parse()
            .map_err(|_| Error::Config(format!("unknown timezone: {}", file.session.timezone)))?;
        let parse_time = |label: &str, value: &str| -> Result<NaiveTime> {
            NaiveTime::parse_from_str(value, "%H:%M")
                .map_err(|_| Error::Config(format!("bad session.{label} time: {value}")))
        };

        Ok(Self {
            poll_interval: Duration::from_secs(file.scheduler.poll_secs),
            candle_interval: file.scheduler.candle_interval.clone(),
            call_timeout: Duration::from_secs(file.scheduler.call_timeout_secs),
            symbols: file
                .symbols
                .iter()
                .map(|s| SymbolSpec {
                    name: s.name.clone(),
                    size: s.size,
                })
                .collect(),
            gate: GateConfig {
                tz,
                window: SessionWindow {
                    open: parse_time("open", &file.session.open)?,
                    close: parse_time("close", &file.session.close)?,
                },
                max_trades_per_day: file.limits.max_trades_per_day,
            },
            detector: DetectorParams {
                risk_reward: file.strategy.risk_reward,
                body_quality_min: file.strategy.body_quality_min,
            },
            lifecycle: LifecycleConfig {
                breakeven_arm_r: file.limits.breakeven_arm_r,
                expiry_bars: file.limits.expiry_bars,
                ..LifecycleConfig::default()
            },
            report_time: parse_time("report", &file.session.report)?,
        })
    }
}

/// The polling loop: every tick it monitors open positions, fires the daily
/// report when due, and runs detection for each configured symbol. One
/// symbol failing never stops the others.
pub struct Scheduler {
    cfg: SchedulerConfig,
    detector: ThreeCandleDetector,
    gate: SessionGate,
    lifecycle: PositionManager,
    store: BotStore,
    data: Arc<dyn MarketData>,
    venue: Arc<dyn ExecutionVenue>,
    notifier: Arc<dyn Notifier>,
    last_report_day: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(
        cfg: SchedulerConfig,
        store: BotStore,
        data: Arc<dyn MarketData>,
        venue: Arc<dyn ExecutionVenue>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            detector: ThreeCandleDetector::new(cfg.detector),
            gate: SessionGate::new(cfg.gate.clone()),
            lifecycle: PositionManager::new(cfg.lifecycle),
            cfg,
            store,
            data,
            venue,
            notifier,
            last_report_day: None,
        }
    }

    /// Run until the shutdown channel flips to true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.cfg.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            poll_secs = self.cfg.poll_interval.as_secs(),
            symbols = self.cfg.symbols.len(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.cycle(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn cycle(&mut self, now: DateTime<Utc>) {
        self.monitor_positions(now).await;
        self.maybe_send_daily_report(now).await;

        let symbols = self.cfg.symbols.clone();
        for spec in &symbols {
            if let Err(e) = self.evaluate_symbol(spec, now).await {
                warn!(symbol = %spec.name, error = %e, "symbol evaluation failed");
            }
        }
    }

    /// One monitoring tick for every open position.
    async fn monitor_positions(&mut self, now: DateTime<Utc>) {
        for symbol in self.store.position_symbols().await {
            let price = match self
                .with_timeout("last_price", self.data.last_price(&symbol))
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    warn!(symbol, error = %e, "price unavailable, position carried");
                    continue;
                }
            };

            let lifecycle = self.lifecycle;
            let tick = self
                .store
                .with_position_mut(&symbol, |pos| lifecycle.evaluate(pos, price))
                .await;

            match tick {
                Some(Tick::Held) | None => {}
                Some(Tick::BreakevenArmed) => {
                    info!(symbol, price, "breakeven armed, stop moved to entry");
                    self.notifier
                        .send(&format!("🔵 {symbol}: +1R reached, stop moved to entry"))
                        .await;
                }
                Some(Tick::Exit { reason, price }) => {
                    self.close_position(&symbol, reason, price, now).await;
                }
            }
        }
    }

    async fn close_position(
        &mut self,
        symbol: &str,
        reason: ExitReason,
        price: f64,
        now: DateTime<Utc>,
    ) {
        let Some(pos) = self.store.remove_position(symbol).await else {
            return;
        };

        // Best effort: the outcome is recorded even if the venue rejects
        // the reduce-only close, but that failure must be loud.
        if let Err(e) = self
            .with_timeout(
                "close_market",
                self.venue.close_market(symbol, pos.side, pos.size),
            )
            .await
        {
            error!(symbol, error = %e, "CLOSE ORDER FAILED, manual intervention may be required");
            self.notifier
                .send(&format!("🚨 {symbol}: close order failed: {e}"))
                .await;
        }

        let trade = self.lifecycle.build_trade(&pos, reason, price, now);
        info!(
            symbol,
            reason = %reason,
            outcome = %trade.outcome,
            r = trade.r_multiple,
            "position closed"
        );
        self.notifier
            .send(&format!(
                "📉 {symbol} {} closed ({reason}) @ {price:.4} → {} ({:+.2}R)",
                pos.side, trade.outcome, trade.r_multiple
            ))
            .await;
        self.store.ledger.append(trade).await;
    }

    /// Detection for one symbol: fetch the last three closed candles, run
    /// the detector once per new bar, and route the signal through the gate.
    async fn evaluate_symbol(&mut self, spec: &SymbolSpec, now: DateTime<Utc>) -> Result<()> {
        let candles = self
            .with_timeout(
                "fetch_candles",
                self.data.fetch_candles(&spec.name, &self.cfg.candle_interval, 3),
            )
            .await?;
        let [c1, c2, c3] = candles.as_slice() else {
            return Err(Error::DataUnavailable(format!(
                "{}: expected 3 candles, got {}",
                spec.name,
                candles.len()
            )));
        };

        if !self.gate.observe_candle(&spec.name, c3.close_time) {
            return Ok(());
        }

        let Some(signal) = self.detector.detect(&spec.name, c1, c2, c3) else {
            return Ok(());
        };
        info!(symbol = %spec.name, side = %signal.side, "signal detected");

        match self.gate.check(&spec.name, now) {
            GateDecision::SkipOutOfSession => {
                self.journal(&signal, now, SignalStatus::SkippedOutOfSession)
                    .await;
            }
            GateDecision::SkipDailyLimit => {
                self.journal(&signal, now, SignalStatus::SkippedDailyLimit)
                    .await;
                self.notifier
                    .send(&format!(
                        "⚠️ {} {} signal skipped: daily trade limit reached",
                        spec.name, signal.side
                    ))
                    .await;
            }
            GateDecision::Execute => {
                if self.store.has_position(&spec.name).await {
                    debug!(symbol = %spec.name, "position already open, signal ignored");
                    return Ok(());
                }
                self.execute_signal(spec, &signal, now).await?;
            }
        }
        Ok(())
    }

    async fn execute_signal(
        &mut self,
        spec: &SymbolSpec,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Anchor stop and target around the live price, keeping the
        // detector's stop distance. oneR is fixed here for good.
        let price = self
            .with_timeout("last_price", self.data.last_price(&spec.name))
            .await?;
        let one_r = (signal.entry_ref - signal.stop_ref).abs();
        let (stop_price, target_price) = match signal.side {
            common::Side::Long => (
                price - one_r,
                price + self.cfg.detector.risk_reward * one_r,
            ),
            common::Side::Short => (
                price + one_r,
                price - self.cfg.detector.risk_reward * one_r,
            ),
        };

        if let Err(e) = self
            .with_timeout(
                "open_market",
                self.venue.open_market(&spec.name, signal.side, spec.size),
            )
            .await
        {
            // Failed executions do not consume the daily-limit slot.
            warn!(symbol = %spec.name, error = %e, "entry order failed");
            self.journal(signal, now, SignalStatus::ExecutionFailed).await;
            self.notifier
                .send(&format!("⚠️ {} entry order failed: {e}", spec.name))
                .await;
            return Ok(());
        }

        let pos = Position {
            id: Uuid::new_v4().to_string(),
            symbol: spec.name.clone(),
            side: signal.side,
            size: spec.size,
            entry_price: price,
            stop_price,
            target_price,
            one_r,
            breakeven_armed: false,
            bars_held: 0,
            opened_at: now,
        };
        self.store.insert_position(pos).await;
        self.gate.record_execution(&spec.name, now);
        self.journal(signal, now, SignalStatus::Executed).await;

        info!(
            symbol = %spec.name,
            side = %signal.side,
            entry = price,
            stop = stop_price,
            target = target_price,
            "position opened"
        );
        self.notifier
            .send(&format!(
                "🟩 {} {} @ {price:.4} | SL {stop_price:.4} | TP {target_price:.4}",
                spec.name, signal.side
            ))
            .await;
        Ok(())
    }

    /// Send the daily report once the session-zone clock passes the report
    /// time; the day watermark makes it fire exactly once per day.
    async fn maybe_send_daily_report(&mut self, now: DateTime<Utc>) {
        let tz = self.cfg.gate.tz;
        let local = clock::to_session(now, tz);
        if local.time() < self.cfg.report_time {
            return;
        }
        let today = clock::trading_day(now, tz);
        if self.last_report_day == Some(today) {
            return;
        }
        self.last_report_day = Some(today);

        let stats = self.store.ledger.stats_for_day(today, tz).await;
        info!(day = %today, total = stats.total, "sending daily report");
        self.notifier
            .send(&format!(
                "📊 Daily report {today}: {} trades | {}W {}L {}BE {}EXP | win rate {:.0}% | {:+.2}R",
                stats.total,
                stats.wins,
                stats.losses,
                stats.breakevens,
                stats.expired,
                stats.win_rate * 100.0,
                stats.total_r,
            ))
            .await;
    }

    async fn journal(&self, signal: &Signal, now: DateTime<Utc>, status: SignalStatus) {
        info!(symbol = %signal.symbol, status = %status, "signal journaled");
        self.store
            .record_signal(SignalRecord::from_signal(signal, now, status))
            .await;
    }

    async fn with_timeout<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.cfg.call_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(format!(
                "{what} exceeded {:?}",
                self.cfg.call_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use common::{Candle, Outcome, Side};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockData {
        candles: Mutex<Vec<Candle>>,
        prices: Mutex<VecDeque<f64>>,
        last: Mutex<f64>,
    }

    impl MockData {
        fn new(candles: Vec<Candle>, prices: Vec<f64>) -> Self {
            Self {
                candles: Mutex::new(candles),
                prices: Mutex::new(prices.into()),
                last: Mutex::new(0.0),
            }
        }

        fn set_candles(&self, candles: Vec<Candle>) {
            *self.candles.lock().unwrap() = candles;
        }
    }

    #[async_trait]
    impl MarketData for MockData {
        async fn fetch_candles(&self, _: &str, _: &str, _: usize) -> Result<Vec<Candle>> {
            Ok(self.candles.lock().unwrap().clone())
        }

        async fn last_price(&self, _: &str) -> Result<f64> {
            let mut prices = self.prices.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(p) = prices.pop_front() {
                *last = p;
            }
            Ok(*last)
        }
    }

    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    /// Venue that rejects the first `failures` orders, then accepts.
    struct FlakyVenue {
        failures: Mutex<u32>,
    }

    #[async_trait]
    impl ExecutionVenue for FlakyVenue {
        async fn open_market(&self, _: &str, _: Side, _: f64) -> Result<()> {
            let mut left = self.failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(Error::Execution("insufficient margin".into()));
            }
            Ok(())
        }

        async fn close_market(&self, _: &str, _: Side, _: f64) -> Result<()> {
            Ok(())
        }
    }

    fn candle(base: DateTime<Utc>, bar: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        let open_time = base + chrono::Duration::minutes(15 * bar);
        Candle {
            open_time,
            close_time: open_time + chrono::Duration::minutes(15),
            open: o,
            high: h,
            low: l,
            close: c,
        }
    }

    /// Bearish C1, smaller bullish C2, bullish C3 closing above C1's body.
    fn long_setup(base: DateTime<Utc>, bar: i64) -> Vec<Candle> {
        vec![
            candle(base, bar, 10.0, 10.1, 8.9, 9.0),
            candle(base, bar + 1, 9.2, 9.8, 9.1, 9.6),
            candle(base, bar + 2, 9.6, 10.3, 9.55, 10.2),
        ]
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(30),
            candle_interval: "Min15".to_string(),
            call_timeout: Duration::from_secs(5),
            symbols: vec![SymbolSpec {
                name: "BTC_USDT".to_string(),
                size: 0.05,
            }],
            gate: GateConfig {
                tz: New_York,
                window: SessionWindow {
                    open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                    close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
                },
                max_trades_per_day: 1,
            },
            detector: DetectorParams::default(),
            lifecycle: LifecycleConfig::default(),
            report_time: NaiveTime::from_hms_opt(16, 1, 0).unwrap(),
        }
    }

    fn build(
        data: Arc<MockData>,
        venue: Arc<dyn ExecutionVenue>,
    ) -> (Scheduler, BotStore, Arc<RecordingNotifier>) {
        let store = BotStore::new();
        let notifier = Arc::new(RecordingNotifier {
            messages: Mutex::new(Vec::new()),
        });
        let scheduler = Scheduler::new(
            config(),
            store.clone(),
            data,
            venue,
            notifier.clone(),
        );
        (scheduler, store, notifier)
    }

    /// 14:00 UTC on 2024-06-03 is 10:00 in New York, inside the session.
    fn in_session_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn signal_opens_position_and_target_exit_lands_in_ledger() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap();
        // Entry anchored at 100.0; stop distance from the setup is 1.0, so
        // stop 99.0, target 101.5. Second cycle sees 101.5 and takes profit.
        let data = Arc::new(MockData::new(long_setup(base, 0), vec![100.0, 101.5]));
        let venue = Arc::new(paper::PaperVenue::new());
        let (mut scheduler, store, notifier) = build(data, venue);

        let now = in_session_now();
        scheduler.cycle(now).await;

        let positions = store.positions().await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, Side::Long);
        assert_eq!(positions[0].entry_price, 100.0);
        assert_eq!(positions[0].stop_price, 99.0);
        assert_eq!(positions[0].target_price, 101.5);
        assert_eq!(positions[0].one_r, 1.0);

        let journal = store.signals().await;
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].status, SignalStatus::Executed);

        scheduler.cycle(now + chrono::Duration::seconds(30)).await;

        assert!(store.positions().await.is_empty());
        let trades = store.ledger.all().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].outcome, Outcome::Win);
        assert!((trades[0].r_multiple - 1.5).abs() < 1e-9);

        let messages = notifier.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.starts_with("🟩 BTC_USDT")));
        assert!(messages.iter().any(|m| m.contains("WIN")));
    }

    #[tokio::test]
    async fn same_candle_is_evaluated_once() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap();
        let data = Arc::new(MockData::new(long_setup(base, 0), vec![100.0, 100.1]));
        let venue = Arc::new(paper::PaperVenue::new());
        let (mut scheduler, store, _) = build(data, venue);

        let now = in_session_now();
        scheduler.cycle(now).await;
        scheduler.cycle(now + chrono::Duration::seconds(30)).await;

        // One journal entry despite two polls of the same bar.
        assert_eq!(store.signals().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_entry_does_not_consume_the_daily_limit() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap();
        let data = Arc::new(MockData::new(long_setup(base, 0), vec![100.0, 100.0]));
        let venue = Arc::new(FlakyVenue {
            failures: Mutex::new(1),
        });
        let (mut scheduler, store, _) = build(data.clone(), venue);

        let now = in_session_now();
        scheduler.cycle(now).await;

        assert!(store.positions().await.is_empty());
        let journal = store.signals().await;
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].status, SignalStatus::ExecutionFailed);

        // Next bar, same setup: the slot is still free so the retry executes.
        data.set_candles(long_setup(base, 1));
        scheduler.cycle(now + chrono::Duration::minutes(15)).await;

        let journal = store.signals().await;
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].status, SignalStatus::Executed);
        assert_eq!(store.positions().await.len(), 1);
    }

    #[tokio::test]
    async fn out_of_session_signal_is_journaled_not_traded() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 1, 0, 0).unwrap();
        let data = Arc::new(MockData::new(long_setup(base, 0), vec![100.0]));
        let venue = Arc::new(paper::PaperVenue::new());
        let (mut scheduler, store, _) = build(data, venue);

        // 02:00 UTC is 22:00 the previous evening in New York.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 2, 0, 0).unwrap();
        scheduler.cycle(now).await;

        assert!(store.positions().await.is_empty());
        let journal = store.signals().await;
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].status, SignalStatus::SkippedOutOfSession);
    }

    #[tokio::test]
    async fn second_signal_same_day_is_limit_skipped() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap();
        let data = Arc::new(MockData::new(
            long_setup(base, 0),
            vec![100.0, 150.0, 150.0],
        ));
        let venue = Arc::new(paper::PaperVenue::new());
        let (mut scheduler, store, notifier) = build(data.clone(), venue);

        let now = in_session_now();
        scheduler.cycle(now).await;
        // Price gaps to 150: the open position exits at target first.
        scheduler.cycle(now + chrono::Duration::seconds(30)).await;
        assert!(store.positions().await.is_empty());

        // A fresh setup the same day is refused by the daily limit.
        data.set_candles(long_setup(base, 1));
        scheduler.cycle(now + chrono::Duration::minutes(15)).await;

        let journal = store.signals().await;
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].status, SignalStatus::SkippedDailyLimit);
        assert!(store.positions().await.is_empty());

        let messages = notifier.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.contains("daily trade limit")));
    }

    #[tokio::test]
    async fn daily_report_fires_once_after_report_time() {
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap();
        // No setup: flat candles, no signals.
        let flat = vec![
            candle(base, 0, 10.0, 10.1, 9.9, 10.0),
            candle(base, 1, 10.0, 10.1, 9.9, 10.0),
            candle(base, 2, 10.0, 10.1, 9.9, 10.0),
        ];
        let data = Arc::new(MockData::new(flat, vec![100.0]));
        let venue = Arc::new(paper::PaperVenue::new());
        let (mut scheduler, _, notifier) = build(data, venue);

        // 16:02 New York on 2024-06-03 = 20:02 UTC.
        let after_close = Utc.with_ymd_and_hms(2024, 6, 3, 20, 2, 0).unwrap();
        scheduler.cycle(after_close).await;
        scheduler.cycle(after_close + chrono::Duration::seconds(30)).await;

        let messages = notifier.messages.lock().unwrap();
        let reports: Vec<_> = messages.iter().filter(|m| m.starts_with("📊")).collect();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("0 trades"));
    }
}
