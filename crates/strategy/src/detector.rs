use serde::{Deserialize, Serialize};

use common::{Candle, Side, Signal};

/// Tunable parameters of the three-candle detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Target distance as a multiple of the stop distance.
    pub risk_reward: f64,
    /// Minimum C3 body/range ratio required for a breakout candle to count.
    /// A value of 0 disables the filter.
    pub body_quality_min: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            risk_reward: 1.5,
            body_quality_min: 0.70,
        }
    }
}

/// Three-candle reversal + breakout pattern.
///
/// Long: C1 bearish, C2 bullish with a body strictly smaller than C1's,
/// C3 closing above C1's body high with a convincing body. Short is the
/// mirror. Pure function of its inputs; reproducible in tests without any
/// network access.
#[derive(Debug, Clone)]
pub struct ThreeCandleDetector {
    params: DetectorParams,
}

impl ThreeCandleDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> DetectorParams {
        self.params
    }

    /// Evaluate three consecutive closed candles, oldest first.
    ///
    /// Returns `None` when no pattern is present or the computed stop
    /// distance is not positive (degenerate setup).
    pub fn detect(&self, symbol: &str, c1: &Candle, c2: &Candle, c3: &Candle) -> Option<Signal> {
        let entry_ref = c3.close;

        let long = c1.is_bearish()
            && c2.is_bullish()
            && c2.body() < c1.body()
            && c3.close > c1.body_high()
            && self.body_quality_ok(c3);

        if long {
            let stop_ref = c2.body_low();
            let dist = entry_ref - stop_ref;
            if dist <= 0.0 {
                return None;
            }
            return Some(Signal {
                symbol: symbol.to_string(),
                side: Side::Long,
                entry_ref,
                stop_ref,
                target_ref: entry_ref + self.params.risk_reward * dist,
                candle_time: c3.close_time,
            });
        }

        let short = c1.is_bullish()
            && c2.is_bearish()
            && c2.body() < c1.body()
            && c3.close < c1.body_low()
            && self.body_quality_ok(c3);

        if short {
            let stop_ref = c2.body_high();
            let dist = stop_ref - entry_ref;
            if dist <= 0.0 {
                return None;
            }
            return Some(Signal {
                symbol: symbol.to_string(),
                side: Side::Short,
                entry_ref,
                stop_ref,
                target_ref: entry_ref - self.params.risk_reward * dist,
                candle_time: c3.close_time,
            });
        }

        None
    }

    /// Breakout-conviction filter: the close-open body of the third candle
    /// must cover at least `body_quality_min` of its high-low range. Fails
    /// on a zero-range candle.
    fn body_quality_ok(&self, c3: &Candle) -> bool {
        if self.params.body_quality_min <= 0.0 {
            return true;
        }
        let range = c3.range();
        if range <= 0.0 {
            return false;
        }
        c3.body() / range >= self.params.body_quality_min
    }
}
