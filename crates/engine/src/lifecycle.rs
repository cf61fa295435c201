use chrono::{DateTime, Utc};

use common::{ClosedTrade, ExitReason, Outcome, Position, Side};

/// Parameters of the position state machine.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    /// Favorable excursion, in R, that arms the breakeven stop.
    pub breakeven_arm_r: f64,
    /// Monitoring ticks before an open position is force-closed.
    pub expiry_bars: u32,
    /// Tolerance when deciding whether an armed-stop exit landed on entry.
    pub breakeven_eps: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            breakeven_arm_r: 1.0,
            expiry_bars: 96,
            breakeven_eps: 1e-8,
        }
    }
}

/// Result of one monitoring tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Held,
    /// Stop was just moved to entry. One-way; never disarmed.
    BreakevenArmed,
    Exit {
        reason: ExitReason,
        price: f64,
    },
}

/// Drives `OPEN (unarmed) -> OPEN (armed) -> CLOSED{...}` for a position.
///
/// Tick order is fixed: arm breakeven, then stop touch, then target touch,
/// then expiry. Stop before target is the explicit tie-break — when a tick
/// satisfies both, the adverse move is assumed resolved first.
#[derive(Debug, Clone, Copy)]
pub struct PositionManager {
    cfg: LifecycleConfig,
}

impl PositionManager {
    pub fn new(cfg: LifecycleConfig) -> Self {
        Self { cfg }
    }

    /// Evaluate one monitoring tick against the latest observed price.
    pub fn evaluate(&self, pos: &mut Position, price: f64) -> Tick {
        pos.bars_held += 1;

        let mut armed_now = false;
        if !pos.breakeven_armed {
            let arm_at = match pos.side {
                Side::Long => pos.entry_price + self.cfg.breakeven_arm_r * pos.one_r,
                Side::Short => pos.entry_price - self.cfg.breakeven_arm_r * pos.one_r,
            };
            let reached = match pos.side {
                Side::Long => price >= arm_at,
                Side::Short => price <= arm_at,
            };
            if reached {
                pos.stop_price = pos.entry_price;
                pos.breakeven_armed = true;
                armed_now = true;
            }
        }

        let stop_hit = match pos.side {
            Side::Long => price <= pos.stop_price,
            Side::Short => price >= pos.stop_price,
        };
        if stop_hit {
            return Tick::Exit {
                reason: ExitReason::Stop,
                price,
            };
        }

        let target_hit = match pos.side {
            Side::Long => price >= pos.target_price,
            Side::Short => price <= pos.target_price,
        };
        if target_hit {
            return Tick::Exit {
                reason: ExitReason::Target,
                price,
            };
        }

        if pos.bars_held >= self.cfg.expiry_bars {
            return Tick::Exit {
                reason: ExitReason::Expiry,
                price,
            };
        }

        if armed_now {
            Tick::BreakevenArmed
        } else {
            Tick::Held
        }
    }

    /// Classify an exit into an outcome and its R multiple.
    pub fn classify(&self, pos: &Position, reason: ExitReason, exit_price: f64) -> (Outcome, f64) {
        let signed_delta = match pos.side {
            Side::Long => exit_price - pos.entry_price,
            Side::Short => pos.entry_price - exit_price,
        };
        let r = if pos.one_r > 0.0 {
            signed_delta / pos.one_r
        } else {
            0.0
        };

        match reason {
            ExitReason::Target => (Outcome::Win, r),
            ExitReason::Stop => {
                if pos.breakeven_armed
                    && (exit_price - pos.entry_price).abs() <= self.cfg.breakeven_eps
                {
                    (Outcome::Breakeven, 0.0)
                } else {
                    (Outcome::Loss, r)
                }
            }
            ExitReason::Expiry => (Outcome::Expired, 0.0),
        }
    }

    /// Build the immutable ledger record for a closed position.
    pub fn build_trade(
        &self,
        pos: &Position,
        reason: ExitReason,
        exit_price: f64,
        exit_time: DateTime<Utc>,
    ) -> ClosedTrade {
        let (outcome, r_multiple) = self.classify(pos, reason, exit_price);
        ClosedTrade {
            id: pos.id.clone(),
            symbol: pos.symbol.clone(),
            side: pos.side,
            entry_price: pos.entry_price,
            stop_price: pos.stop_price,
            target_price: pos.target_price,
            exit_price,
            opened_at: pos.opened_at,
            exit_time,
            outcome,
            r_multiple,
        }
    }
}
