//! Hysteresis accumulator and scaling gate.
//!
//! Debounce is counted in events, not time: a key must see
//! `buffer_length` consecutive qualifying events with its count on or
//! outside a bound before a signal fires. Any event that lands strictly
//! inside the band restarts the run.

use std::sync::atomic::Ordering;

use tracing::trace;

use connscale_core::{Direction, GatePolicy, ThresholdConfig};

use crate::registry::KeyState;

/// Result of evaluating one qualifying event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    NoSignal,
    Signal(Direction),
}

impl Evaluation {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Evaluation::Signal(direction) => Some(*direction),
            Evaluation::NoSignal => None,
        }
    }
}

/// Feed the post-transition `count` into the key's accumulator.
///
/// The accumulator increment and the reset-on-fire are a single CAS, so
/// among concurrent callers exactly one observes the run completing. A
/// latched gate is re-checked inside that CAS so a caller racing a
/// latching signal does not start a new run.
pub fn evaluate(
    state: &KeyState,
    count: u32,
    config: &ThresholdConfig,
    policy: GatePolicy,
) -> Evaluation {
    if state.gate.load(Ordering::Acquire) {
        trace!(count, "scaling gate held, evaluation suppressed");
        return Evaluation::NoSignal;
    }

    if !config.is_out_of_band(count) {
        state.hysteresis.store(0, Ordering::Release);
        return Evaluation::NoSignal;
    }

    let buffer_length = config.buffer_length;
    let advanced = state
        .hysteresis
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |run| {
            if state.gate.load(Ordering::Acquire) {
                return None;
            }
            // `>=` also covers a live shrink of buffer_length below the
            // current run.
            if run.saturating_add(1) >= buffer_length {
                Some(0)
            } else {
                Some(run + 1)
            }
        });

    let prev = match advanced {
        Ok(prev) => prev,
        Err(_) => return Evaluation::NoSignal,
    };
    if prev.saturating_add(1) < buffer_length {
        return Evaluation::NoSignal;
    }

    let direction = if count <= config.lower_limit {
        Direction::ScaleDown
    } else {
        Direction::ScaleUp
    };

    // Only the caller that closes the gate reports the signal.
    if policy == GatePolicy::Latched
        && state
            .gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
    {
        return Evaluation::NoSignal;
    }

    Evaluation::Signal(direction)
}
