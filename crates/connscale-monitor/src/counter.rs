//! Connection counter: applies a qualifying transition to a key's count.

use std::sync::atomic::Ordering;

use connscale_core::Transition;

use crate::registry::KeyState;

/// Outcome of applying a transition to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountUpdate {
    /// The key is watched; carries the count after the transition.
    Applied(u32),
    /// The key is not watched. Nothing was created or changed.
    Skipped,
}

/// Apply `transition` to the key's count and return the new value.
///
/// `Closed` never takes the count below zero: a close with no matching
/// establish leaves it at 0 rather than inferring the missed event.
pub fn apply(state: &KeyState, transition: Transition) -> u32 {
    match transition {
        Transition::Established => {
            let prev = state
                .count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                    Some(c.saturating_add(1))
                })
                .unwrap_or_else(|c| c);
            prev.saturating_add(1)
        }
        Transition::Closed => {
            match state
                .count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
            {
                Ok(prev) => prev - 1,
                // Already zero.
                Err(current) => current,
            }
        }
    }
}
