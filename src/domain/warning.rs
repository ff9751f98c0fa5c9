use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the generator stopped short of its pool target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BelowTargetReason {
    TimeBudget,
    AttemptsExhausted,
}

/// Non-fatal condition attached to a valid result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    PoolBelowTarget {
        requested: usize,
        produced: usize,
        reason: BelowTargetReason,
    },
    ToleranceRelaxed {
        archetype: String,
        tolerance: f64,
        default_tolerance: f64,
    },
    ArchetypeShortfall {
        archetype: String,
        requested: usize,
        filled: usize,
        /// Donor archetype; `None` when the unfiltered pool had to be used
        backfilled_by: Option<String>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PoolBelowTarget {
                requested,
                produced,
                reason,
            } => write!(
                f,
                "lineup pool below target: {produced}/{requested} ({reason:?})"
            ),
            Warning::ToleranceRelaxed {
                archetype,
                tolerance,
                default_tolerance,
            } => write!(
                f,
                "{archetype}: exposure tolerance relaxed to {tolerance:.2} (default {default_tolerance:.2})"
            ),
            Warning::ArchetypeShortfall {
                archetype,
                requested,
                filled,
                backfilled_by,
            } => match backfilled_by {
                Some(by) => write!(
                    f,
                    "{archetype}: only {filled}/{requested} own candidates, back-filled from {by}"
                ),
                None => write!(
                    f,
                    "{archetype}: only {filled}/{requested} own candidates, back-filled from the unfiltered pool"
                ),
            },
        }
    }
}
