//! Recomputation of calculated penalties after a policy changes.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::model::{CalculatedPenalty, LatePolicy};

/// Granularity a policy charges its penalty in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyUnit {
    Minute,
    Hour,
    Day,
}

impl PenaltyUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minute" | "minutes" => Some(PenaltyUnit::Minute),
            "hour" | "hours" => Some(PenaltyUnit::Hour),
            "day" | "days" => Some(PenaltyUnit::Day),
            _ => None,
        }
    }

    fn minutes(self) -> i64 {
        match self {
            PenaltyUnit::Minute => 1,
            PenaltyUnit::Hour => 60,
            PenaltyUnit::Day => 1440,
        }
    }
}

impl std::fmt::Display for PenaltyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PenaltyUnit::Minute => write!(f, "Minute"),
            PenaltyUnit::Hour => write!(f, "Hour"),
            PenaltyUnit::Day => write!(f, "Day"),
        }
    }
}

/// Whole units between the deadline and the submission. Early submissions
/// are zero units late.
pub fn units_late(due_at: DateTime<Utc>, submitted_at: DateTime<Utc>, unit: PenaltyUnit) -> i64 {
    let minutes_late = (submitted_at - due_at).num_minutes().max(0);
    minutes_late / unit.minutes()
}

/// Points charged for `units` late units, capped at the policy maximum.
pub fn penalty_points(policy: &LatePolicy, units: i64) -> i64 {
    units
        .saturating_mul(policy.penalty_per_unit)
        .min(policy.max_penalty)
}

/// Recompute every penalty charged under `policy`, returning only the
/// records whose points changed.
pub fn recompute(policy: &LatePolicy, penalties: &[CalculatedPenalty]) -> Vec<CalculatedPenalty> {
    let Some(unit) = PenaltyUnit::parse(&policy.penalty_unit) else {
        warn!(
            policy_id = policy.id,
            penalty_unit = %policy.penalty_unit,
            "Unknown penalty unit, leaving calculated penalties unchanged"
        );
        return Vec::new();
    };

    penalties
        .iter()
        .filter(|p| p.late_policy_id == policy.id)
        .filter_map(|p| {
            let points = penalty_points(policy, units_late(p.due_at, p.submitted_at, unit));
            if points == p.penalty_points {
                return None;
            }
            debug!(
                penalty_id = p.id,
                from = p.penalty_points,
                to = points,
                "Calculated penalty changed"
            );
            Some(CalculatedPenalty {
                penalty_points: points,
                ..p.clone()
            })
        })
        .collect()
}
