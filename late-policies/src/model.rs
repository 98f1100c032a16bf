//! Late policy records and the raw form input used to create or edit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PolicyId = i64;

/// A persisted late policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatePolicy {
    pub id: PolicyId,
    pub policy_name: String,
    pub penalty_per_unit: i64,
    pub penalty_unit: String,
    pub max_penalty: i64,
    pub instructor_id: i64,
    pub private: bool,
}

impl LatePolicy {
    /// Copy the editable fields from validated input. Ownership and
    /// visibility are left untouched.
    pub fn apply(&mut self, input: &PolicyInput) {
        self.policy_name = input.policy_name.clone();
        self.penalty_per_unit = input.penalty_per_unit;
        self.penalty_unit = input.penalty_unit.clone();
        self.max_penalty = input.max_penalty;
    }
}

/// A late policy that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLatePolicy {
    pub policy_name: String,
    pub penalty_per_unit: i64,
    pub penalty_unit: String,
    pub max_penalty: i64,
    pub instructor_id: i64,
    pub private: bool,
}

impl NewLatePolicy {
    /// New policies start out private to their owner.
    pub fn from_input(input: &PolicyInput, instructor_id: i64) -> Self {
        Self {
            policy_name: input.policy_name.clone(),
            penalty_per_unit: input.penalty_per_unit,
            penalty_unit: input.penalty_unit.clone(),
            max_penalty: input.max_penalty,
            instructor_id,
            private: true,
        }
    }

    pub fn into_policy(self, id: PolicyId) -> LatePolicy {
        LatePolicy {
            id,
            policy_name: self.policy_name,
            penalty_per_unit: self.penalty_per_unit,
            penalty_unit: self.penalty_unit,
            max_penalty: self.max_penalty,
            instructor_id: self.instructor_id,
            private: self.private,
        }
    }
}

/// Submitted form fields, exactly as they arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatePolicyParams {
    #[serde(default)]
    pub policy_name: String,
    #[serde(default)]
    pub penalty_per_unit: String,
    #[serde(default)]
    pub penalty_unit: String,
    #[serde(default)]
    pub max_penalty: String,
}

impl LatePolicyParams {
    pub fn to_input(&self) -> PolicyInput {
        PolicyInput {
            policy_name: self.policy_name.clone(),
            penalty_per_unit: parse_integer_like(&self.penalty_per_unit),
            penalty_unit: self.penalty_unit.clone(),
            max_penalty: parse_integer_like(&self.max_penalty),
        }
    }
}

impl From<&LatePolicy> for LatePolicyParams {
    fn from(policy: &LatePolicy) -> Self {
        Self {
            policy_name: policy.policy_name.clone(),
            penalty_per_unit: policy.penalty_per_unit.to_string(),
            penalty_unit: policy.penalty_unit.clone(),
            max_penalty: policy.max_penalty.to_string(),
        }
    }
}

/// Form input with the numeric fields already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyInput {
    pub policy_name: String,
    pub penalty_per_unit: i64,
    pub penalty_unit: String,
    pub max_penalty: i64,
}

/// Reads the leading integer of a form value.
///
/// Leading whitespace and an optional sign are accepted, digits are consumed
/// until the first non-digit, and a value without digits reads as 0.
/// Out-of-range values saturate.
pub fn parse_integer_like(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(b - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// Which deadline a calculated penalty was charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    Submission,
    Review,
    MetaReview,
}

/// A penalty charged to a participant under a late policy. Its existence
/// keeps the policy from being deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedPenalty {
    pub id: i64,
    pub late_policy_id: PolicyId,
    pub participant_id: i64,
    pub deadline_type: DeadlineType,
    pub due_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub penalty_points: i64,
}
