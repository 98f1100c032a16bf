//! Business-rule checks shared by create and update.
//!
//! All checks run; every failing check contributes its message and the
//! input is valid only when none fail.

use crate::model::PolicyInput;

pub const EDIT_PREFIX: &str = "Cannot edit the policy. ";
pub const MAX_PENALTY_CEILING: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub messages: Vec<String>,
}

impl ValidationReport {
    /// All messages, one per line.
    pub fn message(&self) -> String {
        self.messages.join("\n")
    }
}

fn prefix(is_update: bool) -> &'static str {
    if is_update {
        EDIT_PREFIX
    } else {
        ""
    }
}

pub fn duplicate_name_message(name: &str, is_update: bool) -> String {
    format!(
        "{}A policy with the same name {} already exists.",
        prefix(is_update),
        name
    )
}

pub fn max_penalty_message(is_update: bool) -> String {
    format!(
        "{}The maximum penalty must be between the penalty per unit and {}.",
        prefix(is_update),
        MAX_PENALTY_CEILING
    )
}

pub const NEGATIVE_PENALTY_MESSAGE: &str = "Penalty per unit cannot be negative.";
pub const BLANK_NAME_MESSAGE: &str = "Policy name cannot be blank.";

pub fn max_penalty_out_of_range(max_penalty: i64, penalty_per_unit: i64) -> bool {
    max_penalty < penalty_per_unit || max_penalty > MAX_PENALTY_CEILING
}

pub fn penalty_per_unit_negative(penalty_per_unit: i64) -> bool {
    penalty_per_unit < 0
}

/// Run the pipeline. `duplicate_found` is the result of the name lookup
/// and is `false` when the lookup was skipped.
pub fn validate(input: &PolicyInput, duplicate_found: bool, is_update: bool) -> ValidationReport {
    let mut messages = Vec::new();

    if input.policy_name.trim().is_empty() {
        messages.push(BLANK_NAME_MESSAGE.to_string());
    }

    if duplicate_found {
        messages.push(duplicate_name_message(&input.policy_name, is_update));
    }

    if max_penalty_out_of_range(input.max_penalty, input.penalty_per_unit) {
        messages.push(max_penalty_message(is_update));
    }

    if penalty_per_unit_negative(input.penalty_per_unit) {
        messages.push(NEGATIVE_PENALTY_MESSAGE.to_string());
    }

    ValidationReport {
        valid: messages.is_empty(),
        messages,
    }
}
