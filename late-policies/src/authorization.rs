//! Role and ownership rules for late policy actions.

use serde::{Deserialize, Serialize};

use crate::model::LatePolicy;

/// User roles, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    #[serde(alias = "ta")]
    TeachingAssistant,
    Instructor,
    #[serde(alias = "admin")]
    Administrator,
    #[serde(alias = "super_admin")]
    SuperAdministrator,
}

impl Role {
    pub fn has_ta_privileges(self) -> bool {
        self >= Role::TeachingAssistant
    }
}

/// The authenticated user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
    /// The instructor this user works for; instructors are their own.
    pub instructor_id: i64,
}

impl Caller {
    pub fn has_ta_privileges(&self) -> bool {
        self.role.has_ta_privileges()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Index,
    Show,
    New,
    Create,
    Edit,
    Update,
    Destroy,
}

impl Action {
    /// Unrecognized names have no action and are never allowed.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "index" => Some(Action::Index),
            "show" => Some(Action::Show),
            "new" => Some(Action::New),
            "create" => Some(Action::Create),
            "edit" => Some(Action::Edit),
            "update" => Some(Action::Update),
            "destroy" => Some(Action::Destroy),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::Show => "show",
            Action::New => "new",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }

    pub fn requires_ownership(self) -> bool {
        matches!(self, Action::Edit | Action::Update | Action::Destroy)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The instructor owning the record in scope, or the caller's own
/// instructor when there is no record.
pub fn resolve_owner(record: Option<&LatePolicy>, caller_instructor_id: i64) -> i64 {
    match record {
        Some(policy) => policy.instructor_id,
        None => caller_instructor_id,
    }
}

/// Private policies are visible only to their owning instructor's staff.
pub fn policy_visible(policy: &LatePolicy, caller: &Caller) -> bool {
    !policy.private || policy.instructor_id == caller.instructor_id
}

pub fn action_allowed(action: Option<Action>, caller: &Caller, owner_id: i64) -> bool {
    let Some(action) = action else {
        return false;
    };
    if !caller.has_ta_privileges() {
        return false;
    }
    if action.requires_ownership() {
        return caller.instructor_id == owner_id;
    }
    true
}
