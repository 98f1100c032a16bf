//! The late policy manager: every list/show/form/create/update/destroy
//! action, evaluated on behalf of an authenticated caller.
//!
//! Expected failures (rejected input, storage errors while saving, policies
//! still in use) are turned into an [`ActionOutcome`] carrying a flash
//! message and a redirect. Only denied access, missing records and
//! storage errors on reads escape as [`ManagerError`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::authorization::{action_allowed, policy_visible, resolve_owner, Action, Caller};
use crate::flash::Flash;
use crate::model::{LatePolicy, LatePolicyParams, NewLatePolicy, PolicyId, PolicyInput};
use crate::penalty;
use crate::store::{PolicyStore, StoreError};
use crate::validation::{self, ValidationReport};

pub const IN_USE_MESSAGE: &str = "This policy is in use and hence cannot be deleted.";
pub const SAVE_ERROR_MESSAGE: &str =
    "The following error occurred while saving the late policy: ";
pub const UPDATE_ERROR_MESSAGE: &str =
    "The following error occurred while updating the late policy: ";

/// Notice shown after a successful save; `verb` is the past tense of the
/// action ("created", "updated").
pub fn success_message(verb: &str) -> String {
    format!("The late policy was successfully {}.", verb)
}

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Not authorized to {action} late policies")]
    AuthorizationDenied { action: String },

    #[error("Late policy not found: {id}")]
    NotFound { id: PolicyId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Who is asking, and which record (if any) the action targets.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Caller,
    pub policy_id: Option<PolicyId>,
}

impl RequestContext {
    pub fn new(caller: Caller) -> Self {
        Self {
            caller,
            policy_id: None,
        }
    }

    pub fn for_policy(caller: Caller, policy_id: PolicyId) -> Self {
        Self {
            caller,
            policy_id: Some(policy_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Index,
    New,
    Edit(PolicyId),
}

impl RedirectTarget {
    pub fn path(self) -> String {
        match self {
            RedirectTarget::Index => "/late_policies".to_string(),
            RedirectTarget::New => "/late_policies/new".to_string(),
            RedirectTarget::Edit(id) => format!("/late_policies/{}/edit", id),
        }
    }
}

/// Result of a mutating action: where to go next and what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub flash: Option<Flash>,
    pub redirect: RedirectTarget,
}

impl ActionOutcome {
    fn notice(message: String, redirect: RedirectTarget) -> Self {
        Self {
            flash: Some(Flash::Notice(message)),
            redirect,
        }
    }

    fn error(message: String, redirect: RedirectTarget) -> Self {
        Self {
            flash: Some(Flash::Error(message)),
            redirect,
        }
    }

    fn redirect(redirect: RedirectTarget) -> Self {
        Self {
            flash: None,
            redirect,
        }
    }
}

#[derive(Clone)]
pub struct LatePolicyManager {
    store: Arc<dyn PolicyStore>,
}

impl LatePolicyManager {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    async fn load(&self, id: PolicyId) -> ManagerResult<LatePolicy> {
        self.store
            .find(id)
            .await?
            .ok_or(ManagerError::NotFound { id })
    }

    /// Check role and ownership for `action`. The record in scope is loaded
    /// to find its owner; without one the caller's own instructor is used.
    pub async fn authorize(&self, action: Option<Action>, ctx: &RequestContext) -> ManagerResult<()> {
        let needs_record =
            ctx.caller.has_ta_privileges() && action.is_some_and(Action::requires_ownership);
        let record = match (needs_record, ctx.policy_id) {
            (true, Some(id)) => Some(self.load(id).await?),
            _ => None,
        };
        let owner = resolve_owner(record.as_ref(), ctx.caller.instructor_id);

        if action_allowed(action, &ctx.caller, owner) {
            Ok(())
        } else {
            let action = action.map(Action::name).unwrap_or("access").to_string();
            warn!(
                user_id = ctx.caller.user_id,
                role = ?ctx.caller.role,
                action = %action,
                "Late policy action denied"
            );
            Err(ManagerError::AuthorizationDenied { action })
        }
    }

    /// Policies owned by the caller's instructor plus every public one.
    pub async fn list(&self, ctx: &RequestContext) -> ManagerResult<Vec<LatePolicy>> {
        self.authorize(Some(Action::Index), ctx).await?;
        let policies = self.store.list_visible(ctx.caller.instructor_id).await?;
        debug!("Listed {} late policies", policies.len());
        Ok(policies)
    }

    /// A single policy, provided the caller could see it in the list.
    pub async fn show(&self, ctx: &RequestContext, id: PolicyId) -> ManagerResult<LatePolicy> {
        self.authorize(Some(Action::Show), ctx).await?;
        let policy = self.load(id).await?;
        if !policy_visible(&policy, &ctx.caller) {
            warn!(
                user_id = ctx.caller.user_id,
                policy_id = id,
                "Private late policy hidden from another instructor"
            );
            return Err(ManagerError::AuthorizationDenied {
                action: Action::Show.name().to_string(),
            });
        }
        Ok(policy)
    }

    /// Blank input for the creation form.
    pub async fn new_form(&self, ctx: &RequestContext) -> ManagerResult<LatePolicyParams> {
        self.authorize(Some(Action::New), ctx).await?;
        Ok(LatePolicyParams::default())
    }

    pub async fn edit_form(&self, ctx: &RequestContext, id: PolicyId) -> ManagerResult<LatePolicy> {
        let ctx = RequestContext::for_policy(ctx.caller.clone(), id);
        self.authorize(Some(Action::Edit), &ctx).await?;
        self.load(id).await
    }

    /// Run the validation pipeline. On update the duplicate-name lookup is
    /// skipped when the name is unchanged.
    async fn validate(
        &self,
        input: &PolicyInput,
        owner_id: i64,
        existing: Option<&LatePolicy>,
    ) -> ManagerResult<ValidationReport> {
        let is_update = existing.is_some();
        let should_check = existing.map_or(true, |p| p.policy_name != input.policy_name);
        let duplicate_found = should_check
            && self
                .store
                .name_taken(&input.policy_name, owner_id)
                .await?;
        Ok(validation::validate(input, duplicate_found, is_update))
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        params: &LatePolicyParams,
    ) -> ManagerResult<ActionOutcome> {
        self.authorize(Some(Action::Create), ctx).await?;
        debug!("Creating late policy '{}'", params.policy_name);

        let input = params.to_input();
        let owner = resolve_owner(None, ctx.caller.instructor_id);
        let report = self.validate(&input, owner, None).await?;
        if !report.valid {
            warn!("Rejected late policy: {}", report.message());
            return Ok(ActionOutcome::error(report.message(), RedirectTarget::New));
        }

        match self.store.insert(NewLatePolicy::from_input(&input, owner)).await {
            Ok(policy) => {
                info!(
                    policy_id = policy.id,
                    instructor_id = owner,
                    "Created late policy '{}'",
                    policy.policy_name
                );
                Ok(ActionOutcome::notice(
                    success_message("created"),
                    RedirectTarget::Index,
                ))
            }
            Err(e) => {
                error!("Failed to save late policy: {}", e);
                Ok(ActionOutcome::error(
                    SAVE_ERROR_MESSAGE.to_string(),
                    RedirectTarget::New,
                ))
            }
        }
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: PolicyId,
        params: &LatePolicyParams,
    ) -> ManagerResult<ActionOutcome> {
        let ctx = RequestContext::for_policy(ctx.caller.clone(), id);
        self.authorize(Some(Action::Update), &ctx).await?;
        let mut policy = self.load(id).await?;
        debug!("Updating late policy {}", id);

        let input = params.to_input();
        let owner = resolve_owner(Some(&policy), ctx.caller.instructor_id);
        let report = self.validate(&input, owner, Some(&policy)).await?;
        if !report.valid {
            warn!("Rejected update of late policy {}: {}", id, report.message());
            return Ok(ActionOutcome::error(report.message(), RedirectTarget::Edit(id)));
        }

        policy.apply(&input);
        if let Err(e) = self.save_and_recompute(&policy).await {
            error!("Failed to update late policy {}: {}", id, e);
            return Ok(ActionOutcome::error(
                UPDATE_ERROR_MESSAGE.to_string(),
                RedirectTarget::Edit(id),
            ));
        }

        info!(policy_id = id, "Updated late policy '{}'", policy.policy_name);
        Ok(ActionOutcome::notice(
            success_message("updated"),
            RedirectTarget::Index,
        ))
    }

    async fn save_and_recompute(&self, policy: &LatePolicy) -> Result<(), StoreError> {
        self.store.update(policy).await?;

        let penalties = self.store.penalties_for(policy.id).await?;
        let changed = penalty::recompute(policy, &penalties);
        for calculated in &changed {
            self.store.put_penalty(calculated).await?;
        }
        if !changed.is_empty() {
            info!(
                policy_id = policy.id,
                "Recomputed {} of {} calculated penalties",
                changed.len(),
                penalties.len()
            );
        }
        Ok(())
    }

    pub async fn destroy(&self, ctx: &RequestContext, id: PolicyId) -> ManagerResult<ActionOutcome> {
        let ctx = RequestContext::for_policy(ctx.caller.clone(), id);
        self.authorize(Some(Action::Destroy), &ctx).await?;
        self.load(id).await?;

        match self.store.delete(id).await {
            Ok(()) => {
                info!(policy_id = id, "Deleted late policy");
                Ok(ActionOutcome::redirect(RedirectTarget::Index))
            }
            Err(e) => {
                warn!("Could not delete late policy {}: {}", id, e);
                Ok(ActionOutcome::error(
                    IN_USE_MESSAGE.to_string(),
                    RedirectTarget::Index,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_messages_use_the_given_verb() {
        assert_eq!(
            success_message("created"),
            "The late policy was successfully created."
        );
        assert_eq!(
            success_message("updated"),
            "The late policy was successfully updated."
        );
    }

    #[test]
    fn redirect_targets_map_to_routes() {
        assert_eq!(RedirectTarget::Index.path(), "/late_policies");
        assert_eq!(RedirectTarget::New.path(), "/late_policies/new");
        assert_eq!(RedirectTarget::Edit(4).path(), "/late_policies/4/edit");
    }
}
