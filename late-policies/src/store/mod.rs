//! Persistence for late policies and the calculated penalties that depend
//! on them.

pub mod kv;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{CalculatedPenalty, LatePolicy, NewLatePolicy, PolicyId};

pub use kv::KvPolicyStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Late policy not found: {id}")]
    NotFound { id: PolicyId },

    #[error("Late policy {id} is referenced by {dependents} calculated penalties")]
    InUse { id: PolicyId, dependents: usize },

    #[error("Failed to encode or decode record: {message}")]
    Serialization { message: String },

    #[error("Storage backend error: {message}")]
    Backend { message: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operations the late policy manager relies on.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Policies owned by `instructor_id` plus every public policy, ordered
    /// by id.
    async fn list_visible(&self, instructor_id: i64) -> StoreResult<Vec<LatePolicy>>;

    async fn find(&self, id: PolicyId) -> StoreResult<Option<LatePolicy>>;

    /// Whether `instructor_id` already owns a policy called `name`.
    async fn name_taken(&self, name: &str, instructor_id: i64) -> StoreResult<bool>;

    /// Store a new policy and return it with its assigned id.
    async fn insert(&self, policy: NewLatePolicy) -> StoreResult<LatePolicy>;

    async fn update(&self, policy: &LatePolicy) -> StoreResult<()>;

    /// Remove a policy. Fails with [`StoreError::InUse`] while calculated
    /// penalties still reference it.
    async fn delete(&self, id: PolicyId) -> StoreResult<()>;

    async fn penalties_for(&self, policy_id: PolicyId) -> StoreResult<Vec<CalculatedPenalty>>;

    /// Insert or replace a calculated penalty.
    async fn put_penalty(&self, penalty: &CalculatedPenalty) -> StoreResult<()>;
}
