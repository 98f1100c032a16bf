//! In-process store used for local runs and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{PolicyStore, StoreError, StoreResult};
use crate::model::{CalculatedPenalty, LatePolicy, NewLatePolicy, PolicyId};

#[derive(Default)]
struct Tables {
    next_id: PolicyId,
    policies: BTreeMap<PolicyId, LatePolicy>,
    penalties: BTreeMap<i64, CalculatedPenalty>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a policy under a fixed id, replacing any existing record.
    pub async fn seed(&self, policy: LatePolicy) {
        let mut tables = self.tables.write().await;
        tables.next_id = tables.next_id.max(policy.id);
        tables.policies.insert(policy.id, policy);
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn list_visible(&self, instructor_id: i64) -> StoreResult<Vec<LatePolicy>> {
        let tables = self.tables.read().await;
        Ok(tables
            .policies
            .values()
            .filter(|p| p.instructor_id == instructor_id || !p.private)
            .cloned()
            .collect())
    }

    async fn find(&self, id: PolicyId) -> StoreResult<Option<LatePolicy>> {
        Ok(self.tables.read().await.policies.get(&id).cloned())
    }

    async fn name_taken(&self, name: &str, instructor_id: i64) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .policies
            .values()
            .any(|p| p.instructor_id == instructor_id && p.policy_name == name))
    }

    async fn insert(&self, policy: NewLatePolicy) -> StoreResult<LatePolicy> {
        let mut tables = self.tables.write().await;
        tables.next_id += 1;
        let stored = policy.into_policy(tables.next_id);
        tables.policies.insert(stored.id, stored.clone());
        debug!("Inserted late policy {}", stored.id);
        Ok(stored)
    }

    async fn update(&self, policy: &LatePolicy) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.policies.get_mut(&policy.id) {
            Some(existing) => {
                *existing = policy.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { id: policy.id }),
        }
    }

    async fn delete(&self, id: PolicyId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let dependents = tables
            .penalties
            .values()
            .filter(|p| p.late_policy_id == id)
            .count();
        if dependents > 0 {
            return Err(StoreError::InUse { id, dependents });
        }
        tables
            .policies
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { id })
    }

    async fn penalties_for(&self, policy_id: PolicyId) -> StoreResult<Vec<CalculatedPenalty>> {
        let tables = self.tables.read().await;
        Ok(tables
            .penalties
            .values()
            .filter(|p| p.late_policy_id == policy_id)
            .cloned()
            .collect())
    }

    async fn put_penalty(&self, penalty: &CalculatedPenalty) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.penalties.insert(penalty.id, penalty.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeadlineType;
    use chrono::Utc;

    fn new_policy(name: &str, instructor_id: i64, private: bool) -> NewLatePolicy {
        NewLatePolicy {
            policy_name: name.to_string(),
            penalty_per_unit: 1,
            penalty_unit: "Day".to_string(),
            max_penalty: 10,
            instructor_id,
            private,
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = MemoryStore::new();
        let a = store.insert(new_policy("a", 1, true)).await.unwrap();
        let b = store.insert(new_policy("b", 1, true)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn visible_policies_are_owned_or_public() {
        let store = MemoryStore::new();
        store.insert(new_policy("mine", 1, true)).await.unwrap();
        store.insert(new_policy("theirs-private", 2, true)).await.unwrap();
        store.insert(new_policy("theirs-public", 2, false)).await.unwrap();
        store.insert(new_policy("mine-public", 1, false)).await.unwrap();

        let names: Vec<String> = store
            .list_visible(1)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.policy_name)
            .collect();

        assert_eq!(names, vec!["mine", "theirs-public", "mine-public"]);
    }

    #[tokio::test]
    async fn names_are_scoped_per_instructor() {
        let store = MemoryStore::new();
        store.insert(new_policy("Standard", 1, true)).await.unwrap();
        assert!(store.name_taken("Standard", 1).await.unwrap());
        assert!(!store.name_taken("Standard", 2).await.unwrap());
    }

    #[tokio::test]
    async fn referenced_policies_cannot_be_deleted() {
        let store = MemoryStore::new();
        let policy = store.insert(new_policy("a", 1, true)).await.unwrap();
        store
            .put_penalty(&CalculatedPenalty {
                id: 1,
                late_policy_id: policy.id,
                participant_id: 10,
                deadline_type: DeadlineType::Review,
                due_at: Utc::now(),
                submitted_at: Utc::now(),
                penalty_points: 0,
            })
            .await
            .unwrap();

        let err = store.delete(policy.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InUse { dependents: 1, .. }));
        assert!(store.find(policy.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn seeded_ids_are_not_reused() {
        let store = MemoryStore::new();
        store
            .seed(new_policy("seeded", 1, true).into_policy(10))
            .await;
        let next = store.insert(new_policy("next", 1, true)).await.unwrap();
        assert_eq!(next.id, 11);
    }
}
