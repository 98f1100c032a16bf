//! Integration tests for the JetStream KV policy store
//!
//! These tests require a running NATS server with JetStream enabled.
//! Run with: NATS_URL=nats://127.0.0.1:4222 cargo test -p late-policies -- --ignored

use anyhow::Result;
use chrono::{Duration, Utc};
use late_policies::model::{CalculatedPenalty, DeadlineType, NewLatePolicy, PolicyInput};
use late_policies::store::{KvPolicyStore, PolicyStore, StoreError};

async fn new_isolated_store() -> Result<(KvPolicyStore, String)> {
    let bucket = format!(
        "late_policies_test_{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    let store = KvPolicyStore::connect(&nats_url(), None, &bucket).await?;
    Ok((store, bucket))
}

fn nats_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string())
}

fn new_policy(name: &str, instructor_id: i64) -> NewLatePolicy {
    NewLatePolicy::from_input(
        &PolicyInput {
            policy_name: name.to_string(),
            penalty_per_unit: 5,
            penalty_unit: "Day".to_string(),
            max_penalty: 50,
        },
        instructor_id,
    )
}

#[tokio::test]
#[ignore] // Requires NATS server running
async fn given_empty_bucket_when_listing_then_returns_empty() -> Result<()> {
    let (store, bucket) = new_isolated_store().await?;

    let policies = store.list_visible(12).await?;

    assert!(
        policies.is_empty(),
        "Expected empty KV bucket {}, found {} items",
        bucket,
        policies.len()
    );
    Ok(())
}

#[tokio::test]
#[ignore] // Requires NATS server running
async fn given_inserts_when_listing_then_ids_are_sequential_and_scoped() -> Result<()> {
    let (store, _) = new_isolated_store().await?;

    let first = store.insert(new_policy("Standard", 12)).await?;
    let second = store.insert(new_policy("Strict", 12)).await?;
    let foreign = store.insert(new_policy("Theirs", 40)).await?;

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(foreign.id, 3);
    assert!(first.private);

    let visible: Vec<i64> = store.list_visible(12).await?.iter().map(|p| p.id).collect();
    assert_eq!(visible, vec![1, 2]);
    assert!(store.name_taken("Standard", 12).await?);
    assert!(!store.name_taken("Standard", 40).await?);
    Ok(())
}

#[tokio::test]
#[ignore] // Requires NATS server running
async fn given_policy_when_updated_then_changes_are_persisted() -> Result<()> {
    let (store, _) = new_isolated_store().await?;
    let mut policy = store.insert(new_policy("Standard", 12)).await?;

    policy.max_penalty = 80;
    store.update(&policy).await?;

    let reloaded = store.find(policy.id).await?.expect("policy should exist");
    assert_eq!(reloaded.max_penalty, 80);
    Ok(())
}

#[tokio::test]
#[ignore] // Requires NATS server running
async fn given_penalty_referencing_policy_when_deleting_then_in_use() -> Result<()> {
    let (store, _) = new_isolated_store().await?;
    let used = store.insert(new_policy("Used", 12)).await?;
    let unused = store.insert(new_policy("Unused", 12)).await?;
    store
        .put_penalty(&CalculatedPenalty {
            id: 1,
            late_policy_id: used.id,
            participant_id: 500,
            deadline_type: DeadlineType::Review,
            due_at: Utc::now() - Duration::hours(5),
            submitted_at: Utc::now(),
            penalty_points: 25,
        })
        .await?;

    let err = store.delete(used.id).await.unwrap_err();
    assert!(matches!(err, StoreError::InUse { dependents: 1, .. }));
    assert_eq!(store.penalties_for(used.id).await?.len(), 1);

    store.delete(unused.id).await?;
    assert!(store.find(unused.id).await?.is_none());
    Ok(())
}
