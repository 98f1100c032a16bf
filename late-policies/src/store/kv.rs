//! JetStream KV backed store.
//!
//! Key layout:
//! - `policy.<id>`  JSON [`LatePolicy`]
//! - `penalty.<id>` JSON [`CalculatedPenalty`]
//! - `seq.policy`   last assigned policy id

use async_nats::jetstream::{self, kv::Store};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{PolicyStore, StoreError, StoreResult};
use crate::model::{CalculatedPenalty, LatePolicy, NewLatePolicy, PolicyId};

const POLICY_PREFIX: &str = "policy.";
const PENALTY_PREFIX: &str = "penalty.";
const POLICY_SEQ_KEY: &str = "seq.policy";
const MAX_ID_ATTEMPTS: usize = 16;

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        message: err.to_string(),
    }
}

fn policy_key(id: PolicyId) -> String {
    format!("{POLICY_PREFIX}{id}")
}

fn penalty_key(id: i64) -> String {
    format!("{PENALTY_PREFIX}{id}")
}

/// Id following the stored counter value; the first id is 1.
fn next_counter(current: Option<&[u8]>) -> StoreResult<PolicyId> {
    let Some(raw) = current else {
        return Ok(1);
    };
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<PolicyId>().ok())
        .and_then(|id| id.checked_add(1))
        .ok_or_else(|| StoreError::Serialization {
            message: format!("invalid id counter at {}", POLICY_SEQ_KEY),
        })
}

/// How a prefix scan treats keys or records it cannot read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// Log and skip. Used for listings.
    Lenient,
    /// Fail the scan. Used where a missed record would change a decision.
    Strict,
}

impl ScanMode {
    fn tolerate(self, key: &str, err: StoreError) -> StoreResult<()> {
        match self {
            ScanMode::Lenient => {
                warn!("Skipping unreadable record {}: {}", key, err);
                Ok(())
            }
            ScanMode::Strict => Err(err),
        }
    }
}

#[derive(Clone)]
pub struct KvPolicyStore {
    kv_store: Store,
}

impl KvPolicyStore {
    /// Connect to NATS and open (or create) the bucket.
    pub async fn connect(
        nats_url: &str,
        creds_path: Option<&str>,
        bucket_name: &str,
    ) -> anyhow::Result<Self> {
        info!(
            "Connecting to NATS at {} for late policy storage (bucket: {})",
            nats_url, bucket_name
        );

        let client = if let Some(creds_path) = creds_path {
            info!("Using credentials file: {}", creds_path);
            async_nats::ConnectOptions::new()
                .credentials_file(creds_path)
                .await?
                .connect(nats_url)
                .await?
        } else {
            warn!("No NATS credentials provided, connecting without auth");
            async_nats::connect(nats_url).await?
        };

        let jetstream = jetstream::new(client);

        let kv_store = match jetstream.get_key_value(bucket_name).await {
            Ok(store) => {
                info!("Using existing KV bucket: {}", bucket_name);
                store
            }
            Err(_) => {
                info!("Creating new KV bucket: {}", bucket_name);
                let config = jetstream::kv::Config {
                    bucket: bucket_name.to_string(),
                    description: "Late policies and calculated penalties".to_string(),
                    ..Default::default()
                };
                jetstream.create_key_value(config).await?
            }
        };

        Ok(Self { kv_store })
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.kv_store.get(key).await.map_err(backend)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_prefixed<T: DeserializeOwned>(
        &self,
        prefix: &str,
        mode: ScanMode,
    ) -> StoreResult<Vec<T>> {
        let mut records = Vec::new();
        let mut keys = self.kv_store.keys().await.map_err(backend)?.boxed();

        while let Some(key_result) = keys.next().await {
            let key = match key_result {
                Ok(key) => key,
                Err(e) => {
                    mode.tolerate(prefix, backend(e))?;
                    continue;
                }
            };
            if !key.starts_with(prefix) {
                continue;
            }
            match self.load::<T>(&key).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => mode.tolerate(&key, e)?,
            }
        }

        Ok(records)
    }

    async fn save_record<T: serde::Serialize>(&self, key: &str, record: &T) -> StoreResult<()> {
        let value = serde_json::to_vec(record)?;
        self.kv_store
            .put(key, value.into())
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Compare-and-set increment of the policy id counter.
    async fn next_policy_id(&self) -> StoreResult<PolicyId> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            let entry = self.kv_store.entry(POLICY_SEQ_KEY).await.map_err(backend)?;
            // Revision 0 only matches while the counter does not exist yet.
            let (next, revision) = match &entry {
                Some(entry) => (next_counter(Some(&entry.value[..]))?, entry.revision),
                None => (next_counter(None)?, 0),
            };
            match self
                .kv_store
                .update(POLICY_SEQ_KEY, next.to_string().into(), revision)
                .await
            {
                Ok(_) => return Ok(next),
                Err(e) => debug!("Policy id allocation attempt {} lost a race: {}", attempt, e),
            }
        }
        Err(StoreError::Backend {
            message: format!(
                "could not allocate a policy id after {} attempts",
                MAX_ID_ATTEMPTS
            ),
        })
    }
}

#[async_trait]
impl PolicyStore for KvPolicyStore {
    async fn list_visible(&self, instructor_id: i64) -> StoreResult<Vec<LatePolicy>> {
        let mut policies: Vec<LatePolicy> = self
            .load_prefixed::<LatePolicy>(POLICY_PREFIX, ScanMode::Lenient)
            .await?
            .into_iter()
            .filter(|p| p.instructor_id == instructor_id || !p.private)
            .collect();
        policies.sort_by_key(|p| p.id);
        Ok(policies)
    }

    async fn find(&self, id: PolicyId) -> StoreResult<Option<LatePolicy>> {
        self.load(&policy_key(id)).await
    }

    async fn name_taken(&self, name: &str, instructor_id: i64) -> StoreResult<bool> {
        Ok(self
            .load_prefixed::<LatePolicy>(POLICY_PREFIX, ScanMode::Strict)
            .await?
            .iter()
            .any(|p| p.instructor_id == instructor_id && p.policy_name == name))
    }

    async fn insert(&self, policy: NewLatePolicy) -> StoreResult<LatePolicy> {
        let id = self.next_policy_id().await?;
        let stored = policy.into_policy(id);
        self.save_record(&policy_key(id), &stored).await?;
        info!("Stored late policy {}", id);
        Ok(stored)
    }

    async fn update(&self, policy: &LatePolicy) -> StoreResult<()> {
        if self.find(policy.id).await?.is_none() {
            return Err(StoreError::NotFound { id: policy.id });
        }
        self.save_record(&policy_key(policy.id), policy).await
    }

    async fn delete(&self, id: PolicyId) -> StoreResult<()> {
        let dependents = self.penalties_for(id).await?.len();
        if dependents > 0 {
            return Err(StoreError::InUse { id, dependents });
        }
        if self.find(id).await?.is_none() {
            return Err(StoreError::NotFound { id });
        }
        self.kv_store
            .delete(policy_key(id))
            .await
            .map_err(backend)?;
        info!("Deleted late policy {}", id);
        Ok(())
    }

    async fn penalties_for(&self, policy_id: PolicyId) -> StoreResult<Vec<CalculatedPenalty>> {
        let mut penalties: Vec<CalculatedPenalty> = self
            .load_prefixed::<CalculatedPenalty>(PENALTY_PREFIX, ScanMode::Strict)
            .await?
            .into_iter()
            .filter(|p| p.late_policy_id == policy_id)
            .collect();
        penalties.sort_by_key(|p| p.id);
        Ok(penalties)
    }

    async fn put_penalty(&self, penalty: &CalculatedPenalty) -> StoreResult<()> {
        self.save_record(&penalty_key(penalty.id), penalty).await
    }
}
