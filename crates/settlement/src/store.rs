use alloy_primitives::Address;
use async_trait::async_trait;
use batch_intents_types::{BatchHandle, BatchStatus, CallSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Persistent record of a submitted batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchRecord {
    pub handle: BatchHandle,
    pub account: Address,
    pub calls: Vec<CallSpec>,
    pub status: BatchStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl BatchRecord {
    /// A freshly submitted batch awaiting resolution
    pub fn submitted(handle: BatchHandle, account: Address, calls: Vec<CallSpec>) -> Self {
        let now = now_secs();
        Self {
            handle,
            account,
            calls,
            status: BatchStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the batch may still reach a different final status
    pub fn is_unresolved(&self) -> bool {
        matches!(self.status, BatchStatus::Pending | BatchStatus::TimedOut)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch not found: {0}")]
    NotFound(BatchHandle),

    #[error("duplicate batch handle: {0}")]
    DuplicateHandle(BatchHandle),

    #[error("batch {handle} already resolved as {status}")]
    AlreadyResolved {
        handle: BatchHandle,
        status: &'static str,
    },
}

/// Storage for submitted batches, so timed-out handles can be resolved later
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn insert(&self, record: &BatchRecord) -> Result<(), StoreError>;

    /// Record a new observation for an unresolved batch.
    ///
    /// Fails for records that already reached a final status.
    async fn update_status(
        &self,
        handle: &BatchHandle,
        status: BatchStatus,
    ) -> Result<(), StoreError>;

    async fn get(&self, handle: &BatchHandle) -> Result<Option<BatchRecord>, StoreError>;

    /// Records still pending or timed out, in insertion order
    async fn list_unresolved(&self) -> Result<Vec<BatchRecord>, StoreError>;
}

#[derive(Debug, Default)]
struct Records {
    by_handle: HashMap<BatchHandle, (u64, BatchRecord)>,
    next_seq: u64,
}

/// Map-backed store; each record keeps the sequence number it was inserted
/// with, since `created_at` only has one-second resolution.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBatchStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Records> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Records> {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_handle.is_empty()
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn insert(&self, record: &BatchRecord) -> Result<(), StoreError> {
        let mut records = self.write();
        if records.by_handle.contains_key(&record.handle) {
            return Err(StoreError::DuplicateHandle(record.handle.clone()));
        }
        let seq = records.next_seq;
        records.next_seq += 1;
        records
            .by_handle
            .insert(record.handle.clone(), (seq, record.clone()));
        Ok(())
    }

    async fn update_status(
        &self,
        handle: &BatchHandle,
        status: BatchStatus,
    ) -> Result<(), StoreError> {
        let mut records = self.write();
        let (_, record) = records
            .by_handle
            .get_mut(handle)
            .ok_or_else(|| StoreError::NotFound(handle.clone()))?;

        if !record.is_unresolved() {
            return Err(StoreError::AlreadyResolved {
                handle: handle.clone(),
                status: record.status.name(),
            });
        }

        record.status = status;
        record.updated_at = now_secs();
        Ok(())
    }

    async fn get(&self, handle: &BatchHandle) -> Result<Option<BatchRecord>, StoreError> {
        Ok(self
            .read()
            .by_handle
            .get(handle)
            .map(|(_, record)| record.clone()))
    }

    async fn list_unresolved(&self) -> Result<Vec<BatchRecord>, StoreError> {
        let mut results: Vec<_> = self
            .read()
            .by_handle
            .values()
            .filter(|(_, r)| r.is_unresolved())
            .cloned()
            .collect();

        results.sort_by_key(|(seq, _)| *seq);
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
