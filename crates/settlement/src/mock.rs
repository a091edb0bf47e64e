//! Scripted execution provider for unit tests.

use alloy_primitives::Address;
use async_trait::async_trait;
use batch_intents_types::{BatchHandle, CallSpec, CallsStatus, ExecutionProvider, ProviderError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Scripted<T> = Mutex<VecDeque<Result<T, ProviderError>>>;

/// Returns scripted results in order; once a script runs dry it falls back to
/// accepting submissions and reporting `Pending`.
///
/// An empty `await_status` script sleeps for the full timeout first, like a
/// real provider that never sees the batch land.
#[derive(Default)]
pub struct MockProvider {
    submit: Scripted<BatchHandle>,
    status: Scripted<CallsStatus>,
    awaited: Scripted<CallsStatus>,
    submitted: Mutex<Vec<CallSpec>>,
    pub submit_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub await_calls: AtomicU32,
}

impl MockProvider {
    pub const HANDLE: &'static str = "0xbatch";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(&self, result: Result<BatchHandle, ProviderError>) {
        self.submit.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<CallsStatus, ProviderError>) {
        self.status.lock().unwrap().push_back(result);
    }

    pub fn push_await(&self, result: Result<CallsStatus, ProviderError>) {
        self.awaited.lock().unwrap().push_back(result);
    }

    pub fn submitted_calls(&self) -> Vec<CallSpec> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_queries(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst) + self.await_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionProvider for MockProvider {
    async fn submit_batch(
        &self,
        calls: &[CallSpec],
        _account: Address,
    ) -> Result<BatchHandle, ProviderError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.submitted.lock().unwrap() = calls.to_vec();
        let scripted = self.submit.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(BatchHandle::new(Self::HANDLE)))
    }

    async fn get_status(&self, _handle: &BatchHandle) -> Result<CallsStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.status.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(CallsStatus::Pending))
    }

    async fn await_status(
        &self,
        _handle: &BatchHandle,
        timeout: Duration,
    ) -> Result<CallsStatus, ProviderError> {
        self.await_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.awaited.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(CallsStatus::Pending)
            }
        }
    }
}
