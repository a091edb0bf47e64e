//! Hand-written collaborators for unit tests.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use batch_intents_types::{
    BatchHandle, CallSpec, CallsStatus, ChainReader, ExecutionProvider, ProviderError, Quote,
    QuoteError, QuoteProvider, QuoteRequest, ReaderError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockReader {
    allowances: Mutex<HashMap<(Address, Address), U256>>,
    failing: Mutex<HashMap<Address, String>>,
    pub calls: AtomicU32,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.allowances
            .lock()
            .unwrap()
            .insert((token, spender), amount);
    }

    /// Every read for `token` fails with `message`
    pub fn fail_token(&self, token: Address, message: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(token, message.to_string());
    }
}

#[async_trait]
impl ChainReader for MockReader {
    async fn get_allowance(
        &self,
        token: Address,
        _owner: Address,
        spender: Address,
    ) -> Result<U256, ReaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failing.lock().unwrap().get(&token) {
            return Err(ReaderError::Rpc(message.clone()));
        }
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&(token, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

type Scripted<T> = Mutex<VecDeque<Result<T, ProviderError>>>;

/// Scripted execution provider; defaults to accepting and staying pending.
///
/// Waits always run their full timeout.
#[derive(Default)]
pub struct MockProvider {
    submit: Scripted<BatchHandle>,
    status: Scripted<CallsStatus>,
    status_delay: Mutex<Duration>,
    submitted: Mutex<Vec<Vec<CallSpec>>>,
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

    /// Every later status read takes `delay` before answering
    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    /// Call lists of every submission, oldest first
    pub fn submissions(&self) -> Vec<Vec<CallSpec>> {
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
        self.submitted.lock().unwrap().push(calls.to_vec());
        let scripted = self.submit.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(BatchHandle::new(Self::HANDLE)))
    }

    async fn get_status(&self, _handle: &BatchHandle) -> Result<CallsStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.status.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(CallsStatus::Pending))
    }

    async fn await_status(
        &self,
        _handle: &BatchHandle,
        timeout: Duration,
    ) -> Result<CallsStatus, ProviderError> {
        self.await_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(timeout).await;
        Ok(CallsStatus::Pending)
    }
}

#[derive(Default)]
pub struct MockQuoter {
    failures: Mutex<VecDeque<QuoteError>>,
    pub calls: AtomicU32,
}

impl MockQuoter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: QuoteError) {
        self.failures.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl QuoteProvider for MockQuoter {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(Quote {
            request: request.clone(),
            call: CallSpec::new(
                Address::repeat_byte(0x5a),
                request.id.as_bytes().to_vec(),
                U256::ZERO,
            ),
            buy_amount: request.sell_amount,
        })
    }
}
