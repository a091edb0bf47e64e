use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use batch_intents::config::{validate_config, ApprovalPolicy, ConfigLoader};
use batch_intents::metrics::{MetricsCollector, MetricsLayer};
use batch_intents::orchestrator::{BatchOrchestrator, OrchestratorSettings};
use batch_intents::ratelimit::{CircuitBreakerConfig, CircuitState, RetryConfig};
use batch_intents::settlement::TrackerConfig;
use batch_intents::types::{
    BatchHandle, BatchStatus, CallSpec, CallsStatus, ChainReader, ExecutionProvider, Intent,
    IntentKind, Outcome, ProviderError, ReaderError, TokenRef, TxHash,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// MOCK IMPLEMENTATIONS FOR TESTING
// ═══════════════════════════════════════════════════════════════════════════

/// Chain reader with fixed allowances, zero when unset
#[derive(Default)]
struct MockChain {
    allowances: Mutex<HashMap<(Address, Address), U256>>,
    reads: AtomicU32,
}

impl MockChain {
    fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.allowances
            .lock()
            .unwrap()
            .insert((token, spender), amount);
    }

    fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_allowance(
        &self,
        token: Address,
        _owner: Address,
        spender: Address,
    ) -> Result<U256, ReaderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&(token, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

/// Wallet that answers from scripted queues.
///
/// Unscripted submissions are accepted with a fresh handle, unscripted status
/// reads stay pending and unscripted waits run their full timeout.
#[derive(Default)]
struct MockWallet {
    submissions: Mutex<VecDeque<Result<BatchHandle, ProviderError>>>,
    statuses: Mutex<VecDeque<Result<CallsStatus, ProviderError>>>,
    sent: Mutex<Vec<Vec<CallSpec>>>,
    submit_calls: AtomicU32,
    status_calls: AtomicU32,
    await_calls: AtomicU32,
}

impl MockWallet {
    fn script_submit(&self, result: Result<BatchHandle, ProviderError>) {
        self.submissions.lock().unwrap().push_back(result);
    }

    fn script_status(&self, result: Result<CallsStatus, ProviderError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    fn sent(&self) -> Vec<Vec<CallSpec>> {
        self.sent.lock().unwrap().clone()
    }

    fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn polls(&self) -> u32 {
        self.status_calls() + self.await_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionProvider for MockWallet {
    async fn submit_batch(
        &self,
        calls: &[CallSpec],
        _account: Address,
    ) -> Result<BatchHandle, ProviderError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(calls.to_vec());
        let scripted = self.submissions.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(BatchHandle::new(format!("0x{n:02x}"))))
    }

    async fn get_status(&self, _handle: &BatchHandle) -> Result<CallsStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.statuses.lock().unwrap().pop_front();
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

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

const WALLET: Address = Address::repeat_byte(0x01);
const TOKEN_X: Address = Address::repeat_byte(0x11);
const ROUTER: Address = Address::repeat_byte(0x5a);

fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        allowance_retry: RetryConfig::immediate(1),
        submission_retry: RetryConfig::immediate(1),
        tracker: TrackerConfig {
            status_retry: RetryConfig::immediate(1),
            ..TrackerConfig::default()
        },
        ..OrchestratorSettings::default()
    }
}

fn build(
    chain: &Arc<MockChain>,
    wallet: &Arc<MockWallet>,
    settings: OrchestratorSettings,
) -> BatchOrchestrator {
    BatchOrchestrator::builder()
        .with_chain_reader(chain.clone())
        .with_execution_provider(wallet.clone())
        .with_settings(settings)
        .build()
        .unwrap()
}

fn token_intent(id: &str, token: Address, amount: u64) -> Intent {
    Intent::builder()
        .id(id)
        .spends(TokenRef::new(token, 18), U256::from(amount))
        .action_call(CallSpec::new(ROUTER, id.as_bytes().to_vec(), U256::ZERO))
        .build()
        .unwrap()
}

fn native_intent(id: &str) -> Intent {
    Intent::builder()
        .id(id)
        .spends_native(U256::from(1_000u64))
        .action_call(CallSpec::new(
            ROUTER,
            id.as_bytes().to_vec(),
            U256::from(1_000u64),
        ))
        .build()
        .unwrap()
}

fn confirmed(byte: u8) -> CallsStatus {
    CallsStatus::Confirmed {
        tx_ref: TxHash::repeat_byte(byte),
    }
}

fn approvals(calls: &[CallSpec]) -> Vec<(Address, Address, U256)> {
    calls
        .iter()
        .filter_map(|call| {
            call.as_erc20_approve()
                .map(|(spender, amount)| (call.to, spender, amount))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// END-TO-END SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_shared_token_gets_one_approval() {
    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    wallet.script_status(Ok(confirmed(0xaa)));
    let orchestrator = build(&chain, &wallet, fast_settings());

    let outcome = orchestrator
        .execute_batch(
            vec![
                token_intent("x-50", TOKEN_X, 50),
                token_intent("x-80", TOKEN_X, 80),
                native_intent("native"),
            ],
            WALLET,
        )
        .await;

    assert_eq!(
        outcome,
        Outcome::Success {
            tx_ref: TxHash::repeat_byte(0xaa)
        }
    );

    let sent = wallet.sent();
    assert_eq!(sent.len(), 1);
    let calls = &sent[0];

    // One approval, then the three actions in input order
    assert_eq!(approvals(calls), vec![(TOKEN_X, ROUTER, U256::from(80u64))]);
    assert_eq!(calls.len(), 4);
    assert!(calls[0].as_erc20_approve().is_some());
    let actions: Vec<&[u8]> = calls[1..].iter().map(|c| &c.data[..]).collect();
    assert_eq!(actions, vec![&b"x-50"[..], &b"x-80"[..], &b"native"[..]]);
    assert_eq!(calls[3].value, U256::from(1_000u64));

    // One allowance read per distinct (token, spender)
    assert_eq!(chain.reads(), 1);
}

#[tokio::test]
async fn test_user_cancellation_makes_no_status_calls() {
    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    wallet.script_submit(Err(ProviderError::UserRejected(
        "User rejected the request.".into(),
    )));
    let orchestrator = build(&chain, &wallet, fast_settings());

    let outcome = orchestrator
        .execute_batch(vec![token_intent("x", TOKEN_X, 10)], WALLET)
        .await;

    assert!(matches!(outcome, Outcome::Cancelled { .. }));
    assert_eq!(wallet.submit_calls(), 1);
    assert_eq!(wallet.polls(), 0);
    assert!(matches!(
        orchestrator.last_batch().unwrap().status(),
        BatchStatus::Cancelled { .. }
    ));
    // Rejections are not dependency failures
    assert_eq!(orchestrator.guard().breaker().failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_handle_cancels_after_three_attempts() {
    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    wallet.script_submit(Ok(BatchHandle::new("0xdead")));
    for _ in 0..3 {
        wallet.script_status(Err(ProviderError::UnknownHandle(BatchHandle::new("0xdead"))));
    }
    let orchestrator = build(&chain, &wallet, fast_settings());

    let outcome = orchestrator
        .execute_batch(vec![native_intent("native")], WALLET)
        .await;

    assert!(matches!(outcome, Outcome::Cancelled { .. }));
    assert_eq!(wallet.status_calls(), 3);
    assert_eq!(orchestrator.guard().breaker().state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_batch_resolves_later() {
    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    wallet.script_submit(Ok(BatchHandle::new("0xslow")));
    let orchestrator = build(&chain, &wallet, fast_settings());

    let outcome = orchestrator
        .execute_batch(vec![native_intent("native")], WALLET)
        .await;

    let handle = BatchHandle::new("0xslow");
    assert_eq!(
        outcome,
        Outcome::TimedOut {
            handle: handle.clone()
        }
    );
    assert!(matches!(
        orchestrator.last_batch().unwrap().status(),
        BatchStatus::TimedOut
    ));

    // Still pending: another timeout, handle preserved
    assert_eq!(
        orchestrator.resolve(&handle).await.unwrap(),
        Outcome::TimedOut {
            handle: handle.clone()
        }
    );

    wallet.script_status(Ok(confirmed(0xbb)));
    assert_eq!(
        orchestrator.resolve(&handle).await.unwrap(),
        Outcome::Success {
            tx_ref: TxHash::repeat_byte(0xbb)
        }
    );
    assert_eq!(wallet.submit_calls(), 1);
    assert!(orchestrator.store().list_unresolved().await.unwrap().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// SHARED RESILIENCE STATE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_breaker_is_shared_between_orchestrators() {
    let settings = OrchestratorSettings {
        breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        },
        ..fast_settings()
    };
    let guard = settings.build_guard().unwrap();

    let chain = Arc::new(MockChain::default());
    let flaky = Arc::new(MockWallet::default());
    flaky.script_submit(Err(ProviderError::rpc(503, "service unavailable")));
    flaky.script_submit(Err(ProviderError::rpc(503, "service unavailable")));
    let healthy = Arc::new(MockWallet::default());

    let first = BatchOrchestrator::builder()
        .with_chain_reader(chain.clone())
        .with_execution_provider(flaky.clone())
        .with_settings(settings.clone())
        .with_guard(guard.clone())
        .build()
        .unwrap();
    let second = BatchOrchestrator::builder()
        .with_chain_reader(chain)
        .with_execution_provider(healthy.clone())
        .with_settings(settings)
        .with_guard(guard.clone())
        .build()
        .unwrap();

    let outcome = first.execute_batch(vec![native_intent("a")], WALLET).await;
    assert!(matches!(outcome, Outcome::Failed { retryable: true, .. }));
    assert_eq!(guard.breaker().state(), CircuitState::Open);

    let outcome = second.execute_batch(vec![native_intent("b")], WALLET).await;
    assert!(matches!(outcome, Outcome::Failed { retryable: true, .. }));
    assert_eq!(healthy.submit_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_batches_are_independent() {
    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    for byte in 1..=3u8 {
        wallet.script_status(Ok(confirmed(byte)));
    }
    let orchestrator = build(&chain, &wallet, fast_settings());

    let (a, b, c) = futures::join!(
        orchestrator.execute_batch(vec![token_intent("a", TOKEN_X, 1)], WALLET),
        orchestrator.execute_batch(vec![native_intent("b")], WALLET),
        orchestrator.execute_batch(vec![token_intent("c", TOKEN_X, 3)], WALLET),
    );

    for outcome in [&a, &b, &c] {
        assert!(matches!(outcome, Outcome::Success { .. }));
    }
    assert_eq!(wallet.submit_calls(), 3);
    assert!(orchestrator.store().list_unresolved().await.unwrap().is_empty());

    // Every run was recorded under its own handle
    for handle in ["0x01", "0x02", "0x03"] {
        let record = orchestrator
            .store()
            .get(&BatchHandle::new(handle))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(record.status, BatchStatus::Success { .. }));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION AND OBSERVABILITY
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_production_config_routes_approvals_to_registered_spender() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/production.toml");
    let config = ConfigLoader::from_file(&path).unwrap();
    validate_config(&config).unwrap();

    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    wallet.script_status(Ok(confirmed(0xcc)));
    let orchestrator = build(
        &chain,
        &wallet,
        OrchestratorSettings::from_app_config(&config).unwrap(),
    );

    let mut order = token_intent("order", TOKEN_X, 25);
    order.kind = IntentKind::LimitOrder;
    let outcome = orchestrator.execute_batch(vec![order], WALLET).await;

    assert!(matches!(outcome, Outcome::Success { .. }));
    let limit_order_executor: Address = "0x111111125421ca6dc452d289314280a0f8842a65"
        .parse()
        .unwrap();
    assert_eq!(
        approvals(&wallet.sent()[0]),
        vec![(TOKEN_X, limit_order_executor, U256::from(25u64))]
    );
}

#[tokio::test]
async fn test_sum_policy_from_config() {
    let config = ConfigLoader::from_toml(
        r#"
        [approvals]
        policy = "sum"

        [resilience.retry.submission]
        max_retries = 0
        base_delay_ms = 1
        max_delay_ms = 1
        "#,
    )
    .unwrap();
    assert_eq!(config.approvals.policy, ApprovalPolicy::Sum);

    let chain = Arc::new(MockChain::default());
    chain.set_allowance(TOKEN_X, ROUTER, U256::from(100u64));
    let wallet = Arc::new(MockWallet::default());
    wallet.script_status(Ok(confirmed(0xdd)));
    let orchestrator = build(
        &chain,
        &wallet,
        OrchestratorSettings::from_app_config(&config).unwrap(),
    );

    orchestrator
        .execute_batch(
            vec![
                token_intent("x-50", TOKEN_X, 50),
                token_intent("x-80", TOKEN_X, 80),
            ],
            WALLET,
        )
        .await;

    // 100 covers either intent alone but not both
    assert_eq!(
        approvals(&wallet.sent()[0]),
        vec![(TOKEN_X, ROUTER, U256::from(130u64))]
    );
}

#[tokio::test]
async fn test_failures_reach_metrics_through_tracing() {
    use tracing_subscriber::layer::SubscriberExt;

    let metrics = Arc::new(MetricsCollector::new());
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(metrics.clone()));
    let _default = tracing::subscriber::set_default(subscriber);

    let chain = Arc::new(MockChain::default());
    let wallet = Arc::new(MockWallet::default());
    wallet.script_submit(Err(ProviderError::rpc(503, "service unavailable")));
    wallet.script_submit(Err(ProviderError::rpc(503, "service unavailable")));
    let orchestrator = BatchOrchestrator::builder()
        .with_chain_reader(chain)
        .with_execution_provider(wallet)
        .with_settings(fast_settings())
        .with_metrics(metrics.clone())
        .build()
        .unwrap();

    let outcome = orchestrator
        .execute_batch(vec![native_intent("a")], WALLET)
        .await;

    assert!(matches!(outcome, Outcome::Failed { retryable: true, .. }));
    let exported = metrics.export_metrics().unwrap();
    assert!(exported.contains(
        r#"batch_intents_resilience_failures_total{error_class="upstream",operation="submit_batch"} 1"#
    ));
    assert!(exported.contains(r#"batch_intents_batch_outcome_total{outcome="failed"} 1"#));
    assert!(exported.contains("batch_intents_batch_submitted_total 0"));
}
