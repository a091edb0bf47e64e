use alloy_primitives::{Address, U256};
use batch_intents_ratelimit::{ResilienceGuard, RetryConfig};
use batch_intents_types::{ApprovalRequirement, ChainReader, Intent, IntentKind};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How spends sharing a (token, spender) pair combine into one approval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowancePolicy {
    /// Largest single spend; approvals are a ceiling per transferFrom
    #[default]
    Max,
    /// Total of all spends, for executors that draw one allowance repeatedly
    Sum,
}

impl AllowancePolicy {
    fn combine(self, current: U256, next: U256) -> U256 {
        match self {
            AllowancePolicy::Max => current.max(next),
            AllowancePolicy::Sum => current.saturating_add(next),
        }
    }
}

/// Executor contract that spends tokens for each intent kind
#[derive(Debug, Clone, Default)]
pub struct SpenderRegistry {
    spenders: HashMap<IntentKind, Address>,
}

impl SpenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: IntentKind, spender: Address) -> Self {
        self.register(kind, spender);
        self
    }

    pub fn register(&mut self, kind: IntentKind, spender: Address) {
        self.spenders.insert(kind, spender);
    }

    /// Registered executor for the intent's kind, else the action call target
    pub fn spender_for(&self, intent: &Intent) -> Address {
        self.spenders
            .get(&intent.kind)
            .copied()
            .unwrap_or(intent.action_call.to)
    }
}

/// Works out which ERC-20 approvals a batch needs
pub struct ApprovalAggregator {
    reader: Arc<dyn ChainReader>,
    guard: ResilienceGuard,
    spenders: SpenderRegistry,
    policy: AllowancePolicy,
    retry: RetryConfig,
    concurrent_reads: bool,
}

impl ApprovalAggregator {
    pub fn new(reader: Arc<dyn ChainReader>, guard: ResilienceGuard) -> Self {
        Self {
            reader,
            guard,
            spenders: SpenderRegistry::default(),
            policy: AllowancePolicy::default(),
            retry: RetryConfig::allowance_read(),
            concurrent_reads: true,
        }
    }

    pub fn with_spenders(mut self, spenders: SpenderRegistry) -> Self {
        self.spenders = spenders;
        self
    }

    pub fn with_policy(mut self, policy: AllowancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrent_reads(mut self, concurrent_reads: bool) -> Self {
        self.concurrent_reads = concurrent_reads;
        self
    }

    pub fn policy(&self) -> AllowancePolicy {
        self.policy
    }

    /// One requirement per distinct (token, spender) pair, in order of first use.
    ///
    /// Native-asset intents never need an approval and are skipped.
    pub fn compute_requirements(&self, intents: &[Intent]) -> Vec<ApprovalRequirement> {
        let mut requirements: Vec<ApprovalRequirement> = Vec::new();
        let mut index: HashMap<(Address, Address), usize> = HashMap::new();

        for intent in intents {
            let Some(token) = intent.spender_token else {
                continue;
            };
            let spender = self.spenders.spender_for(intent);

            match index.get(&(token.address, spender)) {
                Some(&i) => {
                    let req = &mut requirements[i];
                    req.minimum_amount =
                        self.policy.combine(req.minimum_amount, intent.spend_amount);
                }
                None => {
                    index.insert((token.address, spender), requirements.len());
                    requirements.push(ApprovalRequirement {
                        token,
                        spender,
                        minimum_amount: intent.spend_amount,
                    });
                }
            }
        }

        debug!(
            intents = intents.len(),
            requirements = requirements.len(),
            policy = ?self.policy,
            "computed approval requirements"
        );
        requirements
    }

    /// Keep the requirements whose current allowance falls short.
    ///
    /// An allowance that cannot be read counts as insufficient: an extra
    /// approval is cheap, a missing one fails the whole batch.
    pub async fn filter_needed(
        &self,
        requirements: Vec<ApprovalRequirement>,
        owner: Address,
    ) -> Vec<ApprovalRequirement> {
        let checks = requirements.iter().map(|req| self.is_needed(req, owner));

        let needed: Vec<bool> = if self.concurrent_reads {
            join_all(checks).await
        } else {
            let mut needed = Vec::with_capacity(requirements.len());
            for check in checks {
                needed.push(check.await);
            }
            needed
        };

        requirements
            .into_iter()
            .zip(needed)
            .filter_map(|(req, needed)| needed.then_some(req))
            .collect()
    }

    async fn is_needed(&self, req: &ApprovalRequirement, owner: Address) -> bool {
        let reader = &self.reader;
        let (token, spender) = req.key();

        let allowance = self
            .guard
            .call("get_allowance", &self.retry, move || async move {
                reader.get_allowance(token, owner, spender).await
            })
            .await;

        match allowance {
            Ok(current) => {
                debug!(
                    %token,
                    %spender,
                    %current,
                    required = %req.minimum_amount,
                    "allowance read"
                );
                current < req.minimum_amount
            }
            Err(err) => {
                warn!(
                    %token,
                    %spender,
                    error = %err,
                    "allowance read failed, keeping approval"
                );
                true
            }
        }
    }
}
