//! Per-action transaction orchestrator.
//!
//! One [`TransactionFlow`] instance owns the whole lifecycle of one
//! marketplace action; there is no process-wide state. The UI host
//! drives it through `begin` / `fetch_steps` / `approve` / `execute`
//! and observes every transition through a watch channel.
//!
//! # State machine
//!
//! ```text
//! Idle --begin--> CheckingChain --ok--> FetchingSteps
//! CheckingChain --err--> ChainBlocked
//! FetchingSteps --ok, approval needed-----> AwaitingApproval
//! FetchingSteps --ok, no approval needed--> ReadyToExecute
//! FetchingSteps --err--> StepsBlocked
//! AwaitingApproval --approve ok--> ReadyToExecute   (no step re-fetch)
//! AwaitingApproval --approve err--> AwaitingApproval
//! ReadyToExecute --execute--> Executing
//! Executing --tx broadcast--> AwaitingConfirmation
//! Executing --signature accepted--> Completed
//! Executing --err--> Failed                         (execute may be retried)
//! AwaitingConfirmation --receipt ok--> Completed
//! AwaitingConfirmation --receipt reverted--> Failed
//! AwaitingConfirmation --deadline--> TimedOut
//! Completed / TimedOut --execute--> rejected     (the action is spent)
//! ```
//!
//! Phases run strictly in order within one action; concurrent actions
//! each own an independent flow instance and share nothing but the
//! wallet connection itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::{ChainId, TxHash};
use marketflow_wallet::WalletProvider;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::action::{ActionRequest, OrderId};
use crate::api::MarketplaceClient;
use crate::chain::ensure_chain;
use crate::checkout::{CheckoutHandler, run_checkout};
use crate::config::FlowSettings;
use crate::confirmation::await_receipt;
use crate::error::{ConfirmationError, FlowError, NoExecutionStepError, StepError};
use crate::executor::{ExecutionResult, StepExecutor};
use crate::step::Step;

/// Chain-switch phase flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainPhase {
    pub needed: bool,
    pub processing: bool,
    pub processed: bool,
}

/// Approval phase flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPhase {
    pub checked: bool,
    pub needed: bool,
    pub processing: bool,
    pub processed: bool,
}

/// Step-fetch phase flags plus the fetched list.
#[derive(Debug, Clone, Default)]
pub struct StepsPhase {
    pub checking: bool,
    pub checked: bool,
    pub steps: Option<Vec<Step>>,
}

/// Execution phase flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPhase {
    pub ready: bool,
    pub executing: bool,
    pub executed: bool,
}

impl Default for ExecutionPhase {
    // `ready` holds exactly when no chain switch and no approval are
    // needed, which is vacuously the case before either is known.
    fn default() -> Self {
        Self {
            ready: true,
            executing: false,
            executed: false,
        }
    }
}

/// Orchestrator status, including the five terminal states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowStatus {
    #[default]
    Idle,
    CheckingChain,
    ChainBlocked,
    FetchingSteps,
    StepsBlocked,
    AwaitingApproval,
    ReadyToExecute,
    Executing,
    AwaitingConfirmation,
    Completed,
    Failed,
    TimedOut,
}

impl FlowStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::ChainBlocked | Self::StepsBlocked
        )
    }
}

/// Snapshot published to the UI host on every transition.
#[derive(Debug, Clone, Default)]
pub struct TransactionState {
    pub status: FlowStatus,
    pub chain: ChainPhase,
    pub approval: ApprovalPhase,
    pub steps: StepsPhase,
    pub execution: ExecutionPhase,
    /// Set as soon as an execution-phase transaction is broadcast.
    pub hash: Option<TxHash>,
    /// Set when a signature step's submission is accepted.
    pub order_id: Option<OrderId>,
    pub last_error: Option<String>,
}

/// Outcome reported when the flow completes.
///
/// Both fields are set when the backend returned both a transaction
/// and a signature step for the action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowOutcome {
    pub hash: Option<TxHash>,
    pub order_id: Option<OrderId>,
}

struct Inner {
    state: TransactionState,
    approval_step: Option<Step>,
    execution_steps: Vec<Step>,
}

/// Orchestrates one marketplace action end to end.
pub struct TransactionFlow<W: WalletProvider> {
    client: Arc<MarketplaceClient>,
    wallet: Arc<W>,
    executor: StepExecutor<W>,
    action: ActionRequest,
    chain_id: ChainId,
    settings: FlowSettings,
    checkout: Option<Arc<dyn CheckoutHandler>>,
    /// Re-entrancy guard for `fetch_steps`; sits outside the inner
    /// mutex so a duplicate call no-ops instead of queueing.
    checking: AtomicBool,
    /// Re-entrancy guard for `execute`; sits outside the inner mutex
    /// so a duplicate call is rejected instead of queueing behind the
    /// in-flight execution.
    executing: AtomicBool,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<TransactionState>,
}

impl<W: WalletProvider> TransactionFlow<W> {
    pub fn new(
        client: Arc<MarketplaceClient>,
        wallet: Arc<W>,
        action: ActionRequest,
        chain_id: ChainId,
        settings: FlowSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(TransactionState::default());

        Self {
            executor: StepExecutor::new(wallet.clone(), client.clone()),
            client,
            wallet,
            action,
            chain_id,
            settings,
            checkout: None,
            checking: AtomicBool::new(false),
            executing: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: TransactionState::default(),
                approval_step: None,
                execution_steps: Vec::new(),
            }),
            state_tx,
        }
    }

    /// Installs the external payment UI used for buy actions that
    /// require payment facilitation.
    pub fn with_checkout_handler(mut self, handler: Arc<dyn CheckoutHandler>) -> Self {
        self.checkout = Some(handler);
        self
    }

    pub const fn action(&self) -> &ActionRequest {
        &self.action
    }

    /// The UI host's state observable; receives a fresh
    /// [`TransactionState`] on every transition.
    pub fn subscribe(&self) -> watch::Receiver<TransactionState> {
        self.state_tx.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> TransactionState {
        self.state_tx.borrow().clone()
    }

    /// Starts the action: aligns the wallet network, then fetches the
    /// step list.
    #[tracing::instrument(skip(self), fields(action = %self.action.kind()), level = tracing::Level::INFO)]
    pub async fn begin(&self) -> Result<(), FlowError> {
        self.check_chain().await?;
        self.fetch_steps().await
    }

    /// Drives the chain coordinator and records the outcome. Callable
    /// on its own to retry after `ChainBlocked`.
    pub async fn check_chain(&self) -> Result<(), FlowError> {
        let mut inner = self.inner.lock().await;
        inner.state.status = FlowStatus::CheckingChain;
        inner.state.chain.processing = true;
        self.publish(&inner);

        let result = ensure_chain(self.wallet.as_ref(), self.chain_id).await;

        match result {
            Ok(()) => {
                inner.state.chain = ChainPhase {
                    needed: false,
                    processing: false,
                    processed: true,
                };
                Self::recompute_ready(&mut inner);
                self.publish(&inner);
                Ok(())
            }
            Err(err) => {
                inner.state.chain = ChainPhase {
                    needed: true,
                    processing: false,
                    processed: false,
                };
                Self::recompute_ready(&mut inner);
                inner.state.status = FlowStatus::ChainBlocked;
                inner.state.last_error = Some(err.to_string());
                self.publish(&inner);
                Err(err.into())
            }
        }
    }

    /// Requests the ordered step list from the backend and partitions
    /// it into the approval gate and the execution steps.
    ///
    /// A duplicate call while a fetch is already in flight is a no-op:
    /// exactly one backend request runs at a time per action.
    pub async fn fetch_steps(&self) -> Result<(), FlowError> {
        if self.checking.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = self.fetch_steps_locked().await;
        self.checking.store(false, Ordering::SeqCst);
        result
    }

    async fn fetch_steps_locked(&self) -> Result<(), FlowError> {
        let mut inner = self.inner.lock().await;

        // Phases run in order: the chain must have been checked and
        // found aligned before any step request goes out.
        if inner.state.chain.needed || !inner.state.chain.processed {
            return Err(FlowError::NotReady {
                chain_needed: true,
                approval_needed: inner.state.approval.needed,
            });
        }

        inner.state.status = FlowStatus::FetchingSteps;
        inner.state.steps.checking = true;
        self.publish(&inner);

        let result = self
            .client
            .generate_steps(&self.action, self.chain_id, self.wallet.address())
            .await;

        inner.state.steps.checking = false;

        match result {
            Ok(steps) => {
                // The backend's inclusion or omission of the approval
                // step is ground truth; allowance state is never
                // inferred locally.
                let approval_step = steps.iter().find(|step| step.is_approval()).cloned();
                let execution_steps: Vec<Step> = steps
                    .iter()
                    .filter(|step| step.is_execution())
                    .cloned()
                    .collect();

                inner.state.approval.checked = true;
                inner.state.approval.needed = approval_step.is_some();
                inner.state.steps.checked = true;
                inner.state.steps.steps = Some(steps);
                inner.approval_step = approval_step;
                inner.execution_steps = execution_steps;
                Self::recompute_ready(&mut inner);

                inner.state.status = if inner.state.approval.needed {
                    FlowStatus::AwaitingApproval
                } else {
                    FlowStatus::ReadyToExecute
                };
                self.publish(&inner);
                Ok(())
            }
            Err(err) => {
                inner.state.status = FlowStatus::StepsBlocked;
                inner.state.last_error = Some(err.to_string());
                self.publish(&inner);
                Err(err.into())
            }
        }
    }

    /// Executes the pending approval step and waits for its receipt.
    ///
    /// Success consumes the approval step and moves straight to
    /// `ReadyToExecute`; the execution step's shape is unchanged by an
    /// approval, so steps are not re-fetched, and a further `approve()`
    /// call is rejected rather than re-broadcast. Failure keeps the
    /// flow in `AwaitingApproval` for a user-initiated retry.
    #[tracing::instrument(skip(self), fields(action = %self.action.kind()), level = tracing::Level::INFO)]
    pub async fn approve(&self) -> Result<TxHash, FlowError> {
        let mut inner = self.inner.lock().await;

        let step = inner
            .approval_step
            .clone()
            .ok_or(FlowError::NoApprovalPending)?;

        inner.state.approval.processing = true;
        self.publish(&inner);

        let result = self.run_approval(&step).await;

        match result {
            Ok(hash) => {
                inner.approval_step = None;
                inner.state.approval = ApprovalPhase {
                    checked: true,
                    needed: false,
                    processing: false,
                    processed: true,
                };
                Self::recompute_ready(&mut inner);
                inner.state.status = FlowStatus::ReadyToExecute;
                self.publish(&inner);
                info!(%hash, "approval confirmed");
                Ok(hash)
            }
            Err(err) => {
                inner.state.approval.processing = false;
                inner.state.status = FlowStatus::AwaitingApproval;
                inner.state.last_error = Some(err.to_string());
                self.publish(&inner);
                Err(err)
            }
        }
    }

    async fn run_approval(&self, step: &Step) -> Result<TxHash, FlowError> {
        let result = self.executor.execute(step, self.chain_id).await?;

        let ExecutionResult::Transaction { hash } = result else {
            // Approval steps are transaction-shaped by construction.
            return Err(StepError::InvalidSignatureStep { kind: step.kind() }.into());
        };

        await_receipt(
            self.wallet.as_ref(),
            hash,
            self.settings.confirmation_timeout(),
            self.settings.receipt_poll_interval(),
        )
        .await?;

        Ok(hash)
    }

    /// Runs the action's execution step(s) in backend order and, for
    /// broadcast transactions, waits for confirmation.
    ///
    /// Guarded: rejected while a chain switch or approval is still
    /// needed, before a successful step fetch, while another execution
    /// (including a checkout handoff) is in flight, or after the
    /// action already reached `Completed` or `TimedOut`. A failed
    /// execution resets state so `execute()` may be retried.
    #[tracing::instrument(skip(self), fields(action = %self.action.kind()), level = tracing::Level::INFO)]
    pub async fn execute(&self) -> Result<FlowOutcome, FlowError> {
        // The guard must be observable while an execution is in
        // flight; a mutex-held flag would make duplicate callers queue
        // and then run a second full execution.
        if self.executing.swap(true, Ordering::SeqCst) {
            return Err(FlowError::AlreadyExecuting);
        }

        let result = self.execute_guarded().await;
        self.executing.store(false, Ordering::SeqCst);
        result
    }

    async fn execute_guarded(&self) -> Result<FlowOutcome, FlowError> {
        let mut inner = self.inner.lock().await;

        // Completed actions are spent; a timed-out broadcast may still
        // land, so neither admits a re-broadcast. Failed stays
        // retryable.
        if matches!(
            inner.state.status,
            FlowStatus::Completed | FlowStatus::TimedOut
        ) {
            return Err(FlowError::AlreadyExecuted);
        }
        if inner.state.chain.needed || inner.state.approval.needed {
            return Err(FlowError::NotReady {
                chain_needed: inner.state.chain.needed,
                approval_needed: inner.state.approval.needed,
            });
        }
        if !inner.state.steps.checked {
            return Err(FlowError::StepsNotFetched);
        }
        if inner.execution_steps.is_empty() {
            return Err(NoExecutionStepError {
                action: self.action.kind(),
            }
            .into());
        }

        inner.state.execution.executing = true;
        inner.state.status = FlowStatus::Executing;
        self.publish(&inner);

        let steps = inner.execution_steps.clone();
        let result = self.run_execution(&mut inner, &steps).await;

        match result {
            Ok(outcome) => {
                inner.state.execution.executing = false;
                inner.state.execution.executed = true;
                inner.state.status = FlowStatus::Completed;
                inner.state.hash = outcome.hash;
                inner.state.order_id = outcome.order_id.clone();
                self.publish(&inner);
                Ok(outcome)
            }
            Err(err) => {
                inner.state.execution.executing = false;
                inner.state.status = match &err {
                    FlowError::Confirmation(ConfirmationError::TimedOut { .. }) => {
                        FlowStatus::TimedOut
                    }
                    _ => FlowStatus::Failed,
                };
                inner.state.last_error = Some(err.to_string());
                self.publish(&inner);
                warn!(action = %self.action.kind(), "execution failed: {err}");
                Err(err)
            }
        }
    }

    async fn run_execution(
        &self,
        inner: &mut Inner,
        steps: &[Step],
    ) -> Result<FlowOutcome, FlowError> {
        let mut outcome = FlowOutcome::default();

        for step in steps {
            let result = self.run_execution_step(step).await?;

            match result {
                ExecutionResult::Transaction { hash } => {
                    inner.state.status = FlowStatus::AwaitingConfirmation;
                    inner.state.hash = Some(hash);
                    self.publish(inner);

                    await_receipt(
                        self.wallet.as_ref(),
                        hash,
                        self.settings.confirmation_timeout(),
                        self.settings.receipt_poll_interval(),
                    )
                    .await?;

                    outcome.hash = Some(hash);
                }
                ExecutionResult::Signature { order_id } => {
                    // The accepted submission is the confirmation;
                    // there is no receipt to await.
                    inner.state.order_id = Some(order_id.clone());
                    self.publish(inner);
                    outcome.order_id = Some(order_id);
                }
            }
        }

        Ok(outcome)
    }

    async fn run_execution_step(&self, step: &Step) -> Result<ExecutionResult, FlowError> {
        if let (
            ActionRequest::Buy { order_id, .. },
            Step::Transaction(transaction),
            Some(handler),
        ) = (&self.action, step, &self.checkout)
        {
            // Payment facilitation: the payment UI owns the on-chain
            // submission for this step.
            let hash = run_checkout(
                self.client.as_ref(),
                handler.as_ref(),
                order_id,
                transaction,
            )
            .await?;
            return Ok(ExecutionResult::Transaction { hash });
        }

        Ok(self.executor.execute(step, self.chain_id).await?)
    }

    fn recompute_ready(inner: &mut Inner) {
        inner.state.execution.ready =
            !inner.state.chain.needed && !inner.state.approval.needed;
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }
}
