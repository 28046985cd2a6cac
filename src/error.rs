//! Engine error taxonomy, grouped by the phase that detects them.
//!
//! Nothing in here retries automatically: every error is raised to the
//! caller of the failing phase after the flow state has been
//! reconciled, and every retry is a user-initiated re-invocation.

use std::time::Duration;

use alloy::primitives::{ChainId, TxHash};
use marketflow_wallet::WalletError;

use crate::action::{ActionKind, OrderId};
use crate::api::ApiError;
use crate::step::StepKind;

/// Raw backend step payload missing a field its kind requires.
///
/// Raised at parse time; absence of a required field is a backend
/// contract violation, never silently defaulted.
#[derive(Debug, thiserror::Error)]
#[error("malformed {kind} step: missing required field `{field}`")]
pub struct MalformedStepError {
    pub kind: StepKind,
    pub field: &'static str,
}

/// The backend call that produces an action's step list failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to generate steps for {action} action: {source}")]
pub struct StepGenerationError {
    pub action: ActionKind,
    #[source]
    pub source: ApiError,
}

/// The backend returned steps but none of them performs the action.
///
/// A missing approval step is fine; a step list with no transaction
/// and no signature among the results is a contract violation.
#[derive(Debug, thiserror::Error)]
#[error("backend returned no execution step for {action} action")]
pub struct NoExecutionStepError {
    pub action: ActionKind,
}

/// Errors from requesting the action's step list.
#[derive(Debug, thiserror::Error)]
pub enum GenerateStepsError {
    #[error(transparent)]
    Generation(#[from] StepGenerationError),
    #[error(transparent)]
    NoExecutionStep(#[from] NoExecutionStepError),
}

/// The wallet is on the wrong network and could not be switched.
#[derive(Debug, thiserror::Error)]
#[error("wallet is on chain {current:?} but chain {required} is required: {source}")]
pub struct ChainSwitchError {
    /// `None` when the active chain could not even be read.
    pub current: Option<ChainId>,
    pub required: ChainId,
    #[source]
    pub source: WalletError,
}

/// Errors from executing a single step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Transaction-shaped step carrying neither `to` nor `data`;
    /// detected before the wallet is touched.
    #[error("{kind} step carries neither `to` nor `data`")]
    MissingStepData { kind: StepKind },

    /// Signature step with no `post` descriptor to submit through.
    #[error("{kind} step is missing its `post` descriptor")]
    MissingPost { kind: StepKind },

    /// A step that should be signature-shaped is not.
    #[error("{kind} step is not a valid signature step")]
    InvalidSignatureStep { kind: StepKind },

    /// Execution was attempted on a step kind this engine cannot act on.
    #[error("step kind `{id}` is not executable")]
    UnknownKind { id: String },

    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// The backend rejected the signed payload (expired order, already
    /// filled, invalid signature). Not transient; never retried.
    #[error("backend rejected {kind} step execution: {source}")]
    Execution {
        kind: StepKind,
        #[source]
        source: ApiError,
    },
}

/// Errors from the buy-side payment facilitation sub-flow.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("failed to fetch checkout options: {0}")]
    Options(#[source] ApiError),

    #[error("failed to fetch orders: {0}")]
    Orders(#[source] ApiError),

    #[error("order {0} not found on the backend")]
    OrderNotFound(OrderId),

    /// The external payment UI reported a terminal failure.
    #[error("payment handler failed: {0}")]
    Handler(String),
}

/// Errors from waiting on a broadcast transaction's receipt.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    /// Receipt observed with a failure status.
    #[error("transaction {hash} reverted on-chain")]
    Reverted { hash: TxHash },

    /// No receipt before the deadline. Distinct from [`Reverted`]: the
    /// transaction may still land later, so the UI should point at an
    /// explorer rather than claim failure.
    ///
    /// [`Reverted`]: ConfirmationError::Reverted
    #[error("no receipt for transaction {hash} within {timeout:?}")]
    TimedOut { hash: TxHash, timeout: Duration },

    #[error("receipt lookup failed for transaction {hash}: {source}")]
    Receipt {
        hash: TxHash,
        #[source]
        source: WalletError,
    },
}

/// Unified error surfaced by the transaction flow's phase entry points.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    ChainSwitch(#[from] ChainSwitchError),

    #[error(transparent)]
    StepGeneration(#[from] StepGenerationError),

    #[error(transparent)]
    NoExecutionStep(#[from] NoExecutionStepError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    /// `approve()` was called with no approval step pending.
    #[error("no approval is pending for this action")]
    NoApprovalPending,

    /// `execute()` was called before the guard conditions held.
    #[error(
        "action is not ready to execute (chain needed: {chain_needed}, approval needed: {approval_needed})"
    )]
    NotReady {
        chain_needed: bool,
        approval_needed: bool,
    },

    /// `execute()` was called before a successful step fetch.
    #[error("steps have not been fetched for this action")]
    StepsNotFetched,

    /// `execute()` was called while an execution was already in flight.
    #[error("an execution is already in flight for this action")]
    AlreadyExecuting,

    /// `execute()` was called after the action already reached
    /// `Completed` or `TimedOut`; neither admits a re-broadcast.
    #[error("action has already reached a terminal outcome")]
    AlreadyExecuted,
}

impl From<GenerateStepsError> for FlowError {
    fn from(err: GenerateStepsError) -> Self {
        match err {
            GenerateStepsError::Generation(inner) => Self::StepGeneration(inner),
            GenerateStepsError::NoExecutionStep(inner) => Self::NoExecutionStep(inner),
        }
    }
}
