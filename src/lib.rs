//! Marketplace transaction step engine.
//!
//! Executes on-chain marketplace actions (buy, sell, create listing,
//! create offer, cancel) against an order book backend and a
//! blockchain wallet without the caller knowing the action-specific
//! transaction shape. For each action the engine:
//!
//! - requests an ordered list of abstract steps from the backend
//!   ([`MarketplaceClient::generate_steps`]),
//! - classifies them (token approval, on-chain transaction, off-chain
//!   signature) via the [`Step`] model,
//! - drives the injected wallet through chain switching, approval,
//!   signing and broadcasting ([`TransactionFlow`], [`StepExecutor`]),
//! - and tracks confirmation to a terminal state
//!   ([`confirmation::await_receipt`]).
//!
//! The wallet is consumed only through the
//! [`WalletProvider`](marketflow_wallet::WalletProvider) capability
//! trait from `marketflow-wallet`; hosts supply their own connector
//! wrapper and, for buys needing payment facilitation, a
//! [`CheckoutHandler`].

pub mod action;
pub mod api;
pub mod chain;
pub mod checkout;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod executor;
pub mod flow;
pub mod step;

pub use action::{ActionKind, ActionRequest, EmptyOrderIdError, OrderId, OrderTerms};
pub use api::{ApiError, CheckoutOptions, MarketplaceClient, OrderDetail};
pub use checkout::{CheckoutHandler, CheckoutQuote};
pub use config::{ClientConfig, FlowSettings};
pub use error::{
    ChainSwitchError, CheckoutError, ConfirmationError, FlowError, GenerateStepsError,
    MalformedStepError, NoExecutionStepError, StepError, StepGenerationError,
};
pub use executor::{ExecutionResult, StepExecutor};
pub use flow::{FlowOutcome, FlowStatus, TransactionFlow, TransactionState};
pub use step::{GasOverrides, PostStep, Step, StepKind, WireStep};
