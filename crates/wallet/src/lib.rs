//! Wallet interaction abstraction.
//!
//! This crate provides the [`WalletProvider`] trait the engine drives
//! marketplace actions through: account identity, network switching,
//! transaction submission, typed-data and raw-message signing, and
//! receipt lookup.
//!
//! The engine depends only on this trait, never on a concrete wallet
//! or connector library. Production hosts wrap their connector of
//! choice; tests use the in-tree [`MockWallet`].
//!
//! Every method that reaches the user's wallet UI is a suspending
//! operation with no engine-enforced timeout. A user declining a
//! prompt surfaces as [`WalletError::Rejected`] and is terminal for
//! that attempt; the engine never retries wallet-level rejections.

use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes, ChainId, Signature, TxHash, U256};
use async_trait::async_trait;

pub mod mock;

pub use mock::{MockWallet, ReceiptBehavior};

/// Errors surfaced by a wallet provider.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The user declined the prompt in the wallet UI.
    #[error("user rejected the wallet request")]
    Rejected,
    /// The connected wallet cannot switch to the requested chain.
    #[error("chain {0} is not supported by the connected wallet")]
    UnsupportedChain(ChainId),
    /// Connector or transport failure underneath the wallet.
    #[error("wallet provider error: {0}")]
    Provider(String),
}

/// Transaction envelope submitted through a wallet.
///
/// `to` and `data` come straight from the backend step payload and are
/// individually optional on the wire; the engine rejects a step where
/// both are absent before it ever reaches the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub to: Option<Address>,
    pub data: Option<Bytes>,
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub chain_id: ChainId,
}

/// The chain's record of a mined transaction's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    /// `true` for success, `false` for an on-chain revert.
    pub status: bool,
    pub block_number: Option<u64>,
}

/// Injected wallet capability.
///
/// The wallet is an external authority: the engine only issues
/// requests and awaits responses. Implementations handle key
/// management, connector plumbing, and user confirmation UI.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Returns the connected account address.
    fn address(&self) -> Address;

    /// Returns the wallet's currently active chain.
    async fn chain_id(&self) -> Result<ChainId, WalletError>;

    /// Requests a network switch; may suspend on user confirmation.
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError>;

    /// Signs and broadcasts a transaction, returning its hash without
    /// waiting for a receipt.
    async fn send_transaction(&self, tx: TransactionEnvelope) -> Result<TxHash, WalletError>;

    /// Produces an EIP-712 signature over the given typed data.
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, WalletError>;

    /// Produces an EIP-191 signature over raw message bytes.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;

    /// Looks up the receipt for a broadcast transaction, `None` while
    /// it is still pending.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, WalletError>;
}

#[async_trait]
impl<T: WalletProvider> WalletProvider for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn chain_id(&self) -> Result<ChainId, WalletError> {
        (**self).chain_id().await
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError> {
        (**self).switch_chain(chain_id).await
    }

    async fn send_transaction(&self, tx: TransactionEnvelope) -> Result<TxHash, WalletError> {
        (**self).send_transaction(tx).await
    }

    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Signature, WalletError> {
        (**self).sign_typed_data(typed_data).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        (**self).sign_message(message).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, WalletError> {
        (**self).transaction_receipt(hash).await
    }
}
