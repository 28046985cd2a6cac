//! Scriptable wallet for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, ChainId, Signature, TxHash, U256};
use async_trait::async_trait;

use crate::{TransactionEnvelope, TxReceipt, WalletError, WalletProvider};

/// What [`MockWallet::transaction_receipt`] reports for broadcast hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiptBehavior {
    /// Every queried hash confirms successfully.
    #[default]
    Success,
    /// Every queried hash confirms with a revert status.
    Reverted,
    /// No hash ever confirms; receipt lookups return `None` forever.
    Never,
}

/// Deterministic in-memory wallet for exercising the engine without a
/// connector. Records every envelope and chain switch for assertions.
#[derive(Debug)]
pub struct MockWallet {
    address: Address,
    chain: AtomicU64,
    reject_switch: bool,
    reject_transactions: bool,
    reject_signatures: bool,
    receipt_behavior: ReceiptBehavior,
    hash_counter: AtomicU64,
    sent: Mutex<Vec<TransactionEnvelope>>,
    switches: Mutex<Vec<ChainId>>,
}

impl MockWallet {
    pub fn on_chain(chain_id: ChainId) -> Self {
        Self {
            address: Address::repeat_byte(0xa1),
            chain: AtomicU64::new(chain_id),
            reject_switch: false,
            reject_transactions: false,
            reject_signatures: false,
            receipt_behavior: ReceiptBehavior::Success,
            hash_counter: AtomicU64::new(1),
            sent: Mutex::new(Vec::new()),
            switches: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting_switch(mut self) -> Self {
        self.reject_switch = true;
        self
    }

    pub fn rejecting_transactions(mut self) -> Self {
        self.reject_transactions = true;
        self
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    pub fn with_receipt_behavior(mut self, behavior: ReceiptBehavior) -> Self {
        self.receipt_behavior = behavior;
        self
    }

    /// Envelopes submitted through [`WalletProvider::send_transaction`],
    /// in submission order.
    pub fn sent_transactions(&self) -> Vec<TransactionEnvelope> {
        self.sent.lock().expect("sent lock poisoned").clone()
    }

    /// Chain ids the wallet was asked to switch to.
    pub fn requested_switches(&self) -> Vec<ChainId> {
        self.switches.lock().expect("switches lock poisoned").clone()
    }

    fn next_hash(&self) -> TxHash {
        let n = self.hash_counter.fetch_add(1, Ordering::SeqCst);
        TxHash::from(U256::from(n))
    }

    fn dummy_signature() -> Signature {
        Signature::new(U256::from(1), U256::from(1), false)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<ChainId, WalletError> {
        Ok(self.chain.load(Ordering::SeqCst))
    }

    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), WalletError> {
        self.switches
            .lock()
            .expect("switches lock poisoned")
            .push(chain_id);

        if self.reject_switch {
            return Err(WalletError::Rejected);
        }

        self.chain.store(chain_id, Ordering::SeqCst);
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionEnvelope) -> Result<TxHash, WalletError> {
        if self.reject_transactions {
            return Err(WalletError::Rejected);
        }

        self.sent.lock().expect("sent lock poisoned").push(tx);
        Ok(self.next_hash())
    }

    async fn sign_typed_data(&self, _typed_data: &TypedData) -> Result<Signature, WalletError> {
        if self.reject_signatures {
            return Err(WalletError::Rejected);
        }
        Ok(Self::dummy_signature())
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<Signature, WalletError> {
        if self.reject_signatures {
            return Err(WalletError::Rejected);
        }
        Ok(Self::dummy_signature())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, WalletError> {
        match self.receipt_behavior {
            ReceiptBehavior::Success => Ok(Some(TxReceipt {
                hash,
                status: true,
                block_number: Some(1),
            })),
            ReceiptBehavior::Reverted => Ok(Some(TxReceipt {
                hash,
                status: false,
                block_number: Some(1),
            })),
            ReceiptBehavior::Never => Ok(None),
        }
    }
}
