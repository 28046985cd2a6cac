//! Step model: the polymorphic unit of work returned by the backend.
//!
//! Raw backend payloads arrive as [`WireStep`] and are validated into
//! the [`Step`] sum type at parse time. Fields a kind requires are
//! checked on construction; a step the engine cannot understand is
//! preserved as [`Step::Unknown`] and only fails if execution is
//! attempted on it.

use std::fmt::{self, Display};

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::Value;

use crate::error::MalformedStepError;

/// Discriminant for the seven known step kinds plus `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    TokenApproval,
    Buy,
    Sell,
    Cancel,
    CreateListing,
    CreateOffer,
    SignTypedData,
    SignMessage,
    Unknown,
}

impl StepKind {
    /// Maps a backend wire id to a kind. Unrecognized ids are kept as
    /// [`StepKind::Unknown`] rather than rejected, since the backend
    /// may introduce new step kinds ahead of this engine.
    pub fn from_wire(id: &str) -> Self {
        match id {
            "tokenApproval" => Self::TokenApproval,
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            "cancel" => Self::Cancel,
            "createListing" => Self::CreateListing,
            "createOffer" => Self::CreateOffer,
            "signEIP712" | "signTypedData" => Self::SignTypedData,
            "signEIP191" | "signMessage" => Self::SignMessage,
            _ => Self::Unknown,
        }
    }
}

impl Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TokenApproval => "tokenApproval",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Cancel => "cancel",
            Self::CreateListing => "createListing",
            Self::CreateOffer => "createOffer",
            Self::SignTypedData => "signTypedData",
            Self::SignMessage => "signMessage",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// How a produced signature is delivered back to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostStep {
    pub method: String,
    pub endpoint: String,
    #[serde(default)]
    pub body: Value,
}

/// Optional gas overrides carried by transaction-shaped steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasOverrides {
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub max_fee_per_gas: Option<u128>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Untyped step payload exactly as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStep {
    pub id: String,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(flatten)]
    pub gas: GasOverrides,
    /// EIP-712 payload for `signEIP712` steps.
    #[serde(default)]
    pub signature: Option<TypedData>,
    /// Raw message bytes for `signEIP191` steps.
    #[serde(default)]
    pub message: Option<Bytes>,
    #[serde(default)]
    pub post: Option<PostStep>,
}

/// On-chain call payload (token approval or the action itself).
#[derive(Debug, Clone)]
pub struct TransactionStep {
    pub kind: StepKind,
    pub to: Option<Address>,
    pub data: Option<Bytes>,
    pub value: Option<U256>,
    pub gas: GasOverrides,
}

/// EIP-712 signature step, posted back through the execute endpoint.
#[derive(Debug, Clone)]
pub struct SignTypedDataStep {
    pub typed_data: TypedData,
    /// Validated by the executor, not the parser, so a step missing it
    /// still reaches `execute()` and fails there.
    pub post: Option<PostStep>,
}

/// EIP-191 signature step, posted back through the execute endpoint.
#[derive(Debug, Clone)]
pub struct SignMessageStep {
    pub message: Bytes,
    pub post: Option<PostStep>,
}

/// One validated unit of wallet work.
///
/// Produced fresh by the step generator per request, never mutated,
/// and discarded once executed or once the action is re-parameterized.
#[derive(Debug, Clone)]
pub enum Step {
    Transaction(TransactionStep),
    SignTypedData(SignTypedDataStep),
    SignMessage(SignMessageStep),
    /// A kind this engine does not understand; never actionable.
    Unknown { id: String },
}

impl TryFrom<WireStep> for Step {
    type Error = MalformedStepError;

    fn try_from(wire: WireStep) -> Result<Self, MalformedStepError> {
        let kind = StepKind::from_wire(&wire.id);
        match kind {
            StepKind::TokenApproval
            | StepKind::Buy
            | StepKind::Sell
            | StepKind::Cancel
            | StepKind::CreateListing
            | StepKind::CreateOffer => Ok(Self::Transaction(TransactionStep {
                kind,
                to: wire.to,
                data: wire.data,
                value: wire.value,
                gas: wire.gas,
            })),
            StepKind::SignTypedData => {
                let typed_data = wire.signature.ok_or(MalformedStepError {
                    kind,
                    field: "signature",
                })?;
                Ok(Self::SignTypedData(SignTypedDataStep {
                    typed_data,
                    post: wire.post,
                }))
            }
            StepKind::SignMessage => {
                let message = wire.message.ok_or(MalformedStepError {
                    kind,
                    field: "message",
                })?;
                Ok(Self::SignMessage(SignMessageStep {
                    message,
                    post: wire.post,
                }))
            }
            StepKind::Unknown => Ok(Self::Unknown { id: wire.id }),
        }
    }
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Transaction(step) => step.kind,
            Self::SignTypedData(_) => StepKind::SignTypedData,
            Self::SignMessage(_) => StepKind::SignMessage,
            Self::Unknown { .. } => StepKind::Unknown,
        }
    }

    /// An allowance-granting transaction gating the action step.
    pub const fn is_approval(&self) -> bool {
        matches!(
            self,
            Self::Transaction(TransactionStep {
                kind: StepKind::TokenApproval,
                ..
            })
        )
    }

    pub const fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }

    pub const fn is_signature(&self) -> bool {
        matches!(self, Self::SignTypedData(_) | Self::SignMessage(_))
    }

    /// A step that performs the action's primary effect, as opposed to
    /// an approval prerequisite or an unknown placeholder.
    pub const fn is_execution(&self) -> bool {
        (self.is_transaction() && !self.is_approval()) || self.is_signature()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Result<Step, MalformedStepError> {
        let wire: WireStep = serde_json::from_value(json).unwrap();
        Step::try_from(wire)
    }

    #[test]
    fn parses_transaction_step() {
        let step = parse(serde_json::json!({
            "id": "sell",
            "to": "0x00000000000000000000000000000000000000ab",
            "data": "0x01",
            "value": "0x0",
        }))
        .unwrap();

        let Step::Transaction(tx) = &step else {
            panic!("expected transaction step, got {step:?}");
        };
        assert_eq!(tx.kind, StepKind::Sell);
        assert!(tx.to.is_some());
        assert!(step.is_transaction());
        assert!(step.is_execution());
        assert!(!step.is_approval());
        assert!(!step.is_signature());
    }

    #[test]
    fn approval_is_transaction_shaped_but_not_execution() {
        let step = parse(serde_json::json!({
            "id": "tokenApproval",
            "to": "0x00000000000000000000000000000000000000cd",
            "data": "0x02",
        }))
        .unwrap();

        assert!(step.is_approval());
        assert!(step.is_transaction());
        assert!(!step.is_execution());
    }

    #[test]
    fn parses_typed_data_step_with_post() {
        let step = parse(serde_json::json!({
            "id": "signEIP712",
            "signature": {
                "domain": { "name": "Marketplace", "version": "1", "chainId": 1 },
                "types": {
                    "Order": [{ "name": "maker", "type": "address" }]
                },
                "primaryType": "Order",
                "message": { "maker": "0x00000000000000000000000000000000000000ef" }
            },
            "post": { "method": "POST", "endpoint": "/execute", "body": {} }
        }))
        .unwrap();

        assert_eq!(step.kind(), StepKind::SignTypedData);
        assert!(step.is_signature());
        assert!(step.is_execution());
    }

    #[test]
    fn typed_data_step_without_payload_is_malformed() {
        let err = parse(serde_json::json!({ "id": "signEIP712" })).unwrap_err();

        assert_eq!(err.kind, StepKind::SignTypedData);
        assert_eq!(err.field, "signature");
    }

    #[test]
    fn missing_post_survives_parsing() {
        // Scenario: `post` absence must fail at execution, not here.
        let step = parse(serde_json::json!({
            "id": "signEIP191",
            "message": "0xdeadbeef",
        }))
        .unwrap();

        let Step::SignMessage(sign) = step else {
            panic!("expected message signature step");
        };
        assert!(sign.post.is_none());
    }

    #[test]
    fn unrecognized_kind_is_preserved_as_unknown() {
        let step = parse(serde_json::json!({ "id": "futureStepKind" })).unwrap();

        assert_eq!(step.kind(), StepKind::Unknown);
        assert!(!step.is_execution());
        assert!(matches!(step, Step::Unknown { id } if id == "futureStepKind"));
    }
}
