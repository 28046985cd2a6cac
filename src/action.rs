//! Marketplace action requests.

use std::fmt::{self, Display};

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Order id cannot be empty")]
pub struct EmptyOrderIdError;

/// Backend order identifier newtype with validation.
///
/// Ensures order ids are non-empty and provides type safety to prevent
/// mixing them with other string types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(order_id: impl Into<String>) -> Result<Self, EmptyOrderIdError> {
        let order_id = order_id.into();
        if order_id.is_empty() {
            return Err(EmptyOrderIdError);
        }
        Ok(Self(order_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = EmptyOrderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Terms for a new listing or offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerms {
    pub token_id: U256,
    pub price: U256,
    pub currency: Address,
    /// Unix timestamp after which the order is no longer fillable.
    pub expiry: u64,
}

/// One marketplace action, carrying the minimal fields needed to ask
/// the backend for its step list. Immutable once submitted for a
/// fetch; re-parameterizing (e.g. a price change) means a fresh
/// request and regenerated steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Buy { order_id: OrderId, quantity: U256 },
    Sell { order_id: OrderId, quantity: U256 },
    Cancel { order_id: OrderId },
    CreateListing(OrderTerms),
    CreateOffer(OrderTerms),
}

impl ActionRequest {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Buy { .. } => ActionKind::Buy,
            Self::Sell { .. } => ActionKind::Sell,
            Self::Cancel { .. } => ActionKind::Cancel,
            Self::CreateListing(_) => ActionKind::CreateListing,
            Self::CreateOffer(_) => ActionKind::CreateOffer,
        }
    }

    /// The referenced order, for actions that operate on an existing one.
    pub const fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::Buy { order_id, .. } | Self::Sell { order_id, .. } | Self::Cancel { order_id } => {
                Some(order_id)
            }
            Self::CreateListing(_) | Self::CreateOffer(_) => None,
        }
    }
}

/// Action discriminant used for endpoint dispatch and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Buy,
    Sell,
    Cancel,
    CreateListing,
    CreateOffer,
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Cancel => "cancel",
            Self::CreateListing => "listing",
            Self::CreateOffer => "offer",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_rejects_empty() {
        assert_eq!(OrderId::new("").unwrap_err(), EmptyOrderIdError);
        assert_eq!(OrderId::new("0x9876").unwrap().as_str(), "0x9876");
    }

    #[test]
    fn action_kind_mapping() {
        let order_id = OrderId::new("0x1").unwrap();
        let action = ActionRequest::Cancel { order_id };
        assert_eq!(action.kind(), ActionKind::Cancel);
        assert!(action.order_id().is_some());

        let listing = ActionRequest::CreateListing(OrderTerms {
            token_id: U256::from(7),
            price: U256::from(1_000),
            currency: Address::ZERO,
            expiry: 1_700_000_000,
        });
        assert_eq!(listing.kind(), ActionKind::CreateListing);
        assert!(listing.order_id().is_none());
    }
}
