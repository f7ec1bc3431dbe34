//! Payment transaction model
//!
//! Transactions are created by the checkout, tip and payout flows of the
//! payment integration. This core only reads them and applies admin status
//! changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{TransactionStatus, UserSummary};

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Checkout,
    Tip,
    Payout,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Checkout => "CHECKOUT",
            TransactionKind::Tip => "TIP",
            TransactionKind::Payout => "PAYOUT",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CHECKOUT" => Ok(TransactionKind::Checkout),
            "TIP" => Ok(TransactionKind::Tip),
            "PAYOUT" => Ok(TransactionKind::Payout),
            _ => Err(anyhow::anyhow!("Invalid transaction kind: {}", s)),
        }
    }
}

/// Transaction entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction with its owner included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionWithUser {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub user: UserSummary,
}

/// Input for recording a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionInput {
    pub user_id: i64,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub currency: String,
}
