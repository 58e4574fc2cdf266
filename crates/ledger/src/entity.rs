//! Business entities whose mutations are recorded in the ledgers
//!
//! These are the marketplace's own rows. They are mutable; the ledger records
//! describing their mutations are not.

use crate::action::Action;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Deactivated,
}

impl UserStatus {
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        Self::from_str(s).map_err(|_| LedgerError::UnknownValue {
            field: "user_status",
            value: s.to_string(),
        })
    }
}

/// Marketplace user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub region: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
            region: None,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.id.trim().is_empty() {
            return Err(LedgerError::EmptySubjectId);
        }
        if !self.email.contains('@') {
            return Err(LedgerError::InvalidField {
                field: "email",
                reason: format!("'{}' is not an email address", self.email),
            });
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    RolledBack,
}

impl TransactionStatus {
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        Self::from_str(s).map_err(|_| LedgerError::UnknownValue {
            field: "transaction_status",
            value: s.to_string(),
        })
    }

    /// Allowed lifecycle moves
    ///
    /// ```text
    /// pending ──► completed ──► refunded
    ///    │            └───────► rolled_back
    ///    ├──► failed
    ///    ├──► cancelled
    ///    └──► rolled_back
    /// ```
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Pending, RolledBack)
                | (Completed, Refunded)
                | (Completed, RolledBack)
        )
    }

    /// Ledger action recorded when a transaction enters this status
    pub fn ledger_action(&self) -> Action {
        match self {
            TransactionStatus::Pending => Action::Pending,
            TransactionStatus::Completed => Action::Completed,
            TransactionStatus::Failed => Action::Failed,
            TransactionStatus::Cancelled => Action::Cancelled,
            TransactionStatus::Refunded => Action::Refund,
            TransactionStatus::RolledBack => Action::Rollback,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Failed
                | TransactionStatus::Cancelled
                | TransactionStatus::Refunded
                | TransactionStatus::RolledBack
        )
    }
}

/// Marketplace payment transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub region: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New pending transaction with a generated id
    pub fn new(user_id: impl Into<String>, amount: Decimal, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("TX-{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.into(),
            amount,
            currency: currency.into().to_uppercase(),
            region: None,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.id.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(LedgerError::EmptySubjectId);
        }
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(self.amount));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidField {
                field: "currency",
                reason: format!("'{}' is not a 3-letter code", self.currency),
            });
        }
        Ok(())
    }

    /// Check a status move without applying it
    pub fn check_transition(&self, next: TransactionStatus) -> Result<(), LedgerError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }
}
