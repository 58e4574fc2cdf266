//! Ledger records
//!
//! A [`RecordDraft`] is what a caller supplies. Sealing it against the chain
//! tail produces a [`LedgerRecord`]: sequence, id, stamp and digests are
//! assigned there and never change afterwards.

use crate::action::{Action, ActorType, LedgerKind};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use ledgerseal_chain::{audit_hash_at, format_stamp, Chained, Fields, STAMP_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Caller-supplied content of a ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub subject_id: String,
    pub action: Action,
    pub actor_type: ActorType,
    pub reason_code: String,
    pub policy_version: String,
    pub region: Option<String>,
    pub subsystem: Option<String>,
    pub details: Fields,
}

impl RecordDraft {
    pub fn new(
        subject_id: impl Into<String>,
        action: Action,
        actor_type: ActorType,
        reason_code: impl Into<String>,
        policy_version: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            action,
            actor_type,
            reason_code: reason_code.into(),
            policy_version: policy_version.into(),
            region: None,
            subsystem: None,
            details: Fields::new(),
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Field validation. Reason code and policy version are never inferred.
    pub fn validate(&self, kind: LedgerKind) -> Result<(), LedgerError> {
        if self.subject_id.trim().is_empty() {
            return Err(LedgerError::EmptySubjectId);
        }
        if self.reason_code.trim().is_empty() {
            return Err(LedgerError::MissingReasonCode);
        }
        if self.policy_version.trim().is_empty() {
            return Err(LedgerError::MissingPolicyVersion);
        }
        if !self.action.permitted_in(kind) {
            return Err(LedgerError::ActionNotPermitted {
                action: self.action.to_string(),
                kind: kind.to_string(),
            });
        }
        Ok(())
    }
}

/// Immutable, hash-chained ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: String,
    pub kind: LedgerKind,
    /// Position in the kind's global chain, starting at 1
    pub sequence: u64,
    pub subject_id: String,
    pub action: Action,
    pub actor_type: ActorType,
    pub reason_code: String,
    pub policy_version: String,
    pub region: Option<String>,
    pub subsystem: Option<String>,
    pub details: Fields,
    /// Server stamp hashed into `curr_hash`
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub curr_hash: String,
}

impl LedgerRecord {
    /// Seal a validated draft onto the chain tail using the current time
    pub fn seal(
        kind: LedgerKind,
        sequence: u64,
        prev_hash: &str,
        draft: RecordDraft,
    ) -> Result<Self, LedgerError> {
        Self::seal_at(kind, sequence, prev_hash, draft, Utc::now())
    }

    /// [`seal`](Self::seal) with an explicit clock reading
    pub fn seal_at(
        kind: LedgerKind,
        sequence: u64,
        prev_hash: &str,
        draft: RecordDraft,
        at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        draft.validate(kind)?;

        let mut record = Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            sequence,
            subject_id: draft.subject_id,
            action: draft.action,
            actor_type: draft.actor_type,
            reason_code: draft.reason_code,
            policy_version: draft.policy_version,
            region: draft.region,
            subsystem: draft.subsystem,
            details: draft.details,
            created_at: at,
            prev_hash: prev_hash.to_string(),
            curr_hash: String::new(),
        };

        let stamped = audit_hash_at(prev_hash, &record.unstamped_fields(), at);
        record.created_at = stamped.stamped_at;
        record.curr_hash = stamped.digest;

        Ok(record)
    }

    /// Every hashed field except the stamp
    fn unstamped_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("id".into(), json!(self.id));
        f.insert("kind".into(), json!(self.kind.to_string()));
        f.insert("sequence".into(), json!(self.sequence));
        f.insert("subject_id".into(), json!(self.subject_id));
        f.insert("action".into(), json!(self.action.to_string()));
        f.insert("actor_type".into(), json!(self.actor_type.to_string()));
        f.insert("reason_code".into(), json!(self.reason_code));
        f.insert("policy_version".into(), json!(self.policy_version));
        f.insert("region".into(), json!(self.region));
        f.insert("subsystem".into(), json!(self.subsystem));
        f.insert("details".into(), Value::Object(self.details.clone()));
        f
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }
}

impl Chained for LedgerRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    fn curr_hash(&self) -> &str {
        &self.curr_hash
    }

    fn hashable_fields(&self) -> Fields {
        let mut f = self.unstamped_fields();
        f.insert(STAMP_FIELD.into(), json!(format_stamp(&self.created_at)));
        f
    }
}
