//! Ledger search filter

use chrono::{DateTime, Utc};
use ledgerseal_chain::format_stamp;
use ledgerseal_ledger::Action;
use sqlx::{QueryBuilder, Sqlite};

/// Criteria for [`LedgerRepo::search`](crate::LedgerRepo::search)
///
/// Every criterion is optional and they combine with AND. The date range is
/// inclusive on both ends. Results always come back in sequence order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub subject_id: Option<String>,
    pub region: Option<String>,
    pub subsystem: Option<String>,
    pub action: Option<Action>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Append `WHERE ... ORDER BY ... LIMIT ...` to a `SELECT` over a ledger table
    pub fn push_sql<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        let mut first = true;
        let mut clause = |qb: &mut QueryBuilder<'a, Sqlite>| {
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(subject_id) = &self.subject_id {
            clause(qb);
            qb.push("subject_id = ").push_bind(subject_id.as_str());
        }
        if let Some(region) = &self.region {
            clause(qb);
            qb.push("region = ").push_bind(region.as_str());
        }
        if let Some(subsystem) = &self.subsystem {
            clause(qb);
            qb.push("subsystem = ").push_bind(subsystem.as_str());
        }
        if let Some(action) = self.action {
            clause(qb);
            qb.push("action = ").push_bind(action.to_string());
        }
        if let Some(from) = &self.from {
            clause(qb);
            qb.push("created_at >= ").push_bind(format_stamp(from));
        }
        if let Some(to) = &self.to {
            clause(qb);
            qb.push("created_at <= ").push_bind(format_stamp(to));
        }

        qb.push(" ORDER BY sequence ASC");

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }
    }
}
