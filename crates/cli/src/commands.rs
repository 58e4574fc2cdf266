//! CLI commands

use chrono::{DateTime, Utc};
use ledgerseal_chain::ViolationKind;
use ledgerseal_guard::headers::{
    HEADER_ATTESTATION, HEADER_ATTESTATION_TIMESTAMP, HEADER_DEVICE_FINGERPRINT,
    HEADER_OPERATOR_IDENTITY,
};
use ledgerseal_guard::{AttestationMode, AuthorizationHeaders};
use ledgerseal_ledger::{Action, LedgerKind, LedgerRecord, Transaction, TransactionStatus, User};
use ledgerseal_service::{IntegrityReport, Justification, ServiceContext};
use ledgerseal_store::RecordFilter;
use rand::RngCore;
use rust_decimal::Decimal;

/// Show schema status
pub async fn init(ctx: &ServiceContext) -> Result<(), anyhow::Error> {
    println!("✅ Database ready");
    for kind in LedgerKind::ALL {
        let count = ctx.query().count(kind).await?;
        println!("   {:<20} {} records", kind.table(), count);
    }
    Ok(())
}

pub async fn create_user(
    ctx: &ServiceContext,
    user: User,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let (user, record) = ctx.accounts().create_user(user, why).await?;
    println!("✅ Created user {} <{}>", user.id, user.email);
    print_committed(&record);
    Ok(())
}

/// Apply only the given fields on top of the stored profile
pub async fn update_user(
    ctx: &ServiceContext,
    user_id: &str,
    email: Option<String>,
    display_name: Option<String>,
    region: Option<String>,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let mut user = ctx.accounts().get_user(user_id).await?;
    if let Some(email) = email {
        user.email = email;
    }
    if let Some(display_name) = display_name {
        user.display_name = display_name;
    }
    if region.is_some() {
        user.region = region;
    }

    let (user, record) = ctx.accounts().update_user(user, why).await?;
    println!("✅ Updated user {}", user.id);
    print_committed(&record);
    Ok(())
}

pub async fn deactivate_user(
    ctx: &ServiceContext,
    headers: &AuthorizationHeaders,
    user_id: &str,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let record = ctx.accounts().deactivate_user(headers, user_id, why).await?;
    println!("✅ Deactivated user {}", user_id);
    print_committed(&record);
    Ok(())
}

pub async fn delete_user(
    ctx: &ServiceContext,
    headers: &AuthorizationHeaders,
    user_id: &str,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let record = ctx.accounts().delete_user(headers, user_id, why).await?;
    println!("✅ Deleted user {} (history kept)", user_id);
    print_committed(&record);
    Ok(())
}

pub async fn open_transaction(
    ctx: &ServiceContext,
    tx: Transaction,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let (tx, record) = ctx.transactions().open_transaction(tx, why).await?;
    println!(
        "✅ Opened transaction {}: {} {} for {}",
        tx.id, tx.amount, tx.currency, tx.user_id
    );
    print_committed(&record);
    Ok(())
}

pub async fn set_status(
    ctx: &ServiceContext,
    tx_id: &str,
    status: TransactionStatus,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let record = ctx.transactions().set_status(tx_id, status, why).await?;
    println!("✅ Transaction {} is now {}", tx_id, status);
    print_committed(&record);
    Ok(())
}

pub async fn refund(
    ctx: &ServiceContext,
    headers: &AuthorizationHeaders,
    tx_id: &str,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let record = ctx.transactions().refund(headers, tx_id, why).await?;
    println!("✅ Refunded transaction {}", tx_id);
    print_committed(&record);
    Ok(())
}

pub async fn rollback(
    ctx: &ServiceContext,
    headers: &AuthorizationHeaders,
    tx_id: &str,
    why: &Justification,
) -> Result<(), anyhow::Error> {
    let record = ctx.transactions().rollback(headers, tx_id, why).await?;
    println!("✅ Rolled back transaction {}", tx_id);
    print_committed(&record);
    Ok(())
}

/// Ledger history of one subject
pub async fn history(
    ctx: &ServiceContext,
    kind: LedgerKind,
    subject_id: &str,
    json: bool,
) -> Result<(), anyhow::Error> {
    let records = ctx.query().get_history(kind, subject_id).await?;
    print_records(&records, json)
}

#[allow(clippy::too_many_arguments)]
pub async fn search(
    ctx: &ServiceContext,
    kind: LedgerKind,
    region: Option<String>,
    subsystem: Option<String>,
    action: Option<Action>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: u32,
    json: bool,
) -> Result<(), anyhow::Error> {
    let filter = RecordFilter {
        subject_id: None,
        region,
        subsystem,
        action,
        from,
        to,
        limit: Some(limit),
    };
    let records = ctx.query().search(kind, &filter).await?;
    print_records(&records, json)
}

/// Verify ledgers; any violation makes the command fail
pub async fn audit(ctx: &ServiceContext, kind: Option<LedgerKind>) -> Result<(), anyhow::Error> {
    let reports = match kind {
        Some(kind) => vec![ctx.auditor().audit(kind).await?],
        None => ctx.auditor().audit_all().await?,
    };

    let mut broken = 0;
    for report in &reports {
        print_report(report);
        if !report.is_valid() {
            broken += 1;
        }
    }

    if broken > 0 {
        anyhow::bail!("{} ledger(s) failed integrity verification", broken);
    }
    Ok(())
}

/// Print the headers the configured guard accepts
///
/// Operator and device default to the configured ones. In time-bound mode
/// the attestation is minted for `timestamp` (default: now).
pub fn attest(
    ctx: &ServiceContext,
    operator: Option<&str>,
    device: Option<&str>,
    timestamp: Option<i64>,
) -> Result<(), anyhow::Error> {
    let configured = ctx.guard().issue_headers(Utc::now());
    let operator = operator
        .or(configured.operator_identity.as_deref())
        .unwrap_or_default();
    let device = device
        .or(configured.device_fingerprint.as_deref())
        .unwrap_or_default();

    println!("{}: {}", HEADER_OPERATOR_IDENTITY, operator);
    println!("{}: {}", HEADER_DEVICE_FINGERPRINT, device);

    let attestation = match ctx.guard().mode() {
        AttestationMode::Static => ctx.guard().attest(operator, device),
        AttestationMode::TimeBound { .. } => {
            let ts = timestamp.unwrap_or_else(|| Utc::now().timestamp());
            println!("{}: {}", HEADER_ATTESTATION_TIMESTAMP, ts);
            ctx.guard().attest_at(operator, device, ts)
        }
    };
    println!("{}: {}", HEADER_ATTESTATION, attestation);
    Ok(())
}

/// Random master secret, hex encoded
pub fn gen_secret(bytes: usize) -> Result<String, anyhow::Error> {
    if bytes < 16 {
        anyhow::bail!("secret must be at least 16 bytes, got {}", bytes);
    }
    let mut secret = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut secret);
    Ok(hex::encode(secret))
}

fn print_committed(record: &LedgerRecord) {
    println!(
        "   {} #{} {} hash={}",
        record.kind,
        record.sequence,
        record.action,
        short(&record.curr_hash)
    );
}

fn print_records(records: &[LedgerRecord], json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records");
        return Ok(());
    }

    for r in records {
        println!(
            "#{:<5} {} {:<12} {:<16} {:<12} reason={} policy={} prev={} hash={}",
            r.sequence,
            ledgerseal_chain::format_stamp(&r.created_at),
            r.action.to_string(),
            r.subject_id,
            r.actor_type.to_string(),
            r.reason_code,
            r.policy_version,
            short(&r.prev_hash),
            short(&r.curr_hash),
        );
    }
    println!("{} record(s)", records.len());
    Ok(())
}

fn print_report(report: &IntegrityReport) {
    match &report.violation {
        None => println!(
            "✅ {} verified ({} records)",
            report.kind.table(),
            report.total
        ),
        Some(violation) => {
            let what = match &violation.kind {
                ViolationKind::BrokenLink { .. } => "broken link",
                ViolationKind::InvalidHash { .. } => "hash mismatch",
            };
            println!(
                "❌ {} broken at index {} (record {}): {}",
                report.kind.table(),
                violation.index,
                violation.record_id,
                what
            );
            println!("   {}", violation);
        }
    }
}

/// First 12 characters. Stored hashes may be tampered, so never slice bytes.
fn short(hash: &str) -> &str {
    if hash.is_empty() {
        return "-";
    }
    match hash.char_indices().nth(12) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}

/// Parse a decimal amount, rejecting non-positive values early
pub fn parse_amount(raw: &str) -> Result<Decimal, anyhow::Error> {
    let amount: Decimal = raw.trim().parse()?;
    if amount <= Decimal::ZERO {
        anyhow::bail!("amount must be positive, got {}", amount);
    }
    Ok(amount)
}
