//! Integration tests for LedgerSeal services
//!
//! File-backed SQLite databases in temp directories, full flow from service
//! call through guard, writer and store, verified by the integrity auditor.

use chrono::Utc;
use ledgerseal_chain::{validate_chain_from, ViolationKind, GENESIS_PREV_HASH};
use ledgerseal_guard::{AttestationMode, AuthorizationHeaders, DualControlGuard, GuardConfig};
use ledgerseal_ledger::{
    Action, ActorType, LedgerError, LedgerKind, Transaction, TransactionStatus, User, UserStatus,
};
use ledgerseal_service::{Justification, ServiceConfig, ServiceContext, ServiceError};
use ledgerseal_store::{Database, RecordFilter};
use rust_decimal_macros::dec;
use std::time::Duration;
use tempfile::TempDir;

const SECRET: &str = "integration-master-secret";
const OPERATOR: &str = "founder@marketplace.example";
const DEVICE: &str = "fp-laptop-01";

async fn context_with(mode: AttestationMode) -> (TempDir, ServiceContext) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("ledger.db")).await.unwrap();
    let guard =
        DualControlGuard::new(GuardConfig::new(SECRET, OPERATOR, DEVICE).with_mode(mode)).unwrap();
    (dir, ServiceContext::new(db, guard, ServiceConfig::default()))
}

async fn context() -> (TempDir, ServiceContext) {
    context_with(AttestationMode::Static).await
}

fn system(reason: &str) -> Justification {
    Justification::new(ActorType::System, reason, "v1.0.0")
}

fn operator(reason: &str) -> Justification {
    Justification::new(ActorType::Operator, reason, "v1.0.0")
}

fn valid_headers(ctx: &ServiceContext) -> AuthorizationHeaders {
    ctx.guard().issue_headers(Utc::now())
}

fn ada() -> User {
    User::new("u1", "ada@example.com", "Ada").with_region("eu-west")
}

/// Test: u1 CREATE -> guarded DEACTIVATE -> validate -> wrong device rejected
#[tokio::test]
async fn test_end_to_end_account_flow() {
    let (_dir, ctx) = context().await;

    // 1. Create
    let (_, r1) = ctx
        .accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();
    assert_eq!(r1.prev_hash, "");
    assert_eq!(r1.action, Action::Create);

    // 2. Guarded deactivate
    let r2 = ctx
        .accounts()
        .deactivate_user(&valid_headers(&ctx), "u1", &operator("FRAUD_SUSPECTED"))
        .await
        .unwrap();
    assert_eq!(r2.prev_hash, r1.curr_hash);
    assert_eq!(r2.details["authorized_by"], OPERATOR);
    assert_eq!(
        ctx.accounts().get_user("u1").await.unwrap().status,
        UserStatus::Deactivated
    );

    // 3. Chain validates
    let history = ctx
        .query()
        .get_history(LedgerKind::AccountHistory, "u1")
        .await
        .unwrap();
    assert!(validate_chain_from(GENESIS_PREV_HASH, &history).is_valid());
    assert!(ctx
        .auditor()
        .audit(LedgerKind::AccountHistory)
        .await
        .unwrap()
        .is_valid());

    // 4. Wrong device is rejected, nothing written
    let wrong_device = AuthorizationHeaders::new(
        OPERATOR,
        "fp-stolen-phone",
        ctx.guard().attest(OPERATOR, "fp-stolen-phone"),
    );
    let err = ctx
        .accounts()
        .delete_user(&wrong_device, "u1", &operator("CLEANUP"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_DEVICE");

    let history = ctx
        .query()
        .get_history(LedgerKind::AccountHistory, "u1")
        .await
        .unwrap();
    assert_eq!(history, vec![r1, r2]);
    assert!(ctx.accounts().get_user("u1").await.is_ok());
}

#[tokio::test]
async fn test_guard_codes_and_no_side_effects() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();

    let attestation = ctx.guard().attest(OPERATOR, DEVICE);
    let cases = [
        (
            AuthorizationHeaders::new("intruder", DEVICE, attestation.clone()),
            "INVALID_IDENTITY",
        ),
        (
            AuthorizationHeaders::new(OPERATOR, "fp-other", attestation.clone()),
            "INVALID_DEVICE",
        ),
        (
            AuthorizationHeaders::new(OPERATOR, DEVICE, "00".repeat(32)),
            "INVALID_ATTESTATION",
        ),
        (
            AuthorizationHeaders::from_pairs([("x-operator-identity", OPERATOR), ("x-device-fingerprint", DEVICE)]),
            "INVALID_ATTESTATION",
        ),
    ];

    for (headers, code) in cases {
        let err = ctx
            .accounts()
            .deactivate_user(&headers, "u1", &operator("FRAUD"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), code);
        assert!(err.is_recoverable());
    }

    // Business mutation not applied, ledger untouched
    assert_eq!(
        ctx.accounts().get_user("u1").await.unwrap().status,
        UserStatus::Active
    );
    assert_eq!(ctx.query().count(LedgerKind::AccountHistory).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_writers_form_valid_chain() {
    let (_dir, ctx) = context().await;
    let writer = ctx.writer();

    let (a, b) = tokio::join!(
        writer.record_mutation(
            LedgerKind::TransactionLedger,
            "tx-a",
            Action::Append,
            ActorType::EdgeProcess,
            "PAYMENT_RECEIVED",
            "v1.0.0",
        ),
        writer.record_mutation(
            LedgerKind::TransactionLedger,
            "tx-b",
            Action::Append,
            ActorType::EdgeProcess,
            "PAYMENT_RECEIVED",
            "v1.0.0",
        ),
    );
    let mut pair = vec![a.unwrap(), b.unwrap()];
    pair.sort_by_key(|r| r.sequence);

    assert_eq!(pair[0].prev_hash, "");
    assert_eq!(pair[1].prev_hash, pair[0].curr_hash);
    assert_eq!(
        (pair[0].sequence, pair[1].sequence),
        (1, 2)
    );

    // Many independent tasks
    let mut handles = Vec::new();
    for i in 0..16 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            ctx.writer()
                .record_mutation(
                    LedgerKind::TransactionLedger,
                    &format!("tx-{i}"),
                    Action::Pending,
                    ActorType::System,
                    "AWAITING_GATEWAY",
                    "v1.0.0",
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let report = ctx
        .auditor()
        .audit(LedgerKind::TransactionLedger)
        .await
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.total, 18);
}

#[tokio::test]
async fn test_history_read_is_idempotent() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();
    let mut renamed = ada();
    renamed.display_name = "Ada L.".into();
    ctx.accounts()
        .update_user(renamed, &system("PROFILE_UPDATED"))
        .await
        .unwrap();

    let first = ctx
        .query()
        .get_history(LedgerKind::AccountHistory, "u1")
        .await
        .unwrap();
    let second = ctx
        .query()
        .get_history(LedgerKind::AccountHistory, "u1")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[1].action, Action::Modify);
    assert_eq!(first[1].details["display_name"], "Ada L.");
}

#[tokio::test]
async fn test_audit_detects_tampered_field() {
    let (_dir, ctx) = context().await;
    for (id, email) in [("u1", "a@x.io"), ("u2", "b@x.io"), ("u3", "c@x.io")] {
        ctx.accounts()
            .create_user(User::new(id, email, id), &system("USER_CREATED"))
            .await
            .unwrap();
    }
    let target = ctx
        .query()
        .get_history(LedgerKind::AccountHistory, "u2")
        .await
        .unwrap()
        .remove(0);

    // Someone with direct database access bypasses the append-only trigger
    sqlx::query("DROP TRIGGER account_history_no_update")
        .execute(ctx.db().pool())
        .await
        .unwrap();
    sqlx::query("UPDATE account_history SET reason_code = 'NOTHING_TO_SEE' WHERE sequence = 2")
        .execute(ctx.db().pool())
        .await
        .unwrap();

    let report = ctx
        .auditor()
        .audit(LedgerKind::AccountHistory)
        .await
        .unwrap();
    assert_eq!(report.first_invalid_index(), Some(1));
    assert_eq!(report.first_invalid_record(), Some(target.id.as_str()));
    assert!(matches!(
        report.violation.as_ref().map(|v| &v.kind),
        Some(ViolationKind::InvalidHash { .. })
    ));

    let err = report.into_result().unwrap_err();
    assert_eq!(err.code(), "CHAIN_INTEGRITY_VIOLATION");
    assert!(!err.is_recoverable());

    // The other ledger is unaffected
    let reports = ctx.auditor().audit_all().await.unwrap();
    assert!(!reports[0].is_valid());
    assert!(reports[1].is_valid());
}

#[tokio::test]
async fn test_audit_detects_removed_genesis() {
    let (_dir, ctx) = context().await;
    for (id, email) in [("u1", "a@x.io"), ("u2", "b@x.io")] {
        ctx.accounts()
            .create_user(User::new(id, email, id), &system("USER_CREATED"))
            .await
            .unwrap();
    }

    sqlx::query("DROP TRIGGER account_history_no_delete")
        .execute(ctx.db().pool())
        .await
        .unwrap();
    sqlx::query("DELETE FROM account_history WHERE sequence = 1")
        .execute(ctx.db().pool())
        .await
        .unwrap();

    let report = ctx
        .auditor()
        .audit(LedgerKind::AccountHistory)
        .await
        .unwrap();
    assert_eq!(report.first_invalid_index(), Some(0));
    assert!(matches!(
        report.violation.map(|v| v.kind),
        Some(ViolationKind::BrokenLink { .. })
    ));
}

#[tokio::test]
async fn test_failed_mutation_rolls_back_record() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();

    // Same email: the users insert fails after the record was sealed
    let clash = User::new("u2", "ada@example.com", "Impostor");
    let err = ctx
        .accounts()
        .create_user(clash, &system("USER_CREATED"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PERSISTENCE_FAILURE");

    // Missing subject
    let err = ctx
        .accounts()
        .deactivate_user(&valid_headers(&ctx), "ghost", &operator("FRAUD"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    assert_eq!(ctx.query().count(LedgerKind::AccountHistory).await.unwrap(), 1);
    assert!(ctx
        .auditor()
        .audit(LedgerKind::AccountHistory)
        .await
        .unwrap()
        .is_valid());
}

#[tokio::test]
async fn test_deleted_user_keeps_history() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();

    let record = ctx
        .accounts()
        .delete_user(&valid_headers(&ctx), "u1", &operator("GDPR_ERASURE"))
        .await
        .unwrap();
    assert_eq!(record.action, Action::Delete);
    assert_eq!(record.region.as_deref(), Some("eu-west"));

    assert!(matches!(
        ctx.accounts().get_user("u1").await,
        Err(ServiceError::NotFound { .. })
    ));
    let history = ctx
        .query()
        .get_history(LedgerKind::AccountHistory, "u1")
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_transaction_lifecycle() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();

    let tx = Transaction::new("u1", dec!(99.90), "EUR")
        .with_id("tx-1")
        .with_region("eu-west");
    let (tx, r1) = ctx
        .transactions()
        .open_transaction(tx, &Justification::new(ActorType::EdgeProcess, "CHECKOUT", "v1.0.0"))
        .await
        .unwrap();
    assert_eq!(r1.action, Action::Append);
    assert_eq!(r1.details["amount"], "99.90");

    // Refund before completion is not a valid transition
    let err = ctx
        .transactions()
        .refund(&valid_headers(&ctx), &tx.id, &operator("CUSTOMER_CLAIM"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidRecord(LedgerError::InvalidTransition { .. })
    ));

    let r2 = ctx
        .transactions()
        .set_status(&tx.id, TransactionStatus::Completed, &system("GATEWAY_CONFIRMED"))
        .await
        .unwrap();
    assert_eq!(r2.action, Action::Completed);

    // Refund cannot sneak through the unguarded path
    let err = ctx
        .transactions()
        .set_status(&tx.id, TransactionStatus::Refunded, &system("GATEWAY_REFUND"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InvalidRecord(LedgerError::RequiresAuthorization(_))
    ));

    let r3 = ctx
        .transactions()
        .refund(&valid_headers(&ctx), &tx.id, &operator("CUSTOMER_CLAIM"))
        .await
        .unwrap();
    assert_eq!(r3.action, Action::Refund);
    assert_eq!(
        ctx.transactions().get_transaction("tx-1").await.unwrap().status,
        TransactionStatus::Refunded
    );

    let history = ctx
        .query()
        .get_history(LedgerKind::TransactionLedger, "tx-1")
        .await
        .unwrap();
    assert_eq!(history, vec![r1, r2, r3]);

    // Search by subsystem and action
    let refunds = ctx
        .query()
        .search(
            LedgerKind::TransactionLedger,
            &RecordFilter::new().subsystem("payments").action(Action::Refund),
        )
        .await
        .unwrap();
    assert_eq!(refunds.len(), 1);
}

#[tokio::test]
async fn test_rollback_requires_guard() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();
    let (tx, _) = ctx
        .transactions()
        .open_transaction(Transaction::new("u1", dec!(10), "USD"), &system("CHECKOUT"))
        .await
        .unwrap();

    let forged = AuthorizationHeaders::new(OPERATOR, DEVICE, ctx.guard().attest(OPERATOR, DEVICE).to_uppercase());
    let err = ctx
        .transactions()
        .rollback(&forged, &tx.id, &operator("DOUBLE_CHARGE"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ATTESTATION");
    assert_eq!(
        ctx.transactions().get_transaction(&tx.id).await.unwrap().status,
        TransactionStatus::Pending
    );

    ctx.transactions()
        .rollback(&valid_headers(&ctx), &tx.id, &operator("DOUBLE_CHARGE"))
        .await
        .unwrap();
    assert_eq!(
        ctx.transactions().get_transaction(&tx.id).await.unwrap().status,
        TransactionStatus::RolledBack
    );
}

#[tokio::test]
async fn test_time_bound_attestation() {
    let (_dir, ctx) = context_with(AttestationMode::TimeBound {
        window: Duration::from_secs(60),
    })
    .await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();

    // Static attestation no longer suffices
    let replayed = AuthorizationHeaders::new(OPERATOR, DEVICE, ctx.guard().attest(OPERATOR, DEVICE));
    let err = ctx
        .accounts()
        .deactivate_user(&replayed, "u1", &operator("FRAUD"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ATTESTATION");

    // Stale but correctly signed
    let stale = ctx
        .guard()
        .issue_headers(Utc::now() - chrono::Duration::minutes(10));
    let err = ctx
        .accounts()
        .deactivate_user(&stale, "u1", &operator("FRAUD"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ATTESTATION");

    ctx.accounts()
        .deactivate_user(&valid_headers(&ctx), "u1", &operator("FRAUD"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_guarded_transitions_apply_once() {
    let (_dir, ctx) = context().await;
    ctx.accounts()
        .create_user(ada(), &system("USER_CREATED"))
        .await
        .unwrap();
    for id in ["tx-1", "tx-2"] {
        let tx = Transaction::new("u1", dec!(25), "EUR").with_id(id);
        ctx.transactions()
            .open_transaction(tx, &system("CHECKOUT"))
            .await
            .unwrap();
        ctx.transactions()
            .set_status(id, TransactionStatus::Completed, &system("GATEWAY_CONFIRMED"))
            .await
            .unwrap();
    }
    let headers = valid_headers(&ctx);
    let why = operator("CUSTOMER_CLAIM");

    // Two refunds of the same transaction
    let (ctx_a, ctx_b) = (ctx.clone(), ctx.clone());
    let (tx_a, tx_b) = (ctx_a.transactions(), ctx_b.transactions());
    let (a, b) = tokio::join!(
        tx_a.refund(&headers, "tx-1", &why),
        tx_b.refund(&headers, "tx-1", &why),
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let loser = a.err().or(b.err()).unwrap();
    assert!(matches!(
        loser,
        ServiceError::InvalidRecord(LedgerError::InvalidTransition { .. })
    ));

    // Refund racing a rollback
    let double_charge = operator("DOUBLE_CHARGE");
    let (a, b) = tokio::join!(
        tx_a.refund(&headers, "tx-2", &why),
        tx_b.rollback(&headers, "tx-2", &double_charge),
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    // Two deactivations of the same user
    let (acc_a, acc_b) = (ctx_a.accounts(), ctx_b.accounts());
    let (fraud_a, fraud_b) = (operator("FRAUD_SUSPECTED"), operator("FRAUD_SUSPECTED"));
    let (a, b) = tokio::join!(
        acc_a.deactivate_user(&headers, "u1", &fraud_a),
        acc_b.deactivate_user(&headers, "u1", &fraud_b),
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    let destructive = |records: Vec<ledgerseal_ledger::LedgerRecord>| {
        records
            .into_iter()
            .filter(|r| r.action.is_destructive())
            .count()
    };
    let tx1 = ctx.query().get_history(LedgerKind::TransactionLedger, "tx-1").await.unwrap();
    let tx2 = ctx.query().get_history(LedgerKind::TransactionLedger, "tx-2").await.unwrap();
    let u1 = ctx.query().get_history(LedgerKind::AccountHistory, "u1").await.unwrap();
    assert_eq!(destructive(tx1), 1);
    assert_eq!(destructive(tx2), 1);
    assert_eq!(destructive(u1), 1);

    assert_eq!(
        ctx.transactions().get_transaction("tx-1").await.unwrap().status,
        TransactionStatus::Refunded
    );
    for report in ctx.auditor().audit_all().await.unwrap() {
        assert!(report.is_valid());
    }
}

#[tokio::test]
async fn test_writers_on_separate_handles_never_fork() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");
    let config = ServiceConfig {
        lock_timeout_ms: 30_000,
        max_write_retries: 10,
        retry_backoff_ms: 5,
    };
    // Two handles on one file, each with its own in-process tail locks
    let mut contexts = Vec::new();
    for _ in 0..2 {
        let db = Database::open(&path).await.unwrap();
        let guard = DualControlGuard::new(GuardConfig::new(SECRET, OPERATOR, DEVICE)).unwrap();
        contexts.push(ServiceContext::new(db, guard, config.clone()));
    }

    let mut handles = Vec::new();
    for i in 0..40 {
        let ctx = contexts[i % 2].clone();
        handles.push(tokio::spawn(async move {
            ctx.writer()
                .record_mutation(
                    LedgerKind::TransactionLedger,
                    &format!("tx-{i}"),
                    Action::Append,
                    ActorType::EdgeProcess,
                    "PAYMENT_RECEIVED",
                    "v1.0.0",
                )
                .await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(e) => assert_eq!(e.code(), "CHAIN_WRITE_CONFLICT", "{e}"),
        }
    }
    assert!(committed > 0);

    let report = contexts[0]
        .auditor()
        .audit(LedgerKind::TransactionLedger)
        .await
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.total, committed);
}
