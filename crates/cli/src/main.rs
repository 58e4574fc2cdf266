//! LedgerSeal CLI - Main entry point

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use ledgerseal_cli::{commands, AppConfig};
use ledgerseal_guard::{AuthorizationHeaders, DualControlGuard};
use ledgerseal_ledger::{Action, ActorType, LedgerKind, Transaction, TransactionStatus, User};
use ledgerseal_service::{Justification, ServiceContext};
use ledgerseal_store::Database;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledgerseal")]
#[command(about = "LedgerSeal - Tamper-evident audit ledger with dual control", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL (overrides config and LEDGERSEAL_DATABASE_URL)
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Compliance metadata required on every write
#[derive(Args, Debug, Clone)]
struct Why {
    /// Reason code
    #[arg(long)]
    reason: String,
    /// Policy version in effect
    #[arg(long)]
    policy: String,
    /// Who initiates the action (system, operator, edge_process)
    #[arg(long, default_value = "system")]
    actor: ActorType,
}

impl Why {
    fn justification(&self) -> Justification {
        Justification::new(self.actor, self.reason.clone(), self.policy.clone())
    }
}

/// Dual-control factors for destructive actions
#[derive(Args, Debug, Clone)]
struct DualControl {
    /// x-operator-identity
    #[arg(long)]
    operator: Option<String>,
    /// x-device-fingerprint
    #[arg(long)]
    device: Option<String>,
    /// x-dual-control-attestation (hex HMAC)
    #[arg(long)]
    attestation: Option<String>,
    /// x-attestation-timestamp (unix seconds, time-bound mode)
    #[arg(long)]
    timestamp: Option<String>,
}

impl DualControl {
    fn headers(&self) -> AuthorizationHeaders {
        AuthorizationHeaders {
            operator_identity: self.operator.clone(),
            device_fingerprint: self.device.clone(),
            attestation: self.attestation.clone(),
            attestation_timestamp: self.timestamp.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and show ledger sizes
    Init,

    /// Create a user
    CreateUser {
        /// User ID
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        region: Option<String>,
        #[command(flatten)]
        why: Why,
    },

    /// Update profile fields of a user
    UpdateUser {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[command(flatten)]
        why: Why,
    },

    /// Deactivate a user (dual control)
    DeactivateUser {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        why: Why,
        #[command(flatten)]
        auth: DualControl,
    },

    /// Delete a user; the ledger history is kept (dual control)
    DeleteUser {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        why: Why,
        #[command(flatten)]
        auth: DualControl,
    },

    /// Open a pending transaction
    OpenTx {
        /// Owning user ID
        #[arg(long)]
        user: String,
        #[arg(long, value_parser = commands::parse_amount)]
        amount: Decimal,
        /// ISO currency code
        #[arg(long)]
        currency: String,
        #[arg(long)]
        region: Option<String>,
        /// Transaction ID (generated if omitted)
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        why: Why,
    },

    /// Move a transaction to pending / completed / failed / cancelled
    TxStatus {
        #[arg(long)]
        id: String,
        #[arg(long)]
        status: TransactionStatus,
        #[command(flatten)]
        why: Why,
    },

    /// Refund a completed transaction (dual control)
    Refund {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        why: Why,
        #[command(flatten)]
        auth: DualControl,
    },

    /// Roll back a transaction (dual control)
    Rollback {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        why: Why,
        #[command(flatten)]
        auth: DualControl,
    },

    /// Ledger history of one subject
    History {
        /// account_history or transaction_ledger
        #[arg(long)]
        kind: LedgerKind,
        /// User or transaction ID
        subject: String,
        #[arg(long)]
        json: bool,
    },

    /// Search a ledger
    Search {
        #[arg(long)]
        kind: LedgerKind,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        subsystem: Option<String>,
        #[arg(long)]
        action: Option<Action>,
        /// RFC 3339 lower bound (inclusive)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// RFC 3339 upper bound (inclusive)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(long, default_value = "50")]
        limit: u32,
        #[arg(long)]
        json: bool,
    },

    /// Verify hash chains; exits non-zero on any violation
    Audit {
        /// Only this ledger
        #[arg(long)]
        kind: Option<LedgerKind>,
    },

    /// Print the dual-control headers the configured guard accepts
    Attest {
        #[arg(long)]
        operator: Option<String>,
        #[arg(long)]
        device: Option<String>,
        /// Unix seconds (time-bound mode)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Generate a random master secret
    GenSecret {
        /// Secret length in bytes
        #[arg(long, default_value = "32")]
        bytes: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database {
        config.database_url = url;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Needs no guard or database
    if let Commands::GenSecret { bytes } = cli.command {
        let secret = commands::gen_secret(bytes)?;
        println!("✅ Generated master secret");
        println!();
        println!("To use: export {}={}", ledgerseal_guard::config::ENV_MASTER_SECRET, secret);
        return Ok(());
    }

    // Guard first: a misconfigured guard is fatal before anything is opened
    let guard = DualControlGuard::from_env().context("dual-control guard")?;
    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    let ctx = ServiceContext::new(db, guard, config.service.clone());
    debug!(database = %config.database_url, mode = ?ctx.guard().mode(), "Context ready");

    match cli.command {
        Commands::Init => {
            commands::init(&ctx).await?;
        }

        Commands::CreateUser {
            id,
            email,
            name,
            region,
            why,
        } => {
            let mut user = User::new(id, email, name);
            user.region = region;
            commands::create_user(&ctx, user, &why.justification()).await?;
        }

        Commands::UpdateUser {
            id,
            email,
            name,
            region,
            why,
        } => {
            commands::update_user(&ctx, &id, email, name, region, &why.justification()).await?;
        }

        Commands::DeactivateUser { id, why, auth } => {
            commands::deactivate_user(&ctx, &auth.headers(), &id, &why.justification()).await?;
        }

        Commands::DeleteUser { id, why, auth } => {
            commands::delete_user(&ctx, &auth.headers(), &id, &why.justification()).await?;
        }

        Commands::OpenTx {
            user,
            amount,
            currency,
            region,
            id,
            why,
        } => {
            let mut tx = Transaction::new(user, amount, currency);
            tx.region = region;
            if let Some(id) = id {
                tx = tx.with_id(id);
            }
            commands::open_transaction(&ctx, tx, &why.justification()).await?;
        }

        Commands::TxStatus { id, status, why } => {
            commands::set_status(&ctx, &id, status, &why.justification()).await?;
        }

        Commands::Refund { id, why, auth } => {
            commands::refund(&ctx, &auth.headers(), &id, &why.justification()).await?;
        }

        Commands::Rollback { id, why, auth } => {
            commands::rollback(&ctx, &auth.headers(), &id, &why.justification()).await?;
        }

        Commands::History {
            kind,
            subject,
            json,
        } => {
            commands::history(&ctx, kind, &subject, json).await?;
        }

        Commands::Search {
            kind,
            region,
            subsystem,
            action,
            from,
            to,
            limit,
            json,
        } => {
            commands::search(&ctx, kind, region, subsystem, action, from, to, limit, json).await?;
        }

        Commands::Audit { kind } => {
            commands::audit(&ctx, kind).await?;
        }

        Commands::Attest {
            operator,
            device,
            timestamp,
        } => {
            commands::attest(&ctx, operator.as_deref(), device.as_deref(), timestamp)?;
        }

        // Handled before the guard is built
        Commands::GenSecret { .. } => {}
    }

    ctx.db().close().await;
    Ok(())
}
