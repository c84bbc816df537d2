use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tally_core::UserId;
use tally_storage::SqliteStore;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

/// Categorizes and reconciles bank transactions.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file. Defaults to `config.toml` in the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch recent transactions for every linked account and reconcile them.
    Sync {
        #[arg(long)]
        user: String,
    },
    /// Import a bank statement CSV into the manual account.
    Import {
        #[arg(long)]
        user: String,
        file: PathBuf,
    },
    /// Write transactions as CSV. Defaults to the current month so far.
    Export {
        #[arg(long)]
        user: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Show spending against each budget for the current period.
    Budgets {
        #[arg(long)]
        user: String,
    },
    /// Create a budget for a category slug.
    AddBudget {
        #[arg(long)]
        user: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Create a categorization rule.
    AddRule {
        #[arg(long)]
        user: String,
        #[arg(long)]
        category: String,
        /// `equals`, `startsWith` or `contains`.
        #[arg(long, default_value = "contains")]
        match_type: String,
        #[arg(long)]
        value: String,
        #[arg(long)]
        priority: Option<i32>,
    },
    /// Pick a transaction's category by hand. Omit `--category` to clear it.
    SetCategory {
        #[arg(long)]
        user: String,
        #[arg(long)]
        transaction: i64,
        #[arg(long)]
        category: Option<String>,
    },
    /// Record a transaction by hand. Negative amounts are spending.
    AddTransaction {
        #[arg(long)]
        user: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: Decimal,
        #[arg(long)]
        category: Option<String>,
    },
    /// Store a linked account for an access token issued by the aggregator.
    Link {
        #[arg(long)]
        user: String,
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        item_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        institution: Option<String>,
    },
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = config.database_path()?;
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let db = tally_storage::create_db(&db_path)
        .await
        .with_context(|| format!("open database {}", db_path.display()))?;
    tally_storage::seed_default_categories(&db)
        .await
        .context("seed default categories")?;
    let store = SqliteStore::new(db);
    let today = Utc::now().date_naive();

    let output = match cli.command {
        Command::Sync { user } => commands::sync(&store, &config, &UserId::new(user), today).await?,
        Command::Import { user, file } => {
            commands::import(&store, &config, &UserId::new(user), &file).await?
        }
        Command::Export { user, from, to } => {
            commands::export(&store, &UserId::new(user), from, to, today).await?
        }
        Command::Budgets { user } => commands::budgets(&store, &UserId::new(user), today).await?,
        Command::AddBudget {
            user,
            category,
            amount,
            period,
            start,
            end,
        } => {
            let args = commands::BudgetArgs {
                category: &category,
                amount,
                period: &period,
                start,
                end,
            };
            commands::add_budget(&store, &UserId::new(user), args, today).await?
        }
        Command::AddRule {
            user,
            category,
            match_type,
            value,
            priority,
        } => {
            commands::add_rule(&store, &UserId::new(user), &category, &match_type, &value, priority)
                .await?
        }
        Command::SetCategory {
            user,
            transaction,
            category,
        } => {
            commands::set_category(&store, &UserId::new(user), transaction, category.as_deref())
                .await?
        }
        Command::AddTransaction {
            user,
            date,
            name,
            amount,
            category,
        } => {
            commands::add_transaction(
                &store,
                &config,
                &UserId::new(user),
                date,
                &name,
                amount,
                category.as_deref(),
            )
            .await?
        }
        Command::Link {
            user,
            access_token,
            item_id,
            name,
            institution,
        } => {
            let args = commands::LinkArgs {
                access_token: &access_token,
                item_id: item_id.as_deref(),
                name: name.as_deref(),
                institution: institution.as_deref(),
            };
            commands::link(&store, &UserId::new(user), args).await?
        }
    };

    println!("{output}");
    Ok(())
}
