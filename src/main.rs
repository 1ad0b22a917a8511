use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mysql_table_sync::schema::plan::{MergedSyncPlan, SyncPlan};
use mysql_table_sync::{config, Comparer, DbContext, LogObserver, SyncService};

#[derive(Parser)]
#[command(name = "mysql-table-sync")]
#[command(about = "Compare and synchronize MySQL tables between two databases")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare table structures and write diff reports and sync scripts
    Compare {
        /// Named connection to compare from
        #[arg(long, default_value = "source")]
        source: String,
        /// Named connection to compare against
        #[arg(long, default_value = "target")]
        target: String,
        /// Compare a single table instead of all shared tables
        #[arg(long)]
        table: Option<String>,
    },
    /// Continuously synchronize table data on the configured interval
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;

    match cli.command {
        Command::Compare {
            source,
            target,
            table,
        } => compare(&config, &source, &target, table.as_deref()).await,
        Command::Sync => sync(config).await,
    }
}

async fn compare(
    config: &config::Config,
    source_name: &str,
    target_name: &str,
    table: Option<&str>,
) -> anyhow::Result<()> {
    let source = config
        .connection(source_name)
        .with_context(|| format!("unknown connection '{}'", source_name))?;
    let target = config
        .connection(target_name)
        .with_context(|| format!("unknown connection '{}'", target_name))?;

    let comparer = Comparer::connect(source, target).await?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let out_dir = Path::new(&config.options.output_dir);
    if !out_dir.exists() {
        bail!("output directory '{}' does not exist", out_dir.display());
    }

    let plans = match table {
        Some(table) => vec![comparer.compare(table).await?],
        None => comparer.compare_all().await?,
    };

    if config.options.merge_output {
        let merged = MergedSyncPlan::from_plans(plans);
        if merged.total_tables == 0 {
            info!("All compared tables are in sync");
        } else {
            let json = out_dir.join(format!("merged_sync_{}.json", timestamp));
            let sql = out_dir.join(format!("merged_sync_{}.sql", timestamp));
            merged.save_json(&json)?;
            merged.save_sql(&sql)?;
            info!(
                tables = merged.total_tables,
                differences = merged.total_diffs,
                json = %json.display(),
                sql = %sql.display(),
                "Wrote merged sync plan"
            );
        }
    } else {
        for plan in &plans {
            if plan.is_empty() {
                info!(table = %plan.table_name, "Table is in sync");
                continue;
            }
            write_plan(plan, out_dir, &timestamp)?;
        }
    }

    // A table only the target has cannot be diffed; its definition is
    // captured for the operator instead.
    if table.is_none() {
        for (name, create_sql) in comparer.extra_tables().await? {
            let path = out_dir.join(format!("extra_{}_create_{}.sql", name, timestamp));
            std::fs::write(&path, format!("{};\n", create_sql))?;
            info!(table = %name, file = %path.display(), "Captured target-only table");
        }
    }

    Ok(())
}

fn write_plan(plan: &SyncPlan, out_dir: &Path, timestamp: &str) -> anyhow::Result<()> {
    let json = out_dir.join(format!("{}_{}.json", plan.table_name, timestamp));
    let sql = out_dir.join(format!("{}_{}.sql", plan.table_name, timestamp));
    plan.save_json(&json)?;
    plan.save_sql(&sql)?;

    info!(
        table = %plan.table_name,
        differences = plan.differences.len(),
        json = %json.display(),
        sql = %sql.display(),
        "Wrote sync plan"
    );

    Ok(())
}

async fn sync(config: config::Config) -> anyhow::Result<()> {
    let ctx = DbContext::connect(&config.database).await?;

    let mut service = SyncService::new(ctx, Arc::new(config));
    service.register_observer(Box::new(LogObserver));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    Arc::new(service).run(shutdown_rx).await;

    Ok(())
}
