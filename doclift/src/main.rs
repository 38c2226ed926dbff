//! MongoDB to PostgreSQL migration tool.
//!
//! This binary infers a relational schema from a MongoDB collection, creates
//! or verifies the target table, and transfers documents in resumable,
//! idempotent batches.
//!
//! # Security Guarantees
//! - No credentials stored or logged
//! - Connection strings are sanitized in all output

use clap::{Args, Parser, Subcommand};
use doclift_core::{
    MigrateConfig, MigrationJob, Migrator, MongoSource, PgTarget, Result, TargetPlan,
    error::redact_database_url,
    init_logging,
    models::{CoercionPolicy, ConflictMode},
    target::create_table_sql,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "doclift")]
#[command(about = "MongoDB to PostgreSQL migration tool")]
#[command(version)]
#[command(long_about = "
doclift - MongoDB to PostgreSQL migration

Infers a relational schema from a schemaless collection, creates or verifies
the target table, and transfers documents in batches with checkpointed
resume and idempotent conflict handling.

SECURITY FEATURES:
- No credentials stored or logged
- Connection strings sanitized in all output

EXAMPLES:
  doclift migrate users --source mongodb://localhost/app --target postgres://localhost/warehouse
  doclift migrate orders --dry-run --checkpoint orders.checkpoint.json
  doclift schema users --source mongodb://localhost/app
  doclift validate users --source mongodb://localhost/app --target postgres://localhost/warehouse
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Migrate a collection into a table
    Migrate(MigrateArgs),
    /// Compare source and target row counts and schemas
    Validate(ValidateArgs),
    /// Infer and print the schema of a collection
    Schema(SchemaArgs),
    /// Test source and target connections
    Test(TestArgs),
}

#[derive(Args)]
pub struct SourceArgs {
    /// MongoDB connection URL
    #[arg(
        long,
        env = "MONGODB_URI",
        help = "MongoDB connection string (credentials will be sanitized in logs)"
    )]
    pub source: String,
}

#[derive(Args)]
pub struct TargetArgs {
    /// PostgreSQL connection URL
    #[arg(
        long,
        env = "SQL_URI",
        help = "PostgreSQL connection string (credentials will be sanitized in logs)"
    )]
    pub target: String,
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Source collection name
    #[arg(help = "Collection to migrate")]
    pub collection: String,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Target table name
    #[arg(long, help = "Target table name (defaults to the collection name)")]
    pub table: Option<String>,

    /// Target schema name
    #[arg(long, default_value = "public", help = "Target schema name")]
    pub schema: String,

    /// Documents per batch
    #[arg(
        long,
        env = "BATCH_SIZE",
        default_value_t = 1000,
        help = "Documents per read/write batch"
    )]
    pub batch_size: usize,

    /// Documents sampled for schema inference
    #[arg(
        long,
        default_value_t = 100,
        help = "Number of documents sampled for schema inference"
    )]
    pub sample: usize,

    /// Conflict handling mode
    #[arg(
        long,
        default_value = "skip",
        help = "Primary-key conflict handling: fail, skip, or replace"
    )]
    pub conflict: String,

    /// Null uncoercible values instead of failing
    #[arg(
        long,
        help = "Null values that cannot be coerced instead of failing the run"
    )]
    pub lenient: bool,

    /// Plan only; no writes
    #[arg(long, help = "Infer and plan only, without writing anything")]
    pub dry_run: bool,

    /// Drop and recreate the target table
    #[arg(long, help = "Drop and recreate the target table before transferring")]
    pub recreate: bool,

    /// Checkpoint file for resumable runs
    #[arg(long, help = "Checkpoint file path; enables crash-safe resume")]
    pub checkpoint: Option<PathBuf>,

    /// Retries per failed batch
    #[arg(long, default_value_t = 3, help = "Retries per failed batch")]
    pub max_retries: u32,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Source collection name
    #[arg(help = "Collection to validate")]
    pub collection: String,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Target table name
    #[arg(long, help = "Target table name (defaults to the collection name)")]
    pub table: Option<String>,

    /// Target schema name
    #[arg(long, default_value = "public", help = "Target schema name")]
    pub schema: String,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// Source collection name
    #[arg(help = "Collection to inspect")]
    pub collection: String,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Documents sampled for schema inference
    #[arg(
        long,
        default_value_t = 100,
        help = "Number of documents sampled for schema inference"
    )]
    pub sample: usize,

    /// Write the report to a file instead of stdout
    #[arg(short, long, help = "Output file path (JSON)")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct TestArgs {
    /// MongoDB connection URL
    #[arg(long, env = "MONGODB_URI", help = "MongoDB connection string to test")]
    pub source: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "SQL_URI", help = "PostgreSQL connection string to test")]
    pub target: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Migrate(args) => run_migrate(args).await?,
        Command::Validate(args) => run_validate(args).await?,
        Command::Schema(args) => run_schema(args).await?,
        Command::Test(args) => run_test(args).await?,
    }

    Ok(())
}

/// Runs one collection-to-table migration.
async fn run_migrate(args: &MigrateArgs) -> Result<()> {
    let conflict_mode: ConflictMode = args.conflict.parse()?;
    let table = args.table.clone().unwrap_or_else(|| args.collection.clone());

    info!("Source: {}", redact_database_url(&args.source.source));
    info!("Target: {}", redact_database_url(&args.target.target));

    let config = MigrateConfig {
        batch_size: args.batch_size,
        sample_size: args.sample,
        max_retries: args.max_retries,
        conflict_mode,
        coercion_policy: if args.lenient {
            CoercionPolicy::Lenient
        } else {
            CoercionPolicy::Strict
        },
        dry_run: args.dry_run,
        recreate: args.recreate,
        checkpoint_path: args.checkpoint.clone(),
    };
    config.validate()?;

    let migrator = connect(&args.source.source, &args.target.target).await?;

    let job = MigrationJob {
        collection: args.collection.clone(),
        schema: args.schema.clone(),
        table,
        config,
    };

    let report = migrator.migrate(&job).await.map_err(|e| {
        error!("Migration failed: {}", e);
        e
    })?;

    if report.dry_run {
        println!("Dry run completed for '{}'", report.collection);
        return Ok(());
    }

    println!("Migration completed successfully");
    println!("Collection: {}", report.collection);
    println!("Table:      {}", report.table);
    println!("Read:       {}", report.rows_read);
    println!("Written:    {}", report.rows_written);
    println!("Skipped:    {}", report.rows_skipped);
    if report.values_nulled > 0 {
        println!("Nulled:     {}", report.values_nulled);
    }
    println!("Batches:    {}", report.batches);
    println!("Duration:   {}ms", report.duration_ms);
    if report.resumed {
        println!("(resumed from checkpoint)");
    }

    Ok(())
}

/// Compares source and target row counts and schema compatibility.
async fn run_validate(args: &ValidateArgs) -> Result<()> {
    let table = args.table.clone().unwrap_or_else(|| args.collection.clone());
    let migrator = connect(&args.source.source, &args.target.target).await?;

    let job = MigrationJob {
        collection: args.collection.clone(),
        schema: args.schema.clone(),
        table,
        config: MigrateConfig::default(),
    };

    let report = migrator.validate(&job).await?;

    println!("Collection: {} ({} documents)", report.collection, report.source_count);
    println!("Table:      {} ({} rows)", report.table, report.target_count);

    if report.counts_match() {
        println!("✓ Row counts match");
    } else {
        warn!(
            "Row counts differ by {}",
            report.source_count.abs_diff(report.target_count)
        );
        println!("✗ Row counts differ");
    }

    if let Some(compat) = &report.compat {
        for issue in &compat.issues {
            println!("  {} '{}': {}", issue.kind, issue.column, issue.detail);
        }
        if compat.is_compatible() {
            println!("✓ Schema compatible");
        } else {
            println!("✗ Schema incompatible");
        }
    }

    if report.is_valid() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Infers and prints the schema of a collection.
async fn run_schema(args: &SchemaArgs) -> Result<()> {
    info!("Source: {}", redact_database_url(&args.source.source));

    let source = MongoSource::new(&args.source.source).await?;
    let inferred = source.infer_schema(&args.collection, args.sample).await?;

    if inferred.documents_sampled == 0 {
        warn!("Collection '{}' is empty", args.collection);
    }

    let plan = if inferred.documents_sampled > 0 {
        Some(TargetPlan::from_inferred("public", &args.collection, &inferred)?)
    } else {
        None
    };

    let report = serde_json::json!({
        "collection": inferred.collection_name,
        "documents_sampled": inferred.documents_sampled,
        "fields": inferred.fields,
        "plan": plan,
        "create_table_sql": plan.as_ref().map(create_table_sql),
    });

    let json = serde_json::to_string_pretty(&report).map_err(|e| {
        doclift_core::DocLiftError::Serialization {
            context: "Failed to render schema report".to_string(),
            source: e,
        }
    })?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &json)
                .await
                .map_err(|e| doclift_core::DocLiftError::Io {
                    context: format!("Failed to write to {}", path.display()),
                    source: e,
                })?;
            println!("Schema report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Tests the configured connections.
async fn run_test(args: &TestArgs) -> Result<()> {
    if args.source.is_none() && args.target.is_none() {
        return Err(doclift_core::DocLiftError::configuration(
            "Provide --source and/or --target (or set MONGODB_URI / SQL_URI)",
        ));
    }

    if let Some(source_url) = &args.source {
        info!("Testing source {}", redact_database_url(source_url));
        let source = MongoSource::new(source_url).await?;
        source.test_connection().await.map_err(|e| {
            error!("Source connection test failed: {}", e);
            e
        })?;
        println!("✓ MongoDB connection successful");
    }

    if let Some(target_url) = &args.target {
        info!("Testing target {}", redact_database_url(target_url));
        let target = PgTarget::new(target_url).await?;
        target.test_connection().await.map_err(|e| {
            error!("Target connection test failed: {}", e);
            e
        })?;
        println!("✓ PostgreSQL connection successful");
    }

    Ok(())
}

/// Connects to both sides and wraps them in a migrator.
async fn connect(source_url: &str, target_url: &str) -> Result<Migrator> {
    let source = MongoSource::new(source_url).await.map_err(|e| {
        error!("Failed to connect to source: {}", e);
        e
    })?;

    let target = PgTarget::new(target_url).await.map_err(|e| {
        error!("Failed to connect to target: {}", e);
        e
    })?;

    Ok(Migrator::new(source, target))
}
