use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hotel_etl::archive::Archiver;
use hotel_etl::config::Config;
use hotel_etl::hotelbeds::HotelbedsProvider;
use hotel_etl::loader::Layout;
use hotel_etl::pipeline;
use hotel_etl::util::db::Db;
use hotel_etl::util::env as env_util;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hotel-etl", version, about = "Hotelbeds content API to SQL batch loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Page through /hotels and load every window
    Hotels {
        /// Destination table design
        #[arg(long, value_enum, default_value_t = Layout::Normalized)]
        layout: Layout,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Page through the facility type catalogue (/types/facilities)
    Facilities {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// First record index (overrides ETL_START_INDEX)
    #[arg(long)]
    start: Option<u64>,
    /// Last record index, inclusive (overrides ETL_END_INDEX)
    #[arg(long)]
    end: Option<u64>,
    /// Records per window (overrides ETL_BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<u64>,
    /// Directory for raw JSON archives (overrides ARCHIVE_DIR)
    #[arg(long)]
    archive_dir: Option<PathBuf>,
    /// Append logs to this file (overrides LOG_FILE)
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Database URL (overrides DATABASE_URL / DB_*)
    #[arg(long)]
    db_url: Option<String>,
    /// Create missing tables for the layout before loading
    #[arg(long, default_value_t = false)]
    init_schema: bool,
}

impl RunArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(v) = self.start {
            cfg.windows.start = v;
        }
        if let Some(v) = self.end {
            cfg.windows.end = v;
        }
        if let Some(v) = self.batch_size {
            cfg.windows.batch_size = v;
        }
        if let Some(v) = &self.archive_dir {
            cfg.archive_dir = v.clone();
        }
        if let Some(v) = &self.log_file {
            cfg.log_file = Some(v.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    let cli = Cli::parse();
    let (layout, args) = match cli.command {
        Commands::Hotels { layout, run } => (layout, run),
        Commands::Facilities { run } => (Layout::FacilityCatalogue, run),
    };

    // --- logging -------------------------------------------------------------
    let log_file = args
        .log_file
        .clone()
        .or_else(|| env_util::env_opt("LOG_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(layout.default_log_file()));
    hotel_etl::tracing::init_tracing("info,sqlx=warn", Some(&log_file))?;

    env_util::preflight_check(
        "hotel-etl",
        &["API_KEY", "API_SECRET"],
        &[
            "API_KEY",
            "API_SECRET",
            "HOTELBEDS_BASE_URL",
            "HOTELBEDS_LANGUAGE",
            "DATABASE_URL",
            "DB_HOST",
            "DB_USER",
            "DB_PASS",
            "DB_NAME",
            "ETL_START_INDEX",
            "ETL_END_INDEX",
            "ETL_BATCH_SIZE",
            "ARCHIVE_DIR",
        ],
    )?;

    let mut cfg = Config::from_env_with_db(args.db_url.clone())?;
    args.apply(&mut cfg);
    cfg.log_file = Some(log_file);
    cfg.windows.validate()?;
    info!(
        ?layout,
        start = cfg.windows.start,
        end = cfg.windows.end,
        batch_size = cfg.windows.batch_size,
        archive_dir = %cfg.archive_dir.display(),
        "starting run"
    );

    // --- DB connect ----------------------------------------------------------
    let mut db = match Db::connect(&cfg.database_url).await {
        Ok(db) => db,
        Err(err) => {
            error!(error = %format!("{err:#}"), "error connecting to database; aborting run");
            return Err(err);
        }
    };
    if args.init_schema {
        db.init_schema(layout).await?;
    }

    let resource = layout.resource();
    let provider =
        HotelbedsProvider::new(&cfg.api, resource).context("build Hotelbeds provider")?;
    let archiver = Archiver::new(&cfg.archive_dir, resource.archive_prefix());
    let loader = layout.loader();

    let summary =
        pipeline::run(&mut db.conn, &provider, &archiver, loader.as_ref(), cfg.windows).await;

    db.close().await?;
    info!(
        committed = summary.committed,
        rolled_back = summary.rolled_back,
        empty = summary.empty,
        "done"
    );
    Ok(())
}
