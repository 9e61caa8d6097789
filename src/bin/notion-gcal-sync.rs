//! Runs one sync of a Notion database into a Google Calendar
//!
//! Credentials are read from the environment (and from a `.env` file, if any). Set `RUST_LOG` to tune the log output.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use notion_gcal_sync::config::Settings;
use notion_gcal_sync::google::GoogleCalendarTarget;
use notion_gcal_sync::mapper::MappingOptions;
use notion_gcal_sync::memory::MemorySource;
use notion_gcal_sync::notion::NotionSource;
use notion_gcal_sync::provider::sync_progress::feedback_channel;
use notion_gcal_sync::traits::RecordSource;
use notion_gcal_sync::{Reconciler, SyncError, SyncOptions};

#[derive(Parser)]
#[command(name = "notion-gcal-sync")]
#[command(about = "Sync the dated pages of a Notion database into a Google Calendar")]
struct Args {
    /// Show what would change, without changing the calendar
    #[arg(long)]
    dry_run: bool,

    /// Read records from a JSON dump (a list of pages, or the body of a database query) instead of Notion
    #[arg(long, value_name = "PATH")]
    records_file: Option<PathBuf>,

    /// Do not delete events whose record is gone
    #[arg(long)]
    keep_orphans: bool,

    /// Log more details
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<(), SyncError> {
    let settings = Settings::from_env()?;
    settings.validate(args.records_file.is_none())?;

    match &args.records_file {
        Some(path) => {
            log::info!("Reading records from {:?}", path);
            let source = MemorySource::from_file(path)?;
            sync(source, &settings, &args).await
        },
        None => {
            let (token, database_id) = settings.notion()?;
            let source = NotionSource::new(token, database_id)?;
            sync(source, &settings, &args).await
        },
    }
}

async fn sync<S>(source: S, settings: &Settings, args: &Args) -> Result<(), SyncError>
where
    S: RecordSource + Send,
{
    let target = GoogleCalendarTarget::new(&settings.google_access_token, &settings.calendar_id)?;
    let options = SyncOptions {
        delete_orphans: settings.delete_orphans && args.keep_orphans == false,
        allow_empty_source: settings.allow_empty_source,
    };
    let mapping = MappingOptions {
        default_time_zone: settings.time_zone,
        ..MappingOptions::default()
    };

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let mut reconciler = Reconciler::new(source, target)
        .with_options(options)
        .with_mapping_options(mapping)
        .with_cancel_flag(Arc::clone(&cancel_flag));

    if args.dry_run {
        let plan = reconciler.plan().await?;
        println!("Changes a sync of calendar {} would make:", settings.calendar_id);
        notion_gcal_sync::utils::print_plan(&plan);
        return Ok(());
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current change...");
            cancel_flag.store(true, Ordering::SeqCst);
        }
    });

    let (sender, mut receiver) = feedback_channel();
    let feedback = tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            log::trace!("{}", *receiver.borrow());
        }
    });

    let result = reconciler.sync_with_feedback(sender).await;
    // The sender was moved into the sync run, so the receiving task ends with it
    let _ = feedback.await;

    let summary = result?;
    println!("{}", summary);
    Ok(())
}
