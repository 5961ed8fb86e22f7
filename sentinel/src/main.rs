use std::{io::BufRead, sync::Arc};

use anyhow::Error;
use sentinel_core::{
    types::Snapshot, Monitor, RefreshTrigger, SnapshotEngine,
};
use sui_api::Sui;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

mod config;
mod report;

fn print_report(snapshot: &Snapshot) {
    match report::render(snapshot) {
        Ok(table) => println!("{}", table),
        Err(e) => error!("Failed to render cycle {}: {}", snapshot.cycle, e),
    }
}

fn start_report(mut snapshots: watch::Receiver<Arc<Snapshot>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let snapshot = snapshots.borrow_and_update().clone();
        print_report(&snapshot);

        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            print_report(&snapshot);
        }
    })
}

// stdin is read on a plain thread so a pending read never holds up runtime shutdown
fn start_manual_refresh(refresh_trigger: RefreshTrigger) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            if refresh_trigger.trigger() {
                info!("Manual refresh requested");
            }
        }
        debug!("Stdin closed, manual refresh disabled");
    });
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_line_number(true)
                .compact(),
        )
        .init();

    let config_file =
        std::env::var("SENTINEL_CONFIG_FILE").unwrap_or_else(|_| "config".to_string());
    let config = config::load(&config_file)?;

    let sui = Sui::new(&config.sui)?;
    let engine = Arc::new(SnapshotEngine::new(&config.monitor, Arc::new(sui))?);

    info!(
        "Watching {} addresses for {}",
        engine.addresses().len(),
        engine.token()
    );

    let monitor = Monitor::start(engine, config.monitor.poll_interval());
    let report_task_handle = start_report(monitor.subscribe());
    start_manual_refresh(monitor.refresh_trigger());

    println!("Press Enter to refresh now, Ctrl-C to exit.");

    tokio::signal::ctrl_c().await?;

    drop(monitor);
    report_task_handle.abort();

    info!("Exiting...");

    Ok(())
}
