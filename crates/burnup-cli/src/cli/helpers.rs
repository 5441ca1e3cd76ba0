use burnup_core::domain::JobStatus;
use burnup_core::modules::batch::{BatchObserver, JobRequest, StatusCounts};
use burnup_core::modules::identity::ElementCache;
use burnup_core::modules::pipeline::CancellationToken;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(super) const DEFAULT_DATABASE_PATH: &str = "materials.db";
pub(super) const DEFAULT_CARD_OUTPUT: &str = "mcnp_material_card.txt";

/// Logs go to stderr; stdout carries command output and the worker reply.
pub(super) fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(super) fn install_interrupt_handler(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if !cancel.is_cancelled() {
            eprintln!("Interrupt received; waiting for running jobs to finish...");
        }
        cancel.cancel();
    });
    if let Err(error) = installed {
        warn!(%error, "interrupt handler not installed");
    }
}

pub(super) fn load_element_cache(path: &Path) -> ElementCache {
    match ElementCache::load(path) {
        Ok(cache) => cache,
        Err(error) => {
            warn!(%error, "ignoring unusable element cache");
            ElementCache::new()
        }
    }
}

pub(super) struct ProgressObserver;

impl BatchObserver for ProgressObserver {
    fn job_finished(&self, job: &JobRequest, status: JobStatus, counts: StatusCounts) {
        info!(
            element = %job.name,
            %status,
            completed = counts.completed,
            failed = counts.failed,
            running = counts.running,
            remaining = counts.not_started,
            "progress"
        );
    }
}

pub(super) fn format_unix_seconds(seconds: i64) -> String {
    format!("{} (unix seconds)", seconds)
}
