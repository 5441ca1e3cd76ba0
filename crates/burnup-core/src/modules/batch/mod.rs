mod executor;
mod report;

use crate::domain::{
    BatchJob, BurnupError, ExecutorKind, JobStatus, NuclearLibrary, PipelineResult,
};
use crate::modules::extractor::{HeaderPattern, OutputExtractor};
use crate::modules::identity::ElementCache;
use crate::modules::material::{
    CombinedCardEntry, DEFAULT_GEOMETRY_VOLUME_CM3, DEFAULT_MIN_WEIGHT_FRACTION,
    GenerationSettings, render_combined_cards,
};
use crate::modules::pipeline::{CancellationToken, FilePipeline, PipelineOutput};
use crate::modules::registry::LibraryRegistry;
use crate::modules::serialization::{write_json_artifact, write_text_artifact};
use crate::modules::store::MaterialStore;
use crate::modules::traits::JobExecutor;
use globset::Glob;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

pub use executor::{
    InProcessExecutor, ProcessExecutor, WORKER_SUBCOMMAND, WorkerFailure, WorkerReply,
    WorkerRequest, run_worker_request,
};
pub use report::{BatchReport, JobSummary, ProcessingInfo, StatusCounts, render_human_summary};

pub const DEFAULT_PATTERN: &str = "element_*.out";
pub const DEFAULT_MAX_WORKERS: usize = 16;
pub const DEFAULT_MATERIAL_ID_BASE: u32 = 200;
pub const DEFAULT_COMBINED_OUTPUT: &str = "mcnp_materials_parallel.txt";
pub const DEFAULT_ELEMENT_CACHE: &str = "element_cache.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub pattern: String,
    pub max_workers: usize,
    pub executor: ExecutorKind,
    pub library: NuclearLibrary,
    pub isotope_dir: PathBuf,
    pub isotope_file: Option<PathBuf>,
    pub element_cache_path: PathBuf,
    pub geometry_volume_cm3: f64,
    pub material_id_base: u32,
    pub min_weight_fraction: f64,
    pub header_pattern: HeaderPattern,
    pub target_case: Option<String>,
    pub output_path: PathBuf,
    pub summary_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub cycle_number: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.to_string(),
            max_workers: DEFAULT_MAX_WORKERS,
            executor: ExecutorKind::Thread,
            library: NuclearLibrary::EndfB8,
            isotope_dir: PathBuf::from("."),
            isotope_file: None,
            element_cache_path: PathBuf::from(DEFAULT_ELEMENT_CACHE),
            geometry_volume_cm3: DEFAULT_GEOMETRY_VOLUME_CM3,
            material_id_base: DEFAULT_MATERIAL_ID_BASE,
            min_weight_fraction: DEFAULT_MIN_WEIGHT_FRACTION,
            header_pattern: HeaderPattern::Strict,
            target_case: None,
            output_path: PathBuf::from(DEFAULT_COMBINED_OUTPUT),
            summary_path: None,
            database_path: None,
            cycle_number: 1,
        }
    }
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let content = fs::read_to_string(path).map_err(|source| BatchError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| BatchError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_workers == 0 {
            return Err(BatchError::InvalidConfig(
                "maxWorkers must be at least 1".to_string(),
            ));
        }
        if !(self.geometry_volume_cm3.is_finite() && self.geometry_volume_cm3 > 0.0) {
            return Err(BatchError::InvalidConfig(format!(
                "geometryVolumeCm3 must be positive, got {}",
                self.geometry_volume_cm3
            )));
        }
        if !(self.min_weight_fraction.is_finite() && (0.0..1.0).contains(&self.min_weight_fraction))
        {
            return Err(BatchError::InvalidConfig(format!(
                "minWeightFraction must lie in [0, 1), got {}",
                self.min_weight_fraction
            )));
        }
        Ok(())
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            geometry_volume_cm3: self.geometry_volume_cm3,
            min_weight_fraction: self.min_weight_fraction,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to read batch config '{}': {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse batch config '{}': {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid batch config: {0}")]
    InvalidConfig(String),
    #[error("invalid file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("failed to read directory '{}': {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no element files found matching '{pattern}' in '{}'", directory.display())]
    NoInputFiles { directory: PathBuf, pattern: String },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[source] rayon::ThreadPoolBuildError),
    #[error("failed to write '{}': {source}", path.display())]
    WriteArtifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<BatchError> for BurnupError {
    fn from(error: BatchError) -> Self {
        let message = error.to_string();
        match error {
            BatchError::ReadConfig { .. } => BurnupError::io_system("IO.BATCH_CONFIG", message),
            BatchError::ParseConfig { .. } | BatchError::InvalidConfig(_) => {
                BurnupError::input_validation("INPUT.BATCH_CONFIG", message)
            }
            BatchError::InvalidPattern { .. } => {
                BurnupError::input_validation("INPUT.BATCH_PATTERN", message)
            }
            BatchError::NoInputFiles { .. } => {
                BurnupError::input_validation("INPUT.BATCH_NO_FILES", message)
            }
            BatchError::ReadDirectory { .. } | BatchError::WriteArtifact { .. } => {
                BurnupError::io_system("IO.BATCH_FILESYSTEM", message)
            }
            BatchError::ThreadPool(_) => BurnupError::internal("SYS.BATCH_POOL", message),
        }
    }
}

/// Immutable view of one job handed to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub index: usize,
    pub name: String,
    pub source_path: PathBuf,
    pub material_id: u32,
}

impl JobRequest {
    pub fn from_job(job: &BatchJob) -> Self {
        Self {
            index: job.index,
            name: job.name.clone(),
            source_path: job.source_path.clone(),
            material_id: job.material_id,
        }
    }
}

/// Progress notifications from pool threads. Calls may arrive concurrently.
pub trait BatchObserver: Sync {
    fn job_started(&self, _job: &JobRequest, _counts: StatusCounts) {}

    fn job_finished(&self, _job: &JobRequest, _status: JobStatus, _counts: StatusCounts) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Files in `input_dir` whose names match `pattern`, sorted by name, as jobs
/// numbered from `material_id_base` in that order.
pub fn discover_jobs(config: &BatchConfig) -> Result<Vec<BatchJob>, BatchError> {
    let matcher = Glob::new(&config.pattern)
        .map_err(|source| BatchError::InvalidPattern {
            pattern: config.pattern.clone(),
            source,
        })?
        .compile_matcher();

    let entries = fs::read_dir(&config.input_dir).map_err(|source| BatchError::ReadDirectory {
        path: config.input_dir.clone(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| BatchError::ReadDirectory {
            path: config.input_dir.clone(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(BatchError::NoInputFiles {
            directory: config.input_dir.clone(),
            pattern: config.pattern.clone(),
        });
    }
    paths.sort();

    info!(files = paths.len(), pattern = %config.pattern, "found element files");
    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| {
            let offset = u32::try_from(index).unwrap_or(u32::MAX);
            BatchJob::new(index, path, config.material_id_base.saturating_add(offset))
        })
        .collect())
}

struct JobRun {
    status: JobStatus,
    output: Option<PipelineOutput>,
    error: Option<String>,
    runtime_seconds: Option<f64>,
}

struct LiveCounts {
    total: usize,
    running: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    started: AtomicUsize,
}

impl LiveCounts {
    fn new(total: usize) -> Self {
        Self {
            total,
            running: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    fn snapshot(&self) -> StatusCounts {
        let started = self.started.load(Ordering::SeqCst);
        StatusCounts {
            not_started: self.total.saturating_sub(started),
            running: self.running.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Runs every job on a pool of `max_workers` threads and writes each outcome
/// back to its job. Jobs reached after cancellation stay `not_started`.
pub fn execute_jobs(
    jobs: &mut [BatchJob],
    executor: &dyn JobExecutor,
    max_workers: usize,
    cancel: &CancellationToken,
    observer: &dyn BatchObserver,
) -> Result<Vec<PipelineOutput>, BatchError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .thread_name(|index| format!("burnup-worker-{index}"))
        .build()
        .map_err(BatchError::ThreadPool)?;

    let requests: Vec<JobRequest> = jobs.iter().map(JobRequest::from_job).collect();
    let counts = LiveCounts::new(requests.len());

    let runs: Vec<JobRun> = pool.install(|| {
        requests
            .par_iter()
            .map(|request| run_one(request, executor, cancel, observer, &counts))
            .collect()
    });

    let mut outputs = Vec::new();
    for (job, run) in jobs.iter_mut().zip(runs) {
        job.status = run.status;
        job.error = run.error;
        job.runtime_seconds = run.runtime_seconds;
        if let Some(output) = run.output {
            job.result = Some(output.composition.clone());
            outputs.push(output);
        }
    }
    Ok(outputs)
}

fn run_one(
    request: &JobRequest,
    executor: &dyn JobExecutor,
    cancel: &CancellationToken,
    observer: &dyn BatchObserver,
    counts: &LiveCounts,
) -> JobRun {
    if cancel.is_cancelled() {
        return JobRun {
            status: JobStatus::NotStarted,
            output: None,
            error: None,
            runtime_seconds: None,
        };
    }

    counts.started.fetch_add(1, Ordering::SeqCst);
    counts.running.fetch_add(1, Ordering::SeqCst);
    observer.job_started(request, counts.snapshot());
    info!(element = %request.name, material_id = request.material_id, "starting element");

    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| executor.execute(request, cancel)))
        .unwrap_or_else(|payload| Err(panicked_job_error(payload.as_ref())));
    let runtime_seconds = started.elapsed().as_secs_f64();

    counts.running.fetch_sub(1, Ordering::SeqCst);
    let run = match result {
        Ok(output) => {
            counts.completed.fetch_add(1, Ordering::SeqCst);
            info!(
                element = %request.name,
                runtime_seconds,
                isotopes = output.composition.isotope_count(),
                material_id = request.material_id,
                "completed element"
            );
            JobRun {
                status: JobStatus::Completed,
                output: Some(output),
                error: None,
                runtime_seconds: Some(runtime_seconds),
            }
        }
        Err(failure) => {
            counts.failed.fetch_add(1, Ordering::SeqCst);
            error!(element = %request.name, error = %failure, "failed element");
            JobRun {
                status: JobStatus::Failed,
                output: None,
                error: Some(format!("[{}] {}", failure.placeholder(), failure.message())),
                runtime_seconds: Some(runtime_seconds),
            }
        }
    };
    observer.job_finished(request, run.status, counts.snapshot());
    run
}

/// A panic inside one job fails that job only.
fn panicked_job_error(payload: &(dyn std::any::Any + Send)) -> BurnupError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    BurnupError::internal("SYS.JOB_PANIC", format!("job panicked: {detail}"))
}

pub struct BatchOptions<'a> {
    pub cancel: CancellationToken,
    pub observer: &'a dyn BatchObserver,
    /// Program started for each job by the process executor; usually the CLI itself.
    pub worker_program: Option<PathBuf>,
}

impl Default for BatchOptions<'_> {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            observer: &NoopObserver,
            worker_program: None,
        }
    }
}

pub struct BatchRun {
    pub report: BatchReport,
    pub jobs: Vec<BatchJob>,
}

pub fn run_batch(config: &BatchConfig, options: BatchOptions<'_>) -> PipelineResult<BatchRun> {
    config.validate()?;
    let mut jobs = discover_jobs(config)?;

    let registry = LibraryRegistry::load(
        &config.isotope_dir,
        config.library,
        config.isotope_file.as_deref(),
    )?;
    let mut element_cache = match ElementCache::load(&config.element_cache_path) {
        Ok(cache) => cache,
        Err(source) => {
            warn!(error = %source, "ignoring unusable element cache");
            ElementCache::new()
        }
    };

    let pipeline = FilePipeline::new(registry.active().clone(), element_cache.clone())
        .with_extractor(OutputExtractor::new(config.header_pattern))
        .with_settings(config.generation_settings())
        .with_target_case(config.target_case.clone());

    info!(
        jobs = jobs.len(),
        workers = config.max_workers,
        executor = %config.executor,
        library = config.library.description(),
        "starting batch"
    );
    let started = Instant::now();
    let outputs = match config.executor {
        ExecutorKind::Thread => {
            let executor = InProcessExecutor::new(&pipeline);
            execute_jobs(
                &mut jobs,
                &executor,
                config.max_workers,
                &options.cancel,
                options.observer,
            )?
        }
        ExecutorKind::Process => {
            let program = match options.worker_program {
                Some(program) => program,
                None => std::env::current_exe().map_err(|source| {
                    BurnupError::io_system(
                        "IO.WORKER_PROGRAM",
                        format!("failed to locate worker program: {}", source),
                    )
                })?,
            };
            let executor = ProcessExecutor::new(program, &pipeline);
            execute_jobs(
                &mut jobs,
                &executor,
                config.max_workers,
                &options.cancel,
                options.observer,
            )?
        }
    };
    let elapsed_seconds = started.elapsed().as_secs_f64();

    let added = element_cache.merge(
        outputs
            .iter()
            .flat_map(|output| output.discovered_elements.clone()),
    );
    if let Err(source) = element_cache.save(&config.element_cache_path) {
        warn!(error = %source, "element cache was not saved");
    } else if added > 0 {
        info!(added, "recorded new element lookups");
    }

    let generated_at_unix_seconds = current_unix_timestamp_seconds();
    let output_path = write_combined_cards(config, &jobs, generated_at_unix_seconds)?;
    let report = build_report(
        config,
        &jobs,
        options.cancel.is_cancelled(),
        elapsed_seconds,
        generated_at_unix_seconds,
        output_path,
    );

    if let Some(summary_path) = &config.summary_path {
        write_json_artifact(summary_path, &report).map_err(|source| BatchError::WriteArtifact {
            path: summary_path.clone(),
            source,
        })?;
        info!(path = %summary_path.display(), "processing summary saved");
    }

    if let Some(database_path) = &config.database_path {
        let completed: Vec<&BatchJob> = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Completed)
            .collect();
        if completed.is_empty() {
            warn!("no successful jobs to save to database");
        } else {
            let mut store = MaterialStore::open(database_path)?;
            let saved = store.save_batch(config.cycle_number, &completed)?;
            info!(path = %database_path.display(), materials = saved, cycle = config.cycle_number, "materials saved to database");
        }
    }

    let summary = &report.processing_info;
    info!(
        successful = summary.successful_elements,
        total = summary.total_elements,
        "batch complete"
    );
    if summary.failed_elements > 0 {
        let failed: Vec<&str> = report.failed_jobs().map(|job| job.element_name.as_str()).collect();
        warn!(failed = %failed.join(", "), "failed elements");
    }

    Ok(BatchRun { report, jobs })
}

fn write_combined_cards(
    config: &BatchConfig,
    jobs: &[BatchJob],
    generated_at_unix_seconds: u64,
) -> Result<Option<String>, BatchError> {
    let entries: Vec<CombinedCardEntry<'_>> = jobs
        .iter()
        .filter(|job| job.status == JobStatus::Completed)
        .filter_map(|job| {
            job.result.as_ref().map(|material| CombinedCardEntry {
                element_name: &job.name,
                material,
            })
        })
        .collect();
    if entries.is_empty() {
        warn!("no successful jobs to save");
        return Ok(None);
    }

    let content = render_combined_cards(&entries, generated_at_unix_seconds);
    write_text_artifact(&config.output_path, &content).map_err(|source| {
        BatchError::WriteArtifact {
            path: config.output_path.clone(),
            source,
        }
    })?;
    info!(path = %config.output_path.display(), materials = entries.len(), "combined material cards written");
    Ok(Some(config.output_path.to_string_lossy().replace('\\', "/")))
}

fn build_report(
    config: &BatchConfig,
    jobs: &[BatchJob],
    interrupted: bool,
    elapsed_seconds: f64,
    generated_at_unix_seconds: u64,
    output_path: Option<String>,
) -> BatchReport {
    let counts = StatusCounts::from_jobs(jobs);
    BatchReport {
        processing_info: ProcessingInfo {
            total_elements: jobs.len(),
            successful_elements: counts.completed,
            failed_elements: counts.failed,
            not_started_elements: counts.not_started,
            max_workers: config.max_workers,
            executor_type: config.executor,
            library: config.library,
            cycle_number: config.cycle_number,
            interrupted,
            elapsed_seconds,
            generated_at_unix_seconds,
        },
        status_counts: counts,
        output_path,
        elements: jobs.iter().map(JobSummary::from_job).collect(),
    }
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{
        BatchConfig, BatchError, BatchObserver, JobRequest, NoopObserver, StatusCounts,
        discover_jobs, execute_jobs,
    };
    use crate::domain::{
        BurnupError, ExecutorKind, JobStatus, NuclearLibrary, PipelineResult, Zaid,
    };
    use crate::modules::material::{CombinedCardEntry, render_combined_cards};
    use crate::modules::pipeline::{CancellationToken, PipelineOutput};
    use crate::modules::traits::JobExecutor;
    use crate::domain::MaterialComposition;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn config_for(dir: &std::path::Path) -> BatchConfig {
        BatchConfig {
            input_dir: dir.to_path_buf(),
            ..BatchConfig::default()
        }
    }

    #[test]
    fn config_defaults_match_documented_values() {
        let config = BatchConfig::default();
        assert_eq!(config.pattern, "element_*.out");
        assert_eq!(config.max_workers, 16);
        assert_eq!(config.executor, ExecutorKind::Thread);
        assert_eq!(config.library, NuclearLibrary::EndfB8);
        assert_eq!(config.material_id_base, 200);
        assert_eq!(config.cycle_number, 1);
        assert_eq!(config.min_weight_fraction, 1.0e-6);
    }

    #[test]
    fn config_json_uses_camel_case_and_fills_defaults() {
        let config: BatchConfig = serde_json::from_str(
            r#"{ "maxWorkers": 2, "executor": "process", "library": ".70c", "targetCase": "decay" }"#,
        )
        .expect("config should parse");
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.executor, ExecutorKind::Process);
        assert_eq!(config.library, NuclearLibrary::EndfB7);
        assert_eq!(config.target_case.as_deref(), Some("decay"));
        assert_eq!(config.pattern, "element_*.out");
    }

    #[test]
    fn invalid_config_values_are_rejected() {
        let config = BatchConfig {
            max_workers: 0,
            ..BatchConfig::default()
        };
        let error = BurnupError::from(config.validate().expect_err("zero workers"));
        assert_eq!(error.placeholder(), "INPUT.BATCH_CONFIG");

        let config = BatchConfig {
            geometry_volume_cm3: -1.0,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn jobs_are_sorted_by_name_with_sequential_material_ids() {
        let temp = TempDir::new().expect("tempdir should be created");
        for name in ["element_003.out", "element_001.out", "element_002.out", "notes.txt"] {
            fs::write(temp.path().join(name), "").expect("file should be written");
        }
        fs::create_dir(temp.path().join("element_dir.out")).expect("dir should be created");

        let jobs = discover_jobs(&config_for(temp.path())).expect("jobs should be discovered");
        let names: Vec<&str> = jobs.iter().map(|job| job.name.as_str()).collect();
        assert_eq!(names, ["element_001", "element_002", "element_003"]);
        let ids: Vec<u32> = jobs.iter().map(|job| job.material_id).collect();
        assert_eq!(ids, [200, 201, 202]);
    }

    #[test]
    fn empty_match_is_a_setup_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = discover_jobs(&config_for(temp.path())).expect_err("no files should fail");
        assert!(matches!(error, BatchError::NoInputFiles { .. }));
        assert_eq!(BurnupError::from(error).exit_code(), 2);
    }

    struct ScriptedExecutor;

    impl JobExecutor for ScriptedExecutor {
        fn kind(&self) -> ExecutorKind {
            ExecutorKind::Thread
        }

        fn execute(
            &self,
            job: &JobRequest,
            _cancel: &CancellationToken,
        ) -> PipelineResult<PipelineOutput> {
            if job.index % 2 == 1 {
                return Err(BurnupError::input_validation("INPUT.TEST", "odd job"));
            }
            let mut fractions = BTreeMap::new();
            fractions.insert(Zaid::new(92235), 1.0);
            Ok(PipelineOutput {
                composition: MaterialComposition {
                    material_id: job.material_id,
                    case_label: "decay".to_string(),
                    time_label: "1.00E+00min".to_string(),
                    library: NuclearLibrary::EndfB8,
                    total_mass_g: 1.0,
                    density_g_cm3: 1.0,
                    surrogate_mass_g: 0.0,
                    fractions,
                    constituents: Vec::new(),
                },
                discovered_elements: BTreeMap::new(),
            })
        }
    }

    struct PanickingExecutor;

    impl JobExecutor for PanickingExecutor {
        fn kind(&self) -> ExecutorKind {
            ExecutorKind::Thread
        }

        fn execute(
            &self,
            job: &JobRequest,
            cancel: &CancellationToken,
        ) -> PipelineResult<PipelineOutput> {
            if job.index == 1 {
                panic!("mass overflow in {}", job.name);
            }
            ScriptedExecutor.execute(job, cancel)
        }
    }

    /// Trips the shared token from inside the job, as Ctrl-C would mid-run.
    struct SelfCancellingExecutor;

    impl JobExecutor for SelfCancellingExecutor {
        fn kind(&self) -> ExecutorKind {
            ExecutorKind::Thread
        }

        fn execute(
            &self,
            _job: &JobRequest,
            cancel: &CancellationToken,
        ) -> PipelineResult<PipelineOutput> {
            cancel.cancel();
            cancel.check("material generation")?;
            Err(BurnupError::internal("SYS.TEST", "cancellation was not observed"))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        finished: Mutex<Vec<(usize, JobStatus)>>,
        last_counts: Mutex<Option<StatusCounts>>,
    }

    impl BatchObserver for RecordingObserver {
        fn job_finished(&self, job: &JobRequest, status: JobStatus, counts: StatusCounts) {
            if let Ok(mut finished) = self.finished.lock() {
                finished.push((job.index, status));
            }
            if let Ok(mut last) = self.last_counts.lock() {
                let replace = last.is_none_or(|previous| {
                    previous.completed + previous.failed <= counts.completed + counts.failed
                });
                if replace {
                    *last = Some(counts);
                }
            }
        }
    }

    #[test]
    fn outcomes_keep_submission_order_regardless_of_completion() {
        let temp = TempDir::new().expect("tempdir should be created");
        for index in 1..=6 {
            fs::write(temp.path().join(format!("element_{index:03}.out")), "")
                .expect("file should be written");
        }
        let mut jobs = discover_jobs(&config_for(temp.path())).expect("jobs should exist");
        let observer = RecordingObserver::default();

        let outputs = execute_jobs(
            &mut jobs,
            &ScriptedExecutor,
            3,
            &CancellationToken::new(),
            &observer,
        )
        .expect("pool should run");

        let statuses: Vec<JobStatus> = jobs.iter().map(|job| job.status).collect();
        assert_eq!(
            statuses,
            [
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Completed,
                JobStatus::Failed,
            ]
        );
        assert_eq!(outputs.len(), 3);
        assert_eq!(jobs[1].error.as_deref(), Some("[INPUT.TEST] odd job"));
        assert!(jobs.iter().all(|job| job.runtime_seconds.is_some()));

        let entries: Vec<CombinedCardEntry<'_>> = jobs
            .iter()
            .filter_map(|job| {
                job.result.as_ref().map(|material| CombinedCardEntry {
                    element_name: &job.name,
                    material,
                })
            })
            .collect();
        let combined = render_combined_cards(&entries, 0);
        let order: Vec<&str> = combined
            .lines()
            .filter(|line| line.starts_with('M'))
            .collect();
        assert_eq!(order, ["M200 nlib=00c", "M202 nlib=00c", "M204 nlib=00c"]);

        let finished = observer.finished.lock().expect("observer lock").len();
        assert_eq!(finished, 6);
        let last = observer
            .last_counts
            .lock()
            .expect("observer lock")
            .expect("counts should be recorded");
        assert_eq!(last.completed + last.failed, 6);
    }

    #[test]
    fn cancelled_batch_leaves_jobs_not_started() {
        let temp = TempDir::new().expect("tempdir should be created");
        for index in 1..=3 {
            fs::write(temp.path().join(format!("element_{index:03}.out")), "")
                .expect("file should be written");
        }
        let mut jobs = discover_jobs(&config_for(temp.path())).expect("jobs should exist");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outputs = execute_jobs(&mut jobs, &ScriptedExecutor, 2, &cancel, &NoopObserver)
            .expect("pool should run");
        assert!(outputs.is_empty());
        assert!(jobs.iter().all(|job| job.status == JobStatus::NotStarted));
        assert!(jobs.iter().all(|job| job.result.is_none()));
    }

    #[test]
    fn panicking_job_fails_alone() {
        let temp = TempDir::new().expect("tempdir should be created");
        for index in 1..=3 {
            fs::write(temp.path().join(format!("element_{index:03}.out")), "")
                .expect("file should be written");
        }
        let mut jobs = discover_jobs(&config_for(temp.path())).expect("jobs should exist");
        let observer = RecordingObserver::default();

        let outputs = execute_jobs(
            &mut jobs,
            &PanickingExecutor,
            2,
            &CancellationToken::new(),
            &observer,
        )
        .expect("pool should survive a panicking job");

        let statuses: Vec<JobStatus> = jobs.iter().map(|job| job.status).collect();
        assert_eq!(
            statuses,
            [JobStatus::Completed, JobStatus::Failed, JobStatus::Completed]
        );
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            jobs[1].error.as_deref(),
            Some("[SYS.JOB_PANIC] job panicked: mass overflow in element_002")
        );
        assert_eq!(observer.finished.lock().expect("observer lock").len(), 3);
    }

    #[test]
    fn cancellation_during_a_job_fails_it_and_skips_the_rest() {
        let temp = TempDir::new().expect("tempdir should be created");
        for index in 1..=3 {
            fs::write(temp.path().join(format!("element_{index:03}.out")), "")
                .expect("file should be written");
        }
        let mut jobs = discover_jobs(&config_for(temp.path())).expect("jobs should exist");
        let cancel = CancellationToken::new();

        let outputs = execute_jobs(&mut jobs, &SelfCancellingExecutor, 1, &cancel, &NoopObserver)
            .expect("pool should run");

        assert!(outputs.is_empty());
        assert!(cancel.is_cancelled());
        let failed: Vec<&str> = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
            .filter_map(|job| job.error.as_deref())
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].starts_with("[RUN.INTERRUPTED]"));
        let not_started = jobs
            .iter()
            .filter(|job| job.status == JobStatus::NotStarted)
            .count();
        assert_eq!(not_started, 2);
        assert!(jobs.iter().all(|job| job.result.is_none()));
    }
}
