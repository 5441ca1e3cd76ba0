use super::JobRequest;
use crate::domain::{BurnupError, ExecutorKind, NuclearLibrary, PipelineResult, Zaid};
use crate::modules::extractor::{HeaderPattern, OutputExtractor};
use crate::modules::identity::ElementCache;
use crate::modules::material::GenerationSettings;
use crate::modules::pipeline::{CancellationToken, FilePipeline, PipelineOutput, interrupted_error};
use crate::modules::registry::IsotopeAvailability;
use crate::modules::traits::JobExecutor;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const WORKER_SUBCOMMAND: &str = "worker";
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs jobs on the calling pool thread.
pub struct InProcessExecutor<'a> {
    pipeline: &'a FilePipeline,
}

impl<'a> InProcessExecutor<'a> {
    pub fn new(pipeline: &'a FilePipeline) -> Self {
        Self { pipeline }
    }
}

impl JobExecutor for InProcessExecutor<'_> {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Thread
    }

    fn execute(
        &self,
        job: &JobRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutput> {
        self.pipeline
            .run_file(&job.source_path, job.material_id, cancel)
    }
}

/// Everything a worker process needs to rebuild the pipeline: the job plus
/// read-only snapshots of the library set and element cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub source_path: PathBuf,
    pub material_id: u32,
    pub target_case: Option<String>,
    pub header_pattern: HeaderPattern,
    pub settings: GenerationSettings,
    pub library: NuclearLibrary,
    pub available_zaids: Vec<Zaid>,
    pub element_cache: ElementCache,
}

impl WorkerRequest {
    pub fn for_job(pipeline: &FilePipeline, job: &JobRequest) -> Self {
        Self {
            source_path: job.source_path.clone(),
            material_id: job.material_id,
            target_case: pipeline.target_case().map(str::to_string),
            header_pattern: pipeline.extractor().header_pattern(),
            settings: pipeline.settings(),
            library: pipeline.availability().library(),
            available_zaids: pipeline.availability().sorted_zaids(),
            element_cache: pipeline.element_cache().clone(),
        }
    }

    fn into_pipeline(self) -> (FilePipeline, PathBuf, u32) {
        let availability = IsotopeAvailability::from_zaids(self.library, self.available_zaids);
        let pipeline = FilePipeline::new(availability, self.element_cache)
            .with_extractor(OutputExtractor::new(self.header_pattern))
            .with_settings(self.settings)
            .with_target_case(self.target_case);
        (pipeline, self.source_path, self.material_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerFailure {
    pub exit_code: i32,
    pub placeholder: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerReply {
    Completed(PipelineOutput),
    Failed(WorkerFailure),
}

/// Worker-side entry point: rebuilds the pipeline from the request snapshot and runs it.
pub fn run_worker_request(request: WorkerRequest) -> WorkerReply {
    let (pipeline, source_path, material_id) = request.into_pipeline();
    match pipeline.run_file(&source_path, material_id, &CancellationToken::new()) {
        Ok(output) => WorkerReply::Completed(output),
        Err(error) => WorkerReply::Failed(WorkerFailure {
            exit_code: error.exit_code(),
            placeholder: error.placeholder().to_string(),
            message: error.message().to_string(),
        }),
    }
}

/// Runs each job in a child process (`<program> worker`), exchanging one JSON
/// request on stdin for one JSON reply on stdout.
pub struct ProcessExecutor<'a> {
    program: PathBuf,
    pipeline: &'a FilePipeline,
}

impl<'a> ProcessExecutor<'a> {
    pub fn new(program: impl Into<PathBuf>, pipeline: &'a FilePipeline) -> Self {
        Self {
            program: program.into(),
            pipeline,
        }
    }

    fn spawn_and_wait(
        &self,
        request: &WorkerRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<String> {
        let payload = serde_json::to_vec(request).map_err(|source| {
            BurnupError::internal(
                "SYS.WORKER_REQUEST",
                format!("failed to encode worker request: {}", source),
            )
        })?;

        let mut child = Command::new(&self.program)
            .arg(WORKER_SUBCOMMAND)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| {
                BurnupError::io_system(
                    "IO.WORKER_SPAWN",
                    format!(
                        "failed to start worker '{}': {}",
                        self.program.display(),
                        source
                    ),
                )
            })?;
        debug!(pid = child.id(), program = %self.program.display(), "spawned worker");

        if let Some(mut stdin) = child.stdin.take()
            && let Err(source) = stdin.write_all(&payload)
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BurnupError::io_system(
                "IO.WORKER_PIPE",
                format!("failed to send request to worker: {}", source),
            ));
        }

        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buffer = String::new();
                stdout.read_to_string(&mut buffer).map(|_| buffer)
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(interrupted_error("worker completion"));
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(WORKER_POLL_INTERVAL),
                Err(source) => {
                    return Err(BurnupError::io_system(
                        "IO.WORKER_WAIT",
                        format!("failed to wait for worker: {}", source),
                    ));
                }
            }
        };

        let stdout = match reader.map(|handle| handle.join()) {
            Some(Ok(Ok(stdout))) => stdout,
            Some(Ok(Err(source))) => {
                return Err(BurnupError::io_system(
                    "IO.WORKER_PIPE",
                    format!("failed to read worker reply: {}", source),
                ));
            }
            Some(Err(_)) | None => String::new(),
        };

        if stdout.trim().is_empty() {
            return Err(BurnupError::computation(
                "RUN.WORKER",
                format!("worker exited with {} without a reply", status),
            ));
        }
        Ok(stdout)
    }
}

impl JobExecutor for ProcessExecutor<'_> {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Process
    }

    fn execute(
        &self,
        job: &JobRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutput> {
        cancel.check("starting worker")?;
        let request = WorkerRequest::for_job(self.pipeline, job);
        let stdout = self.spawn_and_wait(&request, cancel)?;

        let reply: WorkerReply = serde_json::from_str(stdout.trim()).map_err(|source| {
            BurnupError::internal(
                "SYS.WORKER_REPLY",
                format!("failed to decode worker reply for '{}': {}", job.name, source),
            )
        })?;
        match reply {
            WorkerReply::Completed(output) => Ok(output),
            WorkerReply::Failed(failure) => Err(BurnupError::computation(
                "RUN.WORKER",
                format!("[{}] {}", failure.placeholder, failure.message),
            )),
        }
    }
}
