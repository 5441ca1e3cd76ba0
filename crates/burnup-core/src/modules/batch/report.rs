use crate::domain::{BatchJob, ExecutorKind, JobStatus, NuclearLibrary};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub not_started: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a BatchJob>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            match job.status {
                JobStatus::NotStarted => counts.not_started += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.not_started + self.running + self.completed + self.failed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingInfo {
    pub total_elements: usize,
    pub successful_elements: usize,
    pub failed_elements: usize,
    pub not_started_elements: usize,
    pub max_workers: usize,
    pub executor_type: ExecutorKind,
    pub library: NuclearLibrary,
    pub cycle_number: u32,
    pub interrupted: bool,
    pub elapsed_seconds: f64,
    pub generated_at_unix_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub index: usize,
    pub element_name: String,
    pub source_path: String,
    pub status: JobStatus,
    pub runtime_seconds: Option<f64>,
    pub error: Option<String>,
    pub material_id: u32,
    pub case_name: Option<String>,
    pub total_mass_g: Option<f64>,
    pub density_g_cm3: Option<f64>,
    pub surrogate_mass_g: Option<f64>,
    pub isotope_count: Option<usize>,
}

impl JobSummary {
    pub fn from_job(job: &BatchJob) -> Self {
        let result = job.result.as_ref();
        Self {
            index: job.index,
            element_name: job.name.clone(),
            source_path: job.source_path.to_string_lossy().replace('\\', "/"),
            status: job.status,
            runtime_seconds: job.runtime_seconds,
            error: job.error.clone(),
            material_id: job.material_id,
            case_name: result.map(|material| material.case_label.clone()),
            total_mass_g: result.map(|material| material.total_mass_g),
            density_g_cm3: result.map(|material| material.density_g_cm3),
            surrogate_mass_g: result.map(|material| material.surrogate_mass_g),
            isotope_count: result.map(|material| material.isotope_count()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub processing_info: ProcessingInfo,
    pub status_counts: StatusCounts,
    pub output_path: Option<String>,
    pub elements: Vec<JobSummary>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.processing_info.total_elements > 0
            && self.processing_info.successful_elements == self.processing_info.total_elements
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobSummary> {
        self.elements
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
    }
}

pub fn render_human_summary(report: &BatchReport) -> String {
    let info = &report.processing_info;
    let status = if report.all_succeeded() {
        "COMPLETE"
    } else if info.interrupted {
        "INTERRUPTED"
    } else {
        "PARTIAL"
    };

    let mut lines = Vec::new();
    lines.push(format!("Batch status: {}", status));
    lines.push(format!(
        "Elements: {} total ({} successful, {} failed, {} not started)",
        info.total_elements,
        info.successful_elements,
        info.failed_elements,
        info.not_started_elements
    ));
    lines.push(format!(
        "Executor: {} x{} ({}), cycle {}",
        info.executor_type,
        info.max_workers,
        info.library.description(),
        info.cycle_number
    ));
    let average = if info.total_elements > 0 {
        info.elapsed_seconds / info.total_elements as f64
    } else {
        0.0
    };
    lines.push(format!(
        "Processing time: {:.1} seconds ({:.2} seconds per element)",
        info.elapsed_seconds, average
    ));
    if let Some(output_path) = &report.output_path {
        lines.push(format!("Output file: {}", output_path));
    }

    let failed: Vec<&JobSummary> = report.failed_jobs().collect();
    if !failed.is_empty() {
        lines.push("Failed elements:".to_string());
        for job in failed {
            lines.push(format!(
                "  - {}: {}",
                job.element_name,
                job.error.as_deref().unwrap_or("failed without an error message")
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{BatchReport, JobSummary, ProcessingInfo, StatusCounts, render_human_summary};
    use crate::domain::{BatchJob, ExecutorKind, JobStatus, NuclearLibrary};

    fn report(jobs: &[BatchJob], interrupted: bool) -> BatchReport {
        let counts = StatusCounts::from_jobs(jobs);
        BatchReport {
            processing_info: ProcessingInfo {
                total_elements: counts.total(),
                successful_elements: counts.completed,
                failed_elements: counts.failed,
                not_started_elements: counts.not_started,
                max_workers: 4,
                executor_type: ExecutorKind::Thread,
                library: NuclearLibrary::EndfB8,
                cycle_number: 2,
                interrupted,
                elapsed_seconds: 3.0,
                generated_at_unix_seconds: 0,
            },
            status_counts: counts,
            output_path: Some("mcnp_materials_parallel.txt".to_string()),
            elements: jobs.iter().map(JobSummary::from_job).collect(),
        }
    }

    fn job(index: usize, status: JobStatus, error: Option<&str>) -> BatchJob {
        let mut job = BatchJob::new(index, format!("element_{:03}.out", index + 1), 200 + index as u32);
        job.status = status;
        job.error = error.map(str::to_string);
        job
    }

    #[test]
    fn counts_follow_job_statuses() {
        let jobs = [
            job(0, JobStatus::Completed, None),
            job(1, JobStatus::Failed, Some("bad")),
            job(2, JobStatus::NotStarted, None),
        ];
        let counts = StatusCounts::from_jobs(&jobs);
        assert_eq!(
            counts,
            StatusCounts {
                not_started: 1,
                running: 0,
                completed: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn summary_lists_failed_elements_with_errors() {
        let jobs = [
            job(0, JobStatus::Completed, None),
            job(1, JobStatus::Failed, Some("[INPUT.OUTPUT_NO_CASES] no case sections found")),
        ];
        let rendered = render_human_summary(&report(&jobs, false));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Batch status: PARTIAL");
        assert_eq!(
            lines[1],
            "Elements: 2 total (1 successful, 1 failed, 0 not started)"
        );
        assert_eq!(lines[2], "Executor: thread x4 (ENDF/B-VIII.0), cycle 2");
        assert_eq!(lines[3], "Processing time: 3.0 seconds (1.50 seconds per element)");
        assert!(rendered.contains(
            "  - element_002: [INPUT.OUTPUT_NO_CASES] no case sections found"
        ));
    }

    #[test]
    fn interrupted_and_complete_batches_are_labelled() {
        let complete = [job(0, JobStatus::Completed, None)];
        assert!(render_human_summary(&report(&complete, false)).starts_with("Batch status: COMPLETE"));

        let interrupted = [
            job(0, JobStatus::Completed, None),
            job(1, JobStatus::NotStarted, None),
        ];
        assert!(
            render_human_summary(&report(&interrupted, true))
                .starts_with("Batch status: INTERRUPTED")
        );
    }

    #[test]
    fn summary_json_uses_snake_case_statuses() {
        let jobs = [job(0, JobStatus::NotStarted, None)];
        let json = serde_json::to_value(report(&jobs, true)).expect("report should serialize");
        assert_eq!(json["elements"][0]["status"], "not_started");
        assert_eq!(json["processing_info"]["executor_type"], "thread");
        assert_eq!(json["processing_info"]["library"], ".00c");
        assert_eq!(json["status_counts"]["not_started"], 1);
    }
}
