use crate::domain::{ExecutorKind, PipelineResult};
use crate::modules::batch::JobRequest;
use crate::modules::pipeline::{CancellationToken, PipelineOutput};

/// Runs one batch job to completion. Implementations are shared by every pool thread.
pub trait JobExecutor: Sync {
    fn kind(&self) -> ExecutorKind;

    fn execute(
        &self,
        job: &JobRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<PipelineOutput>;
}

#[cfg(test)]
mod tests {
    use super::JobExecutor;
    use crate::domain::{BurnupError, BurnupErrorCategory, ExecutorKind, PipelineResult};
    use crate::modules::batch::JobRequest;
    use crate::modules::pipeline::{CancellationToken, PipelineOutput};

    struct FailingExecutor;

    impl JobExecutor for FailingExecutor {
        fn kind(&self) -> ExecutorKind {
            ExecutorKind::Thread
        }

        fn execute(
            &self,
            _job: &JobRequest,
            _cancel: &CancellationToken,
        ) -> PipelineResult<PipelineOutput> {
            Err(BurnupError::computation("RUN.JOB", "job execution failed"))
        }
    }

    #[test]
    fn job_executor_uses_shared_error_types() {
        let job = JobRequest {
            index: 0,
            name: "element_001".to_string(),
            source_path: "element_001.out".into(),
            material_id: 200,
        };
        let error = FailingExecutor
            .execute(&job, &CancellationToken::new())
            .expect_err("executor should fail");
        assert_eq!(error.category(), BurnupErrorCategory::ComputationError);
        assert_eq!(error.exit_code(), 4);
        assert_eq!(error.placeholder(), "RUN.JOB");
    }
}
