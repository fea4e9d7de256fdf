// Panic isolation for job execution
// A panicking job must not take down a static worker or leak a permit
use crate::port::{BoxedJob, JobError, JobResult};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Execute a job, converting a panic into `JobError::Panicked`.
/// Nothing is logged here; the runner's failure policy decides.
///
/// # Example
/// ```text
/// let result = execute_guarded(Box::new(PanickingJob("boom"))).await;
/// assert_eq!(result, Err(JobError::Panicked("boom".into())));
/// ```
pub async fn execute_guarded(job: BoxedJob) -> JobResult {
    match AssertUnwindSafe(job.execute()).catch_unwind().await {
        Ok(result) => result,
        Err(panic_info) => Err(JobError::Panicked(panic_message(&*panic_info))),
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job::mocks::{FailingJob, PanickingJob};
    use crate::port::from_fn;

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = execute_guarded(Box::new(from_fn(|| async { Ok(()) }))).await;
        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_failure_passes_through() {
        let result = execute_guarded(Box::new(FailingJob("disk full".into()))).await;
        assert_eq!(result, Err(JobError::Failed("disk full".into())));
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let result = execute_guarded(Box::new(PanickingJob("boom"))).await;
        assert_eq!(result, Err(JobError::Panicked("boom".into())));
    }

    #[tokio::test]
    async fn test_formatted_panic_is_captured() {
        let job = from_fn(|| async {
            let n = 7;
            if n > 0 {
                panic!("bad input {}", n);
            }
            Ok(())
        });
        let result = execute_guarded(Box::new(job)).await;
        assert_eq!(result, Err(JobError::Panicked("bad input 7".into())));
    }
}
