use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::model::{JobId, JobState};
use crate::error::JobError;

/// Default wait between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How a job is polled.
///
/// Both limits are off by default: the backend defines no bound on how long a
/// job may stay queued or running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between two polls.
    pub interval: Duration,
    /// Give up after this many status polls.
    pub max_polls: Option<u32>,
    /// Give up once this much time has passed since submission.
    pub max_duration: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
            max_duration: None,
        }
    }
}

impl PollConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }
}

/// Drives a submit-then-poll job protocol to a terminal state.
#[derive(Debug, Clone, Default)]
pub struct JobPoller {
    config: PollConfig,
}

impl JobPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Submit once, then poll until the job is terminal.
    ///
    /// A job that ends in `failed` is returned as `Ok`; what to make of it is
    /// up to the caller. Errors from `submit`/`poll` are returned immediately
    /// as [`JobError::Source`] and never retried.
    ///
    /// `token` is checked before every wait and every poll and races the wait
    /// itself. A poll already in flight is allowed to finish.
    #[instrument(skip_all, fields(interval_ms = self.config.interval.as_millis() as u64))]
    pub async fn run_to_completion<J, E, S, P, Fut>(
        &self,
        token: &CancellationToken,
        submit: S,
        mut poll: P,
    ) -> Result<J, JobError<E>>
    where
        J: JobState,
        S: Future<Output = Result<J, E>>,
        P: FnMut(JobId) -> Fut,
        Fut: Future<Output = Result<J, E>>,
    {
        if token.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let started = Instant::now();
        let mut job = submit.await.map_err(JobError::Source)?;
        let mut polls: u32 = 0;
        info!(job_id = %job.job_id(), status = %job.status(), "job submitted");

        while !job.status().is_terminal() {
            self.check_limits::<_, E>(&job, polls, started)?;

            if token.is_cancelled() {
                debug!(job_id = %job.job_id(), "job polling cancelled");
                return Err(JobError::Cancelled);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(job_id = %job.job_id(), "job polling cancelled while waiting");
                    return Err(JobError::Cancelled);
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            if token.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let next = poll(job.job_id().clone()).await.map_err(JobError::Source)?;
            polls += 1;

            if !job.status().can_transition_to(next.status()) {
                return Err(JobError::InvalidTransition {
                    from: job.status(),
                    to: next.status(),
                });
            }
            if next.status() != job.status() {
                debug!(job_id = %next.job_id(), from = %job.status(), to = %next.status(), "job status changed");
            }
            job = next;
        }

        info!(
            job_id = %job.job_id(),
            status = %job.status(),
            polls,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job finished"
        );
        Ok(job)
    }

    fn check_limits<J: JobState, E>(
        &self,
        job: &J,
        polls: u32,
        started: Instant,
    ) -> Result<(), JobError<E>> {
        if let Some(max_polls) = self.config.max_polls {
            if polls >= max_polls {
                return Err(JobError::PollLimitExceeded {
                    job_id: job.job_id().to_string(),
                    status: job.status(),
                    polls,
                });
            }
        }

        if let Some(max_duration) = self.config.max_duration {
            let elapsed = started.elapsed();
            if elapsed >= max_duration {
                return Err(JobError::DeadlineExceeded {
                    job_id: job.job_id().to_string(),
                    status: job.status(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }

        Ok(())
    }
}

/// [`JobPoller::run_to_completion`] with the given interval and no limits.
pub async fn run_to_completion<J, E, S, P, Fut>(
    token: &CancellationToken,
    interval: Duration,
    submit: S,
    poll: P,
) -> Result<J, JobError<E>>
where
    J: JobState,
    S: Future<Output = Result<J, E>>,
    P: FnMut(JobId) -> Fut,
    Fut: Future<Output = Result<J, E>>,
{
    JobPoller::new(PollConfig::with_interval(interval))
        .run_to_completion(token, submit, poll)
        .await
}
