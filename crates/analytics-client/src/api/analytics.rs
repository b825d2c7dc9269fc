use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::AnalyticsClient;
use crate::error::{ClientError, JobError, Result};
use crate::jobs::{Job, JobId};
use crate::transport::{ApiRequest, Transport};

/// Body of an analysis submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub recipe_key: String,
    pub params: Value,
}

impl RunRequest {
    pub fn new(recipe_key: impl Into<String>, params: Value) -> Self {
        Self {
            recipe_key: recipe_key.into(),
            params,
        }
    }
}

impl<T: Transport + 'static> AnalyticsClient<T> {
    pub async fn submit_run(&self, dataset_id: i64, run: &RunRequest) -> Result<Job> {
        let body = serde_json::to_value(run).map_err(|e| ClientError::configuration(e.to_string()))?;
        self.fetch(ApiRequest::post(format!("/datasets/{dataset_id}/analytics/run")).json(body))
            .await
    }

    pub async fn get_run(&self, run_id: &JobId) -> Result<Job> {
        self.fetch(ApiRequest::get(format!("/analytics/runs/{run_id}")))
            .await
    }

    /// Fetch a run artifact (plot image, exported table) by the path listed in
    /// the run's `artifacts_json`.
    pub async fn download_artifact(&self, path: &str) -> Result<Bytes> {
        let request = ApiRequest::get(path).binary();
        Ok(self.session.request(&request).await?.bytes())
    }

    /// Submit `run` and poll it until it succeeds or fails.
    ///
    /// A failed run comes back as `Ok`; check [`Job::failed`] and
    /// `error_message`.
    #[instrument(skip(self, run, token), fields(recipe = %run.recipe_key))]
    pub async fn run_analysis(
        &self,
        dataset_id: i64,
        run: &RunRequest,
        token: &CancellationToken,
    ) -> std::result::Result<Job, JobError<ClientError>> {
        let job = self
            .poller
            .run_to_completion(token, self.submit_run(dataset_id, run), |id| async move {
                self.get_run(&id).await
            })
            .await?;

        if job.failed() {
            warn!(
                run_id = %job.id,
                error = job.error_message.as_deref().unwrap_or("unknown error"),
                "analysis run failed"
            );
        } else {
            info!(run_id = %job.id, "analysis run succeeded");
        }
        Ok(job)
    }
}
