//! Typed wrappers for the analytics backend's resources.
//!
//! Every call goes through the [`SessionClient`], so credential renewal is
//! invisible here. Fields the client does not model are kept in flattened
//! JSON maps.

mod analytics;
mod datasets;
mod recipes;
mod stats;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::jobs::{JobPoller, PollConfig};
use crate::session::SessionClient;
use crate::transport::{ApiRequest, HttpTransport, Transport};

pub use analytics::RunRequest;
pub use datasets::{ColumnProfile, Dataset, DatasetPreview, DatasetSchema, DatasetUpload, guess_mime};
pub use recipes::{RecipeTemplate, RecipeUpdate, SavedRecipe};
pub use stats::{CorrelationMatrix, PcaResult, StatsRequest};

/// Cheap to clone; clones share the session and its credential.
pub struct AnalyticsClient<T = HttpTransport> {
    session: Arc<SessionClient<T>>,
    poller: JobPoller,
}

impl<T> Clone for AnalyticsClient<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            poller: self.poller.clone(),
        }
    }
}

impl AnalyticsClient<HttpTransport> {
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let poll = config.poll.clone();
        let session = SessionClient::from_config(config)?;
        Ok(Self::new(session, poll))
    }
}

impl<T: Transport + 'static> AnalyticsClient<T> {
    pub fn new(session: SessionClient<T>, poll: PollConfig) -> Self {
        Self {
            session: Arc::new(session),
            poller: JobPoller::new(poll),
        }
    }

    /// The underlying session, for login/logout and raw requests.
    pub fn session(&self) -> &SessionClient<T> {
        &self.session
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    async fn fetch<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R> {
        self.session.request(&request).await?.decode(&request.path)
    }

    async fn execute(&self, request: ApiRequest) -> Result<()> {
        self.session.request(&request).await.map(|_| ())
    }
}
