//! Client for the dataset analytics backend.
//!
//! ## Core Types
//!
//! - [`SessionClient`] - Attaches the access credential to every request and
//!   transparently renews it once per expiry, however many requests hit the
//!   401 at the same time
//! - [`JobPoller`] - Drives a submit-then-poll job to `succeeded`/`failed`,
//!   honouring a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - [`AnalyticsClient`] - Typed dataset, recipe, statistics and analysis-run
//!   calls on top of the two
//!
//! ## Transport
//!
//! Requests are plain [`ApiRequest`] values handed to a [`Transport`]; the
//! production implementation is [`HttpTransport`] (reqwest with a cookie
//! store for the refresh cookie).
#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod proxy;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::AnalyticsClient;
pub use config::{AuthEndpoints, ClientConfig};
pub use error::{ClientError, JobError, RefreshFailure, Result, TransportError};
pub use jobs::{Job, JobId, JobPoller, JobState, JobStatus, PollConfig, run_to_completion};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use session::{AuthSession, Credential, SessionClient, User};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, install_rustls_provider};
