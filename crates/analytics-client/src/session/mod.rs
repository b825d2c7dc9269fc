//! Authenticated session client.
//!
//! [`SessionClient`] attaches the current [`Credential`] to every request and
//! hides credential expiry from callers: a 401 triggers one shared refresh and
//! a single retry of the original request.
//!
//! # Refresh coordination
//!
//! The client owns two slots, the credential and the pending refresh. The
//! first caller that needs a refresh stores a [`Shared`] future in the pending
//! slot; everyone else who hits a 401 while it is unresolved awaits the same
//! future, so a burst of N expired requests costs one refresh call. The
//! refresh future clears the slot and updates the credential itself when it
//! resolves, before any waiter observes the outcome.

mod auth;
mod credential;

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{AuthEndpoints, ClientConfig};
use crate::error::{ClientError, RefreshFailure, Result};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

pub use auth::{AuthSession, User};
pub use credential::Credential;

type RefreshOutcome = std::result::Result<Credential, RefreshFailure>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
struct SessionState {
    credential: Option<Credential>,
    pending: Option<PendingRefresh>,
    /// Bumped whenever login/logout replaces the credential, so a refresh
    /// that started before the change does not overwrite it.
    epoch: u64,
    refreshes_started: u64,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: Credential,
}

pub struct SessionClient<T = HttpTransport> {
    transport: Arc<T>,
    auth_endpoints: AuthEndpoints,
    state: Arc<Mutex<SessionState>>,
}

impl SessionClient<HttpTransport> {
    /// Session client talking HTTP to `config.base_url`.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let auth_endpoints = config.auth_endpoints.clone();
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(transport, auth_endpoints))
    }
}

impl<T: Transport + 'static> SessionClient<T> {
    pub fn new(transport: T, auth_endpoints: AuthEndpoints) -> Self {
        Self {
            transport: Arc::new(transport),
            auth_endpoints,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn auth_endpoints(&self) -> &AuthEndpoints {
        &self.auth_endpoints
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.state.lock().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().credential.is_some()
    }

    /// Number of refresh calls this client has started.
    pub fn refreshes_started(&self) -> u64 {
        self.state.lock().refreshes_started
    }

    /// Replace the credential after login/logout.
    fn replace_credential(&self, credential: Option<Credential>) {
        let mut state = self.state.lock();
        state.credential = credential;
        state.epoch += 1;
    }

    /// Issue `request`, refreshing the credential and retrying once on a 401.
    ///
    /// Errors other than an authorization failure are returned unchanged and
    /// never retried.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn request(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let sent = self.credential();
        let response = self.transport.send(request, sent.as_ref()).await?;
        if !response.is_unauthorized() {
            return response.error_for_status(&request.path);
        }

        if self.auth_endpoints.is_auth_endpoint(&request.path) {
            debug!("authorization failure from auth endpoint, not refreshing");
            return Err(unauthorized(request, &response));
        }

        let credential = self.credential_for_retry(sent.as_ref()).await?;

        debug!("retrying request with renewed credential");
        let response = self.transport.send(request, Some(&credential)).await?;
        if response.is_unauthorized() {
            warn!("request rejected again after credential renewal");
            return Err(unauthorized(request, &response));
        }
        response.error_for_status(&request.path)
    }

    /// Obtain a fresh credential, joining a refresh already in flight.
    pub async fn refresh(&self) -> Result<Credential> {
        let pending = {
            let mut state = self.state.lock();
            self.join_or_start_refresh(&mut state)
        };
        pending.await.map_err(ClientError::RefreshFailed)
    }

    /// Credential to retry with after `rejected` drew a 401.
    ///
    /// When another request already replaced the rejected credential, the new
    /// one is used directly instead of refreshing again.
    async fn credential_for_retry(&self, rejected: Option<&Credential>) -> Result<Credential> {
        let pending = {
            let mut state = self.state.lock();
            if state.pending.is_none() {
                if let Some(current) = state
                    .credential
                    .as_ref()
                    .filter(|current| Some(*current) != rejected)
                {
                    debug!("credential already renewed by a concurrent request");
                    return Ok(current.clone());
                }
            }
            self.join_or_start_refresh(&mut state)
        };
        pending.await.map_err(ClientError::RefreshFailed)
    }

    fn join_or_start_refresh(&self, state: &mut SessionState) -> PendingRefresh {
        if let Some(pending) = &state.pending {
            debug!("joining refresh already in flight");
            return pending.clone();
        }

        let transport = Arc::clone(&self.transport);
        let slot = Arc::clone(&self.state);
        let request = ApiRequest::post(self.auth_endpoints.refresh.clone());
        let epoch = state.epoch;

        let refresh = async move {
            let outcome = perform_refresh(transport.as_ref(), &request).await;

            let mut state = slot.lock();
            state.pending = None;
            if state.epoch == epoch {
                match &outcome {
                    Ok(credential) => {
                        info!("session refreshed");
                        state.credential = Some(credential.clone());
                    }
                    Err(failure) => {
                        warn!(status = ?failure.status, reason = %failure.reason, "session refresh failed, clearing credential");
                        state.credential = None;
                    }
                }
            } else {
                debug!("credential replaced during refresh, discarding refresh outcome");
            }
            outcome
        }
        .boxed()
        .shared();

        state.refreshes_started += 1;
        state.pending = Some(refresh.clone());
        info!(refreshes = state.refreshes_started, "starting session refresh");
        refresh
    }
}

async fn perform_refresh<T: Transport + ?Sized>(
    transport: &T,
    request: &ApiRequest,
) -> RefreshOutcome {
    let response = transport
        .send(request, None)
        .await
        .map_err(|e| RefreshFailure::new(None, e.to_string()))?;

    if !response.status.is_success() {
        return Err(RefreshFailure::new(Some(response.status), response.detail()));
    }

    response
        .decode::<RefreshResponse>(&request.path)
        .map(|body| body.access)
        .map_err(|e| RefreshFailure::new(Some(response.status), e.to_string()))
}

fn unauthorized(request: &ApiRequest, response: &ApiResponse) -> ClientError {
    ClientError::Unauthorized {
        path: request.path.clone(),
        detail: response.detail(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;
    use reqwest::StatusCode;

    use super::*;
    use crate::testing::{FakeBackend, PASSWORD};

    fn client(backend: FakeBackend) -> SessionClient<FakeBackend> {
        SessionClient::new(backend, AuthEndpoints::default())
    }

    async fn logged_in(backend: FakeBackend) -> SessionClient<FakeBackend> {
        let client = client(backend);
        client.login("ada@example.com", PASSWORD).await.unwrap();
        client
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_expired_requests_triggers_single_refresh() {
        let client = logged_in(FakeBackend::new().with_refresh_delay(Duration::from_millis(50))).await;
        client.transport().expire_access();

        let requests: Vec<_> = (0..16)
            .map(|i| ApiRequest::get(format!("/datasets/{i}/schema")))
            .collect();
        let results = join_all(requests.iter().map(|r| client.request(r))).await;

        assert_eq!(client.transport().refresh_calls(), 1);
        let renewed = client.credential().unwrap();
        for result in results {
            let body: serde_json::Value = result.unwrap().decode("/").unwrap();
            assert_eq!(body["token_seen"], renewed.as_str());
        }
        assert_eq!(client.refreshes_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_failure_reaches_every_waiter_and_clears_credential() {
        let backend = FakeBackend::new().with_refresh_delay(Duration::from_millis(20));
        let client = logged_in(backend).await;
        client.transport().expire_access();
        client.transport().revoke_session();

        let requests: Vec<_> = (0..4).map(|_| ApiRequest::get("/datasets")).collect();
        let results = join_all(requests.iter().map(|r| client.request(r))).await;

        assert_eq!(client.transport().refresh_calls(), 1);
        for result in results {
            let err = result.unwrap_err();
            assert!(err.is_authorization_failure());
            assert!(matches!(
                err,
                ClientError::RefreshFailed(RefreshFailure { status: Some(StatusCode::UNAUTHORIZED), .. })
            ));
        }
        assert!(client.credential().is_none());
    }

    #[tokio::test]
    async fn auth_endpoint_rejection_is_never_retried() {
        let client = client(FakeBackend::new());

        let err = client.login("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized { ref detail, .. } if detail == "Bad credentials"));
        assert_eq!(client.transport().refresh_calls(), 0);

        client.transport().revoke_session();
        let err = client
            .request(&ApiRequest::post("/auth/refresh"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized { .. }));
        // Only the call we made ourselves, no nested refresh.
        assert_eq!(client.transport().refresh_calls(), 1);
        assert_eq!(client.transport().calls_to("/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn rejection_after_retry_is_propagated() {
        let client = logged_in(FakeBackend::new()).await;

        let err = client
            .request(&ApiRequest::get("/always-unauthorized"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Unauthorized { ref path, .. } if path == "/always-unauthorized"));
        assert_eq!(client.transport().calls_to("/always-unauthorized"), 2);
        assert_eq!(client.transport().refresh_calls(), 1);
    }

    #[tokio::test]
    async fn other_failures_pass_through_untouched() {
        let client = logged_in(FakeBackend::new()).await;

        let err = client.request(&ApiRequest::get("/broken")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Status { status: StatusCode::INTERNAL_SERVER_ERROR, .. }
        ));
        assert_eq!(client.transport().calls_to("/broken"), 1);

        let err = client.request(&ApiRequest::get("/offline")).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(client.transport().calls_to("/offline"), 1);

        assert_eq!(client.transport().refresh_calls(), 0);
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn login_credential_is_attached_verbatim() {
        let client = logged_in(FakeBackend::new()).await;
        let credential = client.credential().unwrap();

        client.request(&ApiRequest::get("/datasets")).await.unwrap();

        assert_eq!(
            client.transport().last_credential_for("/datasets").as_deref(),
            Some(credential.as_str())
        );
    }

    #[tokio::test]
    async fn stale_rejection_reuses_already_renewed_credential() {
        let client = logged_in(FakeBackend::new()).await;
        let stale = client.credential().unwrap();
        client.state.lock().credential = Some(Credential::new("renewed-elsewhere"));

        let credential = client.credential_for_retry(Some(&stale)).await.unwrap();

        assert_eq!(credential.as_str(), "renewed-elsewhere");
        assert_eq!(client.transport().refresh_calls(), 0);
    }

    #[tokio::test]
    async fn request_without_credential_refreshes_from_session_cookie() {
        let backend = FakeBackend::new();
        backend.grant_session();
        let client = client(backend);

        let response = client.request(&ApiRequest::get("/datasets")).await.unwrap();

        assert!(response.status.is_success());
        assert_eq!(client.transport().refresh_calls(), 1);
        assert!(client.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_refresh_is_not_undone() {
        let client = logged_in(FakeBackend::new().with_refresh_delay(Duration::from_millis(50))).await;
        client.transport().expire_access();

        let request = ApiRequest::get("/datasets");
        let (result, logout) = tokio::join!(client.request(&request), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.logout().await
        });

        // The in-flight request still completes with the refreshed credential,
        // but the session stays logged out.
        assert!(result.is_ok());
        assert!(logout.is_ok());
        assert!(client.credential().is_none());
    }

    #[tokio::test]
    async fn explicit_refresh_stores_new_credential() {
        let client = logged_in(FakeBackend::new()).await;
        let before = client.credential().unwrap();

        let refreshed = client.refresh().await.unwrap();

        assert_ne!(refreshed, before);
        assert_eq!(client.credential(), Some(refreshed));
    }
}
