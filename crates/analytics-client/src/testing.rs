//! In-memory backend used by the unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::session::Credential;
use crate::transport::{ApiRequest, ApiResponse, RequestBody, Transport};

pub(crate) const PASSWORD: &str = "Correct-h0rse";

#[derive(Default)]
struct BackendState {
    /// Access token the backend currently accepts.
    valid_access: Option<String>,
    /// Whether the refresh cookie is still honoured.
    session_active: bool,
    issued: u32,
    email: String,
    refresh_calls: u32,
    fail_logout: bool,
    calls: Vec<(Method, String, Option<String>)>,
    /// Scripted job states per run id.
    runs: HashMap<String, Vec<Value>>,
    /// Run handed out by the next submission.
    next_run: Option<String>,
    /// Canned authorized responses keyed by method and path.
    stubs: HashMap<(Method, String), (StatusCode, Value)>,
    requests: Vec<ApiRequest>,
}

/// Fake analytics backend speaking the same protocol as the real one.
pub(crate) struct FakeBackend {
    state: Mutex<BackendState>,
    refresh_delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                email: "ada@example.com".to_owned(),
                ..BackendState::default()
            }),
            refresh_delay: Duration::ZERO,
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Access token expires server-side; the refresh cookie stays valid.
    pub fn expire_access(&self) {
        self.state.lock().valid_access = Some("rotated-by-server".to_owned());
    }

    pub fn revoke_session(&self) {
        self.state.lock().session_active = false;
    }

    /// Pretend a refresh cookie from an earlier login is present.
    pub fn grant_session(&self) {
        self.state.lock().session_active = true;
    }

    pub fn fail_logout(&self) {
        self.state.lock().fail_logout = true;
    }

    /// Script the states `GET /analytics/runs/{id}` returns, in order.
    /// The submission response is the first entry.
    pub fn script_run(&self, id: &str, states: Vec<Value>) {
        let mut state = self.state.lock();
        state.runs.insert(id.to_owned(), states);
        state.next_run = Some(id.to_owned());
    }

    /// Answer authorized `method path` calls with `status` and `body`.
    pub fn stub(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.state
            .lock()
            .stubs
            .insert((method, path.to_owned()), (status, body));
    }

    pub fn last_request_for(&self, path: &str) -> Option<ApiRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.lock().refresh_calls
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(_, p, _)| p == path)
            .count()
    }

    pub fn last_credential_for(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find(|(_, p, _)| p == path)
            .and_then(|(_, _, credential)| credential.clone())
    }

    fn issue(state: &mut BackendState) -> String {
        state.issued += 1;
        let token = format!("access-{}", state.issued);
        state.valid_access = Some(token.clone());
        state.session_active = true;
        token
    }

    fn user(state: &BackendState) -> Value {
        json!({ "id": 7, "email": state.email, "role": "user" })
    }

    fn respond(&self, request: &ApiRequest, credential: Option<&Credential>) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock();
        state.calls.push((
            request.method.clone(),
            request.path.clone(),
            credential.map(|c| c.as_str().to_owned()),
        ));
        state.requests.push(request.clone());

        let authorized = credential.is_some_and(|c| state.valid_access.as_deref() == Some(c.as_str()));
        let unauthorized = |detail: &str| -> Result<ApiResponse, TransportError> {
            Ok(ApiResponse::json_value(StatusCode::UNAUTHORIZED, &json!({ "detail": detail })))
        };

        match (request.method.clone(), request.path.as_str()) {
            (Method::POST, "/auth/login") | (Method::POST, "/auth/signup") => {
                let body = match &request.body {
                    RequestBody::Json(body) => body.clone(),
                    _ => Value::Null,
                };
                if body["password"] != PASSWORD {
                    return unauthorized("Bad credentials");
                }
                if let Some(email) = body["email"].as_str() {
                    state.email = email.to_owned();
                }
                let access = Self::issue(&mut state);
                Ok(ApiResponse::json_value(
                    StatusCode::OK,
                    &json!({ "access": access, "user": Self::user(&state) }),
                ))
            }
            (Method::POST, "/auth/refresh") => {
                state.refresh_calls += 1;
                if !state.session_active {
                    return unauthorized("Invalid/expired refresh");
                }
                let access = Self::issue(&mut state);
                Ok(ApiResponse::json_value(StatusCode::OK, &json!({ "access": access })))
            }
            (Method::POST, "/auth/logout") => {
                state.session_active = false;
                if state.fail_logout {
                    return Ok(ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "db down"));
                }
                Ok(ApiResponse::json_value(StatusCode::OK, &json!({ "ok": true })))
            }
            (_, "/offline") => Err(TransportError::other("connection refused")),
            (_, "/broken") => Ok(ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom")),
            (_, "/always-unauthorized") => unauthorized("Token expired"),
            _ if !authorized => unauthorized("Not authenticated"),
            (Method::GET, "/auth/me") => Ok(ApiResponse::json_value(StatusCode::OK, &Self::user(&state))),
            (method, path) if state.stubs.contains_key(&(method.clone(), path.to_owned())) => {
                let (status, body) = &state.stubs[&(method, path.to_owned())];
                if *status == StatusCode::NO_CONTENT {
                    return Ok(ApiResponse::new(*status, bytes::Bytes::new()));
                }
                Ok(ApiResponse::json_value(*status, body))
            }
            (Method::POST, path) if path.ends_with("/analytics/run") => {
                let id = state.next_run.take().unwrap_or_default();
                let first = state
                    .runs
                    .get_mut(&id)
                    .filter(|states| !states.is_empty())
                    .map(|states| states.remove(0));
                match first {
                    Some(job) => Ok(ApiResponse::json_value(StatusCode::OK, &job)),
                    None => Ok(ApiResponse::json_value(
                        StatusCode::BAD_REQUEST,
                        &json!({ "detail": "Unknown recipe_key" }),
                    )),
                }
            }
            (Method::GET, path) if path.starts_with("/analytics/runs/") => {
                let id = path.trim_start_matches("/analytics/runs/");
                let next = state.runs.get_mut(id).and_then(|states| {
                    if states.len() > 1 {
                        Some(states.remove(0))
                    } else {
                        states.first().cloned()
                    }
                });
                match next {
                    Some(job) => Ok(ApiResponse::json_value(StatusCode::OK, &job)),
                    None => Ok(ApiResponse::json_value(
                        StatusCode::NOT_FOUND,
                        &json!({ "detail": "Run not found" }),
                    )),
                }
            }
            (_, path) => Ok(ApiResponse::json_value(
                StatusCode::OK,
                &json!({ "path": path, "token_seen": credential.map(Credential::as_str) }),
            )),
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<ApiResponse, TransportError> {
        let response = self.respond(request, credential);
        if request.path == "/auth/refresh" && !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        response
    }
}
