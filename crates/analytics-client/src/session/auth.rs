//! Session lifecycle: the only operations that set or clear the credential
//! outside of a refresh.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{Credential, SessionClient};
use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_owned()
}

/// Body returned by login and signup.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access: Credential,
    pub user: User,
}

impl<T: Transport + 'static> SessionClient<T> {
    /// Create an account and start a session for it.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str) -> Result<User> {
        let path = self.auth_endpoints.signup.clone();
        self.authenticate(path, email, password).await
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let path = self.auth_endpoints.login.clone();
        self.authenticate(path, email, password).await
    }

    async fn authenticate(&self, path: String, email: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post(path).json(json!({ "email": email, "password": password }));
        let session: AuthSession = self.request(&request).await?.decode(&request.path)?;
        self.replace_credential(Some(session.access));
        info!(user_id = session.user.id, "session started");
        Ok(session.user)
    }

    /// End the session. The local credential is cleared even if the backend
    /// call fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let request = ApiRequest::post(self.auth_endpoints.logout.clone());
        let result = self.request(&request).await;
        self.replace_credential(None);
        match result {
            Ok(_) => {
                info!("session ended");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "logout request failed, local session cleared anyway");
                Err(e)
            }
        }
    }

    /// The user the current credential belongs to.
    pub async fn me(&self) -> Result<User> {
        let request = ApiRequest::get(self.auth_endpoints.me.clone());
        self.request(&request).await?.decode(&request.path)
    }

    /// Resume a session from the backend's long-lived session reference.
    ///
    /// Refreshes the credential and fetches the current user; on any failure
    /// the client is left logged out.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<User> {
        let restored = async {
            self.refresh().await?;
            self.me().await
        }
        .await;

        match restored {
            Ok(user) => {
                info!(user_id = user.id, "session restored");
                Ok(user)
            }
            Err(e) => {
                info!(error = %e, "no session to restore");
                self.replace_credential(None);
                Err(e)
            }
        }
    }
}
