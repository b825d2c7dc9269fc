use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::{debug, trace};

use super::{ApiRequest, ApiResponse, FormValue, RequestBody, Transport};
use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::proxy::build_proxy;
use crate::session::Credential;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// [`Transport`] backed by a `reqwest::Client`.
///
/// The client keeps a cookie store: the backend's refresh endpoint reads the
/// long-lived session reference from a cookie set at login.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(config.headers.clone())
            .connect_timeout(config.connect_timeout);

        if config.timeout > Duration::ZERO {
            builder = builder.timeout(config.timeout);
        }

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(build_proxy(proxy)?);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_form(parts: &[super::FormPart]) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match &part.value {
                FormValue::Text(text) => form.text(part.name.clone(), text.clone()),
                FormValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime)?;
                    }
                    form.part(part.name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<ApiResponse, TransportError> {
        let url = self
            .config
            .endpoint_url(&request.path)
            .map_err(|e| TransportError::InvalidUrl {
                path: request.path.clone(),
                reason: e.to_string(),
            })?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, HeaderValue::from_static(request.response.accept_header()));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(credential) = credential {
            let value = HeaderValue::from_str(&credential.bearer())
                .map_err(|_| TransportError::InvalidHeader {
                    name: "authorization",
                })?;
            builder = builder.header(reqwest::header::AUTHORIZATION, value);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(parts) => builder.multipart(Self::build_form(parts)?),
        };

        trace!(method = %request.method, path = %request.path, "sending request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(ApiResponse::new(status, body))
    }
}
