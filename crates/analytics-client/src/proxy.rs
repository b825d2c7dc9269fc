use reqwest::Proxy;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Proxy configuration types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy, or any scheme reqwest understands.
    #[default]
    All,
}

/// Proxy authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    #[serde(default)]
    pub proxy_type: ProxyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ProxyAuth>,
}

/// Build a reqwest Proxy from the proxy configuration
pub fn build_proxy(config: &ProxyConfig) -> Result<Proxy, ClientError> {
    let url = config.url.as_str();
    let proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(url),
        ProxyType::Https => Proxy::https(url),
        ProxyType::All => Proxy::all(url),
    }
    .map_err(|e| ClientError::configuration(format!("invalid proxy URL `{url}`: {e}")))?;

    Ok(match &config.auth {
        Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
        None => proxy,
    })
}
