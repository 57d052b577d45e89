use std::sync::RwLock;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::persist::Storage;

/// Storage slot the access token is kept in.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// A decoded backend response. `data` is `Null` for empty bodies.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub data: serde_json::Value,
}

impl ApiResponse {
    /// Decode `data` into `T`. `path` is only used in the error.
    pub fn json<T: DeserializeOwned>(self, path: &str) -> Result<T, ApiError> {
        serde_json::from_value(self.data).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// Shared HTTP client for the REST backend.
///
/// Paths are resolved against the configured base URL and every request
/// carries the current bearer token, if any. There is no retry and no
/// caching; non-2xx responses come back as `ApiError::Status`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                path: config.base_url.clone(),
                source,
            })?;
        let client = Self::with_http_client(&config.base_url, http)?;
        if let Some(token) = &config.token {
            client.set_token(token.clone());
        }
        Ok(client)
    }

    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a base-relative path. Absolute URLs pass through untouched.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(token.into());
    }

    pub fn clear_token(&self) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Load the access token from `storage`. Accepts both a raw token and a
    /// JSON-encoded string. Returns whether a token was found.
    pub fn load_token(&self, storage: &dyn Storage) -> bool {
        match storage.get_item(ACCESS_TOKEN_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => {
                let token = serde_json::from_str::<String>(&raw).unwrap_or(raw);
                self.set_token(token);
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored access token");
                false
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None::<&()>).await?.json(path)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await?.json(path)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(body)).await?.json(path)
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, path, None::<&()>).await
    }

    /// Send one request and decode the body as JSON.
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!(%method, %url, "Backend request");

        let mut builder = self
            .http
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = self.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let transport = |source| ApiError::Transport {
            path: path.to_string(),
            source,
        };
        let resp = builder.send().await.map_err(transport)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport)?;

        if !status.is_success() {
            let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            });
            debug!(status = status.as_u16(), %url, "Backend rejected request");
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            });
        }

        let data = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })?
        };
        Ok(ApiResponse { status, data })
    }
}
