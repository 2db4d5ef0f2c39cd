use crate::auth::Credentials;
use crate::config::Settings;
use crate::ingest::error::{map_reqwest_error, FetchError};
use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// JSON client for the farm backend. Holds no credential; every call takes one.
#[derive(Debug, Clone)]
pub struct DairyApiClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl DairyApiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(
            &settings.api_base_url,
            settings.api_timeout,
            settings.api_retries,
        )
    }

    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retries: retries.max(1),
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Base delay before the first retry; doubled on every further attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Public URL of an uploaded animal photo.
    pub fn image_url(&self, image: &str) -> String {
        format!("{}/images/{}", self.base_url, image.trim_start_matches('/'))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credentials: Option<&Credentials>,
    ) -> RequestBuilder {
        let req = self.http.request(method, self.url(path));
        match credentials {
            Some(c) => req.header(AUTHORIZATION, c.authorization()),
            None => req,
        }
    }

    /// GET with retries on transient failures.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        credentials: Option<&Credentials>,
    ) -> Result<T, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let res = self.get_once(path, credentials).await;
            match res {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= self.retries || !err.should_retry() {
                        return Err(err);
                    }
                    let backoff = self.backoff * (1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        path,
                        kind = err.kind(),
                        error = %err,
                        "backend fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        credentials: Option<&Credentials>,
    ) -> Result<T, FetchError> {
        let res = self
            .request(Method::GET, path, credentials)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_response(res).await
    }

    /// Single attempt; mutations are never retried.
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        credentials: Option<&Credentials>,
        body: Option<&B>,
    ) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self.request(method.clone(), path, credentials);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req.send().await.map_err(map_reqwest_error)?;
        tracing::debug!(%method, path, status = %res.status(), "backend mutation");
        read_response(res).await
    }

    pub async fn send_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        credentials: &Credentials,
        form: reqwest::multipart::Form,
    ) -> Result<T, FetchError> {
        let res = self
            .request(Method::POST, path, Some(credentials))
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_response(res).await
    }
}

async fn read_response<T: DeserializeOwned>(res: Response) -> Result<T, FetchError> {
    let status = res.status();
    let text = res.text().await.map_err(map_reqwest_error)?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::Auth);
    }

    let body = if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(&text)
    };

    if !status.is_success() {
        let message = body
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
        return Err(FetchError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let body = body.map_err(|e| FetchError::Malformed(format!("response is not JSON: {e}")))?;
    serde_json::from_value::<T>(body).map_err(|e| FetchError::Malformed(e.to_string()))
}
