//! HTTP client wrapper for the dashboard API.
//!
//! A single [`ApiClient`] holds the base URL, timeout and cookie store used by
//! every call. Failures come back as [`RawFailure`]s, and each one passes
//! through the registered [`SessionExpiryInterceptor`] before the caller sees it.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{classify, FailurePayload, RawFailure};
use crate::retry::{Retrier, RetryPolicy, Sleeper};
use crate::session::SessionExpiryInterceptor;

/// Errors raised while building an [`ApiClient`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The base URL could not be parsed.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// An interceptor was registered twice.
    #[error("a session-expiry interceptor is already registered")]
    InterceptorAlreadyRegistered,

    /// The underlying HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
}

/// Builder for [`ApiClient`].
#[derive(Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    interceptor: Option<Arc<SessionExpiryInterceptor>>,
}

impl ApiClientBuilder {
    /// Sets the per-call time budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Registers the session-expiry interceptor. Only one may be registered.
    pub fn interceptor(
        mut self,
        interceptor: Arc<SessionExpiryInterceptor>,
    ) -> Result<Self, ClientBuildError> {
        if self.interceptor.is_some() {
            return Err(ClientBuildError::InterceptorAlreadyRegistered);
        }
        self.interceptor = Some(interceptor);
        Ok(self)
    }

    pub fn build(self) -> Result<ApiClient, ClientBuildError> {
        let base_url = Url::parse(&self.base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::InvalidBaseUrl {
                url: self.base_url,
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(ApiClient {
            http: builder.build()?,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            interceptor: self.interceptor,
        })
    }
}

/// The shared client every view uses to talk to the API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    interceptor: Option<Arc<SessionExpiryInterceptor>>,
}

impl ApiClient {
    /// Starts building a client for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: None,
            interceptor: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn interceptor(&self) -> Option<&Arc<SessionExpiryInterceptor>> {
        self.interceptor.as_ref()
    }

    /// The absolute URL for an API path.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, RawFailure> {
        self.send(Method::GET, path, self.http.get(self.url_for(path)))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, RawFailure> {
        self.send(Method::DELETE, path, self.http.delete(self.url_for(path)))
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, RawFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url_for(path)).json(body);
        self.send(Method::POST, path, request).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, RawFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.put(self.url_for(path)).json(body);
        self.send(Method::PUT, path, request).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, RawFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.patch(self.url_for(path)).json(body);
        self.send(Method::PATCH, path, request).await
    }

    /// GET through a [`Retrier`]. Reads are idempotent, so this is always safe.
    pub async fn get_with_retry<T, S>(
        &self,
        path: &str,
        retrier: &Retrier<S>,
    ) -> Result<ApiResponse<T>, RawFailure>
    where
        T: DeserializeOwned,
        S: Sleeper,
    {
        retrier.run(|| self.get(path)).await
    }

    /// GET under `policy` using the tokio timer.
    pub async fn get_retrying<T: DeserializeOwned>(
        &self,
        path: &str,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse<T>, RawFailure> {
        self.get_with_retry(path, &Retrier::new(policy.clone()))
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, RawFailure> {
        debug!(%method, path, "sending request");
        let result = execute(request).await;

        if let Err(failure) = &result {
            warn!(%method, path, kind = %classify(failure), error = %failure, "request failed");
            if let Some(interceptor) = &self.interceptor {
                interceptor.on_failure(failure);
            }
        }
        result
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<ApiResponse<T>, RawFailure> {
    let response = request.send().await.map_err(failure_from_reqwest)?;
    let status = response.status();

    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(RawFailure::Response {
            status: status.as_u16(),
            payload: FailurePayload::from_body(&body),
        });
    }

    let body = response.bytes().await.map_err(failure_from_reqwest)?;
    let body: &[u8] = if body.is_empty() { b"null" } else { &body[..] };
    let data = serde_json::from_slice(body)
        .map_err(|e| RawFailure::other(format!("failed to decode response body: {}", e)))?;

    Ok(ApiResponse {
        data,
        status: status.as_u16(),
    })
}

/// Maps a transport-level reqwest error onto a [`RawFailure`].
pub fn failure_from_reqwest(err: reqwest::Error) -> RawFailure {
    if err.is_timeout() {
        RawFailure::timed_out(err.to_string())
    } else if let Some(status) = err.status() {
        RawFailure::status(status.as_u16())
    } else if err.is_redirect() || err.is_builder() || err.is_decode() {
        RawFailure::other(err.to_string())
    } else {
        RawFailure::unreachable(err.to_string())
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, NoResponseReason};
    use crate::session::{MemoryNavigator, MemorySessionStore, RedirectPolicy};

    fn interceptor() -> Arc<SessionExpiryInterceptor> {
        Arc::new(SessionExpiryInterceptor::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryNavigator::at("/")),
            RedirectPolicy::default(),
        ))
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/api", "tutors"), "http://h/api/tutors");
        assert_eq!(join_url("http://h/api/", "/tutors"), "http://h/api/tutors");
        assert_eq!(join_url("http://h/api", "/"), "http://h/api");
        assert_eq!(
            join_url("http://h/api", "courses/3?expand=tutor"),
            "http://h/api/courses/3?expand=tutor"
        );
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        let err = ApiClient::builder("not a url").build().unwrap_err();
        assert!(matches!(err, ClientBuildError::InvalidBaseUrl { .. }));

        let err = ApiClient::builder("mailto:admin@example.com").build().unwrap_err();
        assert!(matches!(err, ClientBuildError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_builder_accepts_interceptor_once() {
        let builder = ApiClient::builder("http://localhost:5000/api")
            .interceptor(interceptor())
            .unwrap();
        let err = builder.interceptor(interceptor()).unwrap_err();
        assert!(matches!(err, ClientBuildError::InterceptorAlreadyRegistered));
    }

    #[test]
    fn test_client_url_for() {
        let client = ApiClient::builder("http://localhost:5000/api/")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url_for("/students"), "http://localhost:5000/api/students");
        assert!(client.interceptor().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        // Port 9 (discard) on localhost is closed on test machines.
        let client = ApiClient::builder("http://127.0.0.1:9/api")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let failure = client
            .get::<serde_json::Value>("/tutors")
            .await
            .unwrap_err();
        assert!(matches!(
            failure,
            RawFailure::NoResponse {
                reason: NoResponseReason::Unreachable,
                ..
            }
        ));
        assert_eq!(classify(&failure), ErrorKind::Network);
    }
}
