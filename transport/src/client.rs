//! The transport service.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheTicket, ResponseCache, derived_prefixes};
use crate::config::TransportConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{ApiError, Result};
use crate::request::ApiRequest;
use crate::response::{ApiResponse, server_message};
use crate::single_flight::SingleFlight;

/// Key of the process-wide refresh slot.
const REFRESH_KEY: &str = "refresh";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Authenticated, cached and deduplicated access to the backend.
///
/// Cloning is cheap and clones share the cache, the in-flight table and the
/// refresh slot.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    config: TransportConfig,
    http: reqwest::Client,
    cache: ResponseCache,
    inflight: SingleFlight<ApiResponse>,
    refresh: SingleFlight<Credentials>,
    credentials: Arc<dyn CredentialStore>,
}

impl Transport {
    /// Create a transport with a default HTTP client.
    pub fn new(config: TransportConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_client(config, credentials, reqwest::Client::new())
    }

    /// Create a transport around an existing HTTP client.
    pub fn with_client(
        config: TransportConfig,
        credentials: Arc<dyn CredentialStore>,
        http: reqwest::Client,
    ) -> Self {
        let cache = ResponseCache::new(config.cache_ttl(), config.cache_max_entries);
        Self {
            inner: Arc::new(Inner {
                config,
                http,
                cache,
                inflight: SingleFlight::new(),
                refresh: SingleFlight::new(),
                credentials,
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credentials
    }

    /// Perform a call.
    ///
    /// Reads are served from the cache while fresh unless the request is
    /// marked [`ApiRequest::fresh`]. Identical concurrent calls share one
    /// network round-trip; a read only joins another read dispatched in the
    /// same cache generation, so nothing issued after an invalidation sees a
    /// response started before it. A successful mutation invalidates its
    /// path, its parent collection and any extra prefixes the request names.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let target = request.target();
        if request.is_read() && !request.is_fresh() {
            if let Some(hit) = self.inner.cache.get(&target).await {
                debug!("Cache hit: {target}");
                return Ok(hit);
            }
            debug!("Cache miss: {target}");
        }

        let token = self
            .inner
            .credentials
            .load()
            .await?
            .map(|credentials| credentials.access_token);
        let ticket = self.inner.cache.ticket().await;
        let mut key = request.dedupe_key(token.as_deref());
        if request.is_read() {
            key = format!("{key}\n@{}", ticket.generation());
        }

        let inner = Arc::clone(&self.inner);
        self.inner
            .inflight
            .run(&key, move || async move { inner.perform(request, ticket).await })
            .await
    }

    /// Perform a call and decode its JSON body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Drop cached reads under `prefixes`.
    pub async fn invalidate<S: AsRef<str>>(&self, prefixes: &[S]) -> usize {
        self.inner.cache.invalidate(prefixes).await
    }
}

impl Inner {
    async fn perform(self: &Arc<Self>, request: ApiRequest, ticket: CacheTicket) -> Result<ApiResponse> {
        let target = request.target();

        let response = self.dispatch_authorized(&request).await?;
        if !response.is_success() {
            let status = response.status();
            let message = server_message(status, response.body());
            debug!("{} {target} failed with {status}: {message}", request.method());
            return Err(ApiError::Server { status, message });
        }

        if request.is_read() {
            self.cache.put(&target, response.clone(), ticket).await;
        } else {
            let mut prefixes = derived_prefixes(request.path());
            prefixes.extend(request.invalidations().iter().cloned());
            self.cache.invalidate(&prefixes).await;
            info!("{} {target} succeeded", request.method());
        }
        Ok(response)
    }

    /// Dispatch with the current access token, renewing it once on a 401.
    async fn dispatch_authorized(self: &Arc<Self>, request: &ApiRequest) -> Result<ApiResponse> {
        let token = self
            .credentials
            .load()
            .await?
            .map(|credentials| credentials.access_token);

        let response = execute(&self.http, &self.config, request, token.as_deref()).await?;
        if response.status() != 401 || self.config.is_auth_exempt(request.path()) {
            return Ok(response);
        }

        debug!("Unauthorized on {}, renewing credentials", request.path());
        let renewed = self.refresh_credentials(token.as_deref()).await?;
        execute(
            &self.http,
            &self.config,
            request,
            Some(renewed.access_token.as_str()),
        )
        .await
    }

    /// Credentials to retry with after a 401 seen with `stale`.
    async fn refresh_credentials(self: &Arc<Self>, stale: Option<&str>) -> Result<Credentials> {
        let Some(current) = self.credentials.load().await? else {
            return Err(ApiError::AuthExpired);
        };
        if stale != Some(current.access_token.as_str()) {
            debug!("Credentials were renewed while the call was in flight");
            return Ok(current);
        }

        let inner = Arc::clone(self);
        self.refresh
            .run(REFRESH_KEY, move || async move {
                inner.exchange_refresh_token(current).await
            })
            .await
    }

    async fn exchange_refresh_token(&self, current: Credentials) -> Result<Credentials> {
        info!("Refreshing credentials");
        let request = ApiRequest::post(self.config.refresh_path.clone()).with_json(&RefreshRequest {
            refresh_token: &current.refresh_token,
        })?;

        let outcome = match execute(&self.http, &self.config, &request, None).await {
            Ok(response) if response.is_success() => response
                .json::<RefreshResponse>()
                .map(|renewed| Credentials {
                    access_token: renewed.access_token,
                    refresh_token: renewed.refresh_token.unwrap_or(current.refresh_token),
                }),
            Ok(response) => Err(match response.status() {
                401 | 403 => ApiError::AuthExpired,
                status => ApiError::Server {
                    status,
                    message: server_message(status, response.body()),
                },
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(renewed) => {
                self.credentials.save(&renewed).await?;
                info!("Credentials refreshed");
                Ok(renewed)
            }
            Err(e) => {
                warn!("Credential refresh failed: {e}");
                if let Err(clear_err) = self.credentials.clear().await {
                    warn!("Failed to clear credentials: {clear_err}");
                }
                Err(e)
            }
        }
    }
}

/// One HTTP round-trip.
async fn execute(
    http: &reqwest::Client,
    config: &TransportConfig,
    request: &ApiRequest,
    token: Option<&str>,
) -> Result<ApiResponse> {
    let target = request.target();
    let mut builder = http.request(request.method().clone(), config.endpoint(&target));
    if let Some(token) = token {
        builder = builder.bearer_auth(token);
    }
    if let Some(body) = request.body() {
        builder = builder.json(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    debug!("{} {target} -> {status}", request.method());
    Ok(ApiResponse::new(status, body))
}
