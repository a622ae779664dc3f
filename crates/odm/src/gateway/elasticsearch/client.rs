//! Client construction and the retrying request loop.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use elasticsearch::Elasticsearch;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{
    CloudConnectionPool, ConnectionPool, SingleNodeConnectionPool, Transport, TransportBuilder,
};
use elasticsearch::params::Refresh;
use serde_json::Value;

use crate::config::{ConnectionConfig, ElasticsearchAuth, OdmConfig, RefreshPolicy};
use crate::error::{GatewayError, GatewayResult, is_retryable_status};

const GATEWAY_NAME: &str = "elasticsearch";

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_retries: u32,
    pub(crate) backoff_ms: u64,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            max_retries: if config.retry_on_failure {
                config.max_retries
            } else {
                0
            },
            backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Delay before retry number `attempt` (0-based): `backoff * 2^attempt`.
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// [`DocumentGateway`](crate::gateway::DocumentGateway) backed by the
/// official Elasticsearch client.
pub struct ElasticsearchGateway {
    client: Elasticsearch,
    retry: RetryPolicy,
    refresh_policy: RefreshPolicy,
    slow_query_threshold_ms: u64,
}

impl Debug for ElasticsearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchGateway")
            .field("retry", &self.retry)
            .field("refresh_policy", &self.refresh_policy)
            .field("slow_query_threshold_ms", &self.slow_query_threshold_ms)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchGateway {
    /// Connects using the connection, refresh and logging settings of `config`.
    ///
    /// With a `cloud_id` the cloud connection pool is used; otherwise the
    /// first entry of `hosts`.
    pub fn new(config: &OdmConfig) -> GatewayResult<Self> {
        let transport = build_transport(&config.connection)?;
        Ok(Self {
            client: Elasticsearch::new(transport),
            retry: RetryPolicy::from_config(&config.connection),
            refresh_policy: config.refresh_policy,
            slow_query_threshold_ms: config.logging.slow_query_threshold_ms,
        })
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Elasticsearch {
        &self.client
    }

    pub(super) fn refresh_param(&self) -> Refresh {
        match self.refresh_policy {
            RefreshPolicy::True => Refresh::True,
            RefreshPolicy::WaitFor => Refresh::WaitFor,
            RefreshPolicy::False => Refresh::False,
        }
    }

    pub(super) fn refreshes(&self) -> bool {
        self.refresh_policy != RefreshPolicy::False
    }

    pub(super) fn slow_query_threshold_ms(&self) -> u64 {
        self.slow_query_threshold_ms
    }

    /// Sends a request, retrying transport errors and throttling/unavailable
    /// statuses with exponential backoff.
    ///
    /// Non-retryable statuses are returned as-is for the caller to interpret.
    pub(super) async fn send_with_retry<F, Fut>(
        &self,
        operation: &str,
        request: F,
    ) -> GatewayResult<Response>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response, elasticsearch::Error>>,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(response) => {
                    let status = response.status_code().as_u16();
                    if is_retryable_status(status) && attempt < self.retry.max_retries {
                        tracing::warn!(
                            "{} returned status {}, retrying (attempt {} of {})",
                            operation,
                            status,
                            attempt + 1,
                            self.retry.max_retries
                        );
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) => {
                    if attempt >= self.retry.max_retries {
                        tracing::error!("{} failed: {}", operation, e);
                        return Err(GatewayError::Transport {
                            operation: operation.to_string(),
                            message: e.to_string(),
                        });
                    }
                    tracing::warn!(
                        "{} failed, retrying (attempt {} of {}): {}",
                        operation,
                        attempt + 1,
                        self.retry.max_retries,
                        e
                    );
                }
            }
            tokio::time::sleep(self.retry.delay(attempt)).await;
            attempt += 1;
        }
    }
}

/// Reads a successful response body as JSON, or turns the status into an error.
pub(super) async fn json_body(operation: &str, response: Response) -> GatewayResult<Value> {
    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| GatewayError::Serialization {
            message: format!("failed to read {} response: {}", operation, e),
        })
}

fn build_transport(config: &ConnectionConfig) -> GatewayResult<Transport> {
    match config.cloud_id {
        Some(ref cloud_id) => {
            let pool = CloudConnectionPool::new(cloud_id)
                .map_err(|e| connection_failed(format!("Invalid cloud id: {}", e)))?;
            configure(pool, config)
        }
        None => {
            let url = config
                .hosts
                .first()
                .cloned()
                .unwrap_or_else(|| "http://localhost:9200".to_string());
            let parsed_url: elasticsearch::http::Url = url
                .parse()
                .map_err(|e| connection_failed(format!("Invalid URL '{}': {}", url, e)))?;
            if config.hosts.len() > 1 {
                tracing::debug!(
                    "Using the first of {} configured hosts: {}",
                    config.hosts.len(),
                    url
                );
            }
            configure(SingleNodeConnectionPool::new(parsed_url), config)
        }
    }
}

fn configure<P>(pool: P, config: &ConnectionConfig) -> GatewayResult<Transport>
where
    P: ConnectionPool + Debug + Clone + Send + 'static,
{
    let mut builder =
        TransportBuilder::new(pool).timeout(Duration::from_millis(config.request_timeout_ms));

    if config.disable_certificate_validation {
        builder = builder.cert_validation(CertificateValidation::None);
    }

    if let Some(ref auth) = config.auth {
        builder = match auth {
            ElasticsearchAuth::Basic { username, password } => {
                builder.auth(Credentials::Basic(username.clone(), password.clone()))
            }
            ElasticsearchAuth::ApiKey { encoded } => {
                builder.auth(Credentials::EncodedApiKey(encoded.clone()))
            }
            ElasticsearchAuth::Bearer { token } => builder.auth(Credentials::Bearer(token.clone())),
        };
    }

    builder
        .build()
        .map_err(|e| connection_failed(format!("Failed to build transport: {}", e)))
}

fn connection_failed(message: String) -> GatewayError {
    GatewayError::ConnectionFailed {
        gateway: GATEWAY_NAME.to_string(),
        message,
    }
}
