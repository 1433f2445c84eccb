//! Search orchestration.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::result::{normalize, RawMeta, PROVIDER};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::trace::trace_id;
use crate::transport::{HttpTransport, Transport};
use crate::upstream::{UpstreamPage, UpstreamQuery};
use crate::{GatewayError, Result, SearchRequest, SearchResult, Settings};

/// Forwards search requests to Google Custom Search.
///
/// One gateway is built per process and shared behind an `Arc`. It owns the
/// pooled upstream transport; call [`Gateway::shutdown`] on the way out.
pub struct Gateway {
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

/// Successful upstream exchange.
struct Fetched {
    data: Value,
    attempts: u32,
}

impl Gateway {
    /// Creates a gateway with a pooled HTTP transport.
    pub fn new(settings: Settings) -> Result<Self> {
        let transport = HttpTransport::new(&settings.timeouts)?;
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    /// Creates a gateway over a custom transport.
    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings: Arc::new(settings),
            transport,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the delay function used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the process settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one search.
    ///
    /// Input errors are returned before any network activity. Transient
    /// upstream failures are retried according to the retry policy.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        let query = UpstreamQuery::build(&request, &self.settings.cx)?;
        let trace = trace_id(query.query_text());

        let start = Instant::now();
        let outcome = self.fetch(&query).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let fetched = match outcome {
            Ok(fetched) => fetched,
            Err(err) => {
                self.log_failure(&query, &trace, latency_ms, &err);
                return Err(err);
            }
        };

        let page = UpstreamPage::from_value(&fetched.data);
        let items = normalize(&page.items, self.settings.allowlist.as_ref());

        if self.settings.log.queries {
            self.log_success(&query, &trace, latency_ms, items.len(), fetched.attempts);
        }

        Ok(SearchResult {
            provider: PROVIDER.to_string(),
            echoed_query: query.echo(),
            search_info: page.search_info,
            next_page_start_index: page.next_page,
            latency_ms,
            items,
            trace_id: trace,
            raw: RawMeta { kind: page.kind },
        })
    }

    /// Releases the upstream connection pool.
    pub async fn shutdown(&self) {
        self.transport.close().await;
        debug!("gateway shut down");
    }

    async fn fetch(&self, query: &UpstreamQuery) -> Result<Fetched> {
        let url = query.endpoint().url();
        let params = query.wire_params(&self.settings.api_key);
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            debug!(attempt, endpoint = url, "upstream request");

            let (failure, retry_after) = match self.transport.get(url, &params).await {
                Ok(response) if response.is_success() => {
                    let data = serde_json::from_str(&response.body)
                        .map_err(|_| GatewayError::upstream(response.status, &response.body))?;
                    return Ok(Fetched {
                        data,
                        attempts: attempt + 1,
                    });
                }
                Ok(response) if !RetryPolicy::is_retryable(response.status) => {
                    return Err(GatewayError::upstream(response.status, &response.body));
                }
                Ok(response) => (
                    GatewayError::upstream(response.status, &response.body),
                    response.retry_after,
                ),
                Err(err) if err.is_closed() => {
                    return Err(GatewayError::Network(err.to_string()));
                }
                Err(err) => (GatewayError::Network(err.to_string()), None),
            };

            if attempt + 1 >= max_attempts {
                return Err(failure);
            }

            let delay = self.policy.delay(attempt, retry_after.as_deref());
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "upstream call failed, retrying"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    fn log_success(
        &self,
        query: &UpstreamQuery,
        trace: &str,
        latency_ms: u64,
        results: usize,
        attempts: u32,
    ) {
        if self.settings.log.query_text {
            info!(
                q_hash = %trace,
                q = %query.query_text(),
                latency_ms,
                results,
                attempts,
                "search"
            );
        } else {
            info!(q_hash = %trace, latency_ms, results, attempts, "search");
        }
    }

    fn log_failure(&self, query: &UpstreamQuery, trace: &str, latency_ms: u64, err: &GatewayError) {
        if self.settings.log.query_text {
            warn!(
                q_hash = %trace,
                q = %query.query_text(),
                latency_ms,
                kind = err.kind(),
                error = %err,
                "search failed"
            );
        } else {
            warn!(q_hash = %trace, latency_ms, kind = err.kind(), error = %err, "search failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedTransport {
        responses: Mutex<Vec<std::result::Result<TransportResponse, TransportError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(mut responses: Vec<std::result::Result<TransportResponse, TransportError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            _url: &str,
            _params: &[(&'static str, String)],
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(TransportResponse::new(200, "{}")))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn gateway(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> Gateway {
        Gateway::with_transport(Settings::new("key", "cx"), transport).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_gateway_success_single_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(TransportResponse::new(
            200,
            r#"{"items":[{"title":"A","link":"https://a.com","snippet":"s"}]}"#,
        ))]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gw = gateway(transport.clone(), sleeper.clone());

        let result = gw.search(SearchRequest::new("a")).await.unwrap();
        assert_eq!(result.count(), 1);
        assert_eq!(result.provider, "google-cse");
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_honors_retry_after() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(TransportResponse::new(429, "slow down").with_retry_after("2")),
            Ok(TransportResponse::new(200, "{}")),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gw = gateway(transport.clone(), sleeper.clone());

        gw.search(SearchRequest::new("a")).await.unwrap();
        assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_gateway_backoff_grows() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(TransportResponse::new(500, "")),
            Ok(TransportResponse::new(502, "")),
            Ok(TransportResponse::new(504, "")),
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gw = gateway(transport.clone(), sleeper.clone());

        let err = gw.search(SearchRequest::new("a")).await.unwrap_err();
        assert_eq!(err, GatewayError::upstream(504, ""));

        let delays = sleeper.delays.lock().unwrap().clone();
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(200) && delays[0] < Duration::from_millis(600));
        assert!(delays[1] >= Duration::from_millis(400) && delays[1] < Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_gateway_invalid_json_is_upstream_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(TransportResponse::new(
            200,
            "<html>oops</html>",
        ))]));
        let gw = gateway(transport.clone(), Arc::new(RecordingSleeper::default()));

        let err = gw.search(SearchRequest::new("a")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { status: 200, .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_gateway_custom_policy() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Failed(
            "timed out".to_string(),
        ))]));
        let gw = gateway(transport.clone(), Arc::new(RecordingSleeper::default()))
            .with_retry_policy(RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            });

        let err = gw.search(SearchRequest::new("a")).await.unwrap_err();
        assert_eq!(err, GatewayError::Network("timed out".to_string()));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_gateway_closed_transport_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::Closed)]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let gw = gateway(transport.clone(), sleeper.clone());

        let err = gw.search(SearchRequest::new("a")).await.unwrap_err();
        assert_eq!(err, GatewayError::Network("http client is closed".to_string()));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_settings_accessor() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let gw = gateway(transport, Arc::new(RecordingSleeper::default()));
        assert_eq!(gw.settings().cx, "cx");
    }
}
