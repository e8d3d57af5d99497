//! Webhook delivery: one POST per attempt, a timeout around each attempt,
//! and a bounded number of retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BotConfig;
use crate::error::DeliveryError;

use super::payload::WebhookPayload;

/// One outbound POST of the payload.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, payload: &WebhookPayload) -> Result<(), DeliveryError>;
}

/// reqwest-backed transport. Any 2xx is success.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "Webhook rejected lead");
        Err(DeliveryError::Status {
            status: status.as_u16(),
        })
    }
}

/// How a successful send went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub attempts: u32,
}

/// Sends payloads with a per-attempt timeout and fixed backoff between
/// attempts.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl DeliveryClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        timeout: Duration,
        attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            transport,
            timeout,
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// HTTP client pointed at the configured webhook.
    pub fn from_config(config: &BotConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new(&config.webhook_url)))
    }

    /// Configured limits with a caller-supplied transport.
    pub fn with_transport(config: &BotConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            transport,
            config.delivery_timeout,
            config.delivery_attempts(),
            config.retry_backoff,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.attempts
    }

    /// POST the payload, retrying failures until the attempt budget runs out.
    pub async fn send(&self, payload: &WebhookPayload) -> Result<DeliveryReceipt, DeliveryError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, self.transport.post(payload)).await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout {
                    timeout: self.timeout,
                }),
            };

            match result {
                Ok(()) => {
                    tracing::info!(
                        session_id = %payload.session_id,
                        attempt,
                        "Lead delivered"
                    );
                    return Ok(DeliveryReceipt { attempts: attempt });
                }
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(
                        session_id = %payload.session_id,
                        attempt,
                        error = %e,
                        "Lead delivery failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %payload.session_id,
                        attempts = attempt,
                        error = %e,
                        "Lead delivery failed"
                    );
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::lead::{LeadRecord, SessionId};

    /// Replays scripted outcomes; `None` hangs past any timeout.
    struct ScriptedTransport {
        calls: AtomicU32,
        outcomes: Mutex<VecDeque<Option<Result<(), DeliveryError>>>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Option<Result<(), DeliveryError>>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                outcomes: Mutex::new(outcomes.into()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(&self, _payload: &WebhookPayload) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().unwrap().pop_front().flatten();
            match next {
                Some(result) => result,
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn payload() -> WebhookPayload {
        let lead = LeadRecord::new(SessionId::from_raw("sess_1_test"));
        WebhookPayload::build(&lead, &BotConfig::default())
    }

    fn client(transport: Arc<ScriptedTransport>, attempts: u32) -> DeliveryClient {
        DeliveryClient::new(
            transport,
            Duration::from_secs(10),
            attempts,
            Duration::from_millis(1200),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success() {
        let transport = ScriptedTransport::new(vec![Some(Ok(()))]);
        let receipt = client(transport.clone(), 2).send(&payload()).await.unwrap();
        assert_eq!(receipt.attempts, 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            Some(Err(DeliveryError::Status { status: 502 })),
            Some(Ok(())),
        ]);
        let receipt = client(transport.clone(), 2).send(&payload()).await.unwrap();
        assert_eq!(receipt.attempts, 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_elapses_between_attempts() {
        let transport = ScriptedTransport::new(vec![
            Some(Err(DeliveryError::Status { status: 503 })),
            Some(Ok(())),
        ]);
        let started = tokio::time::Instant::now();
        client(transport, 2).send(&payload()).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1200), "retried after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1300), "retried after {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_does_not_wait() {
        let transport = ScriptedTransport::new(vec![Some(Ok(()))]);
        let started = tokio::time::Instant::now();
        client(transport, 2).send(&payload()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_budget_is_a_hard_limit() {
        let transport = ScriptedTransport::new(vec![
            Some(Err(DeliveryError::Http("connection refused".into()))),
            Some(Err(DeliveryError::Http("connection refused".into()))),
            Some(Ok(())),
        ]);
        let err = client(transport.clone(), 2).send(&payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Exhausted { attempts: 2, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_endpoint_times_out_each_attempt() {
        let transport = ScriptedTransport::new(vec![None, None]);
        let err = client(transport.clone(), 2).send(&payload()).await.unwrap_err();
        match err {
            DeliveryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, DeliveryError::Timeout { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let transport = ScriptedTransport::new(vec![]);
        assert_eq!(client(transport, 0).max_attempts(), 1);
    }
}
