//! Inference client abstraction with a hard response deadline.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::warn;

use crate::error::{NavError, Result};

/// One inference request: prompt text plus optional images for
/// multimodal providers
#[derive(Clone, Debug, Default)]
pub struct InferenceRequest {
    pub system_prompt: String,
    pub user_message: String,
    /// Encoded images (PNG map render, camera JPEG)
    pub images: Vec<Vec<u8>>,
}

/// A provider that turns a request into raw response text.
///
/// Implementations block; the deadline race in
/// [`complete_with_deadline`] bounds how long the navigation cycle waits.
pub trait InferenceClient: Send + Sync {
    fn complete(&self, request: &InferenceRequest) -> Result<String>;
}

/// Run a completion with a hard deadline.
///
/// The provider call runs on its own thread and races a timer. Exactly one
/// of response or timeout wins; a late response is discarded when the
/// abandoned worker finds the channel closed.
pub fn complete_with_deadline(
    client: Arc<dyn InferenceClient>,
    request: InferenceRequest,
    timeout: Duration,
) -> Result<String> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let result = client.complete(&request);
        if tx.send(result).is_err() {
            warn!("inference response arrived after the deadline, discarded");
        }
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(NavError::InferenceTimeout(timeout.as_millis() as u64)),
    }
}

/// Scripted client for tests and offline simulation
pub struct MockInference {
    reply: Box<dyn Fn(&InferenceRequest) -> String + Send + Sync>,
}

impl MockInference {
    /// Always return the same response
    pub fn fixed(response: impl Into<String>) -> Self {
        let response = response.into();
        Self {
            reply: Box::new(move |_| response.clone()),
        }
    }

    /// Compute the response from the request
    pub fn with(reply: impl Fn(&InferenceRequest) -> String + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
        }
    }
}

impl InferenceClient for MockInference {
    fn complete(&self, request: &InferenceRequest) -> Result<String> {
        Ok((self.reply)(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient {
        delay: Duration,
    }

    impl InferenceClient for SlowClient {
        fn complete(&self, _request: &InferenceRequest) -> Result<String> {
            thread::sleep(self.delay);
            Ok("late".to_string())
        }
    }

    #[test]
    fn test_fast_response_wins() {
        let client: Arc<dyn InferenceClient> = Arc::new(MockInference::fixed("ok"));
        let result = complete_with_deadline(
            client,
            InferenceRequest::default(),
            Duration::from_secs(1),
        );
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn test_deadline_wins_over_slow_client() {
        let client: Arc<dyn InferenceClient> = Arc::new(SlowClient {
            delay: Duration::from_secs(10),
        });
        let result = complete_with_deadline(
            client,
            InferenceRequest::default(),
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(NavError::InferenceTimeout(50))));
    }

    #[test]
    fn test_client_error_propagates() {
        struct FailingClient;
        impl InferenceClient for FailingClient {
            fn complete(&self, _request: &InferenceRequest) -> Result<String> {
                Err(NavError::Inference("provider unavailable".to_string()))
            }
        }
        let client: Arc<dyn InferenceClient> = Arc::new(FailingClient);
        let result = complete_with_deadline(
            client,
            InferenceRequest::default(),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(NavError::Inference(_))));
    }
}
