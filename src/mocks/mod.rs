//! Mock HTTP transport for tests.
//!
//! The mock records every request it receives and answers from a queue of
//! scripted outcomes, so tests can assert on round-trip counts (cache
//! hits, single-flight, chain precedence) and drive transport failures
//! such as timeouts and cancellation.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl MockResponse {
    /// A 200 response with an empty body.
    pub fn ok() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// A 200 response with a body.
    pub fn ok_with_body(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// An error response with the given status and body.
    pub fn error(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header to the response.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Mock [`HttpTransport`] answering from a queue.
///
/// Each `send` pops the next queued outcome; an exhausted queue fails the
/// request, which keeps a test honest about exactly how many round-trips
/// the code under test performs.
pub struct MockTransport {
    outcomes: Mutex<Vec<Result<MockResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a mock with an empty queue.
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with queued responses.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            outcomes: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response.
    pub fn queue_response(&self, response: MockResponse) {
        self.outcomes.lock().unwrap().push(Ok(response));
    }

    /// Queue a transport failure.
    pub fn queue_error(&self, error: TransportError) {
        self.outcomes.lock().unwrap().push(Err(error));
    }

    /// All recorded requests, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent through the mock.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Err(TransportError::ConnectionFailed {
                    message: "no mock response queued".to_string(),
                })
            } else {
                outcomes.remove(0)
            }
        };

        outcome.map(|mock| HttpResponse {
            status: mock.status,
            headers: mock.headers,
            body: mock.body,
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued", &self.outcomes.lock().unwrap().len())
            .field("recorded", &self.requests.lock().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_answers_in_order_and_records() {
        let transport = MockTransport::with_responses(vec![
            MockResponse::ok_with_body("first"),
            MockResponse::error(404, "missing"),
        ]);

        let r1 = transport
            .send(HttpRequest::new("GET", "http://example/1"))
            .await
            .unwrap();
        assert_eq!(r1.status, 200);
        assert_eq!(r1.body, Bytes::from("first"));

        let r2 = transport
            .send(HttpRequest::new("GET", "http://example/2"))
            .await
            .unwrap();
        assert_eq!(r2.status, 404);

        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.last_request().unwrap().url, "http://example/2");
    }

    #[tokio::test]
    async fn test_mock_exhausted_queue_fails() {
        let transport = MockTransport::new();
        let err = transport
            .send(HttpRequest::new("GET", "http://example/"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
        // The failed request is still recorded.
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_queued_error() {
        let transport = MockTransport::new();
        transport.queue_error(TransportError::Timeout {
            duration: Duration::from_secs(5),
        });

        let err = transport
            .send(HttpRequest::new("GET", "http://example/"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }
}
