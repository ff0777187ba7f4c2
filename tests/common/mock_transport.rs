//! Scripted transport for exercising retrying client code.
//!
//! Replays queued outcomes in order, one per call, and records every request it sees.
//! Clones share the script, so a service cloned per attempt keeps advancing through it.
//! A strict transport panics instead of erroring once the script runs out, failing the
//! test that made the unexpected request.
use std::collections::VecDeque;
use std::future::Ready;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    pub method: &'static str,
    pub path: &'static str,
    pub authorization: Option<String>,
}

impl MockRequest {
    pub fn get(path: &'static str) -> Self {
        Self { method: "GET", path, authorization: None }
    }

    pub fn post(path: &'static str) -> Self {
        Self { method: "POST", path, authorization: None }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {}", token));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self { status: 200, body: Vec::new() }
    }
}

impl MockResponse {
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no mock response available")]
    NoMockResponse,
    #[error("connection reset")]
    ConnectionReset,
}

#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Result<MockResponse, TransportError>>,
    requests: Vec<MockRequest>,
    strict: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queued outcomes with `responses`.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        self.script.lock().unwrap().outcomes = responses.into_iter().map(Ok).collect();
        self
    }

    /// Panic on a request with no scripted outcome left.
    pub fn strict(self) -> Self {
        self.script.lock().unwrap().strict = true;
        self
    }

    pub fn add_response(self, response: MockResponse) -> Self {
        self.script.lock().unwrap().outcomes.push_back(Ok(response));
        self
    }

    pub fn add_error(self, error: TransportError) -> Self {
        self.script.lock().unwrap().outcomes.push_back(Err(error));
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().outcomes.len()
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }
}

impl Service<MockRequest> for MockTransport {
    type Response = MockResponse;
    type Error = TransportError;
    type Future = Ready<Result<MockResponse, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MockRequest) -> Self::Future {
        let mut script = self.script.lock().unwrap();
        let index = script.requests.len();
        script.requests.push(req);
        let outcome = script.outcomes.pop_front();
        let strict = script.strict;
        drop(script);
        match outcome {
            Some(outcome) => std::future::ready(outcome),
            None if strict => panic!("no mock response for request at index {}", index),
            None => std::future::ready(Err(TransportError::NoMockResponse)),
        }
    }
}
