//! In-memory [`Upstream`] for tool tests.

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Mutex;

use crate::api::{Upstream, UpstreamRequest};
use crate::error::UpstreamError;

/// Answers every request with the same canned response and records what it
/// was asked.
pub struct FakeUpstream {
    response: Value,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl FakeUpstream {
    pub fn new(response: Value) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Upstream for FakeUpstream {
    fn call<'a>(&'a self, request: &'a UpstreamRequest) -> BoxFuture<'a, Result<Value, UpstreamError>> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}
