//! Mock platform for integration tests
//!
//! Records every publish request and replays queued responses, so service
//! tests can assert the full publish flow without any network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::platforms::{Platform, PublishRequest};

#[derive(Clone)]
pub struct MockPlatform {
    name: String,
    requests: Arc<Mutex<Vec<PublishRequest>>>,
    responses: Arc<Mutex<VecDeque<std::result::Result<String, PlatformError>>>>,
}

impl MockPlatform {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue a successful publish returning the given external ID.
    pub fn respond_with_id(&self, external_id: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(external_id.to_string()));
    }

    /// Queue a failure for the next publish call.
    pub fn respond_with_error(&self, error: PlatformError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, _request: &PublishRequest) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(e)) => Err(e.into()),
            None => Ok("mock-id".to_string()),
        }
    }
}
