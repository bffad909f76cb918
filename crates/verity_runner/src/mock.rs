//! Mock container runner for testing.
//!
//! Provides a scripted implementation of the ContainerRunner trait for use in
//! tests without requiring Docker or Podman.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::{ContainerConfig, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ContainerRunner, ExecutionResult};

/// Predefined mock response for a container execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub image: Option<String>,
    pub command: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub workdir: Option<String>,
}

/// Mock container runner.
///
/// Responses are handed out in order; once exhausted, the last response is
/// repeated. With no responses configured every run succeeds with empty
/// output.
#[derive(Clone)]
pub struct MockRunner {
    responses: Arc<RwLock<Vec<MockResponse>>>,
    response_index: Arc<AtomicUsize>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Add a mock response for the next run_container call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.write() = responses;
        self
    }

    /// Make every call fail with `RunnerError::ExecutionFailed`.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Commands passed to run_container, in call order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.get_method_calls("run_container")
            .into_iter()
            .filter_map(|c| c.command)
            .collect()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self) -> MockResponse {
        let responses = self.responses.read();
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index)
            .or_else(|| responses.last())
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }

    fn check_failure(&self) -> RunnerResult<()> {
        match self.simulate_failure.read().clone() {
            Some(msg) => Err(RunnerError::ExecutionFailed(msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerRunner for MockRunner {
    async fn run_container(
        &self,
        config: &ContainerConfig,
        _run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        self.record_call(CapturedCall {
            method: "run_container".to_string(),
            image: Some(config.full_image()),
            command: Some(config.command.clone()),
            env: Some(config.env.clone()),
            workdir: config.workdir.clone(),
        });

        self.check_failure()?;

        let response = self.next_response();
        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);

        Ok(ExecutionResult {
            container_id: format!("mock-{}", uuid::Uuid::new_v4()),
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}
