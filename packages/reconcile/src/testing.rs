//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the reconciliation
//! library without calling a real interpretation service.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{InterpretError, InterpretResult};
use crate::traits::adjudicator::{Adjudication, AdjudicationRequest, Adjudicator};
use crate::traits::interpreter::{Candidate, Completion, Interpreter, MediaCounts};

/// A mock interpreter for testing.
///
/// Answers are scripted by substring: the first rule whose key appears in
/// the cluster text wins, else the default answer (empty unless set).
/// Failures and delays can be injected, and every call is recorded.
#[derive(Default, Clone)]
pub struct MockInterpreter {
    /// Scripted answers as (key, candidates)
    rules: Arc<RwLock<Vec<(String, Vec<Candidate>)>>>,

    /// Answer when no rule matches
    default: Arc<RwLock<Vec<Candidate>>>,

    /// Number of upcoming calls that fail
    failures: Arc<RwLock<usize>>,

    /// Delay before answering
    delay: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockInterpretCall>>>,
}

/// Record of a call made to the mock interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct MockInterpretCall {
    pub cluster_text: String,
    pub category: String,
    pub media: MediaCounts,
}

impl MockInterpreter {
    /// Create a mock that answers every call with no candidates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer clusters whose text contains `key`.
    pub fn with_candidates(self, key: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        self.rules.write().unwrap().push((key.into(), candidates));
        self
    }

    /// Answer for clusters matching no rule.
    pub fn with_default(self, candidates: Vec<Candidate>) -> Self {
        *self.default.write().unwrap() = candidates;
        self
    }

    /// Fail the next `count` calls with a transport error.
    pub fn with_failures(self, count: usize) -> Self {
        *self.failures.write().unwrap() = count;
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockInterpretCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl Interpreter for MockInterpreter {
    async fn interpret(
        &self,
        cluster_text: &str,
        category: &str,
        media: MediaCounts,
    ) -> InterpretResult<Vec<Candidate>> {
        self.calls.write().unwrap().push(MockInterpretCall {
            cluster_text: cluster_text.to_string(),
            category: category.to_string(),
            media,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.failures.write().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(InterpretError::Transport("mock failure".into()));
            }
        }

        let rules = self.rules.read().unwrap();
        let answer = rules
            .iter()
            .find(|(key, _)| cluster_text.contains(key.as_str()))
            .map(|(_, candidates)| candidates.clone())
            .unwrap_or_else(|| self.default.read().unwrap().clone());
        Ok(answer)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock adjudicator for testing.
///
/// Returns one scripted answer for every request, after any injected
/// failures. Every request is recorded.
#[derive(Default, Clone)]
pub struct MockAdjudicator {
    answer: Arc<RwLock<Adjudication>>,
    failures: Arc<RwLock<usize>>,
    requests: Arc<RwLock<Vec<AdjudicationRequest>>>,
}

impl MockAdjudicator {
    /// Create a mock that answers with an empty adjudication.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(self, answer: Adjudication) -> Self {
        *self.answer.write().unwrap() = answer;
        self
    }

    /// Fail the next `count` calls with a transport error.
    pub fn with_failures(self, count: usize) -> Self {
        *self.failures.write().unwrap() = count;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<AdjudicationRequest> {
        self.requests.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }
}

#[async_trait]
impl Adjudicator for MockAdjudicator {
    async fn adjudicate(&self, request: &AdjudicationRequest) -> InterpretResult<Adjudication> {
        self.requests.write().unwrap().push(request.clone());

        {
            let mut failures = self.failures.write().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(InterpretError::Transport("mock failure".into()));
            }
        }

        Ok(self.answer.read().unwrap().clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock completion that returns a fixed reply and records prompts.
#[derive(Default, Clone)]
pub struct MockCompletion {
    reply: String,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockCompletion {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Arc::default(),
        }
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.read().unwrap().clone()
    }
}

#[async_trait]
impl Completion for MockCompletion {
    async fn complete(&self, _system: &str, user: &str) -> InterpretResult<String> {
        self.prompts.write().unwrap().push(user.to_string());
        Ok(self.reply.clone())
    }
}
