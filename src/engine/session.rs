//! Request-scoped convergence state.

use crate::backend::{CompletionResponse, TokenUsage};
use crate::engine::report::{
    ConvergenceReport, ConvergenceStatus, EvaluationRecord, ProspectRecord, RevisionRecord,
};
use crate::message::{Conversation, Message};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier: `reqai-<utc timestamp>-<counter>`.
pub fn new_session_id() -> String {
    let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("reqai-{}-{}", Utc::now().format("%Y%m%d%H%M%S%3f"), n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Generated,
    Evaluating,
    Revising,
    Converged,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Converged | SessionState::Failed)
    }
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub iteration: u32,
    pub last_failing_index: Option<usize>,
    pub prospects: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_response: Option<Message>,
}

/// Receives a snapshot at every state transition.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, snapshot: &SessionSnapshot);
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_transition(&self, _snapshot: &SessionSnapshot) {}
}

/// Convergence session
///
/// Owned by one engine run and dropped with it. The conversation sent for
/// evaluation or revision is always rebuilt from `original_conversation` and
/// the current prospect; earlier drafts live only in the audit trail.
pub struct ConvergenceSession {
    id: String,
    state: SessionState,
    original_conversation: Conversation,
    prospective_response: Option<Message>,
    iteration_count: u32,
    last_failing_requirement_index: Option<usize>,
    error_streaks: Vec<u32>,
    prospects: Vec<ProspectRecord>,
    usage: TokenUsage,
    model: String,
    finish_reason: Option<String>,
}

impl ConvergenceSession {
    pub fn new(original_conversation: Conversation, requirement_count: usize) -> Self {
        Self {
            id: new_session_id(),
            state: SessionState::Init,
            original_conversation,
            prospective_response: None,
            iteration_count: 0,
            last_failing_requirement_index: None,
            error_streaks: vec![0; requirement_count],
            prospects: Vec::new(),
            usage: TokenUsage::default(),
            model: String::new(),
            finish_reason: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn original_conversation(&self) -> &[Message] {
        &self.original_conversation
    }

    pub fn transition(&mut self, state: SessionState, observer: &dyn SessionObserver) {
        self.state = state;
        observer.on_transition(&self.snapshot());
    }

    /// Install a new prospect. Revisions advance the iteration count.
    pub fn accept_draft(&mut self, response: CompletionResponse, revision: Option<RevisionRecord>) {
        if revision.is_some() {
            self.iteration_count += 1;
        }
        self.usage += response.usage;
        self.model = response.model;
        self.finish_reason = response.finish_reason;
        self.prospects.push(ProspectRecord {
            attempt: self.iteration_count,
            model: self.model.clone(),
            message: response.message.clone(),
            evaluations: Vec::new(),
            revision,
        });
        self.prospective_response = Some(response.message);
    }

    /// `original_conversation + prospective_response`.
    pub fn candidate_conversation(&self) -> Conversation {
        let mut conversation = self.original_conversation.clone();
        conversation.extend(self.prospective_response.iter().cloned());
        conversation
    }

    pub fn record_evaluations(&mut self, records: Vec<EvaluationRecord>) {
        if let Some(prospect) = self.prospects.last_mut() {
            prospect.evaluations = records;
        }
    }

    pub fn set_last_failing(&mut self, index: Option<usize>) {
        self.last_failing_requirement_index = index;
    }

    /// Count another consecutive evaluation error for `index`.
    pub fn note_evaluation_error(&mut self, index: usize) -> u32 {
        let streak = &mut self.error_streaks[index];
        *streak += 1;
        *streak
    }

    pub fn reset_error_streak(&mut self, index: usize) {
        self.error_streaks[index] = 0;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            state: self.state,
            iteration: self.iteration_count,
            last_failing_index: self.last_failing_requirement_index,
            prospects: self.prospects.len(),
            latest_response: self.prospective_response.clone(),
        }
    }

    pub fn into_report(self, status: ConvergenceStatus) -> ConvergenceReport {
        ConvergenceReport {
            session_id: self.id,
            model: self.model,
            response: self
                .prospective_response
                .unwrap_or_else(|| Message::assistant(String::new())),
            status,
            iterations: self.iteration_count,
            prospects: self.prospects,
            usage: self.usage,
            finish_reason: self.finish_reason,
        }
    }
}
