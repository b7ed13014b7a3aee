//! One evaluation pass over the declared requirements.

use crate::engine::report::{EvaluationOutcome, EvaluationRecord};
use crate::message::Message;
use crate::requirement::{EvaluationContext, EvaluationError, RequirementRef, Verdict};
use futures::future::join_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassMode {
    /// Stop at the first requirement that is not met.
    ShortCircuit,
    /// Evaluate everything; used for the final diagnostic pass.
    Exhaustive,
}

pub(crate) struct PassResult {
    pub index: usize,
    pub outcome: Result<Verdict, EvaluationError>,
}

impl PassResult {
    pub fn passed(&self) -> bool {
        matches!(&self.outcome, Ok(verdict) if verdict.satisfied)
    }

    pub fn record(&self, requirements: &[RequirementRef]) -> EvaluationRecord {
        let requirement = &requirements[self.index];
        let (outcome, detail) = match &self.outcome {
            Ok(verdict) if verdict.satisfied => (EvaluationOutcome::Passed, verdict.detail.clone()),
            Ok(verdict) => (EvaluationOutcome::Failed, verdict.detail.clone()),
            Err(e) => (EvaluationOutcome::Error, Some(e.to_string())),
        };
        EvaluationRecord {
            index: self.index,
            type_key: requirement.type_key().to_string(),
            name: requirement.name().to_string(),
            outcome,
            detail,
        }
    }
}

/// Evaluate `requirements` against `conversation` in declared order.
///
/// In concurrent mode every evaluation is dispatched at once; in short-circuit
/// mode the results are then cut after the lowest failing index, so the
/// outcome matches a sequential pass whatever the completion order.
pub(crate) async fn evaluate_pass(
    requirements: &[RequirementRef],
    conversation: &[Message],
    ctx: &EvaluationContext<'_>,
    mode: PassMode,
    concurrent: bool,
) -> Vec<PassResult> {
    let mut results: Vec<PassResult> = if concurrent {
        let outcomes = join_all(
            requirements
                .iter()
                .map(|requirement| requirement.evaluate(conversation, ctx)),
        )
        .await;
        outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| PassResult { index, outcome })
            .collect()
    } else {
        let mut results = Vec::with_capacity(requirements.len());
        for (index, requirement) in requirements.iter().enumerate() {
            let outcome = requirement.evaluate(conversation, ctx).await;
            let result = PassResult { index, outcome };
            let stop = mode == PassMode::ShortCircuit && !result.passed();
            results.push(result);
            if stop {
                break;
            }
        }
        results
    };

    if mode == PassMode::ShortCircuit {
        if let Some(first_failing) = results.iter().position(|r| !r.passed()) {
            results.truncate(first_failing + 1);
        }
    }
    results
}
