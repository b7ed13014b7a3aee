//! Judge prompts for semantic requirements: guidance packing, message layout
//! and verdict parsing.

use crate::message::Message;
use crate::requirement::EvaluationError;
use serde::{Deserialize, Serialize};

/// Judge-reply grammar and call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_affirmative")]
    pub affirmative: String,
    #[serde(default = "default_negative")]
    pub negative: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_system_prompt() -> String {
    "Determine if the given text meets the specified written requirement. Answer with only 'yes' or 'no'."
        .to_string()
}

fn default_affirmative() -> String {
    "yes".to_string()
}

fn default_negative() -> String {
    "no".to_string()
}

fn default_max_tokens() -> u32 {
    3
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            affirmative: default_affirmative(),
            negative: default_negative(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<(), String> {
        let yes = normalize(&self.affirmative);
        let no = normalize(&self.negative);
        if yes.is_empty() || no.is_empty() {
            return Err("Judge verdict tokens cannot be empty".to_string());
        }
        if yes == no {
            return Err(format!(
                "Judge verdict tokens must differ (both are '{}')",
                yes
            ));
        }
        if self.max_tokens == 0 {
            return Err("Judge max_tokens must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Guidance selected to fit a token budget, in packing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedGuidance<'a> {
    pub phrasings: Vec<&'a str>,
    pub positive_examples: Vec<&'a str>,
    pub negative_examples: Vec<&'a str>,
    pub tokens: usize,
}

impl PackedGuidance<'_> {
    pub fn render(&self) -> String {
        let mut out = String::from("Written requirement:");
        for phrasing in &self.phrasings {
            out.push_str("\n- ");
            out.push_str(phrasing);
        }
        if !self.positive_examples.is_empty() {
            out.push_str("\n\nExamples that meet the requirement:\n");
            out.push_str(&self.positive_examples.join("\n\n"));
        }
        if !self.negative_examples.is_empty() {
            out.push_str("\n\nExamples that do NOT meet the requirement:\n");
            out.push_str(&self.negative_examples.join("\n\n"));
        }
        out
    }
}

/// Pack phrasings, then positive examples, then negative examples under
/// `limit` tokens.
///
/// Items are never truncated: one that does not fit the remaining budget is
/// skipped and packing continues with the next. At least one phrasing must fit.
pub fn pack_guidance<'a, F>(
    phrasings: &'a [String],
    positive_examples: &'a [String],
    negative_examples: &'a [String],
    limit: usize,
    estimate: F,
) -> Result<PackedGuidance<'a>, EvaluationError>
where
    F: Fn(&str) -> usize,
{
    let mut packed = PackedGuidance::default();

    let take = |items: &'a [String], into: &mut Vec<&'a str>, used: &mut usize| {
        for item in items {
            let cost = estimate(item);
            if *used + cost <= limit {
                *used += cost;
                into.push(item.as_str());
            }
        }
    };

    let mut used = 0;
    take(phrasings, &mut packed.phrasings, &mut used);
    if packed.phrasings.is_empty() {
        return Err(EvaluationError::PromptOverBudget(limit));
    }
    take(positive_examples, &mut packed.positive_examples, &mut used);
    take(negative_examples, &mut packed.negative_examples, &mut used);
    packed.tokens = used;
    Ok(packed)
}

/// Isolated judge conversation: never shares messages with the user-facing one.
pub fn judge_messages(config: &JudgeConfig, guidance: &PackedGuidance<'_>, content: &str) -> Vec<Message> {
    vec![
        Message::system(config.system_prompt.clone()),
        Message::user(format!(
            "{}\n\nText to evaluate:\n```txt\n{}\n```\nDoes this text meet the requirement?",
            guidance.render(),
            content
        )),
    ]
}

/// Estimated tokens of a whole judge conversation.
pub fn prompt_tokens<F>(messages: &[Message], estimate: F) -> usize
where
    F: Fn(&str) -> usize,
{
    messages.iter().map(|m| estimate(&m.content)).sum()
}

/// Pack guidance and lay out the judge conversation so that the entire
/// prompt (system prompt, scaffolding and the evaluated text) stays within
/// `limit` tokens.
///
/// The fixed cost is taken off the budget before packing. Items dropped by
/// the final check go in reverse packing order; the first phrasing is never
/// dropped, so when even that cannot fit the result is `PromptOverBudget`.
pub fn build_judge_prompt<'a, F>(
    config: &JudgeConfig,
    phrasings: &'a [String],
    positive_examples: &'a [String],
    negative_examples: &'a [String],
    content: &str,
    limit: usize,
    estimate: F,
) -> Result<(PackedGuidance<'a>, Vec<Message>), EvaluationError>
where
    F: Fn(&str) -> usize,
{
    let fixed = prompt_tokens(
        &judge_messages(config, &PackedGuidance::default(), content),
        &estimate,
    );
    if fixed >= limit {
        return Err(EvaluationError::PromptOverBudget(limit));
    }

    let mut packed = pack_guidance(
        phrasings,
        positive_examples,
        negative_examples,
        limit - fixed,
        &estimate,
    )?;
    loop {
        let messages = judge_messages(config, &packed, content);
        if prompt_tokens(&messages, &estimate) <= limit {
            return Ok((packed, messages));
        }
        let dropped = packed
            .negative_examples
            .pop()
            .or_else(|| packed.positive_examples.pop())
            .or_else(|| {
                if packed.phrasings.len() > 1 {
                    packed.phrasings.pop()
                } else {
                    None
                }
            });
        match dropped {
            Some(item) => packed.tokens = packed.tokens.saturating_sub(estimate(item)),
            None => return Err(EvaluationError::PromptOverBudget(limit)),
        }
    }
}

fn normalize(token: &str) -> String {
    token
        .trim()
        .trim_end_matches(['.', '!'])
        .trim_end()
        .to_ascii_lowercase()
}

/// Strict verdict grammar: the trimmed reply, minus trailing `.`/`!`, must
/// equal one of the configured tokens (ASCII case-insensitive).
pub fn parse_verdict(reply: &str, config: &JudgeConfig) -> Result<bool, EvaluationError> {
    let reply_token = normalize(reply);
    if reply_token == normalize(&config.affirmative) {
        Ok(true)
    } else if reply_token == normalize(&config.negative) {
        Ok(false)
    } else {
        Err(EvaluationError::UnparsableVerdict(reply.to_string()))
    }
}
