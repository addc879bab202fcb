//! Interpreter and adjudicator built on a raw text-completion capability.
//!
//! Formats the prompt with a JSON schema of the expected answer, then
//! parses the reply tolerantly: code fences are stripped, the outermost
//! JSON object is taken, and for interpretation a bare array is accepted.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{InterpretError, InterpretResult};
use crate::pipeline::prompts::{
    format_adjudicate_prompt, format_interpret_prompt, ADJUDICATE_SYSTEM_PROMPT,
    INTERPRET_SYSTEM_PROMPT,
};
use crate::traits::adjudicator::{Adjudication, AdjudicationRequest, Adjudicator};
use crate::traits::interpreter::{Candidate, Completion, Interpreter, MediaCounts};
use crate::types::entity::{Confidence, DamageStatus, MediaSet};
use crate::types::message::MediaItem;

/// Expected reply shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterpretReply {
    #[serde(default, alias = "entities", alias = "buildings")]
    pub candidates: Vec<CandidateReply>,
}

/// One building in the reply.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateReply {
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    /// "damaged", "demolished" or "unknown"
    #[serde(default)]
    pub damage_status: Option<String>,
    /// "high", "medium" or "low"
    #[serde(default)]
    pub confidence: Option<String>,
}

impl From<CandidateReply> for Candidate {
    fn from(reply: CandidateReply) -> Self {
        Self {
            name: reply.name.trim().to_string(),
            area: reply
                .area
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            damage_status: reply
                .damage_status
                .as_deref()
                .map(DamageStatus::from_label)
                .unwrap_or_default(),
            confidence: reply
                .confidence
                .as_deref()
                .map(Confidence::from_label)
                .unwrap_or(Confidence::Low),
        }
    }
}

/// Expected adjudication reply shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdjudicationReply {
    /// Media per building name, as listed in the prompt.
    #[serde(default)]
    pub assignments: BTreeMap<String, MediaReply>,
    /// Brief explanation of the decisions.
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Media one building gets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MediaReply {
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default, alias = "maps")]
    pub map_links: Vec<String>,
}

impl From<MediaReply> for MediaSet {
    fn from(reply: MediaReply) -> Self {
        reply
            .photos
            .into_iter()
            .map(MediaItem::Photo)
            .chain(reply.videos.into_iter().map(MediaItem::Video))
            .chain(reply.map_links.into_iter().map(MediaItem::MapLink))
            .collect()
    }
}

/// JSON schema of [`InterpretReply`], pretty-printed.
pub fn reply_schema() -> String {
    let schema = schemars::schema_for!(InterpretReply);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// JSON schema of [`AdjudicationReply`], pretty-printed.
pub fn adjudication_schema() -> String {
    let schema = schemars::schema_for!(AdjudicationReply);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Parse an adjudication reply.
pub fn parse_adjudication(raw: &str) -> InterpretResult<Adjudication> {
    let body = strip_code_fences(raw);
    let object = outermost_object(body.trim())
        .ok_or_else(|| InterpretError::malformed("no JSON object in reply"))?;
    let reply: AdjudicationReply =
        serde_json::from_str(object).map_err(|e| InterpretError::malformed(e.to_string()))?;

    Ok(reply
        .assignments
        .into_iter()
        .map(|(name, media)| (name.trim().to_string(), media))
        .filter(|(name, _)| !name.is_empty())
        .fold(Adjudication::new(), |answer, (name, media)| {
            answer.assign(name, MediaSet::from(media))
        }))
}

/// Parse a completion reply into candidates.
pub fn parse_reply(raw: &str) -> InterpretResult<Vec<Candidate>> {
    let body = strip_code_fences(raw);
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(InterpretError::malformed("empty reply"));
    }

    let replies: Vec<CandidateReply> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| InterpretError::malformed(e.to_string()))?
    } else {
        let object = outermost_object(trimmed)
            .ok_or_else(|| InterpretError::malformed("no JSON object in reply"))?;
        serde_json::from_str::<InterpretReply>(object)
            .map_err(|e| InterpretError::malformed(e.to_string()))?
            .candidates
    };

    Ok(replies
        .into_iter()
        .map(Candidate::from)
        .filter(|c| !c.name.is_empty())
        .collect())
}

/// Content of the first fenced block, or the input unchanged.
fn strip_code_fences(raw: &str) -> &str {
    let Some(start) = raw.find("```") else {
        return raw;
    };
    let after = &raw[start + 3..];
    // Skip an info string such as `json`
    let after = match after.find('\n') {
        Some(newline) => &after[newline + 1..],
        None => after,
    };
    match after.find("```") {
        Some(end) => &after[..end],
        None => after,
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Interpreter and adjudicator that prompt a completion capability.
pub struct CompletionInterpreter<C: Completion> {
    completion: C,
    schema: String,
    adjudication_schema: String,
}

impl<C: Completion> CompletionInterpreter<C> {
    pub fn new(completion: C) -> Self {
        Self {
            completion,
            schema: reply_schema(),
            adjudication_schema: adjudication_schema(),
        }
    }
}

#[async_trait]
impl<C: Completion> Interpreter for CompletionInterpreter<C> {
    async fn interpret(
        &self,
        cluster_text: &str,
        category: &str,
        media: MediaCounts,
    ) -> InterpretResult<Vec<Candidate>> {
        let prompt = format_interpret_prompt(cluster_text, category, media, &self.schema);
        let reply = self.completion.complete(INTERPRET_SYSTEM_PROMPT, &prompt).await?;
        parse_reply(&reply)
    }

    fn name(&self) -> &str {
        "completion"
    }
}

#[async_trait]
impl<C: Completion> Adjudicator for CompletionInterpreter<C> {
    async fn adjudicate(&self, request: &AdjudicationRequest) -> InterpretResult<Adjudication> {
        let prompt = format_adjudicate_prompt(
            &request.conversation,
            &request.category,
            &request.entity_names,
            &self.adjudication_schema,
        );
        let reply = self
            .completion
            .complete(ADJUDICATE_SYSTEM_PROMPT, &prompt)
            .await?;
        parse_adjudication(&reply)
    }

    fn name(&self) -> &str {
        "completion"
    }
}
