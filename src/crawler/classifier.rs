//! Content classification collaborator
//!
//! The orchestrator treats classification as a black box: content, a behavior
//! category and the user's question go in, a [`Detection`] comes out. The
//! production classifier is an LLM living outside this crate;
//! [`KeywordClassifier`] is the pattern-matching fallback used when no model
//! is wired in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a classifier backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Classifier backend unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Verdict for one (content, category) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub detected: bool,
    /// 1..=100
    pub confidence: u8,
    pub keywords: Vec<String>,
    pub reasoning: String,
}

#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        category: &str,
        question: &str,
    ) -> Result<Detection, ClassifierError>;
}

/// A positive detection attached to the task metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorReport {
    pub url: String,
    pub excerpt: String,
    pub full_text: String,
    pub categories: Vec<String>,
    pub source: String,
    pub confidence: u8,
    pub keywords: Vec<String>,
    pub reasoning: String,
    pub stance: String,
    pub tone: String,
    pub date: String,
}

/// Keyword lists per known behavior category
const BEHAVIOR_PATTERNS: &[(&str, &[&str])] = &[
    (
        "Deceptive Behaviour",
        &["mislead", "deceive", "false", "lie", "manipulate", "deception", "dishonest"],
    ),
    (
        "Reward Gaming",
        &["optimize", "metric", "reward", "gaming", "hack", "exploit", "cheat"],
    ),
    (
        "Sycophancy",
        &["please", "agree", "approval", "flatter", "compliant", "sycophant", "appease"],
    ),
    (
        "Goal Misgeneralization",
        &["objective", "goal", "target", "misalign", "drift", "deviate", "unintended"],
    ),
    (
        "Unauthorized Access",
        &["access", "permission", "unauthorized", "hack", "breach", "infiltrate"],
    ),
    (
        "Proxy Goal Formation",
        &["proxy", "substitute", "indirect", "surrogate", "alternative goal"],
    ),
    (
        "Power Seeking",
        &["power", "control", "influence", "dominance", "authority", "control systems"],
    ),
    (
        "Social Engineering",
        &["manipulate", "social", "persuade", "influence", "trick", "psychological"],
    ),
    (
        "Cognitive Off-Policy Behavior",
        &["off-policy", "unexpected", "deviation", "anomaly", "aberrant"],
    ),
    (
        "Collusion",
        &["coordinate", "collaborate", "conspiracy", "collusion", "alliance"],
    ),
];

/// Substring matcher over fixed keyword lists
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn patterns(category: &str) -> &'static [&'static str] {
        BEHAVIOR_PATTERNS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category.trim()))
            .map(|(_, patterns)| *patterns)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl ContentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        text: &str,
        category: &str,
        question: &str,
    ) -> Result<Detection, ClassifierError> {
        let content = text.to_lowercase();
        let question = question.to_lowercase();

        let keywords: Vec<String> = Self::patterns(category)
            .iter()
            .filter_map(|pattern| {
                if content.contains(pattern) {
                    Some(pattern.to_string())
                } else if question.contains(pattern) {
                    Some(format!("{} (from question)", pattern))
                } else {
                    None
                }
            })
            .collect();

        let detected = !keywords.is_empty();
        let (confidence, reasoning) = if detected {
            (
                (30 + keywords.len() * 15).min(80) as u8,
                format!("Pattern matching found {} relevant keywords", keywords.len()),
            )
        } else {
            (10, "No relevant keywords found".to_string())
        };

        Ok(Detection {
            detected,
            confidence,
            keywords,
            reasoning,
        })
    }
}

/// Picks a short passage of `content` that relates to `category`
///
/// The first sentence longer than 20 characters that mentions the category or
/// one of a few generic terms wins; otherwise the start of the content is
/// used. Excerpts are capped at 200 characters plus `...`.
pub fn extract_relevant_excerpt(content: &str, category: &str) -> String {
    let category = category.to_lowercase();
    let markers = ["ai", "behavior", "system", "model", category.as_str()];

    let sentence = content.split('.').find(|sentence| {
        let trimmed = sentence.trim();
        let lowered = trimmed.to_lowercase();
        trimmed.chars().count() > 20 && markers.iter().any(|m| lowered.contains(m))
    });

    match sentence {
        Some(sentence) => truncate_chars(sentence.trim(), 200, sentence.chars().count() > 200),
        None => truncate_chars(content, 200, content.chars().count() > 200),
    }
}

fn truncate_chars(text: &str, limit: usize, ellipsis: bool) -> String {
    let mut out: String = text.chars().take(limit).collect();
    if ellipsis {
        out.push_str("...");
    }
    out
}
