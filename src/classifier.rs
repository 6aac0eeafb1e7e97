//! Safety classification of messages before they are trashed
//!
//! Every message lands in exactly one bucket. The checks run in a fixed
//! order and the first one that fires wins:
//!
//! 1. starred (when `skip_starred`)
//! 2. important (when `skip_important`)
//! 3. sensitive keyword in subject or snippet (when `skip_sensitive`)
//! 4. otherwise eligible for trash
//!
//! The order decides which reason a message is counted under; it is product
//! policy and changing it changes the reported skip counts.

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use crate::error::{GmailError, Result};
use crate::models::{
    ClassificationResult, MessageId, MessageMetadata, SkipReason, LABEL_IMPORTANT, LABEL_STARRED,
};

/// Default keywords marking credentials, one-time codes and similar mail
pub fn default_sensitive_keywords() -> Vec<String> {
    [
        "password",
        "passcode",
        "verification code",
        "verify code",
        "security code",
        "login code",
        "authentication code",
        "one-time password",
        "otp",
        "2fa",
        "two-factor",
        "token",
        "密碼",
        "驗證碼",
        "認證碼",
        "安全碼",
        "一次性密碼",
        "動態密碼",
        "登入碼",
        "兩步驟驗證",
        "權杖",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Which skip filters are active, plus the keyword list for the sensitive check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub skip_starred: bool,
    pub skip_important: bool,
    pub skip_sensitive: bool,
    pub sensitive_keywords: Vec<String>,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            skip_starred: true,
            skip_important: true,
            skip_sensitive: true,
            sensitive_keywords: default_sensitive_keywords(),
        }
    }
}

/// Case-insensitive substring matcher over a keyword list
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    pattern: Option<Regex>,
}

impl KeywordMatcher {
    /// Build a matcher; blank keywords are ignored
    pub fn new(keywords: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()
            .map_err(|e| GmailError::ConfigError(format!("Invalid sensitive keyword list: {}", e)))?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }
}

/// Subject and snippet joined for keyword scanning
fn searchable_text(meta: &MessageMetadata) -> String {
    format!("{} {}", meta.subject(), meta.snippet)
}

/// Decide the skip reason for one message, or `None` if it may be trashed
pub fn skip_reason(
    meta: &MessageMetadata,
    options: &ClassifyOptions,
    matcher: &KeywordMatcher,
) -> Option<SkipReason> {
    if options.skip_starred && meta.has_label(LABEL_STARRED) {
        Some(SkipReason::Starred)
    } else if options.skip_important && meta.has_label(LABEL_IMPORTANT) {
        Some(SkipReason::Important)
    } else if options.skip_sensitive && matcher.is_match(&searchable_text(meta)) {
        Some(SkipReason::Sensitive)
    } else {
        None
    }
}

/// Partition messages into trash-eligible ids and per-reason skip counts.
///
/// Messages without a usable id are dropped and counted nowhere.
pub fn classify(metas: &[MessageMetadata], options: &ClassifyOptions) -> Result<ClassificationResult> {
    let matcher = KeywordMatcher::new(&options.sensitive_keywords)?;
    Ok(classify_with(metas, options, &matcher))
}

/// [`classify`] with a prebuilt matcher
pub fn classify_with(
    metas: &[MessageMetadata],
    options: &ClassifyOptions,
    matcher: &KeywordMatcher,
) -> ClassificationResult {
    let mut result = ClassificationResult::default();

    for meta in metas.iter().filter(|m| m.has_resolvable_id()) {
        match skip_reason(meta, options, matcher) {
            Some(reason) => *result.skipped.entry(reason).or_insert(0) += 1,
            None => result.eligible.push(meta.id.clone()),
        }
    }

    result
}

/// Ids of important messages that are not starred yet, first occurrence only
pub fn important_unstarred(metas: &[MessageMetadata]) -> Vec<MessageId> {
    let mut seen = HashSet::new();
    metas
        .iter()
        .filter(|m| m.has_resolvable_id())
        .filter(|m| m.has_label(LABEL_IMPORTANT) && !m.has_label(LABEL_STARRED))
        .filter(|m| seen.insert(m.id.clone()))
        .map(|m| m.id.clone())
        .collect()
}
