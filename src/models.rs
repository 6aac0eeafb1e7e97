use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque Gmail message identifier
pub type MessageId = String;

/// System label carried by starred messages
pub const LABEL_STARRED: &str = "STARRED";
/// System label Gmail assigns to messages it considers important
pub const LABEL_IMPORTANT: &str = "IMPORTANT";
/// System label that moves a message to the trash
pub const LABEL_TRASH: &str = "TRASH";

/// A single message header as returned by the metadata format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Per-message metadata fetched for one invocation; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub id: MessageId,
    pub label_ids: BTreeSet<String>,
    pub snippet: String,
    pub headers: Vec<Header>,
}

impl MessageMetadata {
    /// Value of the first header whose name matches case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.contains(label)
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or("")
    }

    /// A message with a blank id cannot be acted upon
    pub fn has_resolvable_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<String>,
}

/// Why a message was kept out of the trash.
///
/// Variant order matches the decision order of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    Starred,
    Important,
    Sensitive,
}

impl SkipReason {
    pub const ALL: [SkipReason; 3] = [
        SkipReason::Starred,
        SkipReason::Important,
        SkipReason::Sensitive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Starred => "starred",
            SkipReason::Important => "important",
            SkipReason::Sensitive => "sensitive",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition produced by the classifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Ids eligible for the destructive action, in input order
    pub eligible: Vec<MessageId>,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl ClassificationResult {
    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// How often a normalized sender address appeared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCount {
    pub address: String,
    pub count: usize,
}
