//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use gmail_trash::client::GmailClient;
use gmail_trash::error::{GmailError, Result};
use gmail_trash::models::{Header, MessageId, MessageMetadata, MessagePage, LABEL_TRASH};
use mockall::mock;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use gmail_trash::mutator::{BatchMutator, RetryPolicy};

/// Create a test message with a subject, sender and labels
pub fn create_test_message(id: &str, from: &str, subject: &str, labels: &[&str]) -> MessageMetadata {
    MessageMetadata {
        id: id.to_string(),
        label_ids: labels.iter().map(|l| l.to_string()).collect(),
        snippet: format!("Snippet for {}", id),
        headers: vec![Header::new("Subject", subject), Header::new("From", from)],
    }
}

/// Plain inbox message that nothing protects
pub fn create_plain_message(id: &str) -> MessageMetadata {
    create_test_message(id, "News <news@shop.example>", "Weekly deals", &["INBOX"])
}

/// `count` plain messages with ids `m0000`, `m0001`, ...
pub fn create_plain_messages(count: usize) -> Vec<MessageMetadata> {
    (0..count).map(|i| create_plain_message(&format!("m{:04}", i))).collect()
}

/// Retry policy with millisecond backoff so tests do not sleep for seconds
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

pub fn fast_mutator() -> BatchMutator {
    BatchMutator::new(fast_retry_policy())
}

pub fn service_unavailable() -> GmailError {
    GmailError::ServerError {
        status: 503,
        message: "Service unavailable".to_string(),
    }
}

/// One recorded `batch_modify` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
    pub ids: Vec<MessageId>,
    pub add_label_ids: Vec<String>,
    pub remove_label_ids: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    messages: Vec<MessageMetadata>,
    batch_script: VecDeque<Option<GmailError>>,
    list_calls: Vec<(String, Option<String>, u32)>,
    get_calls: Vec<(MessageId, Vec<String>)>,
    batch_calls: Vec<BatchCall>,
}

/// In-memory mailbox that behaves like the Gmail endpoints the tool uses.
///
/// Search ignores the query text and returns every message outside the
/// trash, in insertion order. Page tokens are offsets. Label changes are
/// applied to the stored messages, so a second run sees the new state.
#[derive(Default)]
pub struct FakeGmailClient {
    state: Mutex<FakeState>,
}

impl FakeGmailClient {
    pub fn new(messages: Vec<MessageMetadata>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                messages,
                ..FakeState::default()
            }),
        }
    }

    /// Make the next `batch_modify` calls fail with these errors, in order
    pub fn fail_batches_with(&self, errors: Vec<GmailError>) {
        self.fail_batches_after(0, errors);
    }

    /// Let `successes` batch calls through, then fail the next ones in order
    pub fn fail_batches_after(&self, successes: usize, errors: Vec<GmailError>) {
        let mut state = self.state.lock().unwrap();
        state.batch_script.extend((0..successes).map(|_| None));
        state.batch_script.extend(errors.into_iter().map(Some));
    }

    pub fn list_calls(&self) -> Vec<(String, Option<String>, u32)> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn get_calls(&self) -> Vec<(MessageId, Vec<String>)> {
        self.state.lock().unwrap().get_calls.clone()
    }

    pub fn batch_calls(&self) -> Vec<BatchCall> {
        self.state.lock().unwrap().batch_calls.clone()
    }

    pub fn message(&self, id: &str) -> Option<MessageMetadata> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn ids_with_label(&self, label: &str) -> Vec<MessageId> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.has_label(label))
            .map(|m| m.id.clone())
            .collect()
    }
}

#[async_trait]
impl GmailClient for FakeGmailClient {
    async fn list_messages_page(
        &self,
        query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<MessagePage> {
        let mut state = self.state.lock().unwrap();
        state
            .list_calls
            .push((query.to_string(), page_token.clone(), max_results));

        let visible: Vec<MessageId> = state
            .messages
            .iter()
            .filter(|m| !m.has_label(LABEL_TRASH))
            .map(|m| m.id.clone())
            .collect();

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| GmailError::BadRequest(format!("Invalid page token: {}", token)))?,
            None => 0,
        };
        let end = (offset + max_results as usize).min(visible.len());
        let ids = visible.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_page_token = (end < visible.len()).then(|| end.to_string());

        Ok(MessagePage {
            ids,
            next_page_token,
        })
    }

    async fn get_message(&self, id: &str, headers: &[String]) -> Result<MessageMetadata> {
        let mut state = self.state.lock().unwrap();
        state.get_calls.push((id.to_string(), headers.to_vec()));

        let mut meta = state
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| GmailError::MessageNotFound(id.to_string()))?;

        if !headers.is_empty() {
            meta.headers
                .retain(|h| headers.iter().any(|wanted| wanted.eq_ignore_ascii_case(&h.name)));
        }
        Ok(meta)
    }

    async fn batch_modify(
        &self,
        message_ids: &[MessageId],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.batch_calls.push(BatchCall {
            ids: message_ids.to_vec(),
            add_label_ids: add_label_ids.to_vec(),
            remove_label_ids: remove_label_ids.to_vec(),
        });

        if let Some(Some(error)) = state.batch_script.pop_front() {
            return Err(error);
        }

        for meta in state.messages.iter_mut() {
            if message_ids.contains(&meta.id) {
                meta.label_ids.extend(add_label_ids.iter().cloned());
                for label in remove_label_ids {
                    meta.label_ids.remove(label);
                }
            }
        }
        Ok(())
    }
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_messages_page(
            &self,
            query: &str,
            page_token: Option<String>,
            max_results: u32,
        ) -> Result<MessagePage>;
        async fn get_message(&self, id: &str, headers: &[String]) -> Result<MessageMetadata>;
        async fn batch_modify(
            &self,
            message_ids: &[MessageId],
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "a@x.com", "Hello", &["INBOX", "STARRED"]);
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.subject(), "Hello");
        assert_eq!(msg.header("from"), Some("a@x.com"));
        assert!(msg.has_label("STARRED"));
    }

    #[tokio::test]
    async fn test_fake_client_pages_by_offset() {
        let client = FakeGmailClient::new(create_plain_messages(5));

        let first = client.list_messages_page("q", None, 2).await.unwrap();
        assert_eq!(first.ids, vec!["m0000", "m0001"]);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let last = client
            .list_messages_page("q", Some("4".to_string()), 2)
            .await
            .unwrap();
        assert_eq!(last.ids, vec!["m0004"]);
        assert_eq!(last.next_page_token, None);
    }

    #[tokio::test]
    async fn test_fake_client_hides_trashed_messages() {
        let client = FakeGmailClient::new(create_plain_messages(3));
        client
            .batch_modify(&["m0001".to_string()], &[LABEL_TRASH.to_string()], &[])
            .await
            .unwrap();

        let page = client.list_messages_page("q", None, 10).await.unwrap();
        assert_eq!(page.ids, vec!["m0000", "m0002"]);
    }

    #[tokio::test]
    async fn test_fake_client_filters_requested_headers() {
        let client = FakeGmailClient::new(create_plain_messages(1));
        let meta = client
            .get_message("m0000", &["From".to_string()])
            .await
            .unwrap();
        assert_eq!(meta.headers.len(), 1);
        assert_eq!(meta.subject(), "");
    }
}
