//! Gmail API capability used by the lister, fetcher and batch mutator

use async_trait::async_trait;
use google_gmail1::api::{BatchModifyMessagesRequest, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{GmailError, Result};
use crate::models::{Header, MessageId, MessageMetadata, MessagePage};

/// Scope every call is issued under
const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Narrow set of Gmail operations the trash pipeline needs.
///
/// Keeping the surface this small lets tests substitute an in-memory double
/// without any network access.
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// Fetch one page of message ids matching `query`
    async fn list_messages_page(
        &self,
        query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<MessagePage>;

    /// Fetch labels, snippet and the requested headers of one message
    async fn get_message(&self, id: &str, headers: &[String]) -> Result<MessageMetadata>;

    /// Add and remove labels on up to 1000 messages in one call
    async fn batch_modify(
        &self,
        message_ids: &[MessageId],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Production Gmail client backed by the generated API hub.
///
/// Calls are issued one at a time; each is bounded by a request timeout that
/// surfaces as [`GmailError::NetworkError`].
pub struct ProductionGmailClient {
    hub: GmailHub,
    user_id: String,
    request_timeout: Duration,
}

impl ProductionGmailClient {
    /// Create a client acting on the authenticated user ("me")
    pub fn new(hub: GmailHub) -> Self {
        Self {
            hub,
            user_id: "me".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn with_timeout_guard<T, F>(&self, operation_name: &str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Gmail API {} call timed out after {:?}",
                    operation_name, self.request_timeout
                );
                Err(GmailError::NetworkError(format!(
                    "API call timed out after {:?}",
                    self.request_timeout
                )))
            }
        }
    }
}

/// Convert a Gmail API message into our metadata record.
///
/// A missing id is kept as an empty string so that downstream filtering can
/// drop the record instead of failing the whole run.
pub fn parse_message_metadata(msg: Message) -> MessageMetadata {
    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| match (h.name, h.value) {
            (Some(name), Some(value)) => Some(Header { name, value }),
            _ => None,
        })
        .collect();

    MessageMetadata {
        id: msg.id.unwrap_or_default(),
        label_ids: msg.label_ids.unwrap_or_default().into_iter().collect(),
        snippet: msg.snippet.unwrap_or_default(),
        headers,
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_messages_page(
        &self,
        query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<MessagePage> {
        self.with_timeout_guard("messages.list", async {
            let mut call = self
                .hub
                .users()
                .messages_list(&self.user_id)
                .q(query)
                .max_results(max_results);

            if let Some(token) = page_token.as_deref() {
                call = call.page_token(token);
            }

            let (_, response) = call.add_scope(MODIFY_SCOPE).doit().await?;

            let ids: Vec<MessageId> = response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id)
                .collect();

            debug!("messages.list returned {} ids", ids.len());
            Ok(MessagePage {
                ids,
                next_page_token: response.next_page_token,
            })
        })
        .await
    }

    async fn get_message(&self, id: &str, headers: &[String]) -> Result<MessageMetadata> {
        self.with_timeout_guard("messages.get", async {
            let mut call = self
                .hub
                .users()
                .messages_get(&self.user_id, id)
                .format("metadata");

            for header in headers {
                call = call.add_metadata_headers(header);
            }

            let (_, msg) = call.add_scope(MODIFY_SCOPE).doit().await?;
            Ok(parse_message_metadata(msg))
        })
        .await
    }

    async fn batch_modify(
        &self,
        message_ids: &[MessageId],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let request = BatchModifyMessagesRequest {
            ids: Some(message_ids.to_vec()),
            add_label_ids: (!add_label_ids.is_empty()).then(|| add_label_ids.to_vec()),
            remove_label_ids: (!remove_label_ids.is_empty()).then(|| remove_label_ids.to_vec()),
        };

        self.with_timeout_guard("messages.batchModify", async {
            self.hub
                .users()
                .messages_batch_modify(request, &self.user_id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;
            Ok(())
        })
        .await
    }
}

// Shared ownership of any client
#[async_trait]
impl<T> GmailClient for Arc<T>
where
    T: GmailClient + ?Sized,
{
    async fn list_messages_page(
        &self,
        query: &str,
        page_token: Option<String>,
        max_results: u32,
    ) -> Result<MessagePage> {
        self.as_ref()
            .list_messages_page(query, page_token, max_results)
            .await
    }

    async fn get_message(&self, id: &str, headers: &[String]) -> Result<MessageMetadata> {
        self.as_ref().get_message(id, headers).await
    }

    async fn batch_modify(
        &self,
        message_ids: &[MessageId],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        self.as_ref()
            .batch_modify(message_ids, add_label_ids, remove_label_ids)
            .await
    }
}
