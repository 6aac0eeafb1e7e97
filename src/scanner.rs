//! Message listing and metadata fetching
//!
//! Both stages issue their remote calls strictly one after another and never
//! retry: a failed page or fetch aborts the run. Retrying is reserved for the
//! idempotent label mutation in [`crate::mutator`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::client::GmailClient;
use crate::error::Result;
use crate::models::{MessageId, MessageMetadata};

/// Page size used for `messages.list` (the Gmail API maximum)
pub const PAGE_SIZE: u32 = 500;

/// Default number of messages previewed in a dry run
pub const DEFAULT_SAMPLE_COUNT: usize = 3;

/// Snippets longer than this many characters are truncated for display
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Marker appended to truncated snippets
pub const ELLIPSIS: char = '…';

/// Progress callback invoked once per fetched message
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Ids gathered by a search, and whether the limit cut it short
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub ids: Vec<MessageId>,
    /// More matches existed past the limit
    pub truncated: bool,
}

/// Collect message ids matching `query` across all result pages.
///
/// Stops as soon as `limit` ids have been gathered, without requesting the
/// next page.
pub async fn search_ids<C>(client: &C, query: &str, limit: Option<usize>) -> Result<Vec<MessageId>>
where
    C: GmailClient + ?Sized,
{
    search_ids_paged(client, query, limit, PAGE_SIZE).await
}

/// [`search_ids`] with an explicit page size
pub async fn search_ids_paged<C>(
    client: &C,
    query: &str,
    limit: Option<usize>,
    page_size: u32,
) -> Result<Vec<MessageId>>
where
    C: GmailClient + ?Sized,
{
    Ok(search(client, query, limit, page_size).await?.ids)
}

/// Paginated search that also reports whether the limit truncated the result
pub async fn search<C>(
    client: &C,
    query: &str,
    limit: Option<usize>,
    page_size: u32,
) -> Result<SearchOutcome>
where
    C: GmailClient + ?Sized,
{
    let mut outcome = SearchOutcome::default();
    if limit == Some(0) {
        return Ok(outcome);
    }

    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = client
            .list_messages_page(query, page_token.take(), page_size)
            .await?;
        pages += 1;
        debug!("Page {} returned {} ids", pages, page.ids.len());

        let next_page_token = page.next_page_token.filter(|t| !t.is_empty());
        let page_len = page.ids.len();

        for (index, id) in page.ids.into_iter().enumerate() {
            outcome.ids.push(id);
            if limit.is_some_and(|l| outcome.ids.len() >= l) {
                outcome.truncated = index + 1 < page_len || next_page_token.is_some();
                info!("Reached limit of {} ids after {} pages", outcome.ids.len(), pages);
                return Ok(outcome);
            }
        }

        match next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    info!("Found {} ids across {} pages", outcome.ids.len(), pages);
    Ok(outcome)
}

/// Fetch metadata for each id in order, one call per id
pub async fn fetch_metadata<C>(
    client: &C,
    ids: &[MessageId],
    headers: &[String],
) -> Result<Vec<MessageMetadata>>
where
    C: GmailClient + ?Sized,
{
    let mut metas = Vec::with_capacity(ids.len());
    for id in ids {
        metas.push(client.get_message(id, headers).await?);
    }
    Ok(metas)
}

/// [`fetch_metadata`] reporting each completed fetch to `on_progress`
pub async fn fetch_metadata_with_progress<C>(
    client: &C,
    ids: &[MessageId],
    headers: &[String],
    on_progress: ProgressCallback,
) -> Result<Vec<MessageMetadata>>
where
    C: GmailClient + ?Sized,
{
    let mut metas = Vec::with_capacity(ids.len());
    for id in ids {
        metas.push(client.get_message(id, headers).await?);
        on_progress();
    }
    Ok(metas)
}

/// Fetch the first `sample_count` messages and render them as
/// `[id] snippet` preview lines
pub async fn fetch_snippets<C>(
    client: &C,
    ids: &[MessageId],
    sample_count: usize,
) -> Result<Vec<String>>
where
    C: GmailClient + ?Sized,
{
    let sample = &ids[..ids.len().min(sample_count)];
    let mut lines = Vec::with_capacity(sample.len());

    for id in sample {
        let meta = client.get_message(id, &[]).await?;
        lines.push(format!("[{}] {}", id, format_snippet(&meta.snippet)));
    }

    Ok(lines)
}

/// Collapse line breaks, trim, and cap the snippet at [`SNIPPET_MAX_CHARS`]
pub fn format_snippet(snippet: &str) -> String {
    let collapsed = snippet.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() > SNIPPET_MAX_CHARS {
        let mut truncated: String = trimmed.chars().take(SNIPPET_MAX_CHARS).collect();
        truncated.push(ELLIPSIS);
        truncated
    } else {
        trimmed.to_string()
    }
}

/// Raw `From` header values, one per message that has one
pub fn extract_from_headers(metas: &[MessageMetadata]) -> Vec<String> {
    metas
        .iter()
        .filter_map(|m| m.header("From"))
        .map(str::to_string)
        .collect()
}

/// Fetch only the `From` header of each message
pub async fn fetch_from_headers<C>(client: &C, ids: &[MessageId]) -> Result<Vec<String>>
where
    C: GmailClient + ?Sized,
{
    let metas = fetch_metadata(client, ids, &["From".to_string()]).await?;
    Ok(extract_from_headers(&metas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Header;

    #[test]
    fn test_format_snippet_collapses_newlines_and_trims() {
        assert_eq!(format_snippet("  hello\nworld\r\n again \r"), "hello world  again");
    }

    #[test]
    fn test_format_snippet_truncates_long_text() {
        let snippet = "a".repeat(250);
        let formatted = format_snippet(&snippet);
        assert_eq!(formatted.chars().count(), 201);
        assert!(formatted.starts_with(&"a".repeat(200)));
        assert!(formatted.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_format_snippet_keeps_exact_length() {
        let snippet = "b".repeat(200);
        assert_eq!(format_snippet(&snippet), snippet);
    }

    #[test]
    fn test_format_snippet_counts_characters_not_bytes() {
        let snippet = "驗".repeat(201);
        let formatted = format_snippet(&snippet);
        assert_eq!(formatted.chars().count(), 201);
        assert_eq!(formatted.chars().filter(|c| *c == '驗').count(), 200);
    }

    #[test]
    fn test_extract_from_headers() {
        let metas = vec![
            MessageMetadata {
                id: "1".into(),
                headers: vec![Header::new("from", "a@x.com"), Header::new("From", "b@x.com")],
                ..Default::default()
            },
            MessageMetadata {
                id: "2".into(),
                headers: vec![Header::new("Subject", "no sender")],
                ..Default::default()
            },
            MessageMetadata {
                id: "3".into(),
                headers: vec![Header::new("FROM", "Carol <c@y.com>")],
                ..Default::default()
            },
        ];

        assert_eq!(extract_from_headers(&metas), vec!["a@x.com", "Carol <c@y.com>"]);
    }
}
