//! Optional web-search context augmentation
//!
//! When a chat request sets `useSearch`, the latest user turn is sent to a
//! [`SearchProvider`] and the results are inserted as one system message
//! directly before that turn. Search failures never fail the request.

pub mod tavily;

use crate::config::SearchConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::pipeline::types::{Message, Role};
use async_trait::async_trait;
use tokio::time::Instant;

pub use tavily::TavilySearch;

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// External web-search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run `query` and return at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<SearchResult>>;
}

/// Index of the final user turn, if any
fn last_user_index(messages: &[Message]) -> Option<usize> {
    messages.iter().rposition(|m| m.role == Role::User)
}

/// Search query derived from the final user turn, truncated to `max_chars`
pub fn build_query(messages: &[Message], max_chars: usize) -> Option<String> {
    let index = last_user_index(messages)?;
    let text = messages[index].content.text();
    let query: String = text.trim().chars().take(max_chars).collect();
    let query = query.trim().to_string();
    (!query.is_empty()).then_some(query)
}

/// Render results as the synthetic system message body
pub fn format_results(results: &[SearchResult]) -> String {
    let mut context = String::from(
        "Web search results for the user's latest question. \
         Use them when relevant and cite the URLs you rely on.\n",
    );
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!(
            "\n[{}] Title: {}\nURL: {}\nContent: {}\n",
            i + 1,
            result.title,
            result.url,
            result.content
        ));
    }
    context
}

/// Insert search context before the final user turn
///
/// Returns `messages` unchanged when there is no provider, no usable query,
/// no results, or the provider fails. A search still running at `deadline`
/// counts as a failure.
pub async fn augment(
    mut messages: Vec<Message>,
    provider: Option<&dyn SearchProvider>,
    config: &SearchConfig,
    metrics: &Metrics,
    deadline: Instant,
) -> Vec<Message> {
    let Some(provider) = provider else {
        tracing::debug!("Search requested but no search provider is configured, skipping");
        return messages;
    };

    let Some(query) = build_query(&messages, config.max_query_chars) else {
        tracing::debug!("No user text to search for, skipping augmentation");
        return messages;
    };

    let search = tokio::time::timeout_at(deadline, provider.search(&query, config.max_results));
    let outcome = search.await.unwrap_or_else(|_| {
        Err(AppError::SearchProvider(
            "search did not finish within its time budget".to_string(),
        ))
    });

    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            metrics.search_failure();
            tracing::warn!(
                error = %e,
                query_chars = query.chars().count(),
                "Search provider failed, continuing without augmentation"
            );
            return messages;
        }
    };

    if results.is_empty() {
        tracing::debug!("Search returned no results");
        return messages;
    }

    let results: Vec<_> = results.into_iter().take(config.max_results).collect();
    tracing::info!(results = results.len(), "Injecting web search context");

    // build_query succeeded, so a user turn exists
    if let Some(index) = last_user_index(&messages) {
        messages.insert(index, Message::system(format_results(&results)));
    }
    messages
}
