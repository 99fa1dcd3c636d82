//! Tavily web-search client

use super::{SearchProvider, SearchResult};
use crate::config::SearchConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// [`SearchProvider`] backed by the Tavily search API
pub struct TavilySearch {
    http: Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(config: &SearchConfig, api_key: String, timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build search client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<SearchResult>> {
        let url = format!("{}/search", self.base_url);
        let request = SearchRequest {
            query,
            max_results,
            search_depth: "basic",
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::SearchProvider(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchProvider(format!(
                "status {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::SearchProvider(format!("invalid response: {}", e)))?;

        Ok(parsed.results)
    }
}
