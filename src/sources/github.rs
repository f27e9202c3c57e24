//! GitHub pull requests via the issue search API.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use digest_core::{DayWindow, DigestError, DigestResult, PrState, PullRequestSummary, Service};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::GitHubConfig;
use crate::http::get_json;

const PER_PAGE: usize = 100;
const MAX_PAGES: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: usize,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    html_url: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

impl SearchItem {
    fn state(&self) -> PrState {
        let merged = self
            .pull_request
            .as_ref()
            .is_some_and(|pr| pr.merged_at.is_some());
        match (merged, self.state.as_str()) {
            (true, _) => PrState::Merged,
            (false, "closed") => PrState::Closed,
            _ => PrState::Open,
        }
    }

    fn into_summary(self, repo: &str) -> PullRequestSummary {
        PullRequestSummary {
            state: self.state(),
            title: self.title,
            repo: repo.to_string(),
            url: self.html_url,
        }
    }
}

pub struct GitHub<'a> {
    http: &'a Client,
    config: &'a GitHubConfig,
}

impl<'a> GitHub<'a> {
    pub fn new(http: &'a Client, config: &'a GitHubConfig) -> Self {
        Self { http, config }
    }

    /// The configured login, or the token owner's.
    pub async fn user(&self) -> DigestResult<String> {
        if let Some(user) = &self.config.user {
            return Ok(user.clone());
        }

        let user: User = get_json(Service::GitHub, self.get(self.endpoint("user"))).await?;
        debug!(login = %user.login, "Resolved GitHub user from token");
        Ok(user.login)
    }

    /// Pull requests in the configured repos that `user` took part in and
    /// whose activity span `[created_at, updated_at]` overlaps `window`.
    ///
    /// Results keep fetch order; a PR found by more than one query is listed once.
    pub async fn fetch_prs(&self, user: &str, window: &DayWindow) -> DigestResult<Vec<PullRequestSummary>> {
        let since = window.start_utc().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut seen = HashSet::new();
        let mut prs = Vec::new();

        for repo in &self.config.repos {
            for role in ["involves", "reviewed-by"] {
                let query = format!("repo:{repo} is:pr {role}:{user} updated:>={since}");
                for item in self.search(&query).await? {
                    if !window.overlaps(&item.created_at, &item.updated_at) {
                        continue;
                    }
                    if seen.insert(item.html_url.clone()) {
                        prs.push(item.into_summary(repo));
                    }
                }
            }
        }

        info!(count = prs.len(), "Fetched pull requests");
        Ok(prs)
    }

    async fn search(&self, query: &str) -> DigestResult<Vec<SearchItem>> {
        let url = self.endpoint("search/issues");
        let per_page = PER_PAGE.to_string();
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let page_number = page.to_string();
            let request = self.get(url.clone()).query(&[
                ("q", query),
                ("per_page", per_page.as_str()),
                ("page", page_number.as_str()),
            ]);
            let response: SearchResponse = get_json(Service::GitHub, request).await?;

            let received = response.items.len();
            items.extend(response.items);
            debug!(query, page, received, total = response.total_count, "GitHub search page");

            if received < PER_PAGE || items.len() >= response.total_count {
                return Ok(items);
            }
        }

        Err(DigestError::malformed(
            Service::GitHub,
            format!("search '{query}' still had results after {MAX_PAGES} pages"),
        ))
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.config.api_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{path}"));
        url
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}
