//! Jira Cloud: assigned issues by status and the day's status transitions.

use chrono::{DateTime, Duration, Utc};
use digest_core::{
    DayWindow, DigestError, DigestResult, IssueReport, IssueSummary, Service, StatusMovement,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::JiraConfig;
use crate::http::get_json;

const MAX_RESULTS: u32 = 100;
const MAX_SEARCH_PAGES: usize = 50;

/// Issues assigned to the user and touched recently, grouped later by status.
const CURRENT_ISSUES_JQL: &str =
    "assignee = currentUser() AND updated >= -30d ORDER BY status ASC, updated DESC";

/// `2025-09-19T14:03:00.000-0300`
const JIRA_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    issues: Vec<Issue>,
    next_page_token: Option<String>,
    is_last: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    summary: Option<String>,
    status: Option<NamedField>,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangelogPage {
    #[serde(default)]
    values: Vec<History>,
    start_at: usize,
    total: Option<usize>,
    is_last: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct History {
    created: String,
    #[serde(default)]
    items: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryItem {
    field: String,
    from_string: Option<String>,
    #[serde(rename = "toString")]
    to_status: Option<String>,
}

impl Issue {
    fn title(&self) -> String {
        self.fields.summary.clone().unwrap_or_default()
    }

    fn status(&self) -> Option<&str> {
        self.fields.status.as_ref().map(|s| s.name.as_str())
    }
}

pub struct Jira<'a> {
    http: &'a Client,
    config: &'a JiraConfig,
}

impl<'a> Jira<'a> {
    pub fn new(http: &'a Client, config: &'a JiraConfig) -> Self {
        Self { http, config }
    }

    /// Current issues in tracked statuses plus the status movements on `window`.
    pub async fn fetch_issue_status(&self, window: &DayWindow) -> DigestResult<IssueReport> {
        let current = self.current_issues().await?;
        let movements = self.movements(window).await?;
        info!(
            current = current.len(),
            movements = movements.len(),
            "Fetched Jira issues"
        );
        Ok(IssueReport { current, movements })
    }

    async fn current_issues(&self) -> DigestResult<Vec<IssueSummary>> {
        let tracked = &self.config.tracked_statuses;

        let issues = self
            .search(CURRENT_ISSUES_JQL)
            .await?
            .into_iter()
            .filter_map(|issue| {
                let status = issue.status()?;
                let bucket = tracked.iter().find(|t| t.eq_ignore_ascii_case(status))?;
                Some(IssueSummary {
                    title: issue.title(),
                    key: issue.key,
                    status: bucket.clone(),
                })
            })
            .collect();

        Ok(issues)
    }

    async fn movements(&self, window: &DayWindow) -> DigestResult<Vec<StatusMovement>> {
        // One day of slack so late-evening updates in western zones are not missed
        let since = window.date() - Duration::days(1);
        let jql = format!(
            "assignee = currentUser() AND updated >= \"{}\" ORDER BY updated DESC",
            since.format("%Y-%m-%d")
        );

        let mut movements = Vec::new();
        for issue in self.search(&jql).await? {
            let title = issue.title();
            for history in self.changelog(&issue.key).await? {
                let at = parse_jira_time(&history.created)?;
                for item in history.items.into_iter().filter(|i| i.field == "status") {
                    movements.push(StatusMovement {
                        issue_key: issue.key.clone(),
                        issue_title: title.clone(),
                        from: item.from_string.unwrap_or_default(),
                        to: item.to_status.unwrap_or_default(),
                        at,
                    });
                }
            }
        }

        Ok(window.points(movements))
    }

    async fn search(&self, jql: &str) -> DigestResult<Vec<Issue>> {
        let url = self.endpoint("rest/api/3/search/jql");
        let max_results = MAX_RESULTS.to_string();
        let mut issues = Vec::new();
        let mut next_page_token: Option<String> = None;

        for _ in 0..MAX_SEARCH_PAGES {
            let mut request = self.get(url.clone()).query(&[
                ("jql", jql),
                ("fields", "summary,status"),
                ("maxResults", max_results.as_str()),
            ]);
            if let Some(token) = &next_page_token {
                request = request.query(&[("nextPageToken", token.as_str())]);
            }

            let page: SearchPage = get_json(Service::Jira, request).await?;
            debug!(jql, received = page.issues.len(), "Jira search page");
            issues.extend(page.issues);

            match page.next_page_token {
                Some(token) if page.is_last != Some(true) => next_page_token = Some(token),
                _ => return Ok(issues),
            }
        }

        Err(DigestError::malformed(
            Service::Jira,
            format!("search still had more pages after {MAX_SEARCH_PAGES}"),
        ))
    }

    async fn changelog(&self, key: &str) -> DigestResult<Vec<History>> {
        let url = self.endpoint(&format!("rest/api/3/issue/{key}/changelog"));
        let max_results = MAX_RESULTS.to_string();
        let mut histories = Vec::new();
        let mut start_at = 0;

        loop {
            let start = start_at.to_string();
            let request = self.get(url.clone()).query(&[
                ("startAt", start.as_str()),
                ("maxResults", max_results.as_str()),
            ]);

            let page: ChangelogPage = get_json(Service::Jira, request).await?;
            let received = page.values.len();
            histories.extend(page.values);
            start_at = page.start_at + received;

            let exhausted = page.is_last == Some(true)
                || received == 0
                || page.total.is_some_and(|total| start_at >= total);
            if exhausted {
                break;
            }
        }

        Ok(histories)
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.config.base_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{path}"));
        url
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.config.email, Some(&self.config.token))
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

fn parse_jira_time(value: &str) -> DigestResult<DateTime<Utc>> {
    DateTime::parse_from_str(value, JIRA_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DigestError::malformed(Service::Jira, format!("unreadable changelog time '{value}'")))
}
