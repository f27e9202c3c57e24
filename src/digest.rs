//! One digest run: fetch everything, render, write.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use digest_core::{DayWindow, Digest, DigestResult, render};
use reqwest::Client;
use tracing::info;

use crate::config::{Config, expand_home};
use crate::sources::{Calendar, GitHub, Jira};

/// Where the rendered report goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// Resolve an output path template; `{date}` becomes the target date.
    pub fn file(template: &str, date: NaiveDate) -> Self {
        let path = template.replace("{date}", &date.format("%Y-%m-%d").to_string());
        Destination::File(expand_home(&path))
    }
}

/// Fetch pull requests, issues and calendar events for `date`, in that order.
/// The first failing service aborts the run.
pub async fn build_digest(http: &Client, config: &Config, date: NaiveDate) -> DigestResult<Digest> {
    let window = DayWindow::new(date, config.timezone);
    info!(
        %date,
        timezone = config.timezone.name(),
        start = %window.start(),
        end = %window.end(),
        "Building digest"
    );

    let github = GitHub::new(http, &config.github);
    let user = github.user().await?;
    let pull_requests = github.fetch_prs(&user, &window).await?;

    let issues = Jira::new(http, &config.jira)
        .fetch_issue_status(&window)
        .await?;

    let events = Calendar::new(http, &config.calendar)
        .fetch_calendar_events(&window)
        .await?;

    Ok(Digest {
        date,
        timezone: config.timezone,
        status_order: config.jira.tracked_statuses.clone(),
        pull_requests,
        issues,
        events,
    })
}

/// Build, render and deliver the digest. Nothing is written unless every
/// service succeeded.
pub async fn run(
    http: &Client,
    config: &Config,
    date: NaiveDate,
    destination: &Destination,
) -> DigestResult<()> {
    let digest = build_digest(http, config, date).await?;
    let report = render(&digest);

    match destination {
        Destination::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.as_bytes())?;
            stdout.flush()?;
        }
        Destination::File(path) => {
            write_atomically(path, &report)?;
            println!("Digest written to {}", path.display());
        }
    }

    Ok(())
}

/// Write through a temporary file in the same directory, then rename over
/// the target.
fn write_atomically(path: &Path, content: &str) -> DigestResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    info!(path = %path.display(), "Wrote digest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CalendarSource, GitHubConfig, JiraConfig};
    use crate::http::build_client;
    use chrono_tz::America::Sao_Paulo;
    use digest_core::{DigestError, Service};
    use serde_json::json;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = "BEGIN:VCALENDAR\n\
VERSION:2.0\n\
BEGIN:VEVENT\n\
UID:standup\n\
SUMMARY:Standup\n\
DTSTART;TZID=America/Sao_Paulo:20250919T090000\n\
DTEND;TZID=America/Sao_Paulo:20250919T093000\n\
END:VEVENT\n\
END:VCALENDAR\n";

    fn config(server: &MockServer) -> Config {
        let base = Url::parse(&server.uri()).unwrap();
        Config {
            github: GitHubConfig {
                token: "ghp_test".into(),
                repos: vec!["acme/api".into()],
                user: Some("octocat".into()),
                api_url: base.clone(),
            },
            jira: JiraConfig {
                base_url: base.clone(),
                email: "dev@acme.test".into(),
                token: "jira-token".into(),
                tracked_statuses: vec!["In Progress".into()],
            },
            calendar: CalendarSource::IcsUrl(base.join("basic.ics").unwrap()),
            timezone: Sao_Paulo,
            output_file: None,
            http_timeout: Duration::from_secs(5),
            log_level: None,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 19).unwrap()
    }

    async fn mount_github(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "items": [{
                    "title": "Fix login",
                    "html_url": "https://github.com/acme/api/pull/1",
                    "state": "closed",
                    "created_at": "2025-09-18T12:00:00Z",
                    "updated_at": "2025-09-19T15:00:00Z",
                    "pull_request": { "merged_at": "2025-09-19T15:00:00Z" }
                }]
            })))
            .mount(server)
            .await;
    }

    async fn mount_calendar(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/basic.ics"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/calendar")
                    .set_body_string(FEED),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn writes_full_report_to_file() {
        let server = MockServer::start().await;
        mount_github(&server).await;
        mount_calendar(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/api/3/search/jql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issues": [{ "key": "ABC-1", "fields": { "summary": "Build the thing", "status": { "name": "In Progress" } } }],
                "isLast": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/3/issue/ABC-1/changelog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "total": 1,
                "isLast": true,
                "values": [{
                    "created": "2025-09-19T14:03:00.000-0300",
                    "items": [{ "field": "status", "fromString": "To Do", "toString": "In Progress" }]
                }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let template = format!("{}/reports/daily_report_{{date}}.txt", dir.path().display());
        let destination = Destination::file(&template, date());
        let Destination::File(path) = &destination else {
            panic!("Expected a file destination");
        };
        assert!(path.ends_with("reports/daily_report_2025-09-19.txt"));

        let http = build_client(Duration::from_secs(5)).unwrap();
        run(&http, &config(&server), date(), &destination).await.unwrap();

        let expected = "\
Daily digest for 2025-09-19 (America/Sao_Paulo)

Pull requests
-------------
- [acme/api] Fix login (merged) - https://github.com/acme/api/pull/1

Issues in progress
------------------
In Progress:
  - ABC-1: Build the thing

Status movements
----------------
ABC-1: Build the thing
  - 14:03 To Do -> In Progress

Calendar
--------
- 09:00-09:30 Standup
";
        assert_eq!(std::fs::read_to_string(path).unwrap(), expected);
    }

    #[tokio::test]
    async fn failing_service_writes_no_file() {
        let server = MockServer::start().await;
        mount_github(&server).await;
        mount_calendar(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/api/3/search/jql"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.txt");
        let destination = Destination::File(target.clone());

        let http = build_client(Duration::from_secs(5)).unwrap();
        let err = run(&http, &config(&server), date(), &destination)
            .await
            .unwrap_err();

        assert_eq!(err.service(), Some(Service::Jira));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unauthorized_calendar_aborts_after_other_services() {
        let server = MockServer::start().await;
        mount_github(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/api/3/search/jql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "issues": [], "isLast": true })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/basic.ics"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let http = build_client(Duration::from_secs(5)).unwrap();
        let err = build_digest(&http, &config(&server), date()).await.unwrap_err();
        assert!(matches!(
            err,
            DigestError::AuthenticationFailure {
                service: Service::Calendar,
                status: 401
            }
        ));
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.txt");
        std::fs::write(&target, "old").unwrap();

        write_atomically(&target, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
