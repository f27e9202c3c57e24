//! Plain-text report layout.

use chrono_tz::Tz;

use crate::calendar::sort_events;
use crate::model::{CalendarEvent, Digest, IssueSummary, PullRequestSummary, StatusMovement};

const NONE_FOUND: &str = "- none found";

/// Format a digest. Every section header is always present.
pub fn render(digest: &Digest) -> String {
    let mut lines = vec![
        format!(
            "Daily digest for {} ({})",
            digest.date.format("%Y-%m-%d"),
            digest.timezone.name()
        ),
        String::new(),
    ];

    section(&mut lines, "Pull requests", render_pull_requests(&digest.pull_requests));
    section(
        &mut lines,
        "Issues in progress",
        render_current_issues(&digest.issues.current, &digest.status_order),
    );
    section(
        &mut lines,
        "Status movements",
        render_movements(&digest.issues.movements, digest.timezone),
    );
    section(&mut lines, "Calendar", render_events(&digest.events));

    // drop the blank line after the last section
    lines.pop();
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn section(lines: &mut Vec<String>, title: &str, body: Vec<String>) {
    lines.push(title.to_string());
    lines.push("-".repeat(title.chars().count()));
    if body.is_empty() {
        lines.push(NONE_FOUND.to_string());
    } else {
        lines.extend(body);
    }
    lines.push(String::new());
}

fn render_pull_requests(prs: &[PullRequestSummary]) -> Vec<String> {
    prs.iter()
        .map(|pr| format!("- [{}] {} ({}) - {}", pr.repo, pr.title, pr.state, pr.url))
        .collect()
}

/// Buckets in declared order; statuses outside it follow in first-seen order.
fn render_current_issues(issues: &[IssueSummary], status_order: &[String]) -> Vec<String> {
    let mut buckets: Vec<&str> = status_order.iter().map(String::as_str).collect();
    for issue in issues {
        if !buckets.contains(&issue.status.as_str()) {
            buckets.push(&issue.status);
        }
    }

    let mut lines = Vec::new();
    for bucket in buckets {
        let members: Vec<&IssueSummary> = issues.iter().filter(|i| i.status == bucket).collect();
        if members.is_empty() {
            continue;
        }
        lines.push(format!("{bucket}:"));
        lines.extend(members.iter().map(|i| format!("  - {}: {}", i.key, i.title)));
    }
    lines
}

fn render_movements(movements: &[StatusMovement], tz: Tz) -> Vec<String> {
    let mut keys: Vec<&str> = Vec::new();
    for movement in movements {
        if !keys.contains(&movement.issue_key.as_str()) {
            keys.push(&movement.issue_key);
        }
    }

    let mut lines = Vec::new();
    for key in keys {
        let mut changes: Vec<&StatusMovement> =
            movements.iter().filter(|m| m.issue_key == key).collect();
        changes.sort_by_key(|m| m.at);

        lines.push(format!("{}: {}", key, changes[0].issue_title));
        lines.extend(changes.iter().map(|m| {
            format!(
                "  - {} {} -> {}",
                m.at.with_timezone(&tz).format("%H:%M"),
                m.from,
                m.to
            )
        }));
    }
    lines
}

fn render_events(events: &[CalendarEvent]) -> Vec<String> {
    let mut events = events.to_vec();
    sort_events(&mut events);

    events
        .iter()
        .map(|e| {
            if e.all_day {
                format!("- all day {}", e.title)
            } else {
                format!("- {}-{} {}", e.start.format("%H:%M"), e.end.format("%H:%M"), e.title)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueReport, PrState};
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::America::Sao_Paulo;

    fn empty_digest() -> Digest {
        Digest {
            date: NaiveDate::from_ymd_opt(2025, 9, 19).unwrap(),
            timezone: Sao_Paulo,
            status_order: vec!["In Progress".into(), "In Review".into()],
            pull_requests: vec![],
            issues: IssueReport::default(),
            events: vec![],
        }
    }

    #[test]
    fn empty_digest_marks_every_section() {
        let expected = "\
Daily digest for 2025-09-19 (America/Sao_Paulo)

Pull requests
-------------
- none found

Issues in progress
------------------
- none found

Status movements
----------------
- none found

Calendar
--------
- none found
";
        assert_eq!(render(&empty_digest()), expected);
    }

    #[test]
    fn renders_full_layout() {
        let at = |h, m| Sao_Paulo.with_ymd_and_hms(2025, 9, 19, h, m, 0).unwrap();
        let mut digest = empty_digest();
        digest.pull_requests = vec![PullRequestSummary {
            title: "Fix login".into(),
            repo: "acme/api".into(),
            state: PrState::Merged,
            url: "https://github.com/acme/api/pull/1".into(),
        }];
        digest.issues = IssueReport {
            current: vec![
                IssueSummary {
                    key: "ABC-2".into(),
                    title: "Review the thing".into(),
                    status: "In Review".into(),
                },
                IssueSummary {
                    key: "ABC-1".into(),
                    title: "Build the thing".into(),
                    status: "In Progress".into(),
                },
            ],
            movements: vec![
                StatusMovement {
                    issue_key: "ABC-1".into(),
                    issue_title: "Build the thing".into(),
                    from: "In Progress".into(),
                    to: "In Review".into(),
                    at: Utc.with_ymd_and_hms(2025, 9, 19, 20, 0, 0).unwrap(),
                },
                StatusMovement {
                    issue_key: "ABC-1".into(),
                    issue_title: "Build the thing".into(),
                    from: "To Do".into(),
                    to: "In Progress".into(),
                    at: Utc.with_ymd_and_hms(2025, 9, 19, 17, 3, 0).unwrap(),
                },
            ],
        };
        digest.events = vec![
            CalendarEvent {
                title: "Standup".into(),
                start: at(9, 0),
                end: at(9, 30),
                all_day: false,
            },
            CalendarEvent {
                title: "Holiday".into(),
                start: at(0, 0),
                end: Sao_Paulo.with_ymd_and_hms(2025, 9, 20, 0, 0, 0).unwrap(),
                all_day: true,
            },
        ];

        let expected = "\
Daily digest for 2025-09-19 (America/Sao_Paulo)

Pull requests
-------------
- [acme/api] Fix login (merged) - https://github.com/acme/api/pull/1

Issues in progress
------------------
In Progress:
  - ABC-1: Build the thing
In Review:
  - ABC-2: Review the thing

Status movements
----------------
ABC-1: Build the thing
  - 14:03 To Do -> In Progress
  - 17:00 In Progress -> In Review

Calendar
--------
- all day Holiday
- 09:00-09:30 Standup
";
        assert_eq!(render(&digest), expected);
    }

    #[test]
    fn undeclared_status_buckets_follow_declared_ones() {
        let issues = vec![
            IssueSummary {
                key: "X-1".into(),
                title: "Odd".into(),
                status: "Blocked".into(),
            },
            IssueSummary {
                key: "X-2".into(),
                title: "Normal".into(),
                status: "In Progress".into(),
            },
        ];
        let lines = render_current_issues(&issues, &["In Progress".to_string()]);
        assert_eq!(
            lines,
            vec!["In Progress:", "  - X-2: Normal", "Blocked:", "  - X-1: Odd"]
        );
    }
}
