//! Calendar events from an ICS feed or the Google Calendar API.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use digest_core::ics::{EventTime, FeedEvent, parse_feed};
use digest_core::{CalendarEvent, DayWindow, DigestError, DigestResult, Service, events_on_day};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CalendarSource;
use crate::http::{get_json, send};

const UNTITLED: &str = "(no title)";
const MAX_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    #[serde(default)]
    id: String,
    summary: Option<String>,
    #[serde(default)]
    status: String,
    start: Option<ApiTime>,
    end: Option<ApiTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<NaiveDate>,
}

impl ApiTime {
    fn to_event_time(&self) -> Option<EventTime> {
        match (self.date_time, self.date) {
            (Some(dt), _) => Some(EventTime::DateTimeUtc(dt)),
            (None, Some(d)) => Some(EventTime::Date(d)),
            (None, None) => None,
        }
    }
}

impl ApiEvent {
    /// API events are already expanded (`singleEvents=true`), so they map to
    /// plain non-recurring feed events.
    fn into_feed_event(self) -> Option<FeedEvent> {
        let start = self.start.as_ref()?.to_event_time()?;
        let end = self
            .end
            .as_ref()
            .and_then(ApiTime::to_event_time)
            .unwrap_or_else(|| start.default_end());

        Some(FeedEvent {
            uid: self.id,
            summary: self
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            start,
            end,
            cancelled: self.status == "cancelled",
            rrule: None,
            exdates: Vec::new(),
            recurrence_id: None,
        })
    }
}

pub struct Calendar<'a> {
    http: &'a Client,
    source: &'a CalendarSource,
}

impl<'a> Calendar<'a> {
    pub fn new(http: &'a Client, source: &'a CalendarSource) -> Self {
        Self { http, source }
    }

    /// Concrete events overlapping `window`, in the report timezone.
    pub async fn fetch_calendar_events(&self, window: &DayWindow) -> DigestResult<Vec<CalendarEvent>> {
        let feed = match self.source {
            CalendarSource::IcsUrl(url) => parse_feed(&self.download(url).await?)?,
            CalendarSource::IcsFile(path) => {
                debug!(path = %path.display(), "Reading ICS file");
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| DigestError::ReadFailure {
                        service: Service::Calendar,
                        path: path.clone(),
                        source,
                    })?;
                parse_feed(&content)?
            }
            CalendarSource::GoogleApi { token, api_url } => self.list_events(token, api_url, window).await?,
        };

        debug!(count = feed.len(), "Parsed calendar events");
        let events = events_on_day(&feed, window);
        info!(count = events.len(), "Fetched calendar events");
        Ok(events)
    }

    async fn download(&self, url: &Url) -> DigestResult<String> {
        let response = send(Service::Calendar, self.http.get(url.clone())).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| DigestError::NetworkFailure {
            service: Service::Calendar,
            detail: e.to_string(),
        })?;

        if let Some(ct) = content_type.filter(|ct| !ct.to_ascii_lowercase().contains("text/calendar")) {
            let preview: String = body.chars().take(160).collect();
            warn!(content_type = %ct, preview = %preview, "Unexpected iCal content type");
        }

        Ok(body)
    }

    async fn list_events(&self, token: &str, api_url: &Url, window: &DayWindow) -> DigestResult<Vec<FeedEvent>> {
        let mut url = api_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/calendars/primary/events"));

        let time_min = window.start_utc().to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = window.end_utc().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self
                .http
                .get(url.clone())
                .bearer_auth(token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: EventsPage = get_json(Service::Calendar, request).await?;
            events.extend(page.items.into_iter().filter_map(ApiEvent::into_feed_event));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(events),
            }
        }

        Err(DigestError::malformed(
            Service::Calendar,
            format!("event list still had more pages after {MAX_PAGES}"),
        ))
    }
}
