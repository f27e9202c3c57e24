//! Runtime configuration.
//!
//! Values come from an optional TOML file, overridden by environment variables
//! (a `.env` file in the working directory is loaded first). Everything is
//! validated once here; the rest of the program only sees typed values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use digest_core::{DigestError, DigestResult};
use serde::Deserialize;
use url::Url;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_TRACKED_STATUSES: [&str; 3] = ["In Progress", "In Review", "Review"];
const DEFAULT_HTTP_TIMEOUT: &str = "30s";

/// Optional config file at ~/.config/daily-digest/config.toml
///
/// ```toml
/// timezone = "America/Sao_Paulo"
/// output_file = "~/digests/daily_report_{date}.txt"
///
/// [github]
/// repos = ["acme/api", "acme/web"]
///
/// [jira]
/// base_url = "https://acme.atlassian.net"
/// tracked_statuses = ["In Progress", "In Review"]
///
/// [calendar]
/// ics_url = "https://calendar.google.com/calendar/ical/.../basic.ics"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub github: GitHubSection,
    pub jira: JiraSection,
    pub calendar: CalendarSection,
    pub timezone: Option<String>,
    pub output_file: Option<String>,
    pub http_timeout: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSection {
    pub token: Option<String>,
    pub repos: Vec<String>,
    pub user: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JiraSection {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    pub tracked_statuses: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarSection {
    pub ics_url: Option<String>,
    pub google_token: Option<String>,
    pub google_api_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub github: GitHubConfig,
    pub jira: JiraConfig,
    pub calendar: CalendarSource,
    pub timezone: Tz,
    /// Output path template; `{date}` is replaced with the target date
    pub output_file: Option<String>,
    pub http_timeout: Duration,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub repos: Vec<String>,
    /// Resolved through the API when not set
    pub user: Option<String>,
    pub api_url: Url,
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: Url,
    pub email: String,
    pub token: String,
    /// Declared bucket order
    pub tracked_statuses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalendarSource {
    IcsUrl(Url),
    IcsFile(PathBuf),
    GoogleApi { token: String, api_url: Url },
}

impl Config {
    /// Load `.env`, the config file and the process environment.
    ///
    /// An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> DigestResult<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => read_file_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file_config(&path)?,
                _ => FileConfig::default(),
            },
        };

        Self::from_sources(file, |name| std::env::var(name).ok())
    }

    /// Build a config from a parsed file and an environment lookup.
    /// Environment values take precedence.
    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> DigestResult<Self> {
        let var = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &str, fallback: Option<String>| {
            var(name)
                .or(fallback.filter(|v| !v.trim().is_empty()))
                .ok_or_else(|| DigestError::ConfigurationMissing(name.to_string()))
        };

        let repos = match var("GITHUB_REPOS") {
            Some(list) => split_list(&list),
            None => file.github.repos,
        };
        if repos.is_empty() {
            return Err(DigestError::ConfigurationMissing("GITHUB_REPOS".into()));
        }
        if let Some(bad) = repos.iter().find(|r| !is_repo_name(r)) {
            return Err(DigestError::invalid_config(
                "GITHUB_REPOS",
                format!("'{bad}' is not in owner/name form"),
            ));
        }

        let github = GitHubConfig {
            token: required("GITHUB_TOKEN", file.github.token)?,
            repos,
            user: var("GITHUB_USER").or(file.github.user),
            api_url: parse_url(
                "GITHUB_API_URL",
                &var("GITHUB_API_URL")
                    .or(file.github.api_url)
                    .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            )?,
        };

        let tracked_statuses = match var("JIRA_TRACKED_STATUSES") {
            Some(list) => split_list(&list),
            None if !file.jira.tracked_statuses.is_empty() => file.jira.tracked_statuses,
            None => DEFAULT_TRACKED_STATUSES.iter().map(|s| s.to_string()).collect(),
        };

        let jira = JiraConfig {
            base_url: parse_url("JIRA_BASE_URL", &required("JIRA_BASE_URL", file.jira.base_url)?)?,
            email: required("JIRA_EMAIL", file.jira.email)?,
            token: required("JIRA_TOKEN", file.jira.token)?,
            tracked_statuses,
        };

        let ics = var("GCAL_ICS_URL").or(file.calendar.ics_url);
        let google_token = var("GOOGLE_CALENDAR_TOKEN").or(file.calendar.google_token);
        let calendar = match (ics, google_token) {
            (Some(source), _) => ics_source(&source)?,
            (None, Some(token)) => CalendarSource::GoogleApi {
                token,
                api_url: parse_url(
                    "GOOGLE_CALENDAR_API_URL",
                    &var("GOOGLE_CALENDAR_API_URL")
                        .or(file.calendar.google_api_url)
                        .unwrap_or_else(|| DEFAULT_GOOGLE_CALENDAR_API_URL.to_string()),
                )?,
            },
            (None, None) => {
                return Err(DigestError::ConfigurationMissing(
                    "GCAL_ICS_URL or GOOGLE_CALENDAR_TOKEN".into(),
                ));
            }
        };

        let timezone = match var("TIMEZONE").or(file.timezone) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| DigestError::invalid_config("TIMEZONE", format!("unknown timezone '{name}'")))?,
            None => system_timezone(),
        };

        let timeout = var("HTTP_TIMEOUT")
            .or(file.http_timeout)
            .unwrap_or_else(|| DEFAULT_HTTP_TIMEOUT.to_string());
        let http_timeout = humantime::parse_duration(&timeout)
            .map_err(|e| DigestError::invalid_config("HTTP_TIMEOUT", e.to_string()))?;

        Ok(Config {
            github,
            jira,
            calendar,
            timezone,
            output_file: var("OUTPUT_FILE").or(file.output_file),
            http_timeout,
            log_level: var("DIGEST_LOG_LEVEL").or(file.log_level),
        })
    }
}

/// Get the default config file path (~/.config/daily-digest/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("daily-digest").join("config.toml"))
}

fn read_file_config(path: &Path) -> DigestResult<FileConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| DigestError::invalid_config(&path.display().to_string(), e.to_string()))
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn is_repo_name(repo: &str) -> bool {
    matches!(repo.split_once('/'), Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/'))
}

fn parse_url(name: &str, value: &str) -> DigestResult<Url> {
    Url::parse(value).map_err(|e| DigestError::invalid_config(name, format!("'{value}': {e}")))
}

/// An `http(s)://` source is fetched; anything else is a file path.
fn ics_source(source: &str) -> DigestResult<CalendarSource> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(CalendarSource::IcsUrl(parse_url("GCAL_ICS_URL", source)?));
    }
    if let Some(rest) = source.strip_prefix("webcal://") {
        return Ok(CalendarSource::IcsUrl(parse_url(
            "GCAL_ICS_URL",
            &format!("https://{rest}"),
        )?));
    }
    Ok(CalendarSource::IcsFile(expand_home(source)))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn system_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}
