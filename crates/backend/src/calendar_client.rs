//! Google Calendar v3 client behind the [`CalendarGateway`] port.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::{Client, Response};
use serde::Deserialize;
use shared_types::{CalendarEventRequest, ExternalEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider request timed out")]
    Timeout,

    #[error("provider request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// 401/403, or the OAuth server's `invalid_grant` anywhere in the body.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            GatewayError::Status { status, body } => {
                matches!(status, 401 | 403) || body.contains("invalid_grant")
            }
            _ => false,
        }
    }

    /// Google answers 410 for events that were already deleted.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Status { status: 404 | 410, .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err)
        }
    }
}

/// Upper bound on `nextPageToken` hops for one listing.
const MAX_LIST_PAGES: usize = 50;

/// Half-open `[time_min, time_max)` window as UTC RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub time_min: String,
    pub time_max: String,
}

impl TimeWindow {
    /// From local midnight of `start` to local midnight after `end`.
    pub fn for_dates(start: NaiveDate, end: NaiveDate, tz: Tz) -> Self {
        let end_exclusive = end.succ_opt().unwrap_or(end);
        Self {
            time_min: format_utc(local_midnight(start, tz)),
            time_max: format_utc(local_midnight(end_exclusive, tz)),
        }
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST jump: fall back to the UTC reading
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn format_utc(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Events in the window, recurring series expanded, ordered by start.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<ExternalEvent>, GatewayError>;

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &CalendarEventRequest,
    ) -> Result<ExternalEvent, GatewayError>;

    async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEventRequest,
    ) -> Result<ExternalEvent, GatewayError>;

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPage {
    #[serde(default)]
    items: Vec<ExternalEvent>,
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
    patch_timeout: Duration,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        patch_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            patch_timeout,
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Calendar provider returned {}: {}", status, body);
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarClient {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<ExternalEvent>, GatewayError> {
        let url = self.events_url(calendar_id);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let mut query = vec![
                ("timeMin", window.time_min.as_str()),
                ("timeMax", window.time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await?;
            let page: EventPage = Self::check(response).await?.json().await?;
            events.extend(page.items);

            match page.next_page_token {
                None => break,
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(GatewayError::Decode(format!(
                        "provider repeated page token {next:?}"
                    )));
                }
                Some(_) if seen_tokens.len() >= MAX_LIST_PAGES => {
                    tracing::warn!(
                        "Calendar listing stopped after {} pages with more remaining",
                        MAX_LIST_PAGES
                    );
                    break;
                }
                Some(next) => page_token = Some(next),
            }
        }

        Ok(events)
    }

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &CalendarEventRequest,
    ) -> Result<ExternalEvent, GatewayError> {
        let response = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEventRequest,
    ) -> Result<ExternalEvent, GatewayError> {
        let response = self
            .http
            .patch(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .timeout(self.patch_timeout)
            .json(event)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .http
            .delete(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
