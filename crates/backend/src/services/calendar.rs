//! Calendar view merged from local rows and the external provider, and the
//! mutations that keep the local mirror in step with it.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use shared_types::{
    CalendarEventRequest, CalendarEventView, EventDateTime, EventType, ExternalEvent, TodoStatus,
};

use super::error::{ServiceError, ServiceResult};
use crate::calendar_client::{CalendarGateway, TimeWindow};
use crate::db;
use crate::models::{CalendarEventRow, NewCalendarEvent, NewTodo, OAuthTokenRow, UserRow};

pub const GOOGLE_PROVIDER: &str = "google";
const UNTITLED: &str = "(untitled)";
const SYNCED_EVENT_TITLE: &str = "(synced external event)";

#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub calendar_id: String,
    pub timezone: Tz,
}

/// Event identifiers arrive either as local numeric ids or provider ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRef {
    Local(i64),
    External(String),
}

impl EventRef {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => EventRef::Local(id),
            Err(_) => EventRef::External(raw.trim().to_string()),
        }
    }
}

/// Access token that is present and not yet expired.
pub fn usable_token(token: Option<OAuthTokenRow>, now: DateTime<Utc>) -> Option<String> {
    let token = token?;
    if token.access_token.trim().is_empty() {
        return None;
    }
    if token.expires_at.is_some_and(|expires| expires <= now) {
        return None;
    }
    Some(token.access_token)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// RFC 3339 instants are shifted into `tz`; offset-less values are taken as
/// local wall time already.
fn parse_date_time(raw: &str, tz: Tz) -> Option<(NaiveDate, NaiveTime)> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        let local = instant.with_timezone(&tz);
        return Some((local.date_naive(), local.time()));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| (dt.date(), dt.time()))
}

fn start_of(start: &EventDateTime, tz: Tz) -> Option<(NaiveDate, Option<NaiveTime>)> {
    if let Some(date) = non_blank(start.date.as_deref()) {
        return parse_date(date).map(|d| (d, None));
    }
    let (date, time) = parse_date_time(non_blank(start.date_time.as_deref())?, tz)?;
    Some((date, Some(time)))
}

/// View of a provider event that has no local row.
pub fn external_view(event: &ExternalEvent, tz: Tz) -> Option<CalendarEventView> {
    let (date, time) = start_of(event.start.as_ref()?, tz)?;
    Some(CalendarEventView {
        id: None,
        user_id: None,
        title: non_blank(event.summary.as_deref())
            .unwrap_or(UNTITLED)
            .to_string(),
        date,
        time,
        event_type: EventType::Meeting,
        is_important: false,
        is_completed: false,
        source_id: Some(event.id.clone()),
        external_event_id: Some(event.id.clone()),
        created_at: event
            .created
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|c| c.with_timezone(&Utc)),
        status: event.status.clone(),
    })
}

/// Local rows first, then provider events not mirrored locally. Cancelled
/// provider events are dropped; a local row always wins over the provider's
/// copy of the same event.
pub fn merge_events(
    local: Vec<CalendarEventView>,
    external: Vec<ExternalEvent>,
    tz: Tz,
) -> Vec<CalendarEventView> {
    let mut seen: HashSet<String> = local
        .iter()
        .filter_map(|e| e.external_event_id.clone())
        .collect();
    let mut merged = local;

    for event in external {
        let cancelled = event
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"));
        if cancelled || !seen.insert(event.id.clone()) {
            continue;
        }
        match external_view(&event, tz) {
            Some(view) => merged.push(view),
            None => tracing::warn!("Skipping provider event {} without a usable start", event.id),
        }
    }

    merged
}

/// Local row written after the provider accepted a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDraft {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub event_type: EventType,
    pub description: Option<String>,
}

/// Date-only starts become tasks, timed starts meetings; no start at all is
/// a task due today.
pub fn plan_mirror(
    request: &CalendarEventRequest,
    today: NaiveDate,
    tz: Tz,
) -> ServiceResult<MirrorDraft> {
    let title = non_blank(request.summary.as_deref())
        .unwrap_or(UNTITLED)
        .to_string();
    let start = request.start.clone().unwrap_or_default();

    let (date, time, event_type) = if let Some(raw) = non_blank(start.date.as_deref()) {
        let date = parse_date(raw)
            .ok_or_else(|| ServiceError::invalid(format!("start date {raw:?}")))?;
        (date, None, EventType::Task)
    } else if let Some(raw) = non_blank(start.date_time.as_deref()) {
        let (date, time) = parse_date_time(raw, tz)
            .ok_or_else(|| ServiceError::invalid(format!("start dateTime {raw:?}")))?;
        (date, Some(time), EventType::Meeting)
    } else {
        (today, None, EventType::Task)
    };

    Ok(MirrorDraft {
        title,
        date,
        time,
        event_type,
        description: request.description.clone(),
    })
}

/// New title and date for a mirrored row after a provider edit, or `None`
/// when nothing the mirror tracks changed. Time and type are left as they
/// are, even when the edit moved a timed event.
pub fn plan_mirror_update(
    row: &CalendarEventRow,
    request: &CalendarEventRequest,
) -> Option<(String, NaiveDate)> {
    let title = non_blank(request.summary.as_deref())
        .map(String::from)
        .unwrap_or_else(|| row.title.clone());
    let date = request
        .start
        .as_ref()
        .and_then(|s| non_blank(s.date.as_deref()))
        .and_then(parse_date)
        .unwrap_or(row.event_date);

    if title == row.title && date == row.event_date {
        None
    } else {
        Some((title, date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalDelete {
    Deleted,
    AlreadyAbsent,
    /// Provider refused or failed; the local row is removed anyway
    Failed,
}

/// Rows a delete touches. The local row goes whatever the provider answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    pub local_id: i64,
    pub provider_id: Option<String>,
}

pub fn plan_delete(row: &CalendarEventRow) -> DeletePlan {
    DeletePlan {
        local_id: row.id,
        provider_id: non_blank(row.external_event_id.as_deref()).map(String::from),
    }
}

pub struct CalendarService<'a> {
    gateway: &'a dyn CalendarGateway,
    settings: &'a CalendarSettings,
}

impl<'a> CalendarService<'a> {
    pub fn new(gateway: &'a dyn CalendarGateway, settings: &'a CalendarSettings) -> Self {
        Self { gateway, settings }
    }

    fn today(&self) -> NaiveDate {
        Utc::now()
            .with_timezone(&self.settings.timezone)
            .date_naive()
    }

    async fn user(conn: &mut AsyncPgConnection, email: &str) -> ServiceResult<UserRow> {
        db::users::get_by_email(conn, email)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {email}")))
    }

    async fn access_token(
        conn: &mut AsyncPgConnection,
        email: &str,
    ) -> ServiceResult<Option<String>> {
        let token = db::oauth_tokens::get_token(conn, email, GOOGLE_PROVIDER).await?;
        Ok(usable_token(token, Utc::now()))
    }

    async fn require_token(conn: &mut AsyncPgConnection, email: &str) -> ServiceResult<String> {
        Self::access_token(conn, email)
            .await?
            .ok_or_else(|| ServiceError::AuthExpired(format!("no calendar token for {email}")))
    }

    pub async fn get_events_by_date_range(
        &self,
        conn: &mut AsyncPgConnection,
        email: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<CalendarEventView>> {
        if end < start {
            return Err(ServiceError::invalid(format!(
                "end date {end} is before start date {start}"
            )));
        }

        let user = Self::user(conn, email).await?;
        let local: Vec<CalendarEventView> =
            db::calendar_events::list_in_range(conn, user.id, start, end)
                .await?
                .into_iter()
                .map(CalendarEventView::from)
                .collect();
        let token = Self::access_token(conn, email).await?;

        Ok(self
            .merge_with_provider(token.as_deref(), start, end, local)
            .await)
    }

    /// Add provider events to `local`. Without a token, or when the provider
    /// fails, the local list comes back unchanged.
    pub async fn merge_with_provider(
        &self,
        token: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        local: Vec<CalendarEventView>,
    ) -> Vec<CalendarEventView> {
        let Some(token) = token else {
            tracing::debug!("No calendar token, returning local events only");
            return local;
        };

        let window = TimeWindow::for_dates(start, end, self.settings.timezone);
        match self
            .gateway
            .list_events(token, &self.settings.calendar_id, &window)
            .await
        {
            Ok(external) => merge_events(local, external, self.settings.timezone),
            Err(e) if e.is_auth_failure() => {
                tracing::warn!("Calendar authorization expired, showing local events: {}", e);
                local
            }
            Err(e) => {
                tracing::error!("Calendar provider unavailable, showing local events: {}", e);
                local
            }
        }
    }

    pub async fn create_event(
        &self,
        conn: &mut AsyncPgConnection,
        email: &str,
        request: CalendarEventRequest,
    ) -> ServiceResult<ExternalEvent> {
        let user = Self::user(conn, email).await?;
        let draft = plan_mirror(&request, self.today(), self.settings.timezone)?;
        let token = Self::require_token(conn, email).await?;

        let created = self
            .gateway
            .create_event(&token, &self.settings.calendar_id, &request)
            .await
            .map_err(ServiceError::from_gateway)?;

        let external_id = created.id.clone();
        let row = conn
            .transaction::<_, ServiceError, _>(|conn| {
                async move {
                    let task_id = if draft.event_type == EventType::Task {
                        let todo = db::todos::create(
                            conn,
                            &NewTodo {
                                user_id: user.id,
                                meeting_id: None,
                                title: draft.title.clone(),
                                description: draft.description.clone(),
                                due_date: Some(draft.date),
                                status: TodoStatus::Todo.as_str().to_string(),
                            },
                        )
                        .await?;
                        Some(todo.id)
                    } else {
                        None
                    };

                    let row = db::calendar_events::create(
                        conn,
                        &NewCalendarEvent {
                            user_id: user.id,
                            title: draft.title,
                            event_date: draft.date,
                            event_time: draft.time,
                            event_type: draft.event_type.as_str().to_string(),
                            is_important: false,
                            is_completed: false,
                            task_id,
                            meeting_id: None,
                            external_event_id: Some(external_id),
                        },
                    )
                    .await?;
                    Ok(row)
                }
                .scope_boxed()
            })
            .await?;

        tracing::info!(
            "Created calendar event {} mirrored as local {} ({})",
            created.id,
            row.id,
            row.event_type
        );
        Ok(created)
    }

    pub async fn update_event(
        &self,
        conn: &mut AsyncPgConnection,
        email: &str,
        event_id: &str,
        request: CalendarEventRequest,
    ) -> ServiceResult<ExternalEvent> {
        let user = Self::user(conn, email).await?;
        let token = Self::require_token(conn, email).await?;

        let updated = self
            .gateway
            .patch_event(&token, &self.settings.calendar_id, event_id, &request)
            .await
            .map_err(ServiceError::from_gateway)?;

        match db::calendar_events::find_by_external_id(conn, user.id, event_id).await? {
            Some(row) => {
                if let Some((title, date)) = plan_mirror_update(&row, &request) {
                    db::calendar_events::update_title_and_date(conn, row.id, &title, date).await?;
                }
            }
            None => tracing::debug!("Event {} has no local mirror to update", event_id),
        }

        Ok(updated)
    }

    pub async fn delete_event(
        &self,
        conn: &mut AsyncPgConnection,
        email: &str,
        event_id: &str,
    ) -> ServiceResult<()> {
        let user = Self::user(conn, email).await?;
        let row = Self::resolve_row(conn, &user, event_id).await?;
        let plan = plan_delete(&row);

        let token = match plan.provider_id {
            Some(_) => Self::access_token(conn, email).await?,
            None => None,
        };
        self.delete_remote(&plan, token.as_deref()).await;

        db::calendar_events::delete(conn, plan.local_id).await?;
        tracing::info!("Deleted calendar event {} for {}", plan.local_id, email);
        Ok(())
    }

    /// Provider half of a delete. `None` when nothing was sent to the provider.
    pub async fn delete_remote(
        &self,
        plan: &DeletePlan,
        token: Option<&str>,
    ) -> Option<ExternalDelete> {
        let external_id = plan.provider_id.as_deref()?;
        match token {
            Some(token) => Some(self.sync_external_delete(token, external_id).await),
            None => {
                tracing::warn!(
                    "No calendar token, deleting local copy of {} only",
                    external_id
                );
                None
            }
        }
    }

    /// Remove the provider copy. Never fails: the local row goes either way.
    pub async fn sync_external_delete(&self, token: &str, external_id: &str) -> ExternalDelete {
        match self
            .gateway
            .delete_event(token, &self.settings.calendar_id, external_id)
            .await
        {
            Ok(()) => ExternalDelete::Deleted,
            Err(e) if e.is_not_found() => {
                tracing::info!("External event {} already gone from provider", external_id);
                ExternalDelete::AlreadyAbsent
            }
            Err(e) => {
                tracing::warn!(
                    "Provider delete of {} failed, removing local copy anyway: {}",
                    external_id,
                    e
                );
                ExternalDelete::Failed
            }
        }
    }

    /// External id first, then local numeric id.
    async fn resolve_row(
        conn: &mut AsyncPgConnection,
        user: &UserRow,
        event_id: &str,
    ) -> ServiceResult<CalendarEventRow> {
        if let Some(row) = db::calendar_events::find_by_external_id(conn, user.id, event_id).await?
        {
            return Ok(row);
        }
        match EventRef::parse(event_id) {
            EventRef::Local(id) => db::calendar_events::find_for_user(conn, user.id, id)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("Calendar event {id}"))),
            EventRef::External(_) => Err(ServiceError::not_found(format!(
                "Calendar event {event_id}"
            ))),
        }
    }

    fn shell_row(
        &self,
        user_id: i64,
        external_id: String,
        important: bool,
        completed: bool,
    ) -> NewCalendarEvent {
        NewCalendarEvent {
            user_id,
            title: SYNCED_EVENT_TITLE.to_string(),
            event_date: self.today(),
            event_time: None,
            event_type: EventType::Meeting.as_str().to_string(),
            is_important: important,
            is_completed: completed,
            task_id: None,
            meeting_id: None,
            external_event_id: Some(external_id),
        }
    }

    /// Numeric ids hit the user's calendar row, then a meeting they host.
    /// Provider ids without a local row get a new row marked important.
    pub async fn toggle_importance(
        &self,
        conn: &mut AsyncPgConnection,
        email: &str,
        event_id: &str,
    ) -> ServiceResult<()> {
        let user = Self::user(conn, email).await?;

        match EventRef::parse(event_id) {
            EventRef::Local(id) => {
                if let Some(row) = db::calendar_events::find_for_user(conn, user.id, id).await? {
                    db::calendar_events::set_importance(conn, row.id, !row.is_important).await?;
                    return Ok(());
                }
                if db::meetings::toggle_importance(conn, id, user.id)
                    .await?
                    .is_some()
                {
                    return Ok(());
                }
                Err(ServiceError::not_found(format!("Calendar event {id}")))
            }
            EventRef::External(external_id) => {
                match db::calendar_events::find_by_external_id(conn, user.id, &external_id).await? {
                    Some(row) => {
                        db::calendar_events::set_importance(conn, row.id, !row.is_important)
                            .await?;
                    }
                    None => {
                        let shell = self.shell_row(user.id, external_id, true, false);
                        let row = db::calendar_events::create(conn, &shell).await?;
                        tracing::info!("Synthesized local row {} for external event", row.id);
                    }
                }
                Ok(())
            }
        }
    }

    pub async fn set_completion(
        &self,
        conn: &mut AsyncPgConnection,
        email: &str,
        event_id: &str,
        completed: bool,
    ) -> ServiceResult<CalendarEventView> {
        let user = Self::user(conn, email).await?;

        let row = match EventRef::parse(event_id) {
            EventRef::Local(id) => {
                let row = db::calendar_events::find_for_user(conn, user.id, id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(format!("Calendar event {id}")))?;
                db::calendar_events::set_completion(conn, row.id, completed).await?
            }
            EventRef::External(external_id) => {
                match db::calendar_events::find_by_external_id(conn, user.id, &external_id).await? {
                    Some(row) => db::calendar_events::set_completion(conn, row.id, completed).await?,
                    None => {
                        let shell = self.shell_row(user.id, external_id, false, completed);
                        db::calendar_events::create(conn, &shell).await?
                    }
                }
            }
        };

        Ok(row.into())
    }
}
