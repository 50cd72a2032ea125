// Database models for Diesel
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use shared_types::{
    CalendarEventView, EventType, MeetingResponse, MeetingStatus, ParticipantView, TranscriptView,
};

use crate::services::transcripts::time_label;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::oauth_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OAuthTokenRow {
    pub id: i64,
    pub user_email: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::meetings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MeetingRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub status: String,
    pub host_user_id: i64,
    pub is_important: bool,
    pub highlight_keywords: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeetingRow {
    pub fn status(&self) -> MeetingStatus {
        MeetingStatus::from_str(&self.status).unwrap_or(MeetingStatus::Scheduled)
    }
}

impl From<MeetingRow> for MeetingResponse {
    fn from(row: MeetingRow) -> Self {
        let status = row.status();
        MeetingResponse {
            id: row.id,
            title: row.title,
            description: row.description,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            status,
            host_user_id: row.host_user_id,
            is_important: row.is_important,
            highlight_keywords: row
                .highlight_keywords
                .as_deref()
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::meetings)]
pub struct NewMeeting {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub status: String,
    pub host_user_id: i64,
    pub is_important: bool,
    pub highlight_keywords: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ParticipantRow {
    pub id: i64,
    pub meeting_id: i64,
    pub speaker_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ParticipantRow> for ParticipantView {
    fn from(row: ParticipantRow) -> Self {
        ParticipantView {
            speaker_id: row.speaker_id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::participants)]
pub struct NewParticipant {
    pub meeting_id: i64,
    pub speaker_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::meeting_results)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MeetingResultRow {
    pub id: i64,
    pub meeting_id: i64,
    pub purpose: Option<String>,
    pub agenda: Option<String>,
    pub summary: Option<String>,
    pub importance_level: Option<String>,
    pub importance_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary fields to overwrite; `None` leaves the column as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = crate::schema::meeting_results)]
pub struct MeetingResultChangeset {
    pub purpose: Option<String>,
    pub agenda: Option<String>,
    pub summary: Option<String>,
    pub importance_level: Option<String>,
    pub importance_reason: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::keywords)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KeywordRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::meeting_result_keywords)]
pub struct NewResultKeyword {
    pub meeting_result_id: i64,
    pub keyword_id: i64,
    pub source: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::action_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActionItemRow {
    pub id: i64,
    pub meeting_result_id: i64,
    pub assignee_user_id: Option<i64>,
    pub task: String,
    pub is_completed: bool,
    pub due_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::action_items)]
pub struct NewActionItem {
    pub meeting_result_id: i64,
    pub assignee_user_id: Option<i64>,
    pub task: String,
    pub is_completed: bool,
    pub due_date: Option<NaiveDateTime>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::transcripts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TranscriptRow {
    pub id: i64,
    pub meeting_id: i64,
    pub speaker_id: String,
    pub speaker_name: Option<String>,
    pub speaker_label: Option<i32>,
    pub text: String,
    pub start_time: i64,
    pub end_time: i64,
    pub sequence_order: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TranscriptRow> for TranscriptView {
    fn from(row: TranscriptRow) -> Self {
        TranscriptView {
            id: row.id,
            time_label: time_label(row.start_time),
            speaker: row.speaker_id,
            speaker_name: row.speaker_name,
            text: row.text,
            start_time: row.start_time,
            end_time: row.end_time,
            sequence_order: row.sequence_order,
            is_deleted: row.is_deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = crate::schema::transcripts)]
pub struct NewTranscript {
    pub meeting_id: i64,
    pub speaker_id: String,
    pub speaker_name: Option<String>,
    pub speaker_label: Option<i32>,
    pub text: String,
    pub start_time: i64,
    pub end_time: i64,
    pub sequence_order: i32,
    pub is_deleted: bool,
}

/// In-place changes to an existing transcript line
#[derive(Debug, Clone, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = crate::schema::transcripts)]
pub struct TranscriptChangeset {
    pub speaker_id: String,
    pub speaker_name: Option<String>,
    pub text: String,
    pub sequence_order: i32,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::recordings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecordingRow {
    pub id: i64,
    pub meeting_id: i64,
    pub audio_file_url: Option<String>,
    pub audio_file_size: Option<i64>,
    pub audio_format: Option<String>,
    pub duration_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::recordings)]
pub struct NewRecording {
    pub meeting_id: i64,
    pub audio_file_url: Option<String>,
    pub audio_file_size: Option<i64>,
    pub audio_format: Option<String>,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::todos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TodoRow {
    pub id: i64,
    pub user_id: i64,
    pub meeting_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::todos)]
pub struct NewTodo {
    pub user_id: i64,
    pub meeting_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::calendar_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CalendarEventRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    pub event_time: Option<NaiveTime>,
    pub event_type: String,
    pub is_important: bool,
    pub is_completed: bool,
    pub task_id: Option<i64>,
    pub meeting_id: Option<i64>,
    pub external_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CalendarEventRow {
    pub fn event_type(&self) -> EventType {
        EventType::from_str(&self.event_type).unwrap_or(EventType::Normal)
    }

    /// The linked todo for tasks, the linked meeting for meetings, otherwise
    /// the provider's id.
    pub fn source_id(&self) -> Option<String> {
        match (self.event_type(), self.task_id, self.meeting_id) {
            (EventType::Task, Some(task), _) => Some(task.to_string()),
            (EventType::Meeting, _, Some(meeting)) => Some(meeting.to_string()),
            _ => self.external_event_id.clone(),
        }
    }
}

impl From<CalendarEventRow> for CalendarEventView {
    fn from(row: CalendarEventRow) -> Self {
        CalendarEventView {
            source_id: row.source_id(),
            event_type: row.event_type(),
            id: Some(row.id),
            user_id: Some(row.user_id),
            title: row.title,
            date: row.event_date,
            time: row.event_time,
            is_important: row.is_important,
            is_completed: row.is_completed,
            external_event_id: row.external_event_id,
            created_at: Some(row.created_at),
            status: None,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::calendar_events)]
pub struct NewCalendarEvent {
    pub user_id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    pub event_time: Option<NaiveTime>,
    pub event_type: String,
    pub is_important: bool,
    pub is_completed: bool,
    pub task_id: Option<i64>,
    pub meeting_id: Option<i64>,
    pub external_event_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar_row(event_type: &str) -> CalendarEventRow {
        CalendarEventRow {
            id: 7,
            user_id: 1,
            title: "Row".into(),
            event_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            event_time: None,
            event_type: event_type.into(),
            is_important: false,
            is_completed: false,
            task_id: Some(40),
            meeting_id: Some(50),
            external_event_id: Some("g1".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_source_id_prefers_linked_child() {
        assert_eq!(calendar_row("TASK").source_id().as_deref(), Some("40"));
        assert_eq!(calendar_row("MEETING").source_id().as_deref(), Some("50"));
        assert_eq!(calendar_row("NORMAL").source_id().as_deref(), Some("g1"));
    }

    #[test]
    fn test_source_id_falls_back_to_external_id_without_link() {
        let mut row = calendar_row("TASK");
        row.task_id = None;
        assert_eq!(row.source_id().as_deref(), Some("g1"));

        row.external_event_id = None;
        assert_eq!(row.source_id(), None);
    }

    #[test]
    fn test_highlight_keywords_split() {
        let row = MeetingRow {
            id: 1,
            title: "Sync".into(),
            description: None,
            scheduled_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            started_at: None,
            ended_at: None,
            status: "RECORDING".into(),
            host_user_id: 3,
            is_important: false,
            highlight_keywords: Some("budget, hiring,,".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let response = MeetingResponse::from(row);
        assert_eq!(response.status, MeetingStatus::Recording);
        assert_eq!(response.highlight_keywords, vec!["budget", "hiring"]);
    }
}
