use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Meetings
// ---------------------------------------------------------------------------

/// Meeting lifecycle, stored as VARCHAR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    Scheduled,
    Recording,
    Completed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MeetingStatus::Scheduled => "SCHEDULED",
            MeetingStatus::Recording => "RECORDING",
            MeetingStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(MeetingStatus::Scheduled),
            "RECORDING" => Some(MeetingStatus::Recording),
            "COMPLETED" => Some(MeetingStatus::Completed),
            _ => None,
        }
    }

    /// Transitions only move forward; a meeting never returns to an earlier state.
    pub fn can_transition_to(&self, next: MeetingStatus) -> bool {
        matches!(
            (self, next),
            (MeetingStatus::Scheduled, MeetingStatus::Recording)
                | (MeetingStatus::Scheduled, MeetingStatus::Completed)
                | (MeetingStatus::Recording, MeetingStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportanceLevel {
    High,
    Medium,
    Low,
}

impl ImportanceLevel {
    pub fn as_str(&self) -> &str {
        match self {
            ImportanceLevel::High => "HIGH",
            ImportanceLevel::Medium => "MEDIUM",
            ImportanceLevel::Low => "LOW",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(ImportanceLevel::High),
            "MEDIUM" => Some(ImportanceLevel::Medium),
            "LOW" => Some(ImportanceLevel::Low),
            _ => None,
        }
    }
}

/// Who produced a keyword: the user or the summarizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeywordSource {
    User,
    Ai,
}

impl KeywordSource {
    pub fn as_str(&self) -> &str {
        match self {
            KeywordSource::User => "USER",
            KeywordSource::Ai => "AI",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(KeywordSource::User),
            "AI" => Some(KeywordSource::Ai),
            _ => None,
        }
    }

    /// Lenient parse used for client input: anything that is not "ai"
    /// (in any case) counts as user-provided.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some(s) if s.trim().eq_ignore_ascii_case("ai") => KeywordSource::Ai,
            _ => KeywordSource::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMeetingRequest {
    pub title: String,
    pub description: Option<String>,
    /// Local wall-clock time, `YYYY-MM-DDTHH:MM:SS`
    pub scheduled_at: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub status: MeetingStatus,
    pub host_user_id: i64,
    pub is_important: bool,
    pub highlight_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub speaker_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptView {
    pub id: i64,
    pub speaker: String,
    pub speaker_name: Option<String>,
    pub text: String,
    pub start_time: i64,
    pub end_time: i64,
    pub time_label: String,
    pub sequence_order: i32,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordView {
    pub text: String,
    pub source: KeywordSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItemView {
    pub id: i64,
    pub task: String,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceView {
    pub level: ImportanceLevel,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingResultView {
    pub purpose: Option<String>,
    pub agenda: Option<String>,
    pub summary: Option<String>,
    pub importance: Option<ImportanceView>,
    pub keywords: Vec<KeywordView>,
    pub action_items: Vec<ActionItemView>,
}

/// Full meeting graph as returned to clients. Resubmitting its pieces
/// unchanged through `MeetingResultUpdate` is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDetail {
    pub meeting: MeetingResponse,
    pub participants: Vec<ParticipantView>,
    pub transcripts: Vec<TranscriptView>,
    pub result: Option<MeetingResultView>,
}

// ---------------------------------------------------------------------------
// Result update payload
//
// Every collection is `Option<Vec<_>>`: a missing field leaves the stored
// collection untouched, an empty list clears it.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingResultUpdate {
    pub title: Option<String>,
    pub purpose: Option<String>,
    pub agenda: Option<String>,
    pub summary: Option<String>,
    pub importance: Option<ImportanceInput>,
    pub participants: Option<Vec<ParticipantInput>>,
    pub keywords: Option<Vec<KeywordInput>>,
    pub action_items: Option<Vec<ActionItemInput>>,
    pub transcripts: Option<Vec<TranscriptInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportanceInput {
    pub level: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub speaker_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordInput {
    pub text: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionItemInput {
    pub task: String,
    pub assignee: Option<String>,
    /// Date only, `YYYY-MM-DD`
    pub due_date: Option<String>,
    pub source: Option<String>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptInput {
    /// Persisted row id; absent for new lines
    pub id: Option<i64>,
    pub speaker: Option<String>,
    pub speaker_name: Option<String>,
    pub text: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub sequence_order: Option<i32>,
    pub is_deleted: Option<bool>,
}

/// Output of the summarizer, applied on top of the stored result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiSummary {
    pub purpose: Option<String>,
    pub agenda: Option<String>,
    pub summary: Option<String>,
    pub importance: Option<ImportanceInput>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingInput {
    pub audio_file_url: Option<String>,
    pub audio_file_size: Option<i64>,
    pub audio_format: Option<String>,
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptCapture {
    pub speaker: String,
    pub speaker_name: Option<String>,
    pub speaker_label: Option<i32>,
    pub text: String,
    pub start_time: i64,
    pub end_time: i64,
    pub sequence_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinishMeetingRequest {
    pub recording: Option<RecordingInput>,
    #[serde(default)]
    pub transcripts: Vec<TranscriptCapture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSweepResponse {
    pub deleted: usize,
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Normal,
    AllDay,
    Task,
    Meeting,
    Personal,
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Normal => "NORMAL",
            EventType::AllDay => "ALL_DAY",
            EventType::Task => "TASK",
            EventType::Meeting => "MEETING",
            EventType::Personal => "PERSONAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(EventType::Normal),
            "ALL_DAY" => Some(EventType::AllDay),
            "TASK" => Some(EventType::Task),
            "MEETING" => Some(EventType::Meeting),
            "PERSONAL" => Some(EventType::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    Todo,
    Completed,
}

impl TodoStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TodoStatus::Todo => "TODO",
            TodoStatus::Completed => "COMPLETED",
        }
    }
}

/// Unified calendar entry. Local rows carry `id`/`user_id`; external-only
/// entries from the provider leave them empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventView {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub event_type: EventType,
    pub is_important: bool,
    pub is_completed: bool,
    /// Linked todo/meeting id for local rows, else the external id
    pub source_id: Option<String>,
    pub external_event_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Start or end of a provider event: `date` for all-day, `dateTime` for timed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Body for creating or patching an event, forwarded to the provider as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
}

/// Event as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub start: Option<EventDateTime>,
    #[serde(default)]
    pub end: Option<EventDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub is_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_collections_are_distinct() {
        let absent: MeetingResultUpdate = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(absent.participants.is_none());
        assert!(absent.transcripts.is_none());

        let empty: MeetingResultUpdate =
            serde_json::from_str(r#"{"participants":[],"transcripts":[]}"#).unwrap();
        assert_eq!(empty.participants.map(|p| p.len()), Some(0));
        assert_eq!(empty.transcripts.map(|t| t.len()), Some(0));
    }

    #[test]
    fn test_meeting_status_only_moves_forward() {
        assert!(MeetingStatus::Scheduled.can_transition_to(MeetingStatus::Recording));
        assert!(MeetingStatus::Recording.can_transition_to(MeetingStatus::Completed));
        assert!(!MeetingStatus::Completed.can_transition_to(MeetingStatus::Recording));
        assert!(!MeetingStatus::Recording.can_transition_to(MeetingStatus::Scheduled));
        assert!(!MeetingStatus::Completed.can_transition_to(MeetingStatus::Completed));
    }

    #[test]
    fn test_keyword_source_label_defaults_to_user() {
        assert_eq!(KeywordSource::from_label(Some("ai")), KeywordSource::Ai);
        assert_eq!(KeywordSource::from_label(Some(" AI ")), KeywordSource::Ai);
        assert_eq!(KeywordSource::from_label(Some("robot")), KeywordSource::User);
        assert_eq!(KeywordSource::from_label(None), KeywordSource::User);
    }

    #[test]
    fn test_event_type_storage_names() {
        for ty in [
            EventType::Normal,
            EventType::AllDay,
            EventType::Task,
            EventType::Meeting,
            EventType::Personal,
        ] {
            assert_eq!(EventType::from_str(ty.as_str()), Some(ty));
        }
        assert_eq!(EventType::from_str("meeting"), None);
    }

    #[test]
    fn test_external_event_uses_provider_field_names() {
        let json = r#"{
            "id": "g1",
            "summary": "Standup",
            "status": "confirmed",
            "htmlLink": "https://calendar.example/g1",
            "start": {"dateTime": "2024-03-01T09:00:00+09:00"},
            "end": {"dateTime": "2024-03-01T09:15:00+09:00"}
        }"#;
        let event: ExternalEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "g1");
        assert_eq!(
            event.start.and_then(|s| s.date_time).as_deref(),
            Some("2024-03-01T09:00:00+09:00")
        );

        let request = CalendarEventRequest {
            summary: Some("Plan".into()),
            start: Some(EventDateTime {
                date: Some("2024-03-02".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["start"]["date"], "2024-03-02");
        assert!(value.get("description").is_none());
    }
}
