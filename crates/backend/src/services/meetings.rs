//! Meeting lifecycle around the result editor: scheduling, recording,
//! finishing, and the read model returned to clients.

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use shared_types::{
    ActionItemView, CreateMeetingRequest, EventType, FinishMeetingRequest, ImportanceLevel,
    ImportanceView, KeywordSource, KeywordView, MeetingDetail, MeetingResponse,
    MeetingResultView, MeetingStatus, ParticipantInput, RecordingInput, TranscriptCapture,
};

use super::error::{ServiceError, ServiceResult};
use super::participants::plan_participants;
use super::speakers::SpeakerMap;
use crate::db;
use crate::models::{
    ActionItemRow, MeetingResultRow, MeetingRow, NewCalendarEvent, NewMeeting, NewParticipant,
    NewRecording, NewTranscript,
};

pub fn parse_scheduled_at(raw: &str) -> ServiceResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| ServiceError::invalid(format!("scheduled_at {raw:?}: {e}")))
}

fn now_local(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Trimmed, non-empty keywords joined for the `highlight_keywords` column.
pub fn join_highlights(keywords: &[String]) -> Option<String> {
    let joined = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    (!joined.is_empty()).then_some(joined)
}

pub fn capture_rows(meeting_id: i64, captures: &[TranscriptCapture]) -> Vec<NewTranscript> {
    captures
        .iter()
        .map(|c| NewTranscript {
            meeting_id,
            speaker_id: c.speaker.clone(),
            speaker_name: c.speaker_name.clone(),
            speaker_label: c.speaker_label,
            text: c.text.clone(),
            start_time: c.start_time,
            end_time: c.end_time,
            sequence_order: c.sequence_order,
            is_deleted: false,
        })
        .collect()
}

fn new_recording(meeting_id: i64, input: RecordingInput) -> NewRecording {
    NewRecording {
        meeting_id,
        audio_file_url: input.audio_file_url,
        audio_file_size: input.audio_file_size,
        audio_format: input.audio_format,
        duration_seconds: input.duration_seconds,
    }
}

pub fn result_view(
    result: MeetingResultRow,
    keywords: Vec<(String, String)>,
    action_items: Vec<(ActionItemRow, Option<String>)>,
) -> MeetingResultView {
    let importance = result.importance_level.as_deref().map(|level| ImportanceView {
        level: ImportanceLevel::from_str(level).unwrap_or(ImportanceLevel::Medium),
        reason: result.importance_reason.clone().unwrap_or_default(),
    });

    MeetingResultView {
        purpose: result.purpose,
        agenda: result.agenda,
        summary: result.summary,
        importance,
        keywords: keywords
            .into_iter()
            .map(|(text, source)| KeywordView {
                text,
                source: KeywordSource::from_str(&source).unwrap_or(KeywordSource::User),
            })
            .collect(),
        action_items: action_items
            .into_iter()
            .map(|(item, assignee)| ActionItemView {
                id: item.id,
                task: item.task,
                assignee,
                due_date: item.due_date,
                source: item.source,
                is_completed: item.is_completed,
            })
            .collect(),
    }
}

async fn meeting_or_not_found(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
) -> ServiceResult<MeetingRow> {
    db::meetings::get_by_id(conn, meeting_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Meeting {meeting_id}")))
}

/// Schedule a meeting hosted by `host_email`. Listed participants become
/// `Speaker 1..n` in order and the host gets a MEETING entry on their
/// calendar.
pub async fn create_meeting(
    conn: &mut AsyncPgConnection,
    host_email: &str,
    request: CreateMeetingRequest,
) -> ServiceResult<MeetingResponse> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::invalid("meeting title is empty"));
    }
    let scheduled_at = parse_scheduled_at(&request.scheduled_at)?;
    let host = db::users::get_by_email(conn, host_email)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("User {host_email}")))?;

    let inputs: Vec<ParticipantInput> = request
        .participants
        .iter()
        .map(|name| ParticipantInput {
            speaker_id: None,
            name: name.clone(),
        })
        .collect();
    let drafts =
        plan_participants(&mut SpeakerMap::default(), Some(inputs.as_slice())).unwrap_or_default();

    let meeting = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                let meeting = db::meetings::create(
                    conn,
                    &NewMeeting {
                        title: title.clone(),
                        description: request.description.clone(),
                        scheduled_at,
                        status: MeetingStatus::Scheduled.as_str().to_string(),
                        host_user_id: host.id,
                        is_important: false,
                        highlight_keywords: join_highlights(&request.keywords),
                    },
                )
                .await?;

                let participants: Vec<NewParticipant> = drafts
                    .into_iter()
                    .map(|p| NewParticipant {
                        meeting_id: meeting.id,
                        speaker_id: p.speaker_id,
                        name: p.name,
                    })
                    .collect();
                db::participants::replace(conn, meeting.id, &participants).await?;

                db::calendar_events::create(
                    conn,
                    &NewCalendarEvent {
                        user_id: host.id,
                        title,
                        event_date: scheduled_at.date(),
                        event_time: Some(scheduled_at.time()),
                        event_type: EventType::Meeting.as_str().to_string(),
                        is_important: false,
                        is_completed: false,
                        task_id: None,
                        meeting_id: Some(meeting.id),
                        external_event_id: None,
                    },
                )
                .await?;

                Ok(meeting)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!("Created meeting {} for {}", meeting.id, host_email);
    Ok(meeting.into())
}

pub async fn get_meeting(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
) -> ServiceResult<MeetingDetail> {
    let meeting = meeting_or_not_found(conn, meeting_id).await?;
    let participants = db::participants::list_for_meeting(conn, meeting_id).await?;
    let transcripts = db::transcripts::list_for_meeting(conn, meeting_id).await?;

    let result = match db::meeting_results::get_for_meeting(conn, meeting_id).await? {
        Some(result) => {
            let keywords = db::keywords::linked_to_result(conn, result.id).await?;
            let action_items = db::action_items::list_for_result(conn, result.id).await?;
            Some(result_view(result, keywords, action_items))
        }
        None => None,
    };

    Ok(MeetingDetail {
        meeting: meeting.into(),
        participants: participants.into_iter().map(Into::into).collect(),
        transcripts: transcripts.into_iter().map(Into::into).collect(),
        result,
    })
}

pub async fn start_recording(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
    tz: Tz,
) -> ServiceResult<MeetingResponse> {
    let meeting = meeting_or_not_found(conn, meeting_id).await?;
    let status = meeting.status();
    if !status.can_transition_to(MeetingStatus::Recording) {
        return Err(ServiceError::Conflict(format!(
            "meeting {meeting_id} is {} and cannot start recording",
            status.as_str()
        )));
    }

    let meeting = db::meetings::mark_recording(conn, meeting_id, now_local(tz)).await?;
    tracing::info!("Meeting {} started recording", meeting_id);
    Ok(meeting.into())
}

/// Complete a meeting with its recording and captured transcript. Finishing
/// twice keeps the first end time; a non-empty capture replaces the stored
/// transcript.
pub async fn finish_meeting(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
    request: FinishMeetingRequest,
    tz: Tz,
) -> ServiceResult<MeetingResponse> {
    let meeting = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                let mut meeting = meeting_or_not_found(conn, meeting_id).await?;
                if meeting.status() != MeetingStatus::Completed {
                    meeting = db::meetings::mark_completed(conn, meeting_id, now_local(tz)).await?;
                }

                if let Some(recording) = request.recording {
                    match db::recordings::get_for_meeting(conn, meeting_id).await? {
                        Some(existing) => tracing::debug!(
                            "Meeting {} already has recording {}",
                            meeting_id,
                            existing.id
                        ),
                        None => {
                            db::recordings::create(conn, &new_recording(meeting_id, recording))
                                .await?;
                        }
                    }
                }

                if !request.transcripts.is_empty() {
                    let rows = capture_rows(meeting_id, &request.transcripts);
                    db::transcripts::replace_all(conn, meeting_id, &rows).await?;
                }

                Ok(meeting)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!("Meeting {} finished", meeting_id);
    Ok(meeting.into())
}

pub async fn attach_recording(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
    input: RecordingInput,
    tz: Tz,
) -> ServiceResult<MeetingResponse> {
    let meeting = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                let mut meeting = meeting_or_not_found(conn, meeting_id).await?;
                if db::recordings::get_for_meeting(conn, meeting_id)
                    .await?
                    .is_some()
                {
                    return Err(ServiceError::Conflict(format!(
                        "meeting {meeting_id} already has a recording"
                    )));
                }

                db::recordings::create(conn, &new_recording(meeting_id, input)).await?;
                if meeting.status() != MeetingStatus::Completed {
                    meeting = db::meetings::mark_completed(conn, meeting_id, now_local(tz)).await?;
                }
                Ok(meeting)
            }
            .scope_boxed()
        })
        .await?;

    Ok(meeting.into())
}

/// Delete keywords that no meeting result links to.
pub async fn sweep_orphan_keywords(conn: &mut AsyncPgConnection) -> ServiceResult<usize> {
    let deleted = db::keywords::delete_orphans(conn).await?;
    tracing::info!("Swept {} orphan keywords", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_scheduled_at() {
        let at = parse_scheduled_at("2024-03-01T10:30:00").unwrap();
        assert_eq!(
            at,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        );

        for bad in ["2024-03-01", "2024-03-01 10:30:00", "tomorrow"] {
            let err = parse_scheduled_at(bad).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "{bad}");
        }
    }

    #[test]
    fn test_join_highlights() {
        assert_eq!(
            join_highlights(&[" budget ".into(), "".into(), "hiring".into()]).as_deref(),
            Some("budget,hiring")
        );
        assert_eq!(join_highlights(&[" ".into()]), None);
        assert_eq!(join_highlights(&[]), None);
    }

    #[test]
    fn test_capture_rows_are_visible() {
        let rows = capture_rows(
            4,
            &[TranscriptCapture {
                speaker: "Speaker 1".into(),
                speaker_name: Some("Alice".into()),
                speaker_label: Some(1),
                text: "Let's start".into(),
                start_time: 0,
                end_time: 1500,
                sequence_order: 1,
            }],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].meeting_id, 4);
        assert_eq!(rows[0].speaker_id, "Speaker 1");
        assert!(!rows[0].is_deleted);
    }

    #[test]
    fn test_result_view() {
        let now = Utc::now();
        let result = MeetingResultRow {
            id: 9,
            meeting_id: 1,
            purpose: Some("Plan Q2".into()),
            agenda: None,
            summary: None,
            importance_level: Some("SEVERE".into()),
            importance_reason: None,
            created_at: now,
            updated_at: now,
        };
        let item = ActionItemRow {
            id: 3,
            meeting_result_id: 9,
            assignee_user_id: Some(2),
            task: "Draft budget".into(),
            is_completed: false,
            due_date: None,
            source: Some("AI".into()),
            created_at: now,
            updated_at: now,
        };

        let view = result_view(
            result,
            vec![("budget".into(), "AI".into()), ("q2".into(), "??".into())],
            vec![(item, Some("Bob".into()))],
        );

        let importance = view.importance.unwrap();
        assert_eq!(importance.level, ImportanceLevel::Medium);
        assert_eq!(importance.reason, "");
        assert_eq!(view.keywords[0].source, KeywordSource::Ai);
        assert_eq!(view.keywords[1].source, KeywordSource::User);
        assert_eq!(view.action_items[0].assignee.as_deref(), Some("Bob"));
    }
}
