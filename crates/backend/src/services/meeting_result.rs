//! Applies an edited meeting result: title, summary fields, importance,
//! participants, keywords, action items and transcripts, all in one
//! transaction.

use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use shared_types::{AiSummary, ImportanceInput, ImportanceLevel, MeetingResultUpdate};

use super::action_items::{plan_action_items, ActionItemDraft};
use super::error::{ServiceError, ServiceResult};
use super::keywords::{plan_ai_keywords, plan_keywords, KeywordLink};
use super::participants::{plan_participants, ParticipantDraft};
use super::speakers::SpeakerMap;
use super::transcripts::{plan_transcripts, TranscriptPlan};
use crate::db;
use crate::models::{
    MeetingResultChangeset, MeetingResultRow, MeetingRow, NewActionItem, NewParticipant,
    ParticipantRow, TranscriptRow,
};

/// Stored state of one meeting, loaded inside the transaction.
#[derive(Debug, Clone)]
pub struct MeetingSnapshot {
    pub meeting: MeetingRow,
    pub participants: Vec<ParticipantRow>,
    pub result: MeetingResultRow,
    pub transcripts: Vec<TranscriptRow>,
}

/// Every write an update needs. `None` parts leave stored data untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingResultPlan {
    pub title: Option<String>,
    pub summary: MeetingResultChangeset,
    pub participants: Option<Vec<ParticipantDraft>>,
    pub keywords: Option<Vec<KeywordLink>>,
    pub action_items: Option<Vec<ActionItemDraft>>,
    pub transcripts: Option<TranscriptPlan>,
}

/// Free-text importance labels, Korean or English, to a level. Anything
/// unrecognised is MEDIUM.
pub fn map_importance_label(label: Option<&str>) -> ImportanceLevel {
    let Some(label) = label.map(str::trim).filter(|s| !s.is_empty()) else {
        return ImportanceLevel::Medium;
    };
    match label {
        "높음" => ImportanceLevel::High,
        "보통" => ImportanceLevel::Medium,
        "낮음" => ImportanceLevel::Low,
        other => ImportanceLevel::from_str(&other.to_uppercase()).unwrap_or_else(|| {
            tracing::debug!("Unknown importance label {:?}, using MEDIUM", other);
            ImportanceLevel::Medium
        }),
    }
}

fn summary_changes(
    purpose: Option<&String>,
    agenda: Option<&String>,
    summary: Option<&String>,
    importance: Option<&ImportanceInput>,
) -> MeetingResultChangeset {
    MeetingResultChangeset {
        purpose: purpose.cloned(),
        agenda: agenda.cloned(),
        summary: summary.cloned(),
        importance_level: importance
            .map(|i| map_importance_label(i.level.as_deref()).as_str().to_string()),
        importance_reason: importance.map(|i| i.reason.clone().unwrap_or_default()),
    }
}

/// Work out every change `update` makes to `snapshot` without touching the
/// database. Participants are planned before transcripts so that new
/// participants are already resolvable when transcript speakers are repaired.
pub fn plan_meeting_result(
    snapshot: &MeetingSnapshot,
    update: &MeetingResultUpdate,
) -> ServiceResult<MeetingResultPlan> {
    let title = update
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != snapshot.meeting.title)
        .map(String::from);

    let mut speakers = SpeakerMap::from_participants(&snapshot.participants);
    let participants = plan_participants(&mut speakers, update.participants.as_deref());
    let transcripts = plan_transcripts(
        snapshot.meeting.id,
        &snapshot.transcripts,
        update.transcripts.as_deref(),
        &speakers,
    )?;

    Ok(MeetingResultPlan {
        title,
        summary: summary_changes(
            update.purpose.as_ref(),
            update.agenda.as_ref(),
            update.summary.as_ref(),
            update.importance.as_ref(),
        ),
        participants,
        keywords: plan_keywords(update.keywords.as_deref()),
        action_items: plan_action_items(update.action_items.as_deref()),
        transcripts,
    })
}

pub async fn load_snapshot(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
) -> ServiceResult<MeetingSnapshot> {
    let meeting = db::meetings::get_by_id(conn, meeting_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Meeting {meeting_id}")))?;
    let participants = db::participants::list_for_meeting(conn, meeting_id).await?;
    let result = db::meeting_results::get_or_create(conn, meeting_id).await?;
    let transcripts = db::transcripts::list_for_meeting(conn, meeting_id).await?;

    Ok(MeetingSnapshot {
        meeting,
        participants,
        result,
        transcripts,
    })
}

async fn apply_plan(
    conn: &mut AsyncPgConnection,
    snapshot: &MeetingSnapshot,
    plan: MeetingResultPlan,
) -> ServiceResult<()> {
    let meeting_id = snapshot.meeting.id;
    let result_id = snapshot.result.id;

    if let Some(title) = &plan.title {
        db::meetings::update_title(conn, meeting_id, title).await?;
    }

    if plan.summary != MeetingResultChangeset::default() {
        db::meeting_results::update_summary(conn, result_id, &plan.summary).await?;
    }

    if let Some(participants) = plan.participants {
        let rows: Vec<NewParticipant> = participants
            .into_iter()
            .map(|p| NewParticipant {
                meeting_id,
                speaker_id: p.speaker_id,
                name: p.name,
            })
            .collect();
        db::participants::replace(conn, meeting_id, &rows).await?;
    }

    if let Some(links) = &plan.keywords {
        db::keywords::replace_links(conn, result_id, links).await?;
    }

    if let Some(items) = plan.action_items {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let assignee_user_id = match item.assignee_name.as_deref() {
                Some(name) => db::users::find_by_name(conn, name).await?.map(|u| u.id),
                None => None,
            };
            rows.push(NewActionItem {
                meeting_result_id: result_id,
                assignee_user_id,
                task: item.task,
                is_completed: item.is_completed,
                due_date: item.due_date,
                source: item.source,
            });
        }
        db::action_items::replace(conn, result_id, &rows).await?;
    }

    if let Some(transcripts) = plan.transcripts.filter(|p| !p.is_empty()) {
        tracing::debug!(
            "Meeting {} transcripts: {} deleted, {} updated, {} inserted",
            meeting_id,
            transcripts.deletes.len(),
            transcripts.updates.len(),
            transcripts.inserts.len()
        );
        db::transcripts::apply_plan(conn, &transcripts).await?;
    }

    Ok(())
}

/// Apply a user edit of a meeting's result. Nothing is written unless every
/// part succeeds.
pub async fn reconcile_meeting_result(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
    update: MeetingResultUpdate,
) -> ServiceResult<()> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let snapshot = load_snapshot(conn, meeting_id).await?;
            let plan = plan_meeting_result(&snapshot, &update)?;
            apply_plan(conn, &snapshot, plan).await
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!("Reconciled result of meeting {}", meeting_id);
    Ok(())
}

/// Store summarizer output. Summary fields the AI sent are overwritten; its
/// keywords are added next to the existing ones.
pub async fn apply_ai_summary(
    conn: &mut AsyncPgConnection,
    meeting_id: i64,
    ai: AiSummary,
) -> ServiceResult<()> {
    let added = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                if db::meetings::get_by_id(conn, meeting_id).await?.is_none() {
                    return Err(ServiceError::not_found(format!("Meeting {meeting_id}")));
                }
                let result = db::meeting_results::get_or_create(conn, meeting_id).await?;

                let changes = summary_changes(
                    ai.purpose.as_ref(),
                    ai.agenda.as_ref(),
                    ai.summary.as_ref(),
                    ai.importance.as_ref(),
                );
                if changes != MeetingResultChangeset::default() {
                    db::meeting_results::update_summary(conn, result.id, &changes).await?;
                }

                let existing = db::keywords::linked_to_result(conn, result.id).await?;
                let links =
                    plan_ai_keywords(existing.iter().map(|(name, _)| name.as_str()), &ai.keywords);
                db::keywords::add_links(conn, result.id, &links).await?;
                Ok(links.len())
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        "Applied AI summary to meeting {} ({} new keywords)",
        meeting_id,
        added
    );
    Ok(())
}
