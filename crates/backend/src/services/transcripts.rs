//! Three-way transcript merge.
//!
//! Incoming lines that carry a persisted id update that row, persisted rows
//! whose id is missing from the payload are deleted, and lines without an id
//! are inserted. There is no explicit delete marker in the payload.

use std::collections::{HashMap, HashSet};

use shared_types::TranscriptInput;

use super::error::{ServiceError, ServiceResult};
use super::speakers::{parse_speaker_number, SpeakerMap};
use crate::models::{NewTranscript, TranscriptChangeset, TranscriptRow};

const UNKNOWN_SPEAKER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptUpdate {
    pub id: i64,
    pub changes: TranscriptChangeset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptPlan {
    pub deletes: Vec<i64>,
    pub updates: Vec<TranscriptUpdate>,
    pub inserts: Vec<NewTranscript>,
}

impl TranscriptPlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// `mm:ss`, or `hh:mm:ss` from the first hour on.
pub fn time_label(offset_ms: i64) -> String {
    let total = offset_ms.max(0) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Diff `incoming` against the meeting's persisted lines. `None` input means
/// the transcripts were not submitted and nothing changes.
///
/// An id that does not belong to one of `persisted` fails with `NotFound`.
pub fn plan_transcripts(
    meeting_id: i64,
    persisted: &[TranscriptRow],
    incoming: Option<&[TranscriptInput]>,
    speakers: &SpeakerMap,
) -> ServiceResult<Option<TranscriptPlan>> {
    let Some(incoming) = incoming else {
        return Ok(None);
    };

    let mut by_id: HashMap<i64, &TranscriptInput> = HashMap::new();
    let mut new_lines = Vec::new();
    for line in incoming {
        match line.id {
            Some(id) => {
                by_id.insert(id, line);
            }
            None => new_lines.push(line),
        }
    }

    let known: HashSet<i64> = persisted.iter().map(|row| row.id).collect();
    if let Some(unknown) = by_id.keys().find(|id| !known.contains(id)) {
        return Err(ServiceError::not_found(format!("Transcript {unknown}")));
    }

    let mut plan = TranscriptPlan::default();

    for row in persisted {
        match by_id.get(&row.id) {
            None => plan.deletes.push(row.id),
            Some(line) => {
                let changes = merge_existing(row, line, speakers);
                if changes != current_state(row) {
                    plan.updates.push(TranscriptUpdate {
                        id: row.id,
                        changes,
                    });
                }
            }
        }
    }

    let mut next_order = persisted
        .iter()
        .map(|row| row.sequence_order)
        .chain(incoming.iter().filter_map(|line| line.sequence_order))
        .max()
        .unwrap_or(0);

    for line in new_lines {
        let sequence_order = match line.sequence_order {
            Some(order) => order,
            None => {
                next_order = next_order.checked_add(1).ok_or_else(|| {
                    ServiceError::invalid("Transcript sequence order is out of range")
                })?;
                next_order
            }
        };
        plan.inserts.push(NewTranscript {
            meeting_id,
            speaker_id: resolve_new_speaker(line, speakers),
            speaker_name: non_blank(line.speaker_name.as_deref()).map(String::from),
            speaker_label: None,
            text: line.text.clone().unwrap_or_default(),
            start_time: line.start_time.unwrap_or(0),
            end_time: line.end_time.unwrap_or(0),
            sequence_order,
            is_deleted: line.is_deleted.unwrap_or(false),
        });
    }

    Ok(Some(plan))
}

fn current_state(row: &TranscriptRow) -> TranscriptChangeset {
    TranscriptChangeset {
        speaker_id: row.speaker_id.clone(),
        speaker_name: row.speaker_name.clone(),
        text: row.text.clone(),
        sequence_order: row.sequence_order,
        is_deleted: row.is_deleted,
    }
}

fn merge_existing(
    row: &TranscriptRow,
    line: &TranscriptInput,
    speakers: &SpeakerMap,
) -> TranscriptChangeset {
    let speaker_name = non_blank(line.speaker_name.as_deref())
        .map(String::from)
        .or_else(|| row.speaker_name.clone());

    // A well-formed id is taken as sent; anything else is repaired by name.
    let speaker_id = match line.speaker.as_deref() {
        Some(id) if parse_speaker_number(id).is_some() => id.to_string(),
        raw => speaker_name
            .as_deref()
            .and_then(|name| speakers.resolve(name))
            .map(String::from)
            .or_else(|| non_blank(raw).map(String::from))
            .unwrap_or_else(|| row.speaker_id.clone()),
    };

    TranscriptChangeset {
        speaker_id,
        speaker_name,
        text: line.text.clone().unwrap_or_else(|| row.text.clone()),
        sequence_order: line.sequence_order.unwrap_or(row.sequence_order),
        is_deleted: line.is_deleted.unwrap_or(false),
    }
}

fn resolve_new_speaker(line: &TranscriptInput, speakers: &SpeakerMap) -> String {
    let name = non_blank(line.speaker_name.as_deref());
    name.and_then(|n| speakers.resolve(n))
        .or_else(|| non_blank(line.speaker.as_deref()))
        .or(name)
        .unwrap_or(UNKNOWN_SPEAKER)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::TranscriptView;

    fn row(id: i64, speaker: &str, name: &str, order: i32) -> TranscriptRow {
        TranscriptRow {
            id,
            meeting_id: 1,
            speaker_id: speaker.to_string(),
            speaker_name: Some(name.to_string()),
            speaker_label: None,
            text: format!("line {id}"),
            start_time: i64::from(order) * 1000,
            end_time: i64::from(order) * 1000 + 900,
            sequence_order: order,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resubmit(view: &TranscriptView) -> TranscriptInput {
        TranscriptInput {
            id: Some(view.id),
            speaker: Some(view.speaker.clone()),
            speaker_name: view.speaker_name.clone(),
            text: Some(view.text.clone()),
            start_time: Some(view.start_time),
            end_time: Some(view.end_time),
            sequence_order: Some(view.sequence_order),
            is_deleted: Some(view.is_deleted),
        }
    }

    fn speakers() -> SpeakerMap {
        SpeakerMap::from_pairs([("Alice", "Speaker 1"), ("Bob", "Speaker 2")])
    }

    #[test]
    fn test_time_label() {
        assert_eq!(time_label(0), "00:00");
        assert_eq!(time_label(65_400), "01:05");
        assert_eq!(time_label(3_723_000), "01:02:03");
        assert_eq!(time_label(-5), "00:00");
    }

    #[test]
    fn test_absent_list_changes_nothing() {
        let persisted = vec![row(10, "Speaker 1", "Alice", 1)];
        assert_eq!(
            plan_transcripts(1, &persisted, None, &speakers()).unwrap(),
            None
        );
    }

    #[test]
    fn test_three_way_merge() {
        let persisted = vec![
            row(10, "Speaker 1", "Alice", 1),
            row(11, "Speaker 2", "Bob", 2),
            row(12, "Speaker 1", "Alice", 3),
        ];
        let incoming = vec![
            TranscriptInput {
                id: Some(11),
                text: Some("edited".into()),
                is_deleted: Some(true),
                ..Default::default()
            },
            TranscriptInput {
                speaker_name: Some("Alice".into()),
                text: Some("fresh".into()),
                ..Default::default()
            },
        ];

        let plan = plan_transcripts(1, &persisted, Some(&incoming), &speakers())
            .unwrap()
            .unwrap();

        assert_eq!(plan.deletes, vec![10, 12]);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].id, 11);
        assert_eq!(plan.updates[0].changes.text, "edited");
        assert!(plan.updates[0].changes.is_deleted);
        assert_eq!(plan.updates[0].changes.speaker_id, "Speaker 2");

        assert_eq!(plan.inserts.len(), 1);
        let inserted = &plan.inserts[0];
        assert_eq!(inserted.speaker_id, "Speaker 1");
        assert_eq!(inserted.text, "fresh");
        assert_eq!((inserted.start_time, inserted.end_time), (0, 0));
        assert_eq!(inserted.sequence_order, 4);
        assert!(!inserted.is_deleted);
    }

    #[test]
    fn test_unchanged_resubmission_is_a_no_op() {
        let mut deleted = row(12, "Speaker 1", "Alice", 3);
        deleted.is_deleted = true;
        let persisted = vec![
            row(10, "Speaker 1", "Alice", 1),
            row(11, "spk-guest", "Guest", 2),
            deleted,
        ];
        let incoming: Vec<_> = persisted
            .iter()
            .cloned()
            .map(TranscriptView::from)
            .map(|view| resubmit(&view))
            .collect();

        let plan = plan_transcripts(1, &persisted, Some(&incoming), &speakers())
            .unwrap()
            .unwrap();
        assert!(plan.is_empty(), "unexpected changes: {plan:?}");
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let persisted = vec![row(10, "Speaker 1", "Alice", 1)];
        let incoming = vec![TranscriptInput {
            id: Some(99),
            ..Default::default()
        }];
        let err = plan_transcripts(1, &persisted, Some(&incoming), &speakers()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn test_malformed_speaker_is_repaired_by_name() {
        let persisted = vec![row(10, "Speaker 1", "Alice", 1)];
        let incoming = vec![TranscriptInput {
            id: Some(10),
            speaker: Some("SPEAKER_00".into()),
            speaker_name: Some("Bob".into()),
            ..Default::default()
        }];
        let plan = plan_transcripts(1, &persisted, Some(&incoming), &speakers())
            .unwrap()
            .unwrap();
        assert_eq!(plan.updates[0].changes.speaker_id, "Speaker 2");
        assert_eq!(plan.updates[0].changes.speaker_name.as_deref(), Some("Bob"));
        assert_eq!(plan.updates[0].changes.text, "line 10");
    }

    #[test]
    fn test_missing_soft_delete_flag_restores() {
        let mut hidden = row(10, "Speaker 1", "Alice", 1);
        hidden.is_deleted = true;
        let incoming = vec![TranscriptInput {
            id: Some(10),
            ..Default::default()
        }];
        let plan = plan_transcripts(1, &[hidden], Some(&incoming), &speakers())
            .unwrap()
            .unwrap();
        assert!(!plan.updates[0].changes.is_deleted);
    }

    #[test]
    fn test_new_line_speaker_fallbacks() {
        let incoming = vec![
            TranscriptInput {
                speaker: Some("diarizer-7".into()),
                speaker_name: Some("Stranger".into()),
                sequence_order: Some(10),
                ..Default::default()
            },
            TranscriptInput {
                speaker_name: Some("Nobody".into()),
                ..Default::default()
            },
            TranscriptInput::default(),
        ];
        let plan = plan_transcripts(1, &[], Some(&incoming), &speakers())
            .unwrap()
            .unwrap();

        let ids: Vec<_> = plan.inserts.iter().map(|t| t.speaker_id.as_str()).collect();
        assert_eq!(ids, vec!["diarizer-7", "Nobody", "Unknown"]);
        let orders: Vec<_> = plan.inserts.iter().map(|t| t.sequence_order).collect();
        assert_eq!(orders, vec![10, 11, 12]);
    }

    #[test]
    fn test_empty_list_deletes_everything() {
        let persisted = vec![row(10, "Speaker 1", "Alice", 1), row(11, "Speaker 2", "Bob", 2)];
        let plan = plan_transcripts(1, &persisted, Some(&[]), &speakers())
            .unwrap()
            .unwrap();
        assert_eq!(plan.deletes, vec![10, 11]);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn test_sequence_order_past_i32_max_is_rejected() {
        let incoming = vec![
            TranscriptInput {
                sequence_order: Some(i32::MAX),
                ..Default::default()
            },
            TranscriptInput::default(),
        ];
        let err = plan_transcripts(1, &[], Some(&incoming), &speakers()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
