//! Participant list replacement.

use std::collections::HashSet;

use shared_types::ParticipantInput;

use super::speakers::SpeakerMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDraft {
    pub speaker_id: String,
    pub name: String,
}

/// Target participant set for an incoming list, or `None` when the list was
/// not submitted and the stored participants stay as they are.
///
/// Names are assigned through `speakers`, which keeps the mapping for the
/// transcript pass. A name listed twice keeps its first entry only.
pub fn plan_participants(
    speakers: &mut SpeakerMap,
    incoming: Option<&[ParticipantInput]>,
) -> Option<Vec<ParticipantDraft>> {
    let incoming = incoming?;
    let mut seen = HashSet::new();

    let drafts = incoming
        .iter()
        .filter_map(|p| {
            let name = p.name.trim();
            if name.is_empty() || !seen.insert(name.to_string()) {
                return None;
            }
            let speaker_id = speakers.assign(name, p.speaker_id.as_deref());
            Some(ParticipantDraft {
                speaker_id,
                name: name.to_string(),
            })
        })
        .collect();

    Some(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, speaker_id: Option<&str>) -> ParticipantInput {
        ParticipantInput {
            name: name.to_string(),
            speaker_id: speaker_id.map(String::from),
        }
    }

    #[test]
    fn test_absent_list_leaves_participants_alone() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1")]);
        assert_eq!(plan_participants(&mut map, None), None);
    }

    #[test]
    fn test_empty_list_clears_participants() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1")]);
        assert_eq!(plan_participants(&mut map, Some(&[])), Some(vec![]));
    }

    #[test]
    fn test_replace_preserves_known_speakers() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1"), ("Bob", "Speaker 2")]);
        let plan = plan_participants(&mut map, Some(&[input("Bob", None), input("Carol", None)]))
            .unwrap();

        assert_eq!(
            plan,
            vec![
                ParticipantDraft {
                    speaker_id: "Speaker 2".into(),
                    name: "Bob".into()
                },
                ParticipantDraft {
                    speaker_id: "Speaker 3".into(),
                    name: "Carol".into()
                },
            ]
        );
        assert!(plan.iter().all(|p| p.name != "Alice"));
        assert_eq!(map.resolve("Carol"), Some("Speaker 3"));
    }

    #[test]
    fn test_duplicate_and_blank_names_are_collapsed() {
        let mut map = SpeakerMap::default();
        let plan = plan_participants(
            &mut map,
            Some(&[
                input("Alice", None),
                input("  ", None),
                input("Alice ", Some("Speaker 5")),
                input("Bob", None),
            ]),
        )
        .unwrap();

        let names: Vec<_> = plan.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(plan[0].speaker_id, "Speaker 1");
        assert_eq!(plan[1].speaker_id, "Speaker 2");
    }
}
