//! Stable `Speaker N` identities for meeting participants.
//!
//! A [`SpeakerMap`] is built from the persisted participants at the start of a
//! reconciliation pass and then threaded through participant and transcript
//! reconciliation, so both agree on which id a display name resolves to.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::ParticipantRow;

const SPEAKER_PREFIX: &str = "Speaker ";

fn speaker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^Speaker (\d+)$").expect("valid speaker pattern"))
}

/// Number of a well-formed `Speaker N` id.
pub fn parse_speaker_number(speaker_id: &str) -> Option<u32> {
    speaker_pattern()
        .captures(speaker_id)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn speaker_label(number: u32) -> String {
    format!("{SPEAKER_PREFIX}{number}")
}

#[derive(Debug, Clone, Default)]
pub struct SpeakerMap {
    by_name: HashMap<String, String>,
    used: HashSet<u32>,
    max_number: u32,
}

impl SpeakerMap {
    pub fn from_participants(participants: &[ParticipantRow]) -> Self {
        Self::from_pairs(
            participants
                .iter()
                .map(|p| (p.name.as_str(), p.speaker_id.as_str())),
        )
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = SpeakerMap::default();
        for (name, speaker_id) in pairs {
            if let Some(n) = parse_speaker_number(speaker_id) {
                map.used.insert(n);
                map.max_number = map.max_number.max(n);
            }
            map.by_name
                .insert(name.to_string(), speaker_id.to_string());
        }
        map
    }

    /// Id for `name`: an existing mapping always wins, an incoming
    /// `Speaker N` is honoured only above every number seen so far (and below
    /// `u32::MAX`, so a successor always exists), anything else takes the
    /// next free number.
    pub fn assign(&mut self, name: &str, incoming: Option<&str>) -> String {
        if let Some(existing) = self.by_name.get(name) {
            return existing.clone();
        }

        let number = match incoming.and_then(parse_speaker_number) {
            Some(n) if n > self.max_number && n < u32::MAX => n,
            _ => self.next_free(),
        };
        self.used.insert(number);
        self.max_number = self.max_number.max(number);

        let speaker_id = speaker_label(number);
        self.by_name.insert(name.to_string(), speaker_id.clone());
        speaker_id
    }

    /// One past the maximum, or the lowest unused number once the maximum
    /// is `u32::MAX` (only reachable through persisted ids).
    fn next_free(&self) -> u32 {
        self.max_number
            .checked_add(1)
            .unwrap_or_else(|| (1..u32::MAX).find(|n| !self.used.contains(n)).unwrap_or(0))
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    #[cfg(test)]
    fn max_number(&self) -> u32 {
        self.max_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speaker_number() {
        assert_eq!(parse_speaker_number("Speaker 3"), Some(3));
        assert_eq!(parse_speaker_number("Speaker 12"), Some(12));
        assert_eq!(parse_speaker_number("Speaker"), None);
        assert_eq!(parse_speaker_number("Speaker x"), None);
        assert_eq!(parse_speaker_number("speaker 3"), None);
        assert_eq!(parse_speaker_number("Speaker 3 "), None);
        assert_eq!(parse_speaker_number("spk-1"), None);
    }

    #[test]
    fn test_existing_name_keeps_id_regardless_of_incoming() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1"), ("Bob", "Speaker 2")]);
        assert_eq!(map.assign("Bob", Some("Speaker 9")), "Speaker 2");
        assert_eq!(map.assign("Alice", None), "Speaker 1");
    }

    #[test]
    fn test_new_names_get_increasing_numbers() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1"), ("Bob", "Speaker 2")]);
        assert_eq!(map.assign("Carol", None), "Speaker 3");
        assert_eq!(map.assign("Dan", Some("not-a-speaker")), "Speaker 4");
        assert_eq!(map.max_number(), 4);
    }

    #[test]
    fn test_incoming_id_honoured_only_above_max() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1"), ("Bob", "Speaker 2")]);
        assert_eq!(map.assign("Carol", Some("Speaker 7")), "Speaker 7");
        // Collides with Bob's number, so it is renumbered
        assert_eq!(map.assign("Dan", Some("Speaker 2")), "Speaker 8");
        assert_eq!(map.assign("Eve", Some("Speaker 5")), "Speaker 9");
    }

    #[test]
    fn test_non_numbered_persisted_ids_are_preserved() {
        let mut map = SpeakerMap::from_pairs([("Host", "spk-host")]);
        assert_eq!(map.assign("Host", None), "spk-host");
        assert_eq!(map.assign("Guest", None), "Speaker 1");
    }

    #[test]
    fn test_no_two_names_share_an_id() {
        let mut map = SpeakerMap::from_pairs([("A", "Speaker 1"), ("B", "Speaker 4")]);
        let incoming = [
            ("C", Some("Speaker 4")),
            ("D", Some("Speaker 1")),
            ("E", None),
            ("F", Some("Speaker 20")),
            ("G", Some("Speaker 20")),
        ];
        let mut seen = std::collections::HashSet::from(["Speaker 1".to_string(), "Speaker 4".to_string()]);
        for (name, id) in incoming {
            let assigned = map.assign(name, id);
            assert!(seen.insert(assigned), "duplicate id for {name}");
        }
    }

    #[test]
    fn test_incoming_id_at_numeric_limit_is_renumbered() {
        let mut map = SpeakerMap::from_pairs([("Alice", "Speaker 1")]);
        assert_eq!(map.assign("Eve", Some("Speaker 4294967295")), "Speaker 2");
        assert_eq!(map.assign("Mallory", None), "Speaker 3");
        assert_eq!(map.max_number(), 3);
    }

    #[test]
    fn test_persisted_id_at_numeric_limit_falls_back_to_lowest_free() {
        let mut map = SpeakerMap::from_pairs([
            ("Alice", "Speaker 1"),
            ("Bob", "Speaker 4294967295"),
        ]);
        assert_eq!(map.assign("Carol", None), "Speaker 2");
        assert_eq!(map.assign("Dan", Some("Speaker 9")), "Speaker 3");
        assert_eq!(map.assign("Bob", None), "Speaker 4294967295");
    }
}
