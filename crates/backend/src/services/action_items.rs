//! Action item replacement. Every submitted list replaces the stored one.

use chrono::{NaiveDate, NaiveDateTime};
use shared_types::ActionItemInput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionItemDraft {
    pub task: String,
    /// Display name to resolve against users; `None` when blank
    pub assignee_name: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub is_completed: bool,
}

/// `YYYY-MM-DD` as the last second of that day. Anything else yields no
/// due date.
pub fn parse_due_date(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(23, 59, 59),
        Err(e) => {
            tracing::debug!("Ignoring unparsable due date {:?}: {}", raw, e);
            None
        }
    }
}

pub fn plan_action_items(incoming: Option<&[ActionItemInput]>) -> Option<Vec<ActionItemDraft>> {
    let incoming = incoming?;
    Some(
        incoming
            .iter()
            .map(|item| ActionItemDraft {
                task: item.task.clone(),
                assignee_name: item
                    .assignee
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
                due_date: parse_due_date(item.due_date.as_deref()),
                source: item.source.clone(),
                is_completed: item.is_completed.unwrap_or(false),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_date_is_end_of_day() {
        let due = parse_due_date(Some("2024-05-31")).unwrap();
        assert_eq!(due.to_string(), "2024-05-31 23:59:59");
    }

    #[test]
    fn test_bad_due_dates_are_dropped() {
        assert_eq!(parse_due_date(None), None);
        assert_eq!(parse_due_date(Some("")), None);
        assert_eq!(parse_due_date(Some("next friday")), None);
        assert_eq!(parse_due_date(Some("2024-02-30")), None);
        assert_eq!(parse_due_date(Some("2024-05-31T10:00:00")), None);
    }

    #[test]
    fn test_plan_defaults() {
        let plan = plan_action_items(Some(&[
            ActionItemInput {
                task: "Send deck".into(),
                assignee: Some("  ".into()),
                due_date: Some("bogus".into()),
                source: Some("AI".into()),
                is_completed: None,
            },
            ActionItemInput {
                task: "Book room".into(),
                assignee: Some("Alice".into()),
                due_date: Some("2024-06-01".into()),
                source: None,
                is_completed: Some(true),
            },
        ]))
        .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].assignee_name, None);
        assert_eq!(plan[0].due_date, None);
        assert!(!plan[0].is_completed);
        assert_eq!(plan[1].assignee_name.as_deref(), Some("Alice"));
        assert!(plan[1].due_date.is_some());
        assert!(plan[1].is_completed);
    }

    #[test]
    fn test_absent_list_is_untouched() {
        assert_eq!(plan_action_items(None), None);
        assert_eq!(plan_action_items(Some(&[])), Some(vec![]));
    }
}
