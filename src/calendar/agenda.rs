use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar::Event;

/// Events sharing one calendar day, in the order they arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub events: Vec<Event>,
}

impl DayGroup {
    /// Display heading for the group, e.g. `Sat Mar 02 2024`.
    pub fn label(&self) -> String {
        self.date.format("%a %b %d %Y").to_string()
    }
}

/// Buckets events by the calendar day of their start timestamp.
///
/// Groups come back in ascending date order. Events inside a group keep
/// their input order; the list view does not re-sort by time of day.
/// An empty input yields an empty output, which the caller renders as an
/// explicit "no events" state.
pub fn group_by_day<I>(events: I) -> Vec<DayGroup>
where
    I: IntoIterator<Item = Event>,
{
    let mut buckets: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
    for event in events {
        buckets.entry(event.start_date()).or_default().push(event);
    }

    buckets
        .into_iter()
        .map(|(date, events)| DayGroup { date, events })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn event_at(id: &str, start: &str) -> Event {
        let start = NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M").unwrap();
        Event {
            id: id.to_string(),
            title: format!("event {}", id),
            description: String::new(),
            start,
            end: start + chrono::Duration::hours(1),
            recurrence: None,
            is_recurring_instance: false,
            original_id: None,
        }
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert_eq!(group_by_day(Vec::new()), Vec::new());
    }

    #[test]
    fn groups_sorted_ascending_by_date() {
        let events = vec![
            event_at("late", "2024-03-02T10:00"),
            event_at("early", "2024-03-01T10:00"),
        ];

        let groups = group_by_day(events);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(groups[1].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn same_day_events_share_a_group_in_input_order() {
        let events = vec![
            event_at("b", "2024-03-01T15:00"),
            event_at("a", "2024-03-01T09:00"),
            event_at("c", "2024-03-02T08:00"),
        ];

        let groups = group_by_day(events);

        assert_eq!(groups.len(), 2);
        let ids: Vec<&str> = groups[0].events.iter().map(|e| e.id.as_str()).collect();
        // Input order, not time-of-day order.
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn label_matches_date_string_style() {
        let groups = group_by_day(vec![event_at("a", "2024-03-02T10:00")]);
        assert_eq!(groups[0].label(), "Sat Mar 02 2024");
    }
}
