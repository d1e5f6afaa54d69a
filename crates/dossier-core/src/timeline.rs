//! Chronological merge of the deal's dated records.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    dossier::{Dossier, ResourceKey},
    errors::Error,
    Result,
};

/// Where a timeline event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Activity,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Activity => "activity",
        }
    }
}

/// Dossier resources that feed the timeline, with the tag their events carry.
const SOURCES: &[(ResourceKey, EventKind)] = &[(ResourceKey::Activities, EventKind::Activity)];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(with = "event_date")]
    pub date: DateTime<FixedOffset>,
    pub data: Value,
}

/// Merge every timeline source into one list sorted by `CREATED`.
///
/// A record whose `CREATED` is missing or not ISO-8601 fails the whole merge: a
/// silently dropped entry would make the report look complete when it is not.
pub fn merge(dossier: &Dossier) -> Result<Vec<TimelineEvent>> {
    let mut events = Vec::new();

    for (key, kind) in SOURCES {
        let Some(Value::Array(records)) = dossier.value(*key) else {
            continue;
        };
        for (index, record) in records.iter().enumerate() {
            let date = created_at(index, record)?;
            events.push(TimelineEvent {
                kind: *kind,
                date,
                data: record.clone(),
            });
        }
    }

    // stable: equal timestamps keep source order
    events.sort_by_key(|e| e.date);
    Ok(events)
}

fn created_at(index: usize, record: &Value) -> Result<DateTime<FixedOffset>> {
    let invalid = |value: String, reason: &str| Error::TimelineDate {
        index,
        value,
        reason: reason.to_string(),
    };

    match record.get("CREATED") {
        None | Some(Value::Null) => Err(invalid(String::new(), "missing")),
        Some(Value::String(raw)) => {
            parse_iso8601(raw).ok_or_else(|| invalid(raw.clone(), "not an ISO-8601 timestamp"))
        }
        Some(other) => Err(invalid(other.to_string(), "not a string")),
    }
}

/// ISO-8601 with offset, or a naive date/date-time read as UTC.
pub fn parse_iso8601(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Timestamps travel through report JSON as `YYYY-MM-DD HH:MM:SS[.fff]+HH:MM`.
///
/// Sub-second precision is written only when present, in 3, 6 or 9 digits.
pub(crate) mod event_date {
    use chrono::{DateTime, FixedOffset};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

    pub fn serialize<S: Serializer>(
        date: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&raw))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dossier::Slot;
    use serde_json::json;

    fn with_activities(records: Value) -> Dossier {
        let mut d = Dossier::new();
        d.insert(ResourceKey::Activities, Slot::Fetched(records));
        d
    }

    #[test]
    fn empty_dossier_yields_empty_timeline() {
        assert!(merge(&Dossier::new()).unwrap().is_empty());
    }

    #[test]
    fn sorts_by_created_and_keeps_ties_in_order() {
        let d = with_activities(json!([
            {"ID": "late", "CREATED": "2025-06-11T09:00:00+03:00"},
            {"ID": "tie-a", "CREATED": "2025-06-10T12:30:00+03:00"},
            {"ID": "early", "CREATED": "2025-06-10T08:00:00+03:00"},
            {"ID": "tie-b", "CREATED": "2025-06-10T09:30:00+00:00"},
        ]));

        let ids: Vec<_> = merge(&d)
            .unwrap()
            .iter()
            .map(|e| e.data["ID"].as_str().unwrap().to_string())
            .collect();

        // 12:30+03:00 and 09:30Z are the same instant
        assert_eq!(ids, vec!["early", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn already_sorted_input_is_unchanged() {
        let records = json!([
            {"ID": "1", "CREATED": "2025-01-01T00:00:00+00:00"},
            {"ID": "2", "CREATED": "2025-01-01T00:00:00+00:00"},
            {"ID": "3", "CREATED": "2025-01-02T00:00:00+00:00"},
        ]);
        let events = merge(&with_activities(records.clone())).unwrap();
        let data: Vec<_> = events.into_iter().map(|e| e.data).collect();
        assert_eq!(Value::Array(data), records);
    }

    #[test]
    fn malformed_created_fails_the_merge() {
        let d = with_activities(json!([
            {"ID": "1", "CREATED": "2025-01-01T00:00:00+00:00"},
            {"ID": "2", "CREATED": "yesterday"},
        ]));
        let err = merge(&d).unwrap_err();
        assert!(matches!(err, Error::TimelineDate { index: 1, .. }), "{err}");
    }

    #[test]
    fn missing_created_fails_the_merge() {
        let d = with_activities(json!([{"ID": "1"}]));
        assert!(merge(&d).is_err());
    }

    #[test]
    fn events_are_tagged_as_activities() {
        let d = with_activities(json!([{"CREATED": "2025-06-10T12:30:00"}]));
        let events = merge(&d).unwrap();
        assert_eq!(events[0].kind, EventKind::Activity);
        assert_eq!(events[0].date.to_rfc3339(), "2025-06-10T12:30:00+00:00");
    }

    #[test]
    fn sub_second_order_survives_the_merge() {
        let d = with_activities(json!([
            {"ID": "b", "CREATED": "2025-06-10T12:30:00.900Z"},
            {"ID": "a", "CREATED": "2025-06-10T12:30:00.100Z"},
        ]));
        let events = merge(&d).unwrap();
        assert_eq!(events[0].data["ID"], "a");
        assert_eq!(events[1].data["ID"], "b");
    }

    #[test]
    fn parses_common_iso_shapes() {
        for raw in [
            "2025-06-10T12:30:00+03:00",
            "2025-06-10T12:30:00.250Z",
            "2025-06-10T12:30:00+0300",
            "2025-06-10 12:30:00",
            "2025-06-10",
        ] {
            assert!(parse_iso8601(raw).is_some(), "{raw}");
        }
        assert!(parse_iso8601("10.06.2025").is_none());
    }
}
