use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// One queued blog post. Keys are camelCase to stay compatible with the
/// hand-edited queue file; unknown keys survive a load/save cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostSpec {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_scheduled: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "timestamp::serialize",
        deserialize_with = "timestamp::deserialize"
    )]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "timestamp::serialize",
        deserialize_with = "timestamp::deserialize"
    )]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostSpec {
    pub fn new(title: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            title: title.into(),
            tags,
            is_scheduled: false,
            scheduled_date: None,
            created: false,
            created_date: None,
            extra: Map::new(),
        }
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.is_scheduled = true;
        self.scheduled_date = Some(at);
        self
    }

    /// Due-date policy. A scheduled post without a date is treated as due.
    pub fn is_due(&self, now: DateTime<Utc>, force: bool) -> bool {
        if force || !self.is_scheduled {
            return true;
        }
        match self.scheduled_date {
            Some(at) => at <= now,
            None => true,
        }
    }

    pub fn mark_created(&mut self, at: DateTime<Utc>) {
        self.created = true;
        self.created_date = Some(at);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Remote => "remote",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw generated body for one title, tagged with the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub text: String,
    pub backend: Backend,
}

/// Queue timestamps are written like JavaScript's `toISOString()` and read
/// leniently so hand edits such as `2025-05-02` or `2025-05-02T09:00:00` work.
mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }

    pub(super) fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(s) {
            return Some(at.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 13, 0, 0).unwrap()
    }

    #[test]
    fn unscheduled_post_is_always_due() {
        let spec = PostSpec::new("a", vec![]);
        assert!(spec.is_due(now(), false));
    }

    #[test]
    fn future_post_waits_unless_forced() {
        let spec = PostSpec::new("a", vec![]).scheduled_for(now() + Duration::days(3));
        assert!(!spec.is_due(now(), false));
        assert!(spec.is_due(now(), true));
    }

    #[test]
    fn past_and_exact_dates_are_due() {
        let past = PostSpec::new("a", vec![]).scheduled_for(now() - Duration::minutes(1));
        let exact = PostSpec::new("b", vec![]).scheduled_for(now());
        assert!(past.is_due(now(), false));
        assert!(exact.is_due(now(), false));
    }

    #[test]
    fn scheduled_without_date_is_due() {
        let mut spec = PostSpec::new("a", vec![]);
        spec.is_scheduled = true;
        assert!(spec.is_due(now(), false));
    }

    #[test]
    fn deserializes_queue_entry_with_defaults_and_extra_keys() {
        let spec: PostSpec = serde_json::from_value(json!({
            "title": "Intro to Widgets",
            "isScheduled": true,
            "scheduledDate": "2025-05-09",
            "author": "me"
        }))
        .unwrap();
        assert!(spec.tags.is_empty());
        assert!(!spec.created);
        assert_eq!(
            spec.scheduled_date,
            Some(Utc.with_ymd_and_hms(2025, 5, 9, 0, 0, 0).unwrap())
        );

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["author"], "me");
        assert_eq!(back["scheduledDate"], "2025-05-09T00:00:00.000Z");
        assert!(back.get("createdDate").is_none());
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let err = serde_json::from_value::<PostSpec>(json!({
            "title": "x",
            "scheduledDate": "next friday"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn parses_offsets_and_naive_datetimes() {
        assert_eq!(
            timestamp::parse("2025-05-02T15:00:00+02:00"),
            Some(now())
        );
        assert_eq!(timestamp::parse("2025-05-02T13:00:00"), Some(now()));
    }
}
