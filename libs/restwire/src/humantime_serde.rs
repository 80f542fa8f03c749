//! `#[serde(with = "...")]` helpers for durations written as `"30s"`,
//! `"250ms"` or `"1h 30m"`.

use std::fmt;
use std::time::Duration;

use serde::{Deserializer, Serializer, de};

/// Serialize a `Duration` as a humantime string
///
/// # Errors
///
/// Propagates the serializer's error.
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_duration(*duration))
}

/// Deserialize a `Duration` from a humantime string
///
/// # Errors
///
/// Fails if the input is not a string or not a valid humantime duration.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    deserializer.deserialize_str(DurationVisitor)
}

struct DurationVisitor;

impl de::Visitor<'_> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a duration such as \"30s\" or \"250ms\"")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
        humantime::parse_duration(value).map_err(|e| E::custom(format!("{value:?}: {e}")))
    }
}

/// Same as the parent module for `Option<Duration>`; `null` maps to `None`.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates the serializer's error.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => super::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// # Errors
    ///
    /// Fails if the value is neither `null` nor a valid humantime duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "crate::humantime_serde")] Duration);

        Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(d)| d))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Timeouts {
        #[serde(with = "crate::humantime_serde")]
        connect: Duration,
    }

    #[test]
    fn test_parses_human_durations() {
        let parsed: Timeouts = serde_json::from_str(r#"{"connect": "1m 30s"}"#).unwrap();
        assert_eq!(parsed.connect, Duration::from_secs(90));
    }

    #[test]
    fn test_serializes_round_figures() {
        let json = serde_json::to_string(&Timeouts {
            connect: Duration::from_millis(250),
        })
        .unwrap();
        assert_eq!(json, r#"{"connect":"250ms"}"#);
    }

    #[derive(Debug, Deserialize)]
    struct Idle {
        #[serde(default, with = "crate::humantime_serde::option")]
        idle: Option<Duration>,
    }

    #[test]
    fn test_optional_durations() {
        let set: Idle = serde_json::from_str(r#"{"idle": "90s"}"#).unwrap();
        assert_eq!(set.idle, Some(Duration::from_secs(90)));

        let null: Idle = serde_json::from_str(r#"{"idle": null}"#).unwrap();
        assert_eq!(null.idle, None);

        let missing: Idle = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.idle, None);
    }

    #[test]
    fn test_rejects_garbage_and_numbers() {
        assert!(serde_json::from_str::<Timeouts>(r#"{"connect": "soon"}"#).is_err());
        assert!(serde_json::from_str::<Timeouts>(r#"{"connect": 30}"#).is_err());
    }
}
