//! Typed view of the engine-relevant node attributes.
//!
//! Nodes carry an opaque attribute bag; the compiler decodes the keys it
//! understands into [`NodeAttributes`] and ignores the rest.
//!
//! | key           | type                         | meaning                              |
//! |---------------|------------------------------|--------------------------------------|
//! | `timeout`     | duration string or int (ns)  | per-computation deadline             |
//! | `max_workers` | int                          | concurrent operator invocations      |
//! | `inline`      | bool                         | evaluate lazily in the reader's task |
//! | `edge_sorter` | string                       | named inbound edge ordering          |
//!
//! Duration strings use unit suffixes: `"1h30m"`, `"1.5s"`, `"250ms"`, `"10us"`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use xgraph::Attributes;

/// Execution attributes of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAttributes {
    /// Deadline for one computation of the node; zero means none.
    #[serde(with = "duration", skip_serializing_if = "Duration::is_zero")]
    pub timeout: Duration,

    /// Bound on concurrent operator invocations; zero means unbounded.
    pub max_workers: usize,

    /// Evaluate lazily on first read instead of on a background task.
    pub inline: bool,

    /// Name of the inbound edge ordering, see [`crate::sort`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_sorter: Option<String>,
}

impl NodeAttributes {
    /// Decode from a node's attribute bag; a missing bag yields the defaults.
    pub fn from_attributes(attributes: Option<&Attributes>) -> serde_json::Result<Self> {
        match attributes {
            Some(map) => serde_json::from_value(serde_json::Value::Object(map.clone())),
            None => Ok(Self::default()),
        }
    }
}

/// Parse a duration such as `"1h15m30.5s"` or `"300ms"`.
///
/// Accepted units are `ns`, `us` (`µs`), `ms`, `s`, `m` and `h`. A bare `"0"` is
/// zero. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err(format!("negative duration: {}", input));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration: {}", input))?;
        if number_end == 0 {
            return Err(format!("invalid duration: {}", input));
        }
        let number: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid number in duration: {}", input))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            unit => return Err(format!("unknown unit '{}' in duration: {}", unit, input)),
        };
        total += number * nanos_per_unit;
        rest = &rest[unit_end..];
    }
    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(format!("duration out of range: {}", input));
    }
    Ok(Duration::from_nanos(total.round() as u64))
}

/// Serde adapter accepting duration strings or integer nanoseconds.
pub mod duration {
    use super::parse_duration;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{:?}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration string or a number of nanoseconds")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_nanos(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_nanos)
                .map_err(|_| E::custom(format!("negative duration: {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Duration, E> {
            if v.is_finite() && v >= 0.0 {
                Ok(Duration::from_nanos(v.round() as u64))
            } else {
                Err(E::custom(format!("invalid duration: {}", v)))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse_duration(v).map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: serde_json::Value) -> Attributes {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2m3s").unwrap(), Duration::from_secs(123));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("5 parsecs").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn test_missing_bag_is_default() {
        assert_eq!(NodeAttributes::from_attributes(None).unwrap(), NodeAttributes::default());
    }

    #[test]
    fn test_decode_attributes() {
        let attrs = bag(json!({
            "timeout": "2s",
            "max_workers": 3,
            "inline": true,
            "edge_sorter": "node_key",
            "color": "blue",
        }));
        let parsed = NodeAttributes::from_attributes(Some(&attrs)).unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(2));
        assert_eq!(parsed.max_workers, 3);
        assert!(parsed.inline);
        assert_eq!(parsed.edge_sorter.as_deref(), Some("node_key"));
    }

    #[test]
    fn test_numeric_timeout_is_nanoseconds() {
        let attrs = bag(json!({ "timeout": 1_000_000 }));
        let parsed = NodeAttributes::from_attributes(Some(&attrs)).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(1));

        let attrs = bag(json!({ "timeout": 1.5e9 }));
        let parsed = NodeAttributes::from_attributes(Some(&attrs)).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_bad_timeout_is_an_error() {
        let attrs = bag(json!({ "timeout": "soon" }));
        assert!(NodeAttributes::from_attributes(Some(&attrs)).is_err());
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let attrs = NodeAttributes {
            timeout: Duration::from_millis(250),
            ..Default::default()
        };
        let value = serde_json::to_value(&attrs).unwrap();
        assert_eq!(value, json!({ "timeout": "250ms", "max_workers": 0, "inline": false }));
    }
}
