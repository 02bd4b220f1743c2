//! Timestamp helpers shared by the stores and the persisted layout.
//!
//! Persisted timestamps are ISO-8601 strings at millisecond resolution
//! (`2025-01-10T09:00:00.000Z`). The clock truncates to the same resolution so
//! a value survives a save/load cycle unchanged.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc))
}

pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Local `YYYY-MM-DD HH:MM`, as shown next to created, deadline and upload stamps.
pub fn format_minute(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_iso(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_iso(&raw).map_err(serde::de::Error::custom)
}

pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&super::to_iso(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| super::parse_iso(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_uses_millisecond_precision_and_zulu() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        assert_eq!(to_iso(&ts), "2025-01-10T09:00:00.000Z");
    }

    #[test]
    fn parses_offsets_back_to_utc() {
        let ts = parse_iso("2025-01-10T10:00:00.000+01:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap());
        assert!(parse_iso("yesterday").is_err());
    }

    #[test]
    fn truncation_drops_sub_millisecond_digits() {
        let ts = parse_iso("2025-01-10T09:00:00.123456789Z").unwrap();
        assert_eq!(to_iso(&truncate_millis(ts)), "2025-01-10T09:00:00.123Z");
        assert_eq!(parse_iso(&to_iso(&truncate_millis(ts))).unwrap(), truncate_millis(ts));
    }
}
