use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};

pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wall-clock time of the server, truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn to_sql_datetime(dt: NaiveDateTime) -> String {
    dt.format(SQL_DATETIME_FORMAT).to_string()
}

pub fn from_sql_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(s.trim(), SQL_DATETIME_FORMAT)?)
}

/// Parses an admin-entered time of day, `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Serde adapter for `YYYY-MM-DD HH:MM:SS` timestamps inside JSON metadata.
pub mod sql_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_sql_datetime(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::from_sql_datetime(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&super::super::to_sql_datetime(*dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.filter(|s| !s.trim().is_empty())
                .map(|s| super::super::from_sql_datetime(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(parse_time_of_day("09:20"), NaiveTime::from_hms_opt(9, 20, 0));
        assert_eq!(parse_time_of_day(" 13:05:30 "), NaiveTime::from_hms_opt(13, 5, 30));
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("nine"), None);
    }

    #[test]
    fn sql_datetime_round_trips_whole_seconds() {
        let dt = from_sql_datetime("2025-01-10 09:00:00").unwrap();
        assert_eq!(to_sql_datetime(dt), "2025-01-10 09:00:00");
    }
}
