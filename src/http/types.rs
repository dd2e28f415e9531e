use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteTypeInfo, SqliteValueRef};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// `OffsetDateTime` stored as RFC 3339 text and serialized as RFC 3339 in JSON.
///
/// The schema fills timestamp columns with `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, so the
/// database side is always UTC with millisecond precision. Decoding is done here rather than
/// through SQLx's own `time` integration so the accepted format is exactly the one we write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamptz(pub OffsetDateTime);

impl Serialize for Timestamptz {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamptz {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339)
            .map(Timestamptz)
            .map_err(serde::de::Error::custom)
    }
}

impl sqlx::Type<Sqlite> for Timestamptz {
    fn type_info() -> SqliteTypeInfo {
        <str as sqlx::Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <str as sqlx::Type<Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for Timestamptz {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <&str as sqlx::Decode<Sqlite>>::decode(value)?;
        Ok(Timestamptz(OffsetDateTime::parse(text, &Rfc3339)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_format_round_trips_through_json() {
        let parsed = OffsetDateTime::parse("2024-03-01T12:30:05.123Z", &Rfc3339).unwrap();
        let json = serde_json::to_string(&Timestamptz(parsed)).unwrap();
        assert_eq!(json, r#""2024-03-01T12:30:05.123Z""#);

        let back: Timestamptz = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, parsed);
    }
}
