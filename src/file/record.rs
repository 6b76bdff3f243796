//! File metadata types.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::FileId;

/// Metadata for one uploaded file.
///
/// The password hash is kept on the struct for comparison but is never
/// serialized, so handing a record to any serde-based transport cannot leak it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Identifier shared with the blob store.
    pub id: FileId,
    /// Original filename (display only, never used for addressing).
    pub name: String,
    /// Size in bytes, as observed while storing the blob.
    pub size: u64,
    /// MIME type.
    pub content_type: String,
    /// When the file was uploaded.
    #[serde(rename = "uploadDate")]
    pub upload_time: DateTime<Utc>,
    /// When the file stops being served. `None` means never.
    #[serde(rename = "expiryDate", skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
    /// PHC-formatted password hash, if the file is protected.
    #[serde(skip)]
    pub password_hash: Option<String>,
}

impl FileRecord {
    /// Whether the file must be treated as gone at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time.is_some_and(|expiry| now > expiry)
    }

    /// A copy with the password hash removed.
    pub fn without_password_hash(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

/// How long an upload stays available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryOption {
    /// Never expires.
    Permanent,
    /// One hour.
    OneHour,
    /// One day.
    #[default]
    OneDay,
    /// Seven days.
    SevenDays,
    /// Thirty days.
    ThirtyDays,
}

impl ExpiryOption {
    /// Parse a duration option, returning `None` for unknown values.
    pub fn parse_strict(s: &str) -> Option<Self> {
        match s {
            "permanent" => Some(ExpiryOption::Permanent),
            "1h" => Some(ExpiryOption::OneHour),
            "1d" => Some(ExpiryOption::OneDay),
            "7d" => Some(ExpiryOption::SevenDays),
            "30d" => Some(ExpiryOption::ThirtyDays),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryOption::Permanent => "permanent",
            ExpiryOption::OneHour => "1h",
            ExpiryOption::OneDay => "1d",
            ExpiryOption::SevenDays => "7d",
            ExpiryOption::ThirtyDays => "30d",
        }
    }

    /// Lifetime of an upload, or `None` for permanent files.
    pub fn lifetime(&self) -> Option<Duration> {
        match self {
            ExpiryOption::Permanent => None,
            ExpiryOption::OneHour => Some(Duration::hours(1)),
            ExpiryOption::OneDay => Some(Duration::days(1)),
            ExpiryOption::SevenDays => Some(Duration::days(7)),
            ExpiryOption::ThirtyDays => Some(Duration::days(30)),
        }
    }

    /// Expiry time for a file uploaded at `uploaded_at`.
    pub fn expiry_from(&self, uploaded_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lifetime().map(|d| uploaded_at + d)
    }
}

impl fmt::Display for ExpiryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> FileRecord {
        FileRecord {
            id: FileId::generate(),
            name: "a.txt".to_string(),
            size: 5,
            content_type: "text/plain".to_string(),
            upload_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            expiry_time: None,
            password_hash: Some("$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".to_string()),
        }
    }

    #[test]
    fn test_expiry_option_parse() {
        let parse = ExpiryOption::parse_strict;
        assert_eq!(parse("permanent"), Some(ExpiryOption::Permanent));
        assert_eq!(parse("1h"), Some(ExpiryOption::OneHour));
        assert_eq!(parse("1d"), Some(ExpiryOption::OneDay));
        assert_eq!(parse("7d"), Some(ExpiryOption::SevenDays));
        assert_eq!(parse("30d"), Some(ExpiryOption::ThirtyDays));
    }

    #[test]
    fn test_expiry_option_unknown_is_rejected() {
        assert_eq!(ExpiryOption::parse_strict(""), None);
        assert_eq!(ExpiryOption::parse_strict("2w"), None);
        assert_eq!(ExpiryOption::parse_strict("Permanent"), None);
        assert_eq!(ExpiryOption::default(), ExpiryOption::OneDay);
    }

    #[test]
    fn test_expiry_option_as_str_matches_parse() {
        for opt in [
            ExpiryOption::Permanent,
            ExpiryOption::OneHour,
            ExpiryOption::OneDay,
            ExpiryOption::SevenDays,
            ExpiryOption::ThirtyDays,
        ] {
            assert_eq!(ExpiryOption::parse_strict(opt.as_str()), Some(opt));
        }
    }

    #[test]
    fn test_expiry_from() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ExpiryOption::Permanent.expiry_from(t), None);
        assert_eq!(
            ExpiryOption::OneHour.expiry_from(t),
            Some(t + Duration::hours(1))
        );
        assert_eq!(
            ExpiryOption::OneDay.expiry_from(t),
            Some(t + Duration::hours(24))
        );
        assert_eq!(
            ExpiryOption::ThirtyDays.expiry_from(t),
            Some(t + Duration::days(30))
        );
    }

    #[test]
    fn test_is_expired_at_is_strict() {
        let mut record = sample_record();
        let expiry = record.upload_time + Duration::hours(1);
        record.expiry_time = Some(expiry);

        assert!(!record.is_expired_at(expiry - Duration::minutes(1)));
        assert!(!record.is_expired_at(expiry));
        assert!(record.is_expired_at(expiry + Duration::seconds(1)));
    }

    #[test]
    fn test_permanent_never_expires() {
        let record = sample_record();
        assert!(!record.is_expired_at(record.upload_time + Duration::days(10_000)));
    }

    #[test]
    fn test_serialize_never_includes_password_hash() {
        let record = sample_record();
        assert!(record.password_hash.is_some());

        let json = serde_json::to_value(&record).unwrap();
        let text = json.to_string();

        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(!text.contains("argon2"));
        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["size"], 5);
        assert_eq!(json["contentType"], "text/plain");
        assert!(json.get("uploadDate").is_some());
        assert!(json.get("expiryDate").is_none());
    }

    #[test]
    fn test_without_password_hash() {
        let record = sample_record().without_password_hash();
        assert!(record.password_hash.is_none());
    }
}
