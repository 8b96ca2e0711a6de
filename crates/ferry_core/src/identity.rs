use chrono::{DateTime, Utc};
use std::fmt;

/// The installed application's version, as seen by the deployer.
///
/// Two identities are equal only when both the build number and the last update instant
/// match, so reinstalling the same build still counts as a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionIdentity {
    /// Monotonic build number e.g., an Android `versionCode` or a CI build id.
    pub version_code: i64,

    /// Milliseconds since the Unix epoch of the last install or update.
    pub last_update_time: i64,
}

impl VersionIdentity {
    pub fn new(version_code: i64, last_update_time: i64) -> Self {
        Self {
            version_code,
            last_update_time,
        }
    }

    pub fn from_datetime(version_code: i64, updated_at: DateTime<Utc>) -> Self {
        Self::new(version_code, updated_at.timestamp_millis())
    }
}

impl fmt::Display for VersionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version_code, self.last_update_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn display_joins_code_and_time() {
        assert_eq!(VersionIdentity::new(1, 1000).to_string(), "1-1000");
    }

    #[test]
    fn from_datetime_uses_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let identity = VersionIdentity::from_datetime(7, at);
        assert_eq!(identity, VersionIdentity::new(7, 1_700_000_000_123));
    }
}
