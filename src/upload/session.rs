use chrono::{DateTime, Utc};
use std::str::FromStr;

use super::range::{ContentRange, RangeError};
use crate::models::UploadSessionInfo;

/// A range the server still expects, as listed in `nextExpectedRanges`.
/// `end` is inclusive; `None` means "through the end of the file".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl FromStr for ByteRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        let start = start.parse::<u64>().map_err(|_| malformed())?;
        let end = match end {
            "" => None,
            end => Some(end.parse::<u64>().map_err(|_| malformed())?),
        };
        if end.is_some_and(|end| end < start) {
            return Err(malformed());
        }
        Ok(ByteRange { start, end })
    }
}

/// Client-side view of a server upload session.
///
/// Owned by one upload for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    upload_url: String,
    expiration: Option<DateTime<Utc>>,
    accepted_bytes: u64,
    next_expected: Vec<ByteRange>,
}

impl UploadSession {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            expiration: None,
            accepted_bytes: 0,
            next_expected: vec![ByteRange { start: 0, end: None }],
        }
    }

    /// Seeds a session from the creation response.
    pub fn from_info(info: &UploadSessionInfo) -> Result<Self, RangeError> {
        let mut session = Self::new(info.upload_url.clone());
        session.apply_server_state(info)?;
        Ok(session)
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|at| at <= now)
    }

    /// Contiguous bytes accepted so far.
    pub fn accepted_bytes(&self) -> u64 {
        self.accepted_bytes
    }

    pub fn next_expected(&self) -> &[ByteRange] {
        &self.next_expected
    }

    /// Offset of the first byte the server still needs.
    pub fn next_offset(&self) -> u64 {
        self.next_expected
            .first()
            .map_or(self.accepted_bytes, |range| range.start)
    }

    /// Marks `range` as accepted by a 202 reply.
    pub fn record_accepted(&mut self, range: &ContentRange) {
        self.accepted_bytes = self.accepted_bytes.max(range.last_byte() + 1);
        self.next_expected = if range.is_final() {
            Vec::new()
        } else {
            vec![ByteRange {
                start: self.accepted_bytes,
                end: None,
            }]
        };
    }

    /// Adopts the server's view from an upload session document. An empty
    /// `nextExpectedRanges` leaves the local bookkeeping untouched.
    pub fn apply_server_state(&mut self, info: &UploadSessionInfo) -> Result<(), RangeError> {
        if !info.upload_url.is_empty() {
            self.upload_url = info.upload_url.clone();
        }
        if info.expiration_date_time.is_some() {
            self.expiration = info.expiration_date_time;
        }
        if info.next_expected_ranges.is_empty() {
            return Ok(());
        }

        let mut ranges = info
            .next_expected_ranges
            .iter()
            .map(|r| r.parse::<ByteRange>())
            .collect::<Result<Vec<_>, _>>()?;
        ranges.sort_by_key(|r| r.start);
        self.accepted_bytes = ranges[0].start;
        self.next_expected = ranges;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(ranges: &[&str]) -> UploadSessionInfo {
        UploadSessionInfo {
            upload_url: "https://up.example.com/session/1".to_string(),
            expiration_date_time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).single(),
            next_expected_ranges: ranges.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_byte_range() {
        assert_eq!(
            "0-".parse::<ByteRange>().unwrap(),
            ByteRange { start: 0, end: None }
        );
        assert_eq!(
            "12-55".parse::<ByteRange>().unwrap(),
            ByteRange {
                start: 12,
                end: Some(55)
            }
        );
        assert!("55-12".parse::<ByteRange>().is_err());
        assert!("abc".parse::<ByteRange>().is_err());
    }

    #[test]
    fn test_from_info() {
        let session = UploadSession::from_info(&info(&["0-"])).unwrap();
        assert_eq!(session.upload_url(), "https://up.example.com/session/1");
        assert_eq!(session.next_offset(), 0);

        let before = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap();
        assert!(!session.is_expired(before));
        assert!(session.is_expired(after));
    }

    #[test]
    fn test_record_accepted_advances() {
        let mut session = UploadSession::new("https://up.example.com/s");
        session.record_accepted(&ContentRange::new(0, 99, 300).unwrap());
        assert_eq!(session.accepted_bytes(), 100);
        assert_eq!(session.next_offset(), 100);

        session.record_accepted(&ContentRange::new(200, 299, 300).unwrap());
        assert!(session.next_expected().is_empty());
    }

    #[test]
    fn test_server_state_wins() {
        let mut session = UploadSession::new("https://up.example.com/s");
        session.record_accepted(&ContentRange::new(0, 99, 300).unwrap());
        session
            .apply_server_state(&info(&["150-199", "50-"]))
            .unwrap();
        assert_eq!(session.next_offset(), 50);
        assert_eq!(session.next_expected().len(), 2);

        // empty list keeps what we had
        let mut empty = info(&[]);
        empty.upload_url.clear();
        session.apply_server_state(&empty).unwrap();
        assert_eq!(session.next_offset(), 50);
        assert_eq!(session.upload_url(), "https://up.example.com/session/1");
    }
}
