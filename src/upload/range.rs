use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid byte range {first}-{last}/{total}")]
    OutOfBounds { first: u64, last: u64, total: u64 },

    #[error("malformed range {0:?}")]
    Malformed(String),
}

/// Byte range of one fragment within the whole upload.
///
/// Always satisfies `first <= last < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentRange {
    first: u64,
    last: u64,
    total: u64,
}

impl ContentRange {
    pub fn new(first: u64, last: u64, total: u64) -> Result<Self, RangeError> {
        if first > last || last >= total {
            return Err(RangeError::OutOfBounds { first, last, total });
        }
        Ok(Self { first, last, total })
    }

    pub fn first_byte(&self) -> u64 {
        self.first
    }

    pub fn last_byte(&self) -> u64 {
        self.last
    }

    pub fn total_length(&self) -> u64 {
        self.total
    }

    pub fn bytes_in_range(&self) -> u64 {
        self.last - self.first + 1
    }

    pub fn is_final(&self) -> bool {
        self.last + 1 == self.total
    }

    /// `Content-Range` header value, e.g. `bytes 0-327679/1048576`.
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.first, self.last, self.total)
    }
}

impl FromStr for ContentRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let rest = s.trim().strip_prefix("bytes ").ok_or_else(malformed)?;
        let (span, total) = rest.split_once('/').ok_or_else(malformed)?;
        let (first, last) = span.split_once('-').ok_or_else(malformed)?;

        let parse = |v: &str| v.trim().parse::<u64>().map_err(|_| malformed());
        ContentRange::new(parse(first)?, parse(last)?, parse(total)?)
    }
}

/// Splits `total` bytes into consecutive ranges of `fragment_size`, the
/// last one truncated to the remainder.
pub fn fragment_ranges(total: u64, fragment_size: u64) -> FragmentRanges {
    FragmentRanges {
        next: 0,
        total,
        fragment_size,
    }
}

/// Iterator returned by [`fragment_ranges`].
#[derive(Debug, Clone)]
pub struct FragmentRanges {
    next: u64,
    total: u64,
    fragment_size: u64,
}

impl FragmentRanges {
    /// Continues from `offset` instead of the start.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.next = offset.min(self.total);
        self
    }
}

impl Iterator for FragmentRanges {
    type Item = ContentRange;

    fn next(&mut self) -> Option<ContentRange> {
        if self.fragment_size == 0 || self.next >= self.total {
            return None;
        }
        let first = self.next;
        let last = first.saturating_add(self.fragment_size - 1).min(self.total - 1);
        self.next = last + 1;
        Some(ContentRange {
            first,
            last,
            total: self.total,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.fragment_size == 0 {
            return (0, Some(0));
        }
        let remaining = (self.total - self.next).div_ceil(self.fragment_size);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FragmentRanges {}
