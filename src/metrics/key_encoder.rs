//! Aggregation key encoding
//!
//! Encodes a metric name and its tags into the key that decides which
//! measurements aggregate together.
//!
//! Key format: `<prefixed_name>#<sorted tags joined by '.'>`
//!
//! Examples:
//! - `myapp.http.requests#env:prod.host:web01`
//! - `system.cpu#` (no tags)

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Separates the metric name from the tag list
pub const NAME_SEPARATOR: char = '#';

/// Joins sorted tags
pub const TAG_SEPARATOR: &str = ".";

/// Canonical identity of a (metric name, tag set) pair
///
/// Cheap to clone; the buffer keys its shards by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey(Arc<str>);

impl AggregationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Metric name portion of the key (everything before the first `#`)
    pub fn metric_name(&self) -> &str {
        match self.0.find(NAME_SEPARATOR) {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl Borrow<str> for AggregationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encodes metric names and tag sets into aggregation keys
pub struct MetricKeyEncoder;

impl MetricKeyEncoder {
    /// Apply the configured prefix by plain concatenation
    ///
    /// `("myapp.", "memory.used")` gives `myapp.memory.used`; no separator
    /// is inserted.
    pub fn prefixed_name(prefix: Option<&str>, name: &str) -> String {
        match prefix {
            Some(prefix) if !prefix.is_empty() => {
                let mut full = String::with_capacity(prefix.len() + name.len());
                full.push_str(prefix);
                full.push_str(name);
                full
            }
            _ => name.to_string(),
        }
    }

    /// Encode an already-prefixed name and its tags
    ///
    /// Tags are sorted by byte-wise ordinal order, so insertion order never
    /// matters. Absent tags are an empty slice. Duplicate tags are kept.
    pub fn encode<S: AsRef<str>>(prefixed_name: &str, tags: &[S]) -> AggregationKey {
        if tags.is_empty() {
            let mut key = String::with_capacity(prefixed_name.len() + 1);
            key.push_str(prefixed_name);
            key.push(NAME_SEPARATOR);
            return AggregationKey(key.into());
        }

        let mut sorted: Vec<&str> = tags.iter().map(AsRef::as_ref).collect();
        // str's Ord compares bytes, which is the ordinal order we need
        sorted.sort_unstable();

        let tags_len: usize = sorted.iter().map(|t| t.len()).sum::<usize>() + sorted.len();
        let mut key = String::with_capacity(prefixed_name.len() + 1 + tags_len);
        key.push_str(prefixed_name);
        key.push(NAME_SEPARATOR);
        for (i, tag) in sorted.iter().enumerate() {
            if i > 0 {
                key.push_str(TAG_SEPARATOR);
            }
            key.push_str(tag);
        }
        AggregationKey(key.into())
    }
}
