//! Ordered performance data attached to a check result.
//!
//! Nagios plugins append `label=value` pairs after a `|` in their output.
//! Insertion order is kept so the reply text is stable.

use std::fmt;

/// Ordered mapping from metric name to a value/threshold string.
///
/// Keys are not checked for uniqueness; callers should keep them unique.
///
/// # Example
///
/// ```
/// use nrpe_agent::protocol::PerformanceData;
///
/// let mut perf = PerformanceData::new();
/// perf.push("a", 1);
/// perf.push("b", "2;5;10");
/// assert_eq!(perf.to_string(), "a=1, b=2;5;10");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceData {
    entries: Vec<(String, String)>,
}

impl PerformanceData {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a metric.
    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.entries.push((name.into(), value.to_string()));
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.push(name, value);
        self
    }

    /// Look up the first value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Suffix appended to the status text: `" | k1=v1, k2=v2"`, or empty.
    pub fn suffix(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" | {}", self)
        }
    }
}

impl fmt::Display for PerformanceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for PerformanceData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut perf = PerformanceData::new();
        for (k, v) in iter {
            perf.push(k, v);
        }
        perf
    }
}
