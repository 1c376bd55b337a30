// # Hostname Pattern
//
// A configured hostname, lower-cased and split into labels. A label of `*`
// matches exactly one label of a candidate hostname, never zero and never
// several, so `*.example.com` owns `a.example.com` but neither
// `example.com` nor `a.b.example.com`.
//
// A single trailing `.` (the root label of a fully-qualified name) is ignored
// on both sides, so `host.example.com` and `host.example.com.` are the same
// name for matching purposes.

use std::fmt;

/// Wildcard label
pub const WILDCARD: &str = "*";

/// A hostname pattern with optional single-label wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnamePattern {
    labels: Vec<String>,
}

impl HostnamePattern {
    /// Build a pattern from a configured hostname
    pub fn new(pattern: &str) -> Self {
        Self {
            labels: split_labels(pattern),
        }
    }

    /// Number of labels; fixed at construction
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Check whether `hostname` is covered by this pattern
    ///
    /// Label counts must match exactly; each non-wildcard label must equal
    /// the corresponding hostname label, ignoring ASCII case.
    pub fn matches(&self, hostname: &str) -> bool {
        let candidate = split_labels(hostname);
        if candidate.len() != self.labels.len() {
            return false;
        }

        self.labels
            .iter()
            .zip(&candidate)
            .all(|(pattern, label)| pattern == WILDCARD || pattern == label)
    }
}

impl fmt::Display for HostnamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join("."))
    }
}

fn split_labels(name: &str) -> Vec<String> {
    let lower = name.to_ascii_lowercase();
    let trimmed = lower.strip_suffix('.').unwrap_or(&lower);
    trimmed.split('.').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        let pattern = HostnamePattern::new("home.example.com");

        assert!(pattern.matches("home.example.com"));
        assert!(pattern.matches("HOME.Example.COM"));
        assert!(pattern.matches("home.example.com."));
        assert!(!pattern.matches("work.example.com"));
        assert!(!pattern.matches("example.com"));
        assert!(!pattern.matches("a.home.example.com"));
    }

    #[test]
    fn wildcard_spans_exactly_one_label() {
        let pattern = HostnamePattern::new("*.example.com");

        assert!(pattern.matches("a.example.com"));
        assert!(pattern.matches("printer.example.com"));
        assert!(!pattern.matches("example.com"));
        assert!(!pattern.matches("a.b.example.com"));
        assert!(!pattern.matches("a.example.org"));
    }

    #[test]
    fn wildcard_in_the_middle() {
        let pattern = HostnamePattern::new("vpn.*.example.com");

        assert!(pattern.matches("vpn.berlin.example.com"));
        assert!(!pattern.matches("www.berlin.example.com"));
        assert!(!pattern.matches("vpn.example.com"));
    }

    #[test]
    fn pattern_is_lower_cased_at_construction() {
        let pattern = HostnamePattern::new("Home.EXAMPLE.com");

        assert_eq!(pattern.to_string(), "home.example.com");
        assert_eq!(pattern.label_count(), 3);
        assert!(pattern.matches("home.example.com"));
    }

    #[test]
    fn no_suffix_matching() {
        let pattern = HostnamePattern::new("example.com");

        assert!(!pattern.matches("www.example.com"));
        assert!(!pattern.matches("com"));
    }
}
