//! Concurrent refresh policy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happens when a refresh is requested while another is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Both run; the last to finish wins.
    ///
    /// Nothing orders one refresh's export against another's install, so
    /// the CSV artifact may come from a different refresh than the installed
    /// snapshot. Every export still replaces the file whole.
    Race,
    /// Wait for the running refresh, then run.
    #[default]
    Queue,
    /// Fail immediately with `AlreadyRunning`.
    Reject,
}

impl ConcurrencyPolicy {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Race => "race",
            Self::Queue => "queue",
            Self::Reject => "reject",
        }
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "race" => Ok(Self::Race),
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown refresh concurrency policy '{other}'")),
        }
    }
}

impl std::fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("race", ConcurrencyPolicy::Race)]
    #[test_case("QUEUE", ConcurrencyPolicy::Queue)]
    #[test_case(" reject ", ConcurrencyPolicy::Reject)]
    fn parses_policy(input: &str, expected: ConcurrencyPolicy) {
        assert_eq!(input.parse::<ConcurrencyPolicy>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!("lifo".parse::<ConcurrencyPolicy>().is_err());
    }

    #[test]
    fn default_is_queue() {
        assert_eq!(ConcurrencyPolicy::default(), ConcurrencyPolicy::Queue);
        assert_eq!(ConcurrencyPolicy::default().to_string(), "queue");
    }
}
