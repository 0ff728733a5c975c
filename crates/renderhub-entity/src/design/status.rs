//! Design lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a design record.
///
/// Only [`DesignStatus::Completed`] designs may be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DesignStatus {
    /// Created, generation not started.
    Pending,
    /// Being generated.
    Processing,
    /// Generation finished; renderable.
    Completed,
    /// Generation failed.
    Failed,
    /// Cancelled by the owner.
    Cancelled,
    /// A status this service does not know about.
    #[serde(other)]
    Unknown,
}

impl DesignStatus {
    /// Parse a stored status string, case-insensitively.
    ///
    /// Unrecognized values map to [`DesignStatus::Unknown`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// Whether the design can be rendered.
    pub fn is_renderable(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Uppercase string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DesignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!(DesignStatus::parse("completed"), DesignStatus::Completed);
        assert_eq!(DesignStatus::parse("COMPLETED"), DesignStatus::Completed);
        assert_eq!(DesignStatus::parse("canceled"), DesignStatus::Cancelled);
        assert_eq!(DesignStatus::parse("archived"), DesignStatus::Unknown);
    }

    #[test]
    fn test_only_completed_is_renderable() {
        assert!(DesignStatus::Completed.is_renderable());
        assert!(!DesignStatus::Processing.is_renderable());
        assert!(!DesignStatus::Unknown.is_renderable());
    }
}
