//! Shared vocabulary for the worker's health surface

use serde::{Deserialize, Serialize};

/// Status of one component probed by the health surface (job store, blob
/// store, parser client, embedding client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentHealth {
    Healthy,
    Unhealthy,
    Unknown,
}

impl ComponentHealth {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_snake_case() {
        assert_eq!(ComponentHealth::Healthy.to_string(), "healthy");
        assert_eq!(ComponentHealth::Unhealthy.to_string(), "unhealthy");
    }
}
