//! Trigger strategies

use std::fmt;

use hs_core::{ClientKind, SwapError};

/// Accepted spellings, as shown in errors
pub const ACCEPTED_MODES: &str = "sequential|armed|bg";

/// How the remote set-identity is triggered when SECONDARY runs Firedancer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMode {
    /// Local first, then `exec` on the open session
    Sequential,
    /// Pre-opened channel released by one newline
    Armed,
    /// Remote fired first with `nohup setsid`, then local
    Background,
}

impl SwapMode {
    /// Parse a mode name case-insensitively. `client` is only used in the
    /// error.
    pub fn parse(raw: &str, client: ClientKind) -> Result<Self, SwapError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(SwapMode::Sequential),
            "armed" => Ok(SwapMode::Armed),
            "bg" | "background" => Ok(SwapMode::Background),
            _ => Err(SwapError::InvalidMode {
                mode: raw.to_string(),
                client,
                accepted: ACCEPTED_MODES,
            }),
        }
    }
}

impl fmt::Display for SwapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapMode::Sequential => write!(f, "sequential"),
            SwapMode::Armed => write!(f, "armed"),
            SwapMode::Background => write!(f, "bg"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(SwapMode::parse("Sequential", ClientKind::Fd).unwrap(), SwapMode::Sequential);
        assert_eq!(SwapMode::parse("ARMED", ClientKind::Fd).unwrap(), SwapMode::Armed);
        assert_eq!(SwapMode::parse("background", ClientKind::Fd).unwrap(), SwapMode::Background);
        assert_eq!(SwapMode::parse(" bg ", ClientKind::Fd).unwrap(), SwapMode::Background);
    }

    #[test]
    fn test_invalid_mode_names_accepted_set() {
        let err = SwapMode::parse("turbo", ClientKind::Fd).unwrap_err();
        assert!(err.to_string().contains("sequential|armed|bg"));
        assert!(err.to_string().contains("turbo"));
    }
}
