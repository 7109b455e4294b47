use thiserror::Error;

use super::ChallengeStatus;

/// Errors that can occur when validating or changing a focus area.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FocusAreaError {
    #[error("Focus area name cannot be empty")]
    EmptyName,
    #[error("Focus area name too long (max 100 characters)")]
    NameTooLong,
    #[error("Priority must be between 1 and 5, got {0}")]
    InvalidPriority(u8),
    #[error("Focus area is archived")]
    Archived,
}

/// Errors that can occur when validating or changing a challenge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Challenge title cannot be empty")]
    EmptyTitle,
    #[error("Challenge title too long (max 200 characters)")]
    TitleTooLong,
    #[error("Challenge is not active (status: {0})")]
    NotActive(ChallengeStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_area_error_display() {
        assert_eq!(
            FocusAreaError::EmptyName.to_string(),
            "Focus area name cannot be empty"
        );
        assert_eq!(
            FocusAreaError::InvalidPriority(9).to_string(),
            "Priority must be between 1 and 5, got 9"
        );
    }

    #[test]
    fn test_challenge_error_display() {
        assert_eq!(
            ChallengeError::NotActive(ChallengeStatus::Completed).to_string(),
            "Challenge is not active (status: completed)"
        );
    }
}
