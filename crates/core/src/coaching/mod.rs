mod error;
pub mod events;
mod rules;
mod types;

pub use error::{ChallengeError, FocusAreaError};
pub use rules::invalidation_rules;
pub use types::{Challenge, ChallengeStatus, FocusArea};
