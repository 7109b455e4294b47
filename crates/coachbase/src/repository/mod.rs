//! Repositories: the base every entity store is built on, plus the coaching
//! domain stores.

mod base;
mod challenge;
mod codec;
mod focus_area;

pub use base::Repository;
pub use challenge::{ChallengeRepository, CHALLENGES_TABLE};
pub use codec::{decode_row, encode_entity};
pub use focus_area::{FocusAreaRepository, FOCUS_AREAS_TABLE};
