mod queue;
mod traits;

pub use queue::EventQueue;
pub use traits::{Entity, HasDomainEvents};
