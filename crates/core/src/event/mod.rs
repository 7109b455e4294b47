mod error;
mod traits;
mod types;

pub use error::EventBusError;
pub use traits::EventSink;
pub use types::DomainEvent;
