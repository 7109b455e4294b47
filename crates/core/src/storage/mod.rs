mod error;
mod http_mapping;
mod traits;
mod types;
mod validation;

pub use error::{RepositoryError, Result, StorageError, StorageErrorKind, StorageResult};
pub use http_mapping::repository_error_to_status_code;
pub use traits::{StorageClient, StorageTransaction};
pub use types::{row_id, DeleteOutcome, Filter, Row};
pub use validation::{validate_id, validate_required_params};
