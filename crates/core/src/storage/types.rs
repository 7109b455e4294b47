use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A stored record: column name to value, in storage casing.
pub type Row = Map<String, Value>;

/// Row selection for storage reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every row of the table.
    All,
    /// Rows whose column equals the value.
    Eq { column: String, value: Value },
    /// Rows whose column equals any of the values.
    In { column: String, values: Vec<Value> },
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn any_of<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Selects a row by its `id` column.
    pub fn by_id(id: Uuid) -> Self {
        Filter::eq("id", id.to_string())
    }

    /// Returns true if the row satisfies this filter.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { column, value } => row.get(column) == Some(value),
            Filter::In { column, values } => row
                .get(column)
                .is_some_and(|found| values.iter().any(|v| v == found)),
        }
    }
}

/// Outcome of a repository delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
    pub id: Uuid,
}

/// Reads the `id` column of a row.
pub fn row_id(row: &Row) -> Option<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}
