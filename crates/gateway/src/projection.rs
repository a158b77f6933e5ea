use catalog_contracts::Record;
use serde_json::Value;

use crate::graphql::BackendError;

/// Keeps only the record's allowlisted fields, dropping backend metadata such as
/// `__typename`, then decodes the remainder.
pub(crate) fn project<R: Record>(value: Value) -> Result<R, BackendError> {
    let Value::Object(mut fields) = value else {
        return Err(BackendError::InvalidResponse);
    };

    fields.retain(|key, _| R::FIELDS.contains(&key.as_str()));
    serde_json::from_value(Value::Object(fields)).map_err(|_| BackendError::InvalidResponse)
}

pub(crate) fn project_list<R: Record>(value: Value) -> Result<Vec<R>, BackendError> {
    let Value::Array(items) = value else {
        return Err(BackendError::InvalidResponse);
    };

    items.into_iter().map(project).collect()
}
