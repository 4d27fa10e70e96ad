use crate::catalog::{self, CATALOG};
use crate::errors::AggregateError;
use crate::planner::RequestedFields;
use crate::resource::Outcomes;
use indexmap::IndexMap;
use serde_json::Value;

/// Flat field name to value map, in catalog order.
pub type OutputRecord = IndexMap<&'static str, Value>;

/// Builds the output record from collected outcomes.
///
/// Fields whose dependencies failed, were not fetched, or whose payload lacks
/// the extracted key are omitted. Requested names unknown to the catalog are
/// ignored, but a specific request that yields no field at all is an error.
pub fn project(
    outcomes: &Outcomes,
    requested: &RequestedFields,
) -> Result<OutputRecord, AggregateError> {
    let record: OutputRecord = CATALOG
        .iter()
        .filter(|field| requested.contains(field.name))
        .filter_map(|field| Some((field.name, catalog::extract(field, outcomes)?)))
        .collect();

    if record.is_empty() && matches!(requested, RequestedFields::Only(_)) {
        return Err(AggregateError::NoValidFields);
    }

    Ok(record)
}
