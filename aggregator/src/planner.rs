use crate::catalog;
use crate::resource::Resource;
use std::collections::BTreeSet;

/// The fields a client asked for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestedFields {
    /// Every field in the catalog.
    #[default]
    All,
    /// Client-supplied names, in request order and without duplicates.
    /// Names unknown to the catalog are kept here and ignored later.
    Only(Vec<String>),
}

impl RequestedFields {
    /// Parses the `fields` query parameter.
    ///
    /// Absent, empty, or only separators and whitespace all mean [`RequestedFields::All`].
    pub fn parse(raw: Option<&str>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in raw.unwrap_or_default().split(',').map(str::trim) {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        if names.is_empty() {
            RequestedFields::All
        } else {
            RequestedFields::Only(names)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            RequestedFields::All => true,
            RequestedFields::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Computes the deduplicated set of resources needed for the requested fields.
pub fn plan(requested: &RequestedFields) -> BTreeSet<Resource> {
    match requested {
        RequestedFields::All => catalog::all_resources(),
        RequestedFields::Only(names) => catalog::resolve(names.iter().map(String::as_str)),
    }
}
