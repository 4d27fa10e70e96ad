//! Static registry of every output field the aggregation endpoint exposes.
//!
//! A [`FieldSpec`] names the resources a field needs and how its value is
//! derived from their payloads. The registry is declared once and never
//! mutated; its order is the order fields appear in the output record.

use crate::resource::{Outcomes, Resource};
use serde_json::Value;
use std::collections::BTreeSet;

/// How a field value is derived from the payloads of its dependencies.
///
/// All variants except `Custom` read the payload of the first dependency.
#[derive(Clone, Copy)]
pub enum Extract {
    /// A top-level key of the payload.
    Key(&'static str),
    /// The whole payload, unchanged.
    Payload,
    /// The length of an array stored under a top-level key.
    Count(&'static str),
    /// Arbitrary pure transform over the payloads, in dependency order.
    Custom(fn(&[&Value]) -> Option<Value>),
}

impl Extract {
    fn apply(&self, payloads: &[&Value]) -> Option<Value> {
        match self {
            Extract::Key(key) => payloads.first()?.get(*key).cloned(),
            Extract::Payload => payloads.first().map(|p| (*p).clone()),
            Extract::Count(key) => {
                let items = payloads.first()?.get(*key)?.as_array()?;
                Some(Value::from(items.len()))
            }
            Extract::Custom(f) => f(payloads),
        }
    }
}

pub struct FieldSpec {
    pub name: &'static str,
    pub depends_on: &'static [Resource],
    pub extract: Extract,
}

impl FieldSpec {
    const fn new(name: &'static str, depends_on: &'static [Resource], extract: Extract) -> Self {
        Self {
            name,
            depends_on,
            extract,
        }
    }
}

/// Staff accounts carry the "Administrator" badge.
fn is_staff(payloads: &[&Value]) -> Option<Value> {
    let badges = payloads.first()?.as_array()?;
    let staff = badges
        .iter()
        .any(|badge| badge.get("name").and_then(Value::as_str) == Some("Administrator"));
    Some(Value::Bool(staff))
}

fn previous_usernames(payloads: &[&Value]) -> Option<Value> {
    let entries = payloads.first()?.get("data")?.as_array()?;
    let names = entries
        .iter()
        .filter_map(|entry| entry.get("name").cloned())
        .collect();
    Some(Value::Array(names))
}

use Resource::*;

pub static CATALOG: &[FieldSpec] = &[
    FieldSpec::new("id", &[UserProfile], Extract::Key("id")),
    FieldSpec::new("hasVerifiedBadge", &[UserProfile], Extract::Key("hasVerifiedBadge")),
    FieldSpec::new("username", &[UserProfile], Extract::Key("name")),
    FieldSpec::new("displayName", &[UserProfile], Extract::Key("displayName")),
    FieldSpec::new("status", &[Status], Extract::Key("status")),
    FieldSpec::new("description", &[UserProfile], Extract::Key("description")),
    FieldSpec::new("membership", &[Membership], Extract::Payload),
    FieldSpec::new("created", &[UserProfile], Extract::Key("created")),
    FieldSpec::new("inventory_rap", &[UserProfile], Extract::Key("inventory_rap")),
    FieldSpec::new("isBanned", &[UserProfile], Extract::Key("isBanned")),
    FieldSpec::new("isStaff", &[Badges], Extract::Custom(is_staff)),
    FieldSpec::new("followers", &[FollowersCount], Extract::Key("count")),
    FieldSpec::new("following", &[FollowingCount], Extract::Key("count")),
    FieldSpec::new("friends", &[Friends], Extract::Count("data")),
    FieldSpec::new("friendsList", &[Friends], Extract::Key("data")),
    FieldSpec::new("badges", &[Badges], Extract::Payload),
    FieldSpec::new("usernamehistory", &[UsernameHistory], Extract::Custom(previous_usernames)),
    FieldSpec::new("groupRoles", &[GroupRoles], Extract::Key("data")),
];

pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    CATALOG.iter().find(|field| field.name == name)
}

/// Union of the dependencies of every recognised name; unknown names are dropped.
pub fn resolve<'a, I>(names: I) -> BTreeSet<Resource>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(lookup)
        .flat_map(|field| field.depends_on.iter().copied())
        .collect()
}

/// Every resource referenced by the catalog.
pub fn all_resources() -> BTreeSet<Resource> {
    resolve(CATALOG.iter().map(|field| field.name))
}

/// Extracts a field value, or `None` if any dependency is missing or failed.
pub fn extract(field: &FieldSpec, outcomes: &Outcomes) -> Option<Value> {
    let payloads = field
        .depends_on
        .iter()
        .map(|resource| outcomes.get(resource)?.as_ref().ok())
        .collect::<Option<Vec<&Value>>>()?;

    field.extract.apply(&payloads)
}
