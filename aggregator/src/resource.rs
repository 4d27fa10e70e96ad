//! Upstream resources the aggregation engine knows how to fetch.
//!
//! Each [`Resource`] is one upstream endpoint template parameterised by the
//! subject (player) id. The set is closed and ordered by declaration; that
//! order is the dispatch order and the iteration order of [`Outcomes`].

use crate::errors::UpstreamError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    UserProfile,
    Status,
    Membership,
    Badges,
    FollowersCount,
    FollowingCount,
    Friends,
    UsernameHistory,
    GroupRoles,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::UserProfile,
        Resource::Status,
        Resource::Membership,
        Resource::Badges,
        Resource::FollowersCount,
        Resource::FollowingCount,
        Resource::Friends,
        Resource::UsernameHistory,
        Resource::GroupRoles,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Resource::UserProfile => "user_profile",
            Resource::Status => "status",
            Resource::Membership => "membership",
            Resource::Badges => "badges",
            Resource::FollowersCount => "followers_count",
            Resource::FollowingCount => "following_count",
            Resource::Friends => "friends",
            Resource::UsernameHistory => "username_history",
            Resource::GroupRoles => "group_roles",
        }
    }

    /// Path of this resource for the given subject, relative to the upstream base url.
    pub fn path(&self, subject_id: u64) -> String {
        match self {
            Resource::UserProfile => format!("/apisite/users/v1/users/{subject_id}"),
            Resource::Status => format!("/apisite/users/v1/users/{subject_id}/status"),
            Resource::Membership => {
                format!("/apisite/premiumfeatures/v1/users/{subject_id}/validate-membership")
            }
            Resource::Badges => {
                format!("/apisite/accountinformation/v1/users/{subject_id}/roblox-badges")
            }
            Resource::FollowersCount => {
                format!("/apisite/friends/v1/users/{subject_id}/followers/count")
            }
            Resource::FollowingCount => {
                format!("/apisite/friends/v1/users/{subject_id}/followings/count")
            }
            Resource::Friends => format!("/apisite/friends/v1/users/{subject_id}/friends"),
            Resource::UsernameHistory => {
                format!("/apisite/users/v1/users/{subject_id}/username-history")
            }
            Resource::GroupRoles => format!("/apisite/groups/v1/users/{subject_id}/groups/roles"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of fetching one resource for one request.
pub type Outcome = Result<Value, UpstreamError>;

/// Exactly one outcome per planned resource, keyed by the resource itself.
pub type Outcomes = BTreeMap<Resource, Outcome>;
