//! Persisted entity types. These map directly to the JSON snapshot on disk.
//! Distinct from roost-types API models to keep the storage layer independent.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roost_types::models::{PostResponse, Tier, UserResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password_digest: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tier: Tier,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            tier: user.tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub body: String,
    pub author_id: u64,
}

impl From<&Post> for PostResponse {
    fn from(post: &Post) -> Self {
        PostResponse {
            id: post.id,
            body: post.body.clone(),
            author_id: post.author_id,
        }
    }
}

/// Last id handed out per collection. Ids are never reused, even after a
/// delete, so this cannot be derived from the collection length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextIds {
    pub users: u64,
    pub posts: u64,
}

/// The complete persisted state. Always written and read as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: BTreeMap<u64, User>,
    pub posts: BTreeMap<u64, Post>,
    #[serde(default)]
    pub next_ids: NextIds,
}

impl Snapshot {
    /// Bring the id counters up to at least the highest stored id. Files
    /// written before `next_ids` existed load with zeroed counters.
    pub(crate) fn normalize(&mut self) {
        let max_user = self.users.keys().next_back().copied().unwrap_or(0);
        let max_post = self.posts.keys().next_back().copied().unwrap_or(0);
        self.next_ids.users = self.next_ids.users.max(max_user);
        self.next_ids.posts = self.next_ids.posts.max(max_post);
    }

    pub(crate) fn allocate_user_id(&mut self) -> u64 {
        self.next_ids.users += 1;
        self.next_ids.users
    }

    pub(crate) fn allocate_post_id(&mut self) -> u64 {
        self.next_ids.posts += 1;
        self.next_ids.posts
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }
}
