use chrono::Utc;
use tracing::debug;

use roost_types::models::Tier;

use crate::models::{Post, Snapshot, User};
use crate::{Datastore, Result, StoreError};

impl Datastore {
    // -- Users --

    pub fn create_user(&self, email: &str, password_digest: &str) -> Result<User> {
        self.transact(|s| {
            if s.user_by_email(email).is_some() {
                return Err(StoreError::Conflict(format!("user with email {email}")));
            }

            let user = User {
                id: s.allocate_user_id(),
                email: email.to_string(),
                password_digest: password_digest.to_string(),
                access_token: None,
                refresh_token: None,
                refresh_revoked_at: None,
                access_revoked_at: None,
                tier: Tier::Standard,
            };
            s.users.insert(user.id, user.clone());
            debug!("Created user {}", user.id);
            Ok(user)
        })
    }

    pub fn get_users(&self) -> Result<Vec<User>> {
        self.read(|s| Ok(s.users.values().cloned().collect()))
    }

    pub fn get_user(&self, id: u64) -> Result<User> {
        self.read(|s| s.users.get(&id).cloned().ok_or_else(|| user_not_found(id)))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<User> {
        self.read(|s| {
            s.user_by_email(email)
                .cloned()
                .ok_or_else(|| StoreError::NotFound("user with that email".into()))
        })
    }

    pub fn find_user_by_access_token(&self, token: &str) -> Result<User> {
        self.read(|s| {
            s.users
                .values()
                .find(|u| u.access_token.as_deref() == Some(token))
                .cloned()
                .ok_or_else(|| StoreError::NotFound("access token owner".into()))
        })
    }

    pub fn find_user_by_refresh_token(&self, token: &str) -> Result<User> {
        self.read(|s| {
            s.users
                .values()
                .find(|u| u.refresh_token.as_deref() == Some(token))
                .cloned()
                .ok_or_else(|| StoreError::NotFound("refresh token owner".into()))
        })
    }

    pub fn update_user(&self, id: u64, email: &str, password_digest: &str) -> Result<User> {
        self.transact(|s| {
            if s.user_by_email(email).is_some_and(|other| other.id != id) {
                return Err(StoreError::Conflict(format!("user with email {email}")));
            }

            let user = user_mut(s, id)?;
            user.email = email.to_string();
            user.password_digest = password_digest.to_string();
            debug!("Updated user {}", id);
            Ok(user.clone())
        })
    }

    /// Install a fresh token pair. A new pair starts a new session, so any
    /// earlier revocation stamps are cleared.
    pub fn set_user_tokens(&self, id: u64, access_token: &str, refresh_token: &str) -> Result<User> {
        self.transact(|s| {
            let user = user_mut(s, id)?;
            user.access_token = Some(access_token.to_string());
            user.refresh_token = Some(refresh_token.to_string());
            user.access_revoked_at = None;
            user.refresh_revoked_at = None;
            debug!("Stored new token pair for user {}", id);
            Ok(user.clone())
        })
    }

    /// Swap in a new access token for the holder of `refresh_token`. The
    /// refresh token must still be user `id`'s current, unrevoked one when
    /// the write happens; otherwise nothing changes and `Stale` is returned.
    pub fn refresh_access_token(
        &self,
        id: u64,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<User> {
        self.transact(|s| {
            let user = user_mut(s, id)?;
            if user.refresh_token.as_deref() != Some(refresh_token)
                || user.refresh_revoked_at.is_some()
            {
                return Err(StoreError::Stale(format!("refresh token of user {id}")));
            }
            user.access_token = Some(access_token.to_string());
            user.access_revoked_at = None;
            debug!("Stored refreshed access token for user {}", id);
            Ok(user.clone())
        })
    }

    pub fn revoke_refresh_token(&self, token: &str) -> Result<User> {
        self.transact(|s| {
            let user = s
                .users
                .values_mut()
                .find(|u| u.refresh_token.as_deref() == Some(token))
                .ok_or_else(|| StoreError::NotFound("refresh token owner".into()))?;
            user.refresh_revoked_at = Some(Utc::now());
            debug!("Revoked refresh token of user {}", user.id);
            Ok(user.clone())
        })
    }

    pub fn revoke_access_token(&self, token: &str) -> Result<User> {
        self.transact(|s| {
            let user = s
                .users
                .values_mut()
                .find(|u| u.access_token.as_deref() == Some(token))
                .ok_or_else(|| StoreError::NotFound("access token owner".into()))?;
            user.access_revoked_at = Some(Utc::now());
            debug!("Revoked access token of user {}", user.id);
            Ok(user.clone())
        })
    }

    pub fn upgrade_user_tier(&self, id: u64) -> Result<()> {
        self.transact(|s| {
            let user = user_mut(s, id)?;
            if user.tier != Tier::Upgraded {
                user.tier = Tier::Upgraded;
                debug!("Upgraded user {}", id);
            }
            Ok(())
        })
    }

    // -- Posts --

    /// The body is stored as given; length and moderation are the caller's job.
    pub fn create_post(&self, body: &str, author_id: u64) -> Result<Post> {
        self.transact(|s| {
            if !s.users.contains_key(&author_id) {
                return Err(user_not_found(author_id));
            }

            let post = Post {
                id: s.allocate_post_id(),
                body: body.to_string(),
                author_id,
            };
            s.posts.insert(post.id, post.clone());
            debug!("Created post {} by user {}", post.id, author_id);
            Ok(post)
        })
    }

    pub fn get_posts(&self) -> Result<Vec<Post>> {
        self.read(|s| Ok(s.posts.values().cloned().collect()))
    }

    pub fn get_post(&self, id: u64) -> Result<Post> {
        self.read(|s| {
            s.posts
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("post {id}")))
        })
    }

    /// Deleting an absent post is not an error.
    pub fn delete_post(&self, id: u64) -> Result<()> {
        self.transact(|s| {
            if s.posts.remove(&id).is_some() {
                debug!("Deleted post {}", id);
            }
            Ok(())
        })
    }
}

fn user_mut(s: &mut Snapshot, id: u64) -> Result<&mut User> {
    s.users.get_mut(&id).ok_or_else(|| user_not_found(id))
}

fn user_not_found(id: u64) -> StoreError {
    StoreError::NotFound(format!("user {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn open() -> (tempfile::TempDir, Datastore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Datastore::open(&tmp.path().join("database.json")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_create_user_assigns_sequential_ids() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h1").unwrap();
        let b = store.create_user("b@x.com", "h2").unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.tier, Tier::Standard);
        assert!(a.access_token.is_none());
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let (_tmp, store) = open();
        store.create_user("a@x.com", "h1").unwrap();
        let err = store.create_user("a@x.com", "h2").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get_users().unwrap().len(), 1);
    }

    #[test]
    fn test_find_user_by_email_matches_exactly() {
        let (_tmp, store) = open();
        store.create_user("first@x.com", "h1").unwrap();
        let second = store.create_user("second@x.com", "h2").unwrap();

        assert_eq!(store.find_user_by_email("second@x.com").unwrap().id, second.id);
        assert!(matches!(
            store.find_user_by_email("nobody@x.com"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_user() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h1").unwrap();
        store.create_user("b@x.com", "h2").unwrap();

        let updated = store.update_user(a.id, "a2@x.com", "h3").unwrap();
        assert_eq!(updated.email, "a2@x.com");
        assert_eq!(updated.password_digest, "h3");

        assert!(matches!(
            store.update_user(a.id, "b@x.com", "h4"),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.update_user(99, "z@x.com", "h"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_token_lookup_and_revocation() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.set_user_tokens(a.id, "acc-1", "ref-1").unwrap();

        assert_eq!(store.find_user_by_access_token("acc-1").unwrap().id, a.id);
        assert_eq!(store.find_user_by_refresh_token("ref-1").unwrap().id, a.id);
        assert!(store.find_user_by_refresh_token("acc-1").is_err());

        let revoked = store.revoke_refresh_token("ref-1").unwrap();
        assert!(revoked.refresh_revoked_at.is_some());
        assert!(revoked.access_revoked_at.is_none());

        // a new login clears it
        let relogged = store.set_user_tokens(a.id, "acc-3", "ref-3").unwrap();
        assert!(relogged.refresh_revoked_at.is_none());

        assert!(matches!(
            store.revoke_refresh_token("ref-1"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_refresh_access_token() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.set_user_tokens(a.id, "acc-1", "ref-1").unwrap();
        store.revoke_access_token("acc-1").unwrap();

        let after = store.refresh_access_token(a.id, "ref-1", "acc-2").unwrap();
        assert_eq!(after.access_token.as_deref(), Some("acc-2"));
        assert_eq!(after.refresh_token.as_deref(), Some("ref-1"));
        assert!(after.access_revoked_at.is_none());
    }

    #[test]
    fn test_refresh_access_token_rejects_revoked_refresh() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.set_user_tokens(a.id, "acc-1", "ref-1").unwrap();

        // revocation lands after the caller checked the refresh token
        store.revoke_refresh_token("ref-1").unwrap();
        assert!(matches!(
            store.refresh_access_token(a.id, "ref-1", "acc-2"),
            Err(StoreError::Stale(_))
        ));
        assert_eq!(store.get_user(a.id).unwrap().access_token.as_deref(), Some("acc-1"));
    }

    #[test]
    fn test_refresh_access_token_rejects_superseded_refresh() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.set_user_tokens(a.id, "acc-1", "ref-1").unwrap();

        // a new login lands after the caller checked the old refresh token
        store.set_user_tokens(a.id, "acc-2", "ref-2").unwrap();
        assert!(matches!(
            store.refresh_access_token(a.id, "ref-1", "acc-stale"),
            Err(StoreError::Stale(_))
        ));
        assert_eq!(store.get_user(a.id).unwrap().access_token.as_deref(), Some("acc-2"));
        assert!(matches!(
            store.refresh_access_token(99, "ref-2", "acc-3"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_revoke_access_token() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.set_user_tokens(a.id, "acc", "ref").unwrap();

        let revoked = store.revoke_access_token("acc").unwrap();
        assert!(revoked.access_revoked_at.is_some());
        assert!(revoked.refresh_revoked_at.is_none());
    }

    #[test]
    fn test_upgrade_user_tier() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.upgrade_user_tier(a.id).unwrap();
        store.upgrade_user_tier(a.id).unwrap();
        assert!(store.get_user(a.id).unwrap().tier.is_upgraded());
        assert!(matches!(store.upgrade_user_tier(42), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_create_post_requires_author() {
        let (_tmp, store) = open();
        assert!(matches!(
            store.create_post("hi", 1),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get_posts().unwrap().is_empty());
    }

    #[test]
    fn test_post_ids_not_reused_after_delete() {
        let (_tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        store.create_post("one", a.id).unwrap();
        let two = store.create_post("two", a.id).unwrap();
        store.delete_post(two.id).unwrap();

        let three = store.create_post("three", a.id).unwrap();
        assert_eq!(three.id, 3);
        let ids: Vec<u64> = store.get_posts().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_delete_missing_post_is_ok() {
        let (_tmp, store) = open();
        store.delete_post(12345).unwrap();
    }

    #[test]
    fn test_failed_persist_keeps_previous_snapshot() {
        let (tmp, store) = open();
        let a = store.create_user("a@x.com", "h").unwrap();
        let path = tmp.path().join("database.json");
        let before = fs::read(&path).unwrap();

        // A directory where the temp file should go makes the write fail
        fs::create_dir(tmp.path().join("database.json.tmp")).unwrap();
        let err = store.create_post("lost", a.id).unwrap_err();
        assert!(err.is_persistence());

        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(store.get_posts().unwrap().is_empty());

        fs::remove_dir(tmp.path().join("database.json.tmp")).unwrap();
        assert_eq!(store.create_post("kept", a.id).unwrap().id, 1);
    }
}
