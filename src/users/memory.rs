use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    users::{
        repo::{StoreError, UserStore},
        repo_types::{NewUser, ProfilePatch, User},
    },
};

/// In-process store double. Enforces the same live-row uniqueness as the
/// partial indexes in the migration.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
    failing_probe: AtomicBool,
    forced_taken: AtomicUsize,
    probed: Mutex<Vec<String>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `username_exists` report a storage fault.
    pub fn fail_username_probe(&self, fail: bool) {
        self.failing_probe.store(fail, Ordering::SeqCst);
    }

    /// The next `n` availability checks answer "taken" regardless of the rows.
    pub fn report_taken(&self, n: usize) {
        self.forced_taken.store(n, Ordering::SeqCst);
    }

    /// Every username passed to `username_exists`, in call order.
    pub fn probed_usernames(&self) -> Vec<String> {
        self.probed.lock().expect("memory store mutex poisoned").clone()
    }

    pub fn soft_delete(&self, id: Uuid) {
        let mut rows = self.rows();
        if let Some(row) = rows.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) {
            row.deleted_at = Some(OffsetDateTime::now_utc());
        }
    }

    pub fn live_count(&self) -> usize {
        self.rows().iter().filter(|u| u.deleted_at.is_none()).count()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<User>> {
        self.rows.lock().expect("memory store mutex poisoned")
    }
}

fn clashes(rows: &[User], id: Uuid, username: &str, email: &str) -> bool {
    rows.iter()
        .filter(|u| u.deleted_at.is_none() && u.id != id)
        .any(|u| u.username == username || u.email == email)
}

fn live_index(rows: &[User], id: Uuid) -> Result<usize, StoreError> {
    rows.iter()
        .position(|u| u.id == id && u.deleted_at.is_none())
        .ok_or(StoreError::NotFound)
}

fn write_profile(rows: &mut [User], candidate: &User) -> Result<User, StoreError> {
    let idx = live_index(rows, candidate.id)?;
    if clashes(rows, candidate.id, &candidate.username, &candidate.email) {
        return Err(StoreError::DuplicateEntry);
    }
    let row = &mut rows[idx];
    row.firstname = candidate.firstname.clone();
    row.lastname = candidate.lastname.clone();
    row.username = candidate.username.clone();
    row.email = candidate.email.clone();
    row.updated_at = OffsetDateTime::now_utc();
    Ok(row.clone())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let password_hash = hash_password(&new.password)?;
        let mut rows = self.rows();
        if clashes(&rows, new.id, &new.username, &new.email) {
            return Err(StoreError::DuplicateEntry);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: new.id,
            firstname: new.firstname,
            lastname: new.lastname,
            username: new.username,
            email: new.email,
            password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_id_or_email(&self, key: &str) -> Result<User, StoreError> {
        let id = Uuid::parse_str(key).ok();
        self.rows()
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .find(|u| match id {
                Some(id) => u.id == id,
                None => u.email == key,
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        write_profile(&mut self.rows(), user)
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<User, StoreError> {
        let mut rows = self.rows();
        let mut candidate = rows[live_index(&rows, id)?].clone();
        patch.apply(&mut candidate);
        write_profile(&mut rows, &candidate)
    }

    async fn update_password(&self, id: Uuid, new_password: &str) -> Result<User, StoreError> {
        let password_hash = hash_password(new_password)?;
        let mut rows = self.rows();
        let idx = live_index(&rows, id)?;
        let row = &mut rows[idx];
        row.password_hash = password_hash;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        self.probed
            .lock()
            .expect("memory store mutex poisoned")
            .push(username.to_string());
        if self.failing_probe.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("username probe unavailable".into()));
        }
        let forced = self
            .forced_taken
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Ok(true);
        }
        Ok(self
            .rows()
            .iter()
            .any(|u| u.deleted_at.is_none() && u.username == username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            firstname: "Ada".into(),
            lastname: "Lovelace".into(),
            username: username.into(),
            email: email.into(),
            password: "secret12".into(),
        }
    }

    #[tokio::test]
    async fn create_hashes_and_enforces_uniqueness() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("ada", "ada@x.com")).await.unwrap();
        assert!(verify_password("secret12", &user.password_hash));

        let dup_email = store.create_user(new_user("other", "ada@x.com")).await;
        assert!(matches!(dup_email, Err(StoreError::DuplicateEntry)));
        let dup_name = store.create_user(new_user("ada", "other@x.com")).await;
        assert!(matches!(dup_name, Err(StoreError::DuplicateEntry)));
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_invisible_and_free_their_keys() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("ada", "ada@x.com")).await.unwrap();
        store.soft_delete(user.id);

        let by_id = store.get_user_by_id_or_email(&user.id.to_string()).await;
        assert!(matches!(by_id, Err(StoreError::NotFound)));
        assert!(!store.username_exists("ada").await.unwrap());

        store.create_user(new_user("ada", "ada@x.com")).await.unwrap();
        assert_eq!(store.live_count(), 1);
    }

    #[tokio::test]
    async fn lookup_dispatches_on_key_shape() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("ada", "ada@x.com")).await.unwrap();
        let by_id = store.get_user_by_id_or_email(&user.id.to_string()).await.unwrap();
        let by_email = store.get_user_by_id_or_email("ada@x.com").await.unwrap();
        assert_eq!(by_id.id, by_email.id);
    }

    #[tokio::test]
    async fn update_profile_rejects_taken_username() {
        let store = MemoryUserStore::new();
        store.create_user(new_user("ada", "ada@x.com")).await.unwrap();
        let grace = store.create_user(new_user("grace", "grace@x.com")).await.unwrap();
        let patch = ProfilePatch {
            username: Some("ada".into()),
            ..Default::default()
        };
        let res = store.update_profile(grace.id, &patch).await;
        assert!(matches!(res, Err(StoreError::DuplicateEntry)));
    }

    #[tokio::test]
    async fn update_user_overwrites_mutable_fields() {
        let store = MemoryUserStore::new();
        let mut user = store.create_user(new_user("ada", "ada@x.com")).await.unwrap();
        user.firstname = "Augusta".into();
        user.username = "countess".into();
        let updated = store.update_user(&user).await.unwrap();
        assert_eq!(updated.firstname, "Augusta");
        assert_eq!(updated.username, "countess");
        assert_eq!(updated.password_hash, user.password_hash);

        store.soft_delete(user.id);
        assert!(matches!(
            store.update_user(&user).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn forced_taken_answers_run_out() {
        let store = MemoryUserStore::new();
        store.report_taken(2);
        assert!(store.username_exists("free").await.unwrap());
        assert!(store.username_exists("free").await.unwrap());
        assert!(!store.username_exists("free").await.unwrap());
        assert_eq!(store.probed_usernames().len(), 3);
    }

    #[tokio::test]
    async fn failing_probe_reports_storage_error() {
        let store = MemoryUserStore::new();
        store.fail_username_probe(true);
        assert!(matches!(
            store.username_exists("anyone").await,
            Err(StoreError::Storage(_))
        ));
    }
}
