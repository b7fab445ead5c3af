use std::fmt;

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string, never leaves the service
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

/// Insert payload. `password` is plaintext here; the store hashes it before writing.
pub struct NewUser {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Partial profile change; `None` and empty strings leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl ProfilePatch {
    pub fn apply(&self, user: &mut User) {
        overwrite(&mut user.firstname, &self.firstname);
        overwrite(&mut user.lastname, &self.lastname);
        overwrite(&mut user.username, &self.username);
        overwrite(&mut user.email, &self.email);
    }
}

fn overwrite(slot: &mut String, incoming: &Option<String>) {
    if let Some(value) = incoming.as_deref().filter(|v| !v.is_empty()) {
        *slot = value.to_string();
    }
}

#[cfg(test)]
pub(crate) fn sample_user() -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        firstname: "Ada".into(),
        lastname: "Lovelace".into(),
        username: "adaswiftpanda".into(),
        email: "ada@x.com".into(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
