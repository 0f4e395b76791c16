use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::db::is_unique_violation;

#[derive(Debug, thiserror::Error)]
pub enum InsertUserError {
    /// Email or phone collided with an existing account.
    #[error("user already exists")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<User>>;
    /// Insert a user. Uniqueness is decided by the store, not by a prior lookup.
    async fn insert(&self, user: NewUser) -> Result<User, InsertUserError>;
}

const USER_COLUMNS: &str =
    "id, name, email, phone, password_hash, role, is_verified, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, InsertUserError> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, phone, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(e) if is_unique_violation(&e) => Err(InsertUserError::Duplicate),
            Err(e) => Err(InsertUserError::Other(e.into())),
        }
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use time::OffsetDateTime;

    use super::*;

    /// Vec-backed store used by handler tests. The lock makes check+insert atomic.
    #[derive(Default)]
    pub struct MemoryUserRepo {
        users: Mutex<Vec<User>>,
    }

    impl MemoryUserRepo {
        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        pub fn remove(&self, id: Uuid) {
            self.users.lock().unwrap().retain(|u| u.id != id);
        }
    }

    #[async_trait]
    impl UserRepo for MemoryUserRepo {
        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.phone.as_deref() == Some(phone))
                .cloned())
        }

        async fn insert(&self, user: NewUser) -> Result<User, InsertUserError> {
            let mut users = self.users.lock().unwrap();
            let taken = users.iter().any(|u| {
                u.email.eq_ignore_ascii_case(&user.email)
                    || (user.phone.is_some() && u.phone == user.phone)
            });
            if taken {
                return Err(InsertUserError::Duplicate);
            }
            let now = OffsetDateTime::now_utc();
            let created = User {
                id: Uuid::new_v4(),
                name: user.name,
                email: user.email,
                phone: user.phone,
                password_hash: user.password_hash,
                role: user.role,
                is_verified: false,
                created_at: now,
                updated_at: now,
            };
            users.push(created.clone());
            Ok(created)
        }
    }
}
