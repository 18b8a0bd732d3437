use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::auth::repo_types::{NewUser, TokenEntry, User, UserPatch};
use crate::todos::repo_types::{Todo, TodoFilter, TodoPatch};

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct TokenRow {
    access: String,
    token: String,
}

fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Duplicate("email");
        }
    }
    StoreError::Database(e)
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    async fn load_tokens(&self, user_id: Uuid) -> Result<Vec<TokenEntry>, StoreError> {
        let rows = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT access, token
              FROM user_tokens
             WHERE user_id = $1
             ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| match r.access.parse() {
                Ok(access) => Some(TokenEntry {
                    access,
                    token: r.token,
                }),
                Err(e) => {
                    warn!(error = %e, %user_id, "skipping token with unknown purpose");
                    None
                }
            })
            .collect())
    }

    async fn hydrate(&self, row: Option<UserRow>) -> Result<Option<User>, StoreError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let tokens = self.load_tokens(row.id).await?;
        Ok(Some(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            tokens,
            created_at: row.created_at,
        }))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)?;

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            tokens: Vec::new(),
            created_at: row.created_at,
        })
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        self.hydrate(row).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        self.hydrate(row).await
    }

    async fn find_user_with_token(
        &self,
        id: Uuid,
        entry: &TokenEntry,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.created_at
              FROM users u
             WHERE u.id = $1
               AND EXISTS (
                   SELECT 1 FROM user_tokens t
                    WHERE t.user_id = u.id AND t.token = $2 AND t.access = $3
               )
            "#,
        )
        .bind(id)
        .bind(&entry.token)
        .bind(entry.access.as_str())
        .fetch_optional(&self.db)
        .await?;
        self.hydrate(row).await
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   password_hash = COALESCE($3, password_hash)
             WHERE id = $1
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(patch.email)
        .bind(patch.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)?;
        self.hydrate(row).await
    }

    async fn push_token(&self, id: Uuid, entry: TokenEntry) -> Result<bool, StoreError> {
        // Single-row append; concurrent logins never overwrite each other.
        let res = sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, access, token)
            SELECT $1, $2, $3
             WHERE EXISTS (SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(id)
        .bind(entry.access.as_str())
        .bind(&entry.token)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn pull_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM user_tokens WHERE user_id = $1 AND token = $2"#)
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_todo(&self, todo: Todo) -> Result<Todo, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (id, text, completed, completed_at, creator)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, text, completed, completed_at, creator
            "#,
        )
        .bind(todo.id)
        .bind(&todo.text)
        .bind(todo.completed)
        .bind(todo.completed_at)
        .bind(todo.creator)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, text, completed, completed_at, creator
              FROM todos
             WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
             ORDER BY created_at ASC
            "#,
        )
        .bind(filter.creator)
        .bind(filter.id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_todo(&self, filter: &TodoFilter) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, text, completed, completed_at, creator
              FROM todos
             WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
             ORDER BY created_at ASC
             LIMIT 1
            "#,
        )
        .bind(filter.creator)
        .bind(filter.id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_one_and_update_todo(
        &self,
        filter: &TodoFilter,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET text = COALESCE($3, text),
                   completed = $4,
                   completed_at = $5
             WHERE id = (
                   SELECT id FROM todos
                    WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
                    ORDER BY created_at ASC
                    LIMIT 1
             )
            RETURNING id, text, completed, completed_at, creator
            "#,
        )
        .bind(filter.creator)
        .bind(filter.id)
        .bind(patch.text)
        .bind(patch.completed)
        .bind(patch.completed_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_one_and_delete_todo(
        &self,
        filter: &TodoFilter,
    ) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            DELETE FROM todos
             WHERE id = (
                   SELECT id FROM todos
                    WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
                    ORDER BY created_at ASC
                    LIMIT 1
             )
            RETURNING id, text, completed, completed_at, creator
            "#,
        )
        .bind(filter.creator)
        .bind(filter.id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
