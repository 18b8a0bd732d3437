//! Persistence seam. Handlers and services only ever see `dyn Store`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, TokenEntry, User, UserPatch};
use crate::todos::repo_types::{Todo, TodoFilter, TodoPatch};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint was violated; carries the constraint or field name.
    #[error("duplicate key: {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Finds the user only while `entry` is still among its live tokens.
    async fn find_user_with_token(
        &self,
        id: Uuid,
        entry: &TokenEntry,
    ) -> Result<Option<User>, StoreError>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;
    /// Atomically appends a token. Returns false when the user does not exist.
    async fn push_token(&self, id: Uuid, entry: TokenEntry) -> Result<bool, StoreError>;
    /// Removes every entry with this exact token string. Absent tokens are not an error.
    async fn pull_token(&self, id: Uuid, token: &str) -> Result<(), StoreError>;

    async fn insert_todo(&self, todo: Todo) -> Result<Todo, StoreError>;
    async fn find_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError>;
    async fn find_todo(&self, filter: &TodoFilter) -> Result<Option<Todo>, StoreError>;
    async fn find_one_and_update_todo(
        &self,
        filter: &TodoFilter,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, StoreError>;
    async fn find_one_and_delete_todo(
        &self,
        filter: &TodoFilter,
    ) -> Result<Option<Todo>, StoreError>;

    async fn close(&self);
}
