use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::auth::repo_types::{NewUser, TokenEntry, User, UserPatch};
use crate::todos::repo_types::{Todo, TodoFilter, TodoPatch};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    todos: Vec<Todo>,
}

/// Process-local store. Every operation runs under a single lock acquisition.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &[User], email: &str, except: Option<Uuid>) -> bool {
    users
        .iter()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if email_taken(&inner.users, &user.email, None) {
            return Err(StoreError::Duplicate("email"));
        }
        let user = User {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            tokens: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_with_token(
        &self,
        id: Uuid,
        entry: &TokenEntry,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.id == id && u.tokens.contains(entry))
            .cloned())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = &patch.email {
            if email_taken(&inner.users, email, Some(id)) {
                return Err(StoreError::Duplicate("email"));
            }
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }

    async fn push_token(&self, id: Uuid, entry: TokenEntry) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.tokens.push(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pull_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.tokens.retain(|t| t.token != token);
        }
        Ok(())
    }

    async fn insert_todo(&self, todo: Todo) -> Result<Todo, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.todos.iter().any(|t| t.id == todo.id) {
            return Err(StoreError::Duplicate("id"));
        }
        inner.todos.push(todo.clone());
        Ok(todo)
    }

    async fn find_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .todos
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn find_todo(&self, filter: &TodoFilter) -> Result<Option<Todo>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.todos.iter().find(|t| filter.matches(t)).cloned())
    }

    async fn find_one_and_update_todo(
        &self,
        filter: &TodoFilter,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .todos
            .iter_mut()
            .find(|t| filter.matches(t))
            .map(|todo| {
                patch.apply(todo);
                todo.clone()
            }))
    }

    async fn find_one_and_delete_todo(
        &self,
        filter: &TodoFilter,
    ) -> Result<Option<Todo>, StoreError> {
        let mut inner = self.inner.write().await;
        let pos = inner.todos.iter().position(|t| filter.matches(t));
        Ok(pos.map(|i| inner.todos.remove(i)))
    }

    async fn close(&self) {}
}
