use async_trait::async_trait;
use thiserror::Error;

use roleflow_core::domain::user::{User, UserId};

pub mod memory;
pub mod user;

pub use memory::InMemoryUserRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Store adapter for user records. A missing record is `Ok(None)`, never an
/// error; `save` replaces the stored record wholesale (last write wins).
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}
