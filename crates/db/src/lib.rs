pub mod connection;
pub mod migrations;
pub mod records;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, ping, DbPool};
pub use records::{add_role, append_role, get_or_create_user, save_user};
pub use repositories::{
    InMemoryUserRepository, RepositoryError, SqlUserRepository, UserRepository,
};
