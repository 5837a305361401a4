pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;
pub mod format;
pub mod roles;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use dialogue::{
    Completion, ConflictPolicy, CreateRoleFlow, DialogueEngine, DialogueStatus, DialogueStep,
    Outcome, ThreadGraph, ThreadName,
};
pub use domain::role::Role;
pub use domain::user::{User, UserId};
pub use errors::{ApplicationError, DialogueError, InterfaceError};
pub use format::{role_list_text, role_steps_text};
pub use roles::{find_role_by_display_index, list_roles, parse_display_index, RoleLookupError};
