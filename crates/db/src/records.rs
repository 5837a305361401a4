//! Record access used by the chat handlers: read-or-synthesize a user, append
//! a role, write it back.

use tracing::warn;

use roleflow_core::domain::role::Role;
use roleflow_core::domain::user::{User, UserId};

use crate::repositories::{RepositoryError, UserRepository};

/// Fetches the user, or builds an empty in-memory record when the store has
/// none. Nothing is written.
pub async fn get_or_create_user<R>(repo: &R, id: &UserId) -> Result<User, RepositoryError>
where
    R: UserRepository + ?Sized,
{
    Ok(repo.find_by_id(id).await?.unwrap_or_else(|| User::new(id.clone())))
}

pub fn append_role(user: &mut User, role: Role) {
    user.append_role(role);
}

/// Single write, no retry. Failures are logged and handed back so the caller
/// can report them to the party.
pub async fn save_user<R>(repo: &R, user: User) -> Result<(), RepositoryError>
where
    R: UserRepository + ?Sized,
{
    let user_id = user.id.clone();
    repo.save(user).await.map_err(|error| {
        warn!(
            event_name = "store.user.save_failed",
            user_id = %user_id,
            error = %error,
            "failed to save user record"
        );
        error
    })
}

/// Read-modify-write of one role onto the user's list.
pub async fn add_role<R>(repo: &R, id: &UserId, role: Role) -> Result<User, RepositoryError>
where
    R: UserRepository + ?Sized,
{
    let mut user = get_or_create_user(repo, id).await?;
    append_role(&mut user, role);
    save_user(repo, user.clone()).await?;
    Ok(user)
}
