use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use roleflow_core::{
    domain::{role::Role, user::User},
    format::{role_list_text, role_steps_text},
    roles::{find_role_by_display_index, parse_display_index, RoleLookupError},
};
use roleflow_db::{add_role, get_or_create_user, RepositoryError, UserRepository};

use crate::{
    blocks::reply_message,
    commands::{CommandRequest, CommandRouteError, RoleCommandService},
    dialogue::DialogueService,
    events::Response,
};

pub const ONBOARD_EMPTY: &str = "No roles have been created. Say `add _role_` to create one.";
pub const ONBOARD_MENU: &str = "Would you like to `add`, `edit`, or `view` a role?";
pub const NO_ROLES_EXIST: &str = "No roles currently exist. Say `add _role_` to create one.";
pub const EXISTING_ROLES_HEADER: &str = "These are the existing roles: \n";
pub const EDIT_FOOTER: &str = "Reply with `edit _number_` to modify the role.";
pub const VIEW_FOOTER: &str = "Reply with `view _number_` to view the role.";
pub const SPECIFY_NUMBER: &str = "Please specify a number.";
pub const EDIT_UNSUPPORTED: &str = "Sorry, I don't know how to do that yet.";
pub const ACK_REACTION: &str = "thumbsup";

pub fn out_of_range_text(count: usize) -> String {
    format!("Sorry, your input is out of range. Right now there are {count} roles.")
}

pub fn create_error_text(error: &RepositoryError) -> String {
    format!("I experienced an error creating the role: {error}")
}

pub fn read_error_text(error: &RepositoryError) -> String {
    format!("I experienced an error reading your roles: {error}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lookup {
    Edit,
    View,
}

impl Lookup {
    fn footer(self) -> &'static str {
        match self {
            Self::Edit => EDIT_FOOTER,
            Self::View => VIEW_FOOTER,
        }
    }

    fn render(self, role: &Role) -> String {
        match self {
            Self::Edit => EDIT_UNSUPPORTED.to_owned(),
            Self::View => role_steps_text(role),
        }
    }
}

/// The role commands: onboarding, quick add, guided create, edit and view.
pub struct RoleHandlers<R: ?Sized> {
    repo: Arc<R>,
    dialogues: Arc<DialogueService<R>>,
}

impl<R> RoleHandlers<R>
where
    R: UserRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, dialogues: Arc<DialogueService<R>>) -> Self {
        Self { repo, dialogues }
    }

    /// Reads the party's record; a failed read comes back as the reply that
    /// reports it.
    async fn load_user(&self, request: &CommandRequest) -> Result<User, Vec<Response>> {
        get_or_create_user(self.repo.as_ref(), &request.user_id).await.map_err(|error| {
            warn!(
                event_name = "store.user.read_failed",
                correlation_id = %request.correlation_id,
                user_id = %request.user_id,
                error = %error,
                "could not read user record"
            );
            reply(read_error_text(&error))
        })
    }

    async fn lookup(
        &self,
        lookup: Lookup,
        selector: Option<String>,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        let Some(selector) = selector else {
            let user = match self.load_user(request).await {
                Ok(user) => user,
                Err(failure) => return Ok(failure),
            };
            let text = if user.has_roles() {
                format!("{EXISTING_ROLES_HEADER}{}{}", role_list_text(&user), lookup.footer())
            } else {
                NO_ROLES_EXIST.to_owned()
            };
            return Ok(reply(text));
        };

        let requested = match parse_display_index(&selector) {
            Ok(requested) => requested,
            Err(_) => return Ok(reply(SPECIFY_NUMBER)),
        };

        let user = match self.load_user(request).await {
            Ok(user) => user,
            Err(failure) => return Ok(failure),
        };
        let text = match find_role_by_display_index(&user, requested) {
            Ok(role) => lookup.render(role),
            Err(RoleLookupError::OutOfRange { count, .. }) => out_of_range_text(count),
            Err(RoleLookupError::NotANumber(_)) => SPECIFY_NUMBER.to_owned(),
        };
        Ok(reply(text))
    }
}

fn reply(text: impl Into<String>) -> Vec<Response> {
    vec![Response::Message(reply_message(text))]
}

#[async_trait]
impl<R> RoleCommandService for RoleHandlers<R>
where
    R: UserRepository + ?Sized,
{
    async fn onboard(&self, request: &CommandRequest) -> Result<Vec<Response>, CommandRouteError> {
        let user = match self.load_user(request).await {
            Ok(user) => user,
            Err(failure) => return Ok(failure),
        };
        Ok(reply(if user.has_roles() { ONBOARD_MENU } else { ONBOARD_EMPTY }))
    }

    async fn add_role(
        &self,
        name: String,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        match add_role(self.repo.as_ref(), &request.user_id, Role::named(name)).await {
            Ok(user) => {
                info!(
                    event_name = "roles.added",
                    correlation_id = %request.correlation_id,
                    user_id = %request.user_id,
                    role_count = user.role_count(),
                    "role added"
                );
                Ok(vec![Response::Reaction { name: ACK_REACTION.to_owned() }])
            }
            Err(error) => Ok(reply(create_error_text(&error))),
        }
    }

    async fn create_role(
        &self,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        self.dialogues.start_create_role(request).await
    }

    async fn edit_role(
        &self,
        selector: Option<String>,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        self.lookup(Lookup::Edit, selector, request).await
    }

    async fn view_role(
        &self,
        selector: Option<String>,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        self.lookup(Lookup::View, selector, request).await
    }
}
