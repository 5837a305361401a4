use async_trait::async_trait;
use thiserror::Error;

use roleflow_core::domain::user::UserId;

use crate::events::{EventContext, MessageEvent, MessageKind, Response};

/// Who asked, where, and which message to react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRequest {
    pub user_id: UserId,
    pub channel_id: String,
    pub message_ts: String,
    pub correlation_id: String,
}

impl CommandRequest {
    pub fn from_event(event: &MessageEvent, ctx: &EventContext) -> Self {
        Self {
            user_id: UserId(event.user_id.clone()),
            channel_id: event.channel_id.clone(),
            message_ts: event.ts.clone(),
            correlation_id: ctx.correlation_id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleCommand {
    Onboard,
    /// `add <name>`; a bare `add` starts the guided create-role dialogue.
    Add { name: Option<String> },
    Edit { selector: Option<String> },
    View { selector: Option<String> },
}

impl RoleCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Onboard => "onboard",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::View { .. } => "view",
        }
    }

    /// `add` is heard wherever the bot is addressed; the rest only in DMs.
    pub fn accepts(&self, kind: MessageKind) -> bool {
        match self {
            Self::Add { .. } => matches!(
                kind,
                MessageKind::DirectMessage | MessageKind::DirectMention | MessageKind::Mention
            ),
            Self::Onboard | Self::Edit { .. } | Self::View { .. } => {
                kind == MessageKind::DirectMessage
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("message has no command")]
    Empty,
    #[error("unrecognized command `{0}`")]
    UnknownVerb(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("dialogue failure: {0}")]
    Dialogue(String),
}

/// Splits `verb rest...`; the verb is case-insensitive and the argument keeps
/// its inner spacing.
pub fn parse_role_command(text: &str) -> Result<RoleCommand, CommandParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_owned());

    match verb.to_lowercase().as_str() {
        "onboard" => Ok(RoleCommand::Onboard),
        "add" => Ok(RoleCommand::Add { name: argument }),
        "edit" => Ok(RoleCommand::Edit { selector: argument }),
        "view" => Ok(RoleCommand::View { selector: argument }),
        other => Err(CommandParseError::UnknownVerb(other.to_owned())),
    }
}

/// Parses a chat message. A leading verb wins; otherwise an `add` word
/// anywhere in the message counts, with the text after it as the name.
pub fn parse_message_command(text: &str) -> Result<RoleCommand, CommandParseError> {
    match parse_role_command(text) {
        Err(CommandParseError::UnknownVerb(verb)) => {
            find_add_command(text).ok_or(CommandParseError::UnknownVerb(verb))
        }
        parsed => parsed,
    }
}

fn find_add_command(text: &str) -> Option<RoleCommand> {
    let mut rest = text;
    loop {
        let start = rest.find(|c: char| !c.is_whitespace())?;
        let word_start = &rest[start..];
        let end = word_start.find(char::is_whitespace).unwrap_or(word_start.len());
        let (word, after) = word_start.split_at(end);
        if word.eq_ignore_ascii_case("add") {
            let name = after.trim();
            return Some(RoleCommand::Add { name: (!name.is_empty()).then(|| name.to_owned()) });
        }
        rest = after;
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: RoleCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        command: RoleCommand,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        match command {
            RoleCommand::Onboard => self.service.onboard(request).await,
            RoleCommand::Add { name: Some(name) } => self.service.add_role(name, request).await,
            RoleCommand::Add { name: None } => self.service.create_role(request).await,
            RoleCommand::Edit { selector } => self.service.edit_role(selector, request).await,
            RoleCommand::View { selector } => self.service.view_role(selector, request).await,
        }
    }
}

#[async_trait]
pub trait RoleCommandService: Send + Sync {
    async fn onboard(&self, request: &CommandRequest) -> Result<Vec<Response>, CommandRouteError>;

    async fn add_role(
        &self,
        name: String,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError>;

    async fn create_role(&self, request: &CommandRequest)
        -> Result<Vec<Response>, CommandRouteError>;

    async fn edit_role(
        &self,
        selector: Option<String>,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError>;

    async fn view_role(
        &self,
        selector: Option<String>,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError>;
}
