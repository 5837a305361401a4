use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("a dialogue is already active for user {user_id}")]
    Conflict { user_id: String },
    #[error("thread `{thread}` is not declared in the dialogue graph")]
    UnknownThread { thread: String },
    #[error("branch prompt in thread `{thread}` has no default branch")]
    MissingDefaultBranch { thread: String },
    #[error("dialogue graph declares no threads")]
    EmptyGraph,
    #[error("no active dialogue for user {user_id}")]
    NotActive { user_id: String },
    #[error("reply matched no branch in thread `{thread}`")]
    NoMatch { thread: String },
    #[error("cursor {thread}[{prompt_index}] does not point at a question")]
    InvalidCursor { thread: String, prompt_index: usize },
    #[error("thread `{thread}` keeps redirecting without asking a question")]
    RedirectLoop { thread: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Dialogue(#[from] DialogueError),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => {
                "You already have a conversation in progress. Finish it before starting another."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Dialogue(error @ DialogueError::Conflict { .. }) => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Dialogue(error) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
