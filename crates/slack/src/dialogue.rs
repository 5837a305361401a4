//! Bridges the dialogue engine to chat: starts the create-role flow, feeds it
//! replies, and persists the draft when the party finishes successfully.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use roleflow_core::{
    dialogue::{
        create_role::CreateRoleFlow,
        engine::{Completion, ConflictPolicy, DialogueEngine, DialogueStatus, DialogueStep},
    },
    domain::{role::Role, user::UserId},
    errors::{ApplicationError, DialogueError},
};
use roleflow_db::{add_role, UserRepository};

use crate::{
    blocks::reply_message,
    commands::{CommandRequest, CommandRouteError},
    events::{ConversationService, EventContext, EventHandlerError, Response},
    handlers::create_error_text,
};

pub const SAVED: &str = "Saved";

#[derive(Default)]
struct DialogueState {
    engine: DialogueEngine<Role>,
    channels: HashMap<UserId, String>,
}

impl DialogueState {
    fn track(&mut self, user_id: &UserId, channel_id: &str, step: &DialogueStep<Role>) {
        match step.status {
            DialogueStatus::Awaiting(_) => {
                self.channels.insert(user_id.clone(), channel_id.to_owned());
            }
            DialogueStatus::Completed(_) => {
                self.channels.remove(user_id);
            }
        }
    }
}

pub struct DialogueService<R: ?Sized> {
    state: Mutex<DialogueState>,
    flow: CreateRoleFlow,
    repo: Arc<R>,
}

impl<R> DialogueService<R>
where
    R: UserRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, conflict_policy: ConflictPolicy) -> Result<Self, DialogueError> {
        Ok(Self {
            state: Mutex::new(DialogueState {
                engine: DialogueEngine::new(conflict_policy),
                channels: HashMap::new(),
            }),
            flow: CreateRoleFlow::new()?,
            repo,
        })
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.engine.active_count()
    }

    pub async fn is_active(&self, user_id: &UserId) -> bool {
        self.state.lock().await.engine.is_active(user_id)
    }

    /// Starts the create-role dialogue in the request's channel. A conflicting
    /// start under the reject policy is answered in chat, not returned as an
    /// error.
    pub async fn start_create_role(
        &self,
        request: &CommandRequest,
    ) -> Result<Vec<Response>, CommandRouteError> {
        let step = {
            let mut state = self.state.lock().await;
            let started = state.engine.start(
                request.user_id.clone(),
                self.flow.graph(),
                self.flow.initial_thread(),
                self.flow.draft(),
            );
            match started {
                Ok(step) => {
                    state.track(&request.user_id, &request.channel_id, &step);
                    step
                }
                Err(error @ DialogueError::Conflict { .. }) => {
                    info!(
                        event_name = "dialogue.start_rejected",
                        correlation_id = %request.correlation_id,
                        user_id = %request.user_id,
                        "dialogue already in progress"
                    );
                    let interface = ApplicationError::from(error)
                        .into_interface(request.correlation_id.clone());
                    return Ok(vec![Response::Message(reply_message(interface.user_message()))]);
                }
                Err(error) => return Err(CommandRouteError::Dialogue(error.to_string())),
            }
        };

        Ok(self.settle(&request.correlation_id, step).await)
    }

    /// Abandons the party's dialogue. Returns whether one was active.
    pub async fn cancel(&self, user_id: &UserId) -> bool {
        let mut state = self.state.lock().await;
        state.channels.remove(user_id);
        state.engine.cancel(user_id).is_some()
    }

    /// Abandons every active dialogue, returning how many there were.
    pub async fn cancel_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let users: Vec<UserId> = state.channels.drain().map(|(user_id, _)| user_id).collect();
        users.iter().filter(|user_id| state.engine.cancel(user_id).is_some()).count()
    }

    async fn settle(&self, correlation_id: &str, step: DialogueStep<Role>) -> Vec<Response> {
        let mut responses: Vec<Response> = step
            .messages
            .iter()
            .map(|text| Response::Message(reply_message(text.as_str())))
            .collect();

        if let Some(completion) = step.into_completion() {
            if let Some(text) = self.persist(correlation_id, completion).await {
                responses.push(Response::Message(reply_message(text)));
            }
        }
        responses
    }

    async fn persist(&self, correlation_id: &str, completion: Completion<Role>) -> Option<String> {
        if !completion.outcome.is_successful() {
            return None;
        }

        match add_role(self.repo.as_ref(), &completion.user_id, completion.draft).await {
            Ok(user) => {
                info!(
                    event_name = "dialogue.role_saved",
                    correlation_id = %correlation_id,
                    user_id = %completion.user_id,
                    role_count = user.role_count(),
                    "role created through dialogue"
                );
                Some(SAVED.to_owned())
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.role_save_failed",
                    correlation_id = %correlation_id,
                    user_id = %completion.user_id,
                    error = %error,
                    "could not save role from dialogue"
                );
                Some(create_error_text(&error))
            }
        }
    }
}

#[async_trait]
impl<R> ConversationService for DialogueService<R>
where
    R: UserRepository + ?Sized,
{
    async fn captures(&self, user_id: &UserId, channel_id: &str) -> bool {
        self.state.lock().await.channels.get(user_id).is_some_and(|channel| channel == channel_id)
    }

    async fn submit_reply(
        &self,
        user_id: &UserId,
        channel_id: &str,
        text: &str,
        ctx: &EventContext,
    ) -> Result<Option<Vec<Response>>, EventHandlerError> {
        let step = {
            let mut state = self.state.lock().await;
            if !state.channels.get(user_id).is_some_and(|channel| channel == channel_id) {
                return Ok(None);
            }
            match state.engine.submit_reply(user_id, text) {
                Ok(Some(step)) => {
                    state.track(user_id, channel_id, &step);
                    step
                }
                Ok(None) => {
                    state.channels.remove(user_id);
                    return Ok(None);
                }
                Err(error) => {
                    state.channels.remove(user_id);
                    warn!(
                        event_name = "dialogue.reply_failed",
                        correlation_id = %ctx.correlation_id,
                        user_id = %user_id,
                        error = %error,
                        "dialogue ended on invalid reply handling"
                    );
                    return Err(EventHandlerError::Conversation(error.to_string()));
                }
            }
        };

        Ok(Some(self.settle(&ctx.correlation_id, step).await))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{DialogueService, SAVED};
    use crate::commands::CommandRequest;
    use crate::events::{ConversationService, EventContext, Response};
    use roleflow_core::dialogue::create_role::{
        ASK_ADD_STEP, ASK_NAME, ASK_STEP, NOT_UNDERSTOOD, ROLE_CREATED,
    };
    use roleflow_core::dialogue::engine::ConflictPolicy;
    use roleflow_core::domain::{
        role::Role,
        user::{User, UserId},
    };
    use roleflow_db::{InMemoryUserRepository, RepositoryError, UserRepository};

    fn request(user: &str, channel: &str) -> CommandRequest {
        CommandRequest {
            user_id: UserId::from(user),
            channel_id: channel.to_owned(),
            message_ts: "1.0".to_owned(),
            correlation_id: "env-1".to_owned(),
        }
    }

    fn texts(responses: &[Response]) -> Vec<String> {
        responses
            .iter()
            .filter_map(|response| match response {
                Response::Message(message) => Some(message.fallback_text.clone()),
                Response::Reaction { .. } => None,
            })
            .collect()
    }

    async fn reply<R>(service: &DialogueService<R>, user: &str, text: &str) -> Vec<String>
    where
        R: UserRepository + ?Sized,
    {
        let responses = service
            .submit_reply(&UserId::from(user), "D1", text, &EventContext::default())
            .await
            .expect("reply")
            .expect("dialogue active");
        texts(&responses)
    }

    #[tokio::test]
    async fn completed_dialogue_saves_role_and_replies_saved() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let service =
            DialogueService::new(Arc::clone(&repo), ConflictPolicy::Reject).expect("flow");

        let started = service.start_create_role(&request("U1", "D1")).await.expect("start");
        assert_eq!(texts(&started), vec![ASK_NAME]);
        assert_eq!(reply(&service, "U1", "Widget").await, vec![ASK_ADD_STEP]);
        assert_eq!(reply(&service, "U1", "yes").await, vec![ASK_STEP]);
        assert_eq!(reply(&service, "U1", "Tighten bolt").await, vec![ASK_ADD_STEP]);
        assert_eq!(reply(&service, "U1", "no").await, vec![ROLE_CREATED, SAVED]);

        let saved = repo.find_by_id(&UserId::from("U1")).await.expect("read").expect("user");
        assert_eq!(
            saved.roles,
            vec![Role { name: "Widget".to_owned(), steps: vec!["Tighten bolt".to_owned()] }]
        );
        assert_eq!(service.active_count().await, 0);
        assert!(!service.captures(&UserId::from("U1"), "D1").await);
    }

    #[tokio::test]
    async fn bad_answer_reprompts_and_keeps_dialogue_open() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let service = DialogueService::new(repo, ConflictPolicy::Reject).expect("flow");

        service.start_create_role(&request("U1", "D1")).await.expect("start");
        reply(&service, "U1", "Widget").await;
        assert_eq!(reply(&service, "U1", "maybe").await, vec![NOT_UNDERSTOOD, ASK_ADD_STEP]);
        assert!(service.is_active(&UserId::from("U1")).await);
    }

    #[tokio::test]
    async fn second_start_is_rejected_with_a_chat_reply() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let service = DialogueService::new(repo, ConflictPolicy::Reject).expect("flow");

        service.start_create_role(&request("U1", "D1")).await.expect("start");
        let rejected = service.start_create_role(&request("U1", "C1")).await.expect("conflict");

        assert_eq!(
            texts(&rejected),
            vec!["You already have a conversation in progress. Finish it before starting another."]
        );
        assert!(service.captures(&UserId::from("U1"), "D1").await);
        assert!(!service.captures(&UserId::from("U1"), "C1").await);
    }

    #[tokio::test]
    async fn supersede_moves_dialogue_to_new_channel() {
        let service = DialogueService::new(
            Arc::new(InMemoryUserRepository::default()),
            ConflictPolicy::Supersede,
        )
        .expect("flow");

        service.start_create_role(&request("U1", "D1")).await.expect("start");
        let restarted = service.start_create_role(&request("U1", "C1")).await.expect("restart");

        assert_eq!(texts(&restarted), vec![ASK_NAME]);
        assert!(service.captures(&UserId::from("U1"), "C1").await);
        assert!(!service.captures(&UserId::from("U1"), "D1").await);
        assert_eq!(service.active_count().await, 1);
    }

    #[tokio::test]
    async fn replies_without_dialogue_are_not_captured() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let service = DialogueService::new(repo, ConflictPolicy::Reject).expect("flow");

        let outcome = service
            .submit_reply(&UserId::from("U9"), "D1", "yes", &EventContext::default())
            .await
            .expect("no-op");
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn cancel_abandons_without_saving() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let service =
            DialogueService::new(Arc::clone(&repo), ConflictPolicy::Reject).expect("flow");

        service.start_create_role(&request("U1", "D1")).await.expect("start");
        service.start_create_role(&request("U2", "D2")).await.expect("start");
        reply(&service, "U1", "Widget").await;

        assert!(service.cancel(&UserId::from("U1")).await);
        assert!(!service.cancel(&UserId::from("U1")).await);
        assert_eq!(service.cancel_all().await, 1);
        assert_eq!(service.active_count().await, 0);
        assert!(repo.is_empty().await);
    }

    struct FailingRepository;

    #[async_trait]
    impl UserRepository for FailingRepository {
        async fn find_by_id(&self, _id: &UserId) -> Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn save(&self, _user: User) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_owned()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_reported_to_the_party() {
        let service = DialogueService::new(Arc::new(FailingRepository), ConflictPolicy::Reject)
            .expect("flow");

        service.start_create_role(&request("U1", "D1")).await.expect("start");
        reply(&service, "U1", "Widget").await;
        let finished = reply(&service, "U1", "no").await;

        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0], ROLE_CREATED);
        assert!(finished[1].starts_with("I experienced an error creating the role: "));
        assert!(finished[1].contains("disk full"));
    }
}
