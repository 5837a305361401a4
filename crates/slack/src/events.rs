use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use roleflow_core::domain::user::UserId;

use crate::{
    blocks::MessageTemplate,
    commands::{
        parse_message_command, CommandRequest, CommandRouteError, CommandRouter,
        RoleCommandService,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Channel and timestamp that replies and reactions attach to.
    pub fn reply_target(&self) -> Option<(&str, &str)> {
        match self {
            Self::Message(event) => Some((event.channel_id.as_str(), event.ts.as_str())),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    Unsupported,
}

/// How a message reached the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    DirectMessage,
    /// Starts with `<@bot>`; the mention is stripped from the text.
    DirectMention,
    /// Mentions the bot somewhere after the start; every mention of the bot
    /// is removed from the text.
    Mention,
    Ambient,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub kind: MessageKind,
}

impl MessageEvent {
    /// Builds an event from a raw channel message. Returns `None` for the
    /// bot's own messages.
    pub fn classify(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        text: &str,
        ts: impl Into<String>,
        bot_user_id: &str,
    ) -> Option<Self> {
        let channel_id = channel_id.into();
        let user_id = user_id.into();
        if user_id == bot_user_id {
            return None;
        }

        let mention = format!("<@{bot_user_id}>");
        let trimmed = text.trim_start();
        let (kind, text) = if channel_id.starts_with('D') {
            (MessageKind::DirectMessage, text.trim().to_owned())
        } else if let Some(rest) = trimmed.strip_prefix(mention.as_str()) {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            (MessageKind::DirectMention, rest.trim().to_owned())
        } else if text.contains(mention.as_str()) {
            (MessageKind::Mention, text.replace(mention.as_str(), " ").trim().to_owned())
        } else {
            (MessageKind::Ambient, text.trim().to_owned())
        };

        Some(Self { channel_id, user_id, text, ts: ts.into(), kind })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Something to send back in the channel of the triggering message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Message(MessageTemplate),
    /// Emoji reaction on the triggering message.
    Reaction { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<Response>),
    Processed,
    Ignored,
}

impl HandlerResult {
    fn from_responses(responses: Vec<Response>) -> Self {
        if responses.is_empty() {
            Self::Processed
        } else {
            Self::Responded(responses)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("conversation handler failure: {0}")]
    Conversation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Active dialogues keyed by party. A dialogue listens in the channel where
/// it was started.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn captures(&self, user_id: &UserId, channel_id: &str) -> bool;

    /// `Ok(None)` when the party has no dialogue in that channel.
    async fn submit_reply(
        &self,
        user_id: &UserId,
        channel_id: &str,
        text: &str,
        ctx: &EventContext,
    ) -> Result<Option<Vec<Response>>, EventHandlerError>;
}

/// Routes channel messages either into the party's active dialogue or to the
/// role commands.
pub struct MessageHandler<S, C: ?Sized> {
    router: CommandRouter<S>,
    conversations: Arc<C>,
}

impl<S, C> MessageHandler<S, C>
where
    S: RoleCommandService,
    C: ConversationService + ?Sized,
{
    pub fn new(service: S, conversations: Arc<C>) -> Self {
        Self { router: CommandRouter::new(service), conversations }
    }
}

#[async_trait]
impl<S, C> EventHandler for MessageHandler<S, C>
where
    S: RoleCommandService + 'static,
    C: ConversationService + ?Sized + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let user_id = UserId(event.user_id.clone());
        if self.conversations.captures(&user_id, &event.channel_id).await {
            let responses = self
                .conversations
                .submit_reply(&user_id, &event.channel_id, &event.text, ctx)
                .await?;
            return Ok(responses.map_or(HandlerResult::Processed, HandlerResult::from_responses));
        }

        let command = match parse_message_command(&event.text) {
            Ok(command) => command,
            Err(error) => {
                debug!(
                    event_name = "ingress.slack.message_ignored",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    reason = %error,
                    "message is not a role command"
                );
                return Ok(HandlerResult::Ignored);
            }
        };
        if !command.accepts(event.kind) {
            debug!(
                event_name = "ingress.slack.command_out_of_scope",
                correlation_id = %ctx.correlation_id,
                user_id = %event.user_id,
                command = command.verb(),
                kind = ?event.kind,
                "command not heard for this message kind"
            );
            return Ok(HandlerResult::Ignored);
        }

        let request = CommandRequest::from_event(event, ctx);
        let responses = self.router.route(command, &request).await?;
        Ok(HandlerResult::from_responses(responses))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        ConversationService, EventContext, EventDispatcher, EventHandlerError, HandlerResult,
        MessageEvent, MessageHandler, MessageKind, Response, SlackEnvelope, SlackEvent,
    };
    use crate::blocks::reply_message;
    use crate::commands::{CommandRequest, CommandRouteError, RoleCommandService};
    use roleflow_core::domain::user::UserId;

    const BOT: &str = "UBOT";

    struct EchoService;

    #[async_trait]
    impl RoleCommandService for EchoService {
        async fn onboard(
            &self,
            _request: &CommandRequest,
        ) -> Result<Vec<Response>, CommandRouteError> {
            Ok(vec![Response::Message(reply_message("onboard"))])
        }

        async fn add_role(
            &self,
            name: String,
            _request: &CommandRequest,
        ) -> Result<Vec<Response>, CommandRouteError> {
            Ok(vec![Response::Message(reply_message(format!("add {name}")))])
        }

        async fn create_role(
            &self,
            _request: &CommandRequest,
        ) -> Result<Vec<Response>, CommandRouteError> {
            Ok(vec![Response::Message(reply_message("create"))])
        }

        async fn edit_role(
            &self,
            _selector: Option<String>,
            _request: &CommandRequest,
        ) -> Result<Vec<Response>, CommandRouteError> {
            Err(CommandRouteError::Dialogue("disk on fire".to_owned()))
        }

        async fn view_role(
            &self,
            _selector: Option<String>,
            _request: &CommandRequest,
        ) -> Result<Vec<Response>, CommandRouteError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeConversations {
        active: Mutex<Option<(UserId, String)>>,
        replies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConversationService for FakeConversations {
        async fn captures(&self, user_id: &UserId, channel_id: &str) -> bool {
            matches!(
                &*self.active.lock().await,
                Some((active_user, active_channel))
                    if active_user == user_id && active_channel == channel_id
            )
        }

        async fn submit_reply(
            &self,
            _user_id: &UserId,
            _channel_id: &str,
            text: &str,
            _ctx: &EventContext,
        ) -> Result<Option<Vec<Response>>, EventHandlerError> {
            self.replies.lock().await.push(text.to_owned());
            Ok(Some(vec![Response::Message(reply_message(format!("got {text}")))]))
        }
    }

    fn envelope(channel: &str, user: &str, text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-1".to_owned(),
            event: SlackEvent::Message(
                MessageEvent::classify(channel, user, text, "1700000000.000100", BOT)
                    .expect("not a bot message"),
            ),
        }
    }

    fn dispatcher(conversations: Arc<FakeConversations>) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(MessageHandler::new(EchoService, conversations));
        dispatcher
    }

    fn reply_texts(result: HandlerResult) -> Vec<String> {
        match result {
            HandlerResult::Responded(responses) => responses
                .into_iter()
                .filter_map(|response| match response {
                    Response::Message(message) => Some(message.fallback_text),
                    Response::Reaction { .. } => None,
                })
                .collect(),
            other => panic!("expected responses, got {other:?}"),
        }
    }

    #[test]
    fn classifies_message_kinds() {
        let dm = MessageEvent::classify("D1", "U1", " add Widget ", "1.0", BOT).expect("event");
        assert_eq!(dm.kind, MessageKind::DirectMessage);
        assert_eq!(dm.text, "add Widget");

        let direct = MessageEvent::classify("C1", "U1", "<@UBOT>: add Widget", "1.0", BOT)
            .expect("event");
        assert_eq!(direct.kind, MessageKind::DirectMention);
        assert_eq!(direct.text, "add Widget");

        let mention = MessageEvent::classify("C1", "U1", "add Widget <@UBOT>", "1.0", BOT)
            .expect("event");
        assert_eq!(mention.kind, MessageKind::Mention);
        assert_eq!(mention.text, "add Widget");

        let inline = MessageEvent::classify("C1", "U1", "hey <@UBOT> add Widget", "1.0", BOT)
            .expect("event");
        assert_eq!(inline.kind, MessageKind::Mention);
        assert!(!inline.text.contains("<@UBOT>"));

        let ambient = MessageEvent::classify("C1", "U1", "add Widget", "1.0", BOT).expect("event");
        assert_eq!(ambient.kind, MessageKind::Ambient);
    }

    #[test]
    fn bot_messages_are_dropped() {
        assert_eq!(MessageEvent::classify("D1", BOT, "Saved", "1.0", BOT), None);
    }

    #[tokio::test]
    async fn dispatcher_ignores_unsupported_events() {
        let dispatcher = dispatcher(Arc::new(FakeConversations::default()));
        let envelope = SlackEnvelope {
            envelope_id: "env-2".to_owned(),
            event: SlackEvent::Unsupported { event_type: "app_home_opened".to_owned() },
        };

        let result = dispatcher.dispatch(&envelope, &EventContext::default()).await;
        assert_eq!(result, Ok(HandlerResult::Ignored));
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[tokio::test]
    async fn routes_commands_by_message_kind() {
        let dispatcher = dispatcher(Arc::new(FakeConversations::default()));
        let ctx = EventContext::default();

        let dm = dispatcher.dispatch(&envelope("D1", "U1", "onboard"), &ctx).await.expect("dm");
        assert_eq!(reply_texts(dm), vec!["onboard"]);

        let mention = dispatcher
            .dispatch(&envelope("C1", "U1", "<@UBOT> add Widget"), &ctx)
            .await
            .expect("mention");
        assert_eq!(reply_texts(mention), vec!["add Widget"]);

        let inline = dispatcher
            .dispatch(&envelope("C1", "U1", "hey <@UBOT> add Widget"), &ctx)
            .await
            .expect("inline mention");
        assert_eq!(reply_texts(inline), vec!["add Widget"]);

        let onboard_in_channel = dispatcher
            .dispatch(&envelope("C1", "U1", "<@UBOT> onboard"), &ctx)
            .await
            .expect("channel");
        assert_eq!(onboard_in_channel, HandlerResult::Ignored);

        let ambient = dispatcher.dispatch(&envelope("C1", "U1", "add Widget"), &ctx).await;
        assert_eq!(ambient, Ok(HandlerResult::Ignored));

        let chatter = dispatcher.dispatch(&envelope("D1", "U1", "hello there"), &ctx).await;
        assert_eq!(chatter, Ok(HandlerResult::Ignored));

        let empty = dispatcher.dispatch(&envelope("D1", "U1", "view"), &ctx).await;
        assert_eq!(empty, Ok(HandlerResult::Processed));
    }

    #[tokio::test]
    async fn active_dialogue_captures_messages_in_its_channel() {
        let conversations = Arc::new(FakeConversations::default());
        *conversations.active.lock().await = Some((UserId::from("U1"), "D1".to_owned()));
        let dispatcher = dispatcher(Arc::clone(&conversations));
        let ctx = EventContext::default();

        let captured = dispatcher.dispatch(&envelope("D1", "U1", "add"), &ctx).await.expect("dm");
        assert_eq!(reply_texts(captured), vec!["got add"]);

        let other_party =
            dispatcher.dispatch(&envelope("D1", "U2", "add"), &ctx).await.expect("dm");
        assert_eq!(reply_texts(other_party), vec!["create"]);

        let other_channel = dispatcher
            .dispatch(&envelope("C1", "U1", "<@UBOT> add"), &ctx)
            .await
            .expect("mention");
        assert_eq!(reply_texts(other_channel), vec!["create"]);

        assert_eq!(*conversations.replies.lock().await, vec!["add".to_owned()]);
    }

    #[tokio::test]
    async fn route_failures_surface_as_dispatch_errors() {
        let dispatcher = dispatcher(Arc::new(FakeConversations::default()));

        let error = dispatcher
            .dispatch(&envelope("D1", "U1", "edit 1"), &EventContext::default())
            .await
            .expect_err("store failure");
        assert!(error.to_string().contains("disk on fire"));
    }
}
