//! Socket Mode over a websocket. `apps.connections.open` hands out a
//! single-use URL; Slack pushes envelopes on it and expects each one echoed
//! back by `envelope_id`.

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    events::{MessageEvent, SlackEnvelope, SlackEvent},
    socket::{SocketTransport, TransportError},
    transport::SLACK_API_BASE_URL,
};

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    client: Client,
    app_token: SecretString,
    bot_token: SecretString,
    base_url: String,
    bot_user_id: Mutex<Option<String>>,
    reader: Mutex<Option<SplitStream<SocketStream>>>,
    writer: Mutex<Option<SplitSink<SocketStream, Message>>>,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Frame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

impl WebSocketTransport {
    pub fn new(app_token: SecretString, bot_token: SecretString) -> Self {
        Self::with_base_url(app_token, bot_token, SLACK_API_BASE_URL)
    }

    pub fn with_base_url(
        app_token: SecretString,
        bot_token: SecretString,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            app_token,
            bot_token,
            base_url: base_url.into(),
            bot_user_id: Mutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    async fn call(&self, method: &str, token: &SecretString) -> Result<ApiReply, TransportError> {
        let url = format!("{}/{method}", self.base_url.trim_end_matches('/'));
        let reply: ApiReply = self
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(format!("{method}: {error}")))?
            .json()
            .await
            .map_err(|error| TransportError::Connect(format!("{method}: {error}")))?;

        if reply.ok {
            return Ok(reply);
        }
        let error = reply.error.as_deref().unwrap_or("unknown_error");
        Err(TransportError::Connect(format!("{method} was rejected by slack: {error}")))
    }

    fn not_connected() -> TransportError {
        TransportError::Receive("socket mode connection is not open".to_owned())
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let bot_user_id = self
            .call("auth.test", &self.bot_token)
            .await?
            .user_id
            .ok_or_else(|| TransportError::Connect("auth.test returned no user_id".to_owned()))?;
        let url = self
            .call("apps.connections.open", &self.app_token)
            .await?
            .url
            .ok_or_else(|| {
                TransportError::Connect("apps.connections.open returned no url".to_owned())
            })?;

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (writer, reader) = stream.split();

        info!(
            event_name = "ingress.slack.socket_opened",
            correlation_id = "bootstrap",
            bot_user_id = %bot_user_id,
            "socket mode websocket opened"
        );
        *self.bot_user_id.lock().await = Some(bot_user_id);
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let bot_user_id = self.bot_user_id.lock().await.clone().ok_or_else(Self::not_connected)?;
        let mut reader = self.reader.lock().await;
        let stream = reader.as_mut().ok_or_else(Self::not_connected)?;

        while let Some(message) = stream.next().await {
            let text = match message.map_err(|error| TransportError::Receive(error.to_string()))? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    continue
                }
            };

            match parse_frame(text.as_str(), &bot_user_id) {
                Ok(Frame::Hello) => debug!("socket mode hello received"),
                Ok(Frame::Disconnect { reason }) => {
                    return Err(TransportError::Receive(format!(
                        "slack requested a reconnect: {reason}"
                    )));
                }
                Ok(Frame::Envelope(envelope)) => return Ok(Some(envelope)),
                Err(error) => {
                    warn!(error = %error, "skipping unreadable socket mode frame");
                }
            }
        }

        Err(TransportError::Receive("socket mode websocket closed".to_owned()))
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let body = json!({ "envelope_id": envelope_id }).to_string();
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or_else(|| {
            TransportError::Acknowledge("socket mode connection is not open".to_owned())
        })?;
        sink.send(Message::Text(body.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.reader.lock().await.take();
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            writer.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }
}

fn parse_frame(text: &str, bot_user_id: &str) -> Result<Frame, TransportError> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|error| TransportError::Receive(format!("malformed frame: {error}")))?;

    match raw.frame_type.as_str() {
        "hello" => Ok(Frame::Hello),
        "disconnect" => Ok(Frame::Disconnect {
            reason: raw.reason.unwrap_or_else(|| "unspecified".to_owned()),
        }),
        frame_type => {
            let envelope_id = raw.envelope_id.ok_or_else(|| {
                TransportError::Receive(format!("`{frame_type}` frame has no envelope_id"))
            })?;
            let event = if frame_type == "events_api" {
                decode_event(&raw.payload["event"], bot_user_id)
            } else {
                SlackEvent::Unsupported { event_type: frame_type.to_owned() }
            };
            Ok(Frame::Envelope(SlackEnvelope { envelope_id, event }))
        }
    }
}

fn decode_event(event: &Value, bot_user_id: &str) -> SlackEvent {
    let event_type = event["type"].as_str().unwrap_or("unknown");
    let unsupported = || SlackEvent::Unsupported { event_type: event_type.to_owned() };

    // edits, joins and other bots' posts arrive as subtypes or carry a bot_id
    if event_type != "message" || event.get("subtype").is_some() || event.get("bot_id").is_some()
    {
        return unsupported();
    }

    let field = |name: &str| event[name].as_str();
    match (field("channel"), field("user"), field("text"), field("ts")) {
        (Some(channel), Some(user), Some(text), Some(ts)) => {
            MessageEvent::classify(channel, user, text, ts, bot_user_id)
                .map_or_else(unsupported, SlackEvent::Message)
        }
        _ => unsupported(),
    }
}
