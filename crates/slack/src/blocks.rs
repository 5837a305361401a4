use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// Outbound chat message. `fallback_text` is what notifications and clients
/// without block support show, and is always the full reply text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Conversational reply: the text verbatim, rendered as markdown so the
/// backticks and `>` quotes in role listings display as intended.
pub fn reply_message(text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone())
        .section("roleflow.reply.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("roleflow.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("roleflow.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::{error_message, reply_message, Block, MessageBuilder, TextObject};

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("roleflow.summary.v1", |section| {
                section.plain("Summary");
            })
            .context("roleflow.summary.context.v1", |context| {
                context.plain("one").plain("two");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, text: TextObject::Plain { .. } }
                if block_id == "roleflow.summary.v1"
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. } if elements.len() == 2
        ));
    }

    #[test]
    fn reply_keeps_text_verbatim_in_fallback_and_section() {
        let text = "These are the existing roles: \n> `1`) greeter\n";
        let message = reply_message(text);

        assert_eq!(message.fallback_text, text);
        assert!(matches!(
            message.blocks.as_slice(),
            [Block::Section { text: TextObject::Mrkdwn { text: body }, .. }] if body == text
        ));
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message = error_message("Cannot process request", "env-123");
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. } if matches!(
                elements.first(),
                Some(TextObject::Plain { text }) if text.contains("env-123")
            )
        ));
    }

    #[test]
    fn serializes_to_slack_block_kit_shape() {
        let value = serde_json::to_value(reply_message("Saved")).expect("serialize");

        assert_eq!(value["text"], "Saved");
        assert_eq!(value["blocks"][0]["type"], "section");
        assert_eq!(value["blocks"][0]["text"]["type"], "mrkdwn");
        assert_eq!(value["blocks"][0]["text"]["text"], "Saved");
    }
}
