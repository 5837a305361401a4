use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dialogue::graph::{
    select_branch, Cursor, MessageAction, Outcome, Prompt, ThreadGraph, ThreadName,
};
use crate::domain::user::UserId;
use crate::errors::DialogueError;

/// What `start` does when the party already has an active dialogue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Reject,
    Supersede,
}

impl ConflictPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "supersede" => Some(Self::Supersede),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Supersede => "supersede",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion<D> {
    pub user_id: UserId,
    pub draft: D,
    pub outcome: Outcome,
}

pub type CompletionHook<D> = Box<dyn FnOnce(&Completion<D>) + Send>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogueStatus<D> {
    Awaiting(Cursor),
    Completed(Completion<D>),
}

/// Texts emitted while advancing, in order, and where the dialogue stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueStep<D> {
    pub messages: Vec<String>,
    pub status: DialogueStatus<D>,
}

impl<D> DialogueStep<D> {
    pub fn completion(&self) -> Option<&Completion<D>> {
        match &self.status {
            DialogueStatus::Completed(completion) => Some(completion),
            DialogueStatus::Awaiting(_) => None,
        }
    }

    pub fn into_completion(self) -> Option<Completion<D>> {
        match self.status {
            DialogueStatus::Completed(completion) => Some(completion),
            DialogueStatus::Awaiting(_) => None,
        }
    }
}

pub struct Dialogue<D> {
    user_id: UserId,
    graph: Arc<ThreadGraph<D>>,
    cursor: Cursor,
    draft: D,
    hooks: Vec<CompletionHook<D>>,
}

impl<D> Dialogue<D> {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    fn apply_reply(&mut self, reply: &str) -> Result<(), DialogueError> {
        let graph = Arc::clone(&self.graph);
        let next = match graph.prompt_at(&self.cursor)? {
            Some(Prompt::Capture { capture, next, .. }) => {
                capture(&mut self.draft, reply);
                next.clone()
            }
            Some(Prompt::Branch { branches, .. }) => select_branch(branches, reply)
                .cloned()
                .ok_or_else(|| DialogueError::NoMatch { thread: self.cursor.thread.to_string() })?,
            Some(Prompt::Message { .. }) | None => {
                return Err(DialogueError::InvalidCursor {
                    thread: self.cursor.thread.to_string(),
                    prompt_index: self.cursor.prompt_index,
                });
            }
        };

        debug!(
            event_name = "dialogue.transition",
            user_id = %self.user_id,
            from = %self.cursor.thread,
            to = %next,
            "dialogue moved to next thread"
        );
        self.cursor = Cursor::start_of(next);
        Ok(())
    }

    /// Emits prompts from the cursor onward until a question is asked or the
    /// dialogue reaches an outcome.
    fn run_until_blocked(
        &mut self,
        messages: &mut Vec<String>,
    ) -> Result<Option<Outcome>, DialogueError> {
        let graph = Arc::clone(&self.graph);
        for _ in 0..graph.hop_limit() {
            let thread = graph.thread(&self.cursor.thread)?;
            let Some(prompt) = thread.prompts.get(self.cursor.prompt_index) else {
                return Ok(Some(thread.on_exhausted));
            };

            messages.push(prompt.text().to_owned());
            match prompt {
                Prompt::Capture { .. } | Prompt::Branch { .. } => return Ok(None),
                Prompt::Message { action: MessageAction::Continue, .. } => {
                    self.cursor.prompt_index += 1;
                }
                Prompt::Message { action: MessageAction::Complete(outcome), .. } => {
                    return Ok(Some(*outcome));
                }
                Prompt::Message { action: MessageAction::Redirect(target), .. } => {
                    debug!(
                        event_name = "dialogue.redirect",
                        user_id = %self.user_id,
                        from = %self.cursor.thread,
                        to = %target,
                        "dialogue redirected"
                    );
                    self.cursor = Cursor::start_of(target.clone());
                }
            }
        }

        Err(DialogueError::RedirectLoop { thread: self.cursor.thread.to_string() })
    }

    fn finish(self, outcome: Outcome) -> Completion<D> {
        let completion = Completion { user_id: self.user_id, draft: self.draft, outcome };
        for hook in self.hooks {
            hook(&completion);
        }
        info!(
            event_name = "dialogue.finished",
            user_id = %completion.user_id,
            outcome = ?completion.outcome,
            "dialogue finished"
        );
        completion
    }
}

impl<D> fmt::Debug for Dialogue<D>
where
    D: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialogue")
            .field("user_id", &self.user_id)
            .field("cursor", &self.cursor)
            .field("draft", &self.draft)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Session map of active dialogues, at most one per party. A dialogue leaves
/// the map as soon as it has an outcome, so replies after that are ignored.
pub struct DialogueEngine<D> {
    sessions: HashMap<UserId, Dialogue<D>>,
    conflict_policy: ConflictPolicy,
}

impl<D> Default for DialogueEngine<D> {
    fn default() -> Self {
        Self::new(ConflictPolicy::default())
    }
}

impl<D> DialogueEngine<D> {
    pub fn new(conflict_policy: ConflictPolicy) -> Self {
        Self { sessions: HashMap::new(), conflict_policy }
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    pub fn is_active(&self, user_id: &UserId) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn dialogue(&self, user_id: &UserId) -> Option<&Dialogue<D>> {
        self.sessions.get(user_id)
    }

    pub fn start(
        &mut self,
        user_id: UserId,
        graph: Arc<ThreadGraph<D>>,
        initial_thread: ThreadName,
        draft: D,
    ) -> Result<DialogueStep<D>, DialogueError> {
        graph.thread(&initial_thread)?;

        if self.sessions.contains_key(&user_id) {
            match self.conflict_policy {
                ConflictPolicy::Reject => {
                    return Err(DialogueError::Conflict { user_id: user_id.to_string() });
                }
                ConflictPolicy::Supersede => {
                    info!(
                        event_name = "dialogue.superseded",
                        user_id = %user_id,
                        "replacing active dialogue"
                    );
                    self.cancel(&user_id);
                }
            }
        }

        info!(
            event_name = "dialogue.started",
            user_id = %user_id,
            thread = %initial_thread,
            "dialogue started"
        );
        let dialogue = Dialogue {
            user_id,
            graph,
            cursor: Cursor::start_of(initial_thread),
            draft,
            hooks: Vec::new(),
        };
        self.settle(dialogue, Vec::new())
    }

    /// Feeds one reply to the party's dialogue. `Ok(None)` means nothing was
    /// active and the reply was ignored.
    pub fn submit_reply(
        &mut self,
        user_id: &UserId,
        reply: &str,
    ) -> Result<Option<DialogueStep<D>>, DialogueError> {
        let Some(mut dialogue) = self.sessions.remove(user_id) else {
            debug!(event_name = "dialogue.reply_ignored", user_id = %user_id, "no active dialogue");
            return Ok(None);
        };

        if let Err(error) = dialogue.apply_reply(reply) {
            dialogue.finish(Outcome::Unsuccessful);
            return Err(error);
        }
        self.settle(dialogue, Vec::new()).map(Some)
    }

    pub fn cancel(&mut self, user_id: &UserId) -> Option<Completion<D>> {
        let dialogue = self.sessions.remove(user_id)?;
        info!(event_name = "dialogue.cancelled", user_id = %user_id, "dialogue cancelled");
        Some(dialogue.finish(Outcome::Unsuccessful))
    }

    /// Registers a hook fired exactly once, when the party's active dialogue
    /// gets its outcome.
    pub fn on_completion<F>(&mut self, user_id: &UserId, hook: F) -> Result<(), DialogueError>
    where
        F: FnOnce(&Completion<D>) + Send + 'static,
    {
        let dialogue = self
            .sessions
            .get_mut(user_id)
            .ok_or_else(|| DialogueError::NotActive { user_id: user_id.to_string() })?;
        dialogue.hooks.push(Box::new(hook));
        Ok(())
    }

    fn settle(
        &mut self,
        mut dialogue: Dialogue<D>,
        mut messages: Vec<String>,
    ) -> Result<DialogueStep<D>, DialogueError> {
        match dialogue.run_until_blocked(&mut messages) {
            Ok(None) => {
                let cursor = dialogue.cursor.clone();
                self.sessions.insert(dialogue.user_id.clone(), dialogue);
                Ok(DialogueStep { messages, status: DialogueStatus::Awaiting(cursor) })
            }
            Ok(Some(outcome)) => {
                let completion = dialogue.finish(outcome);
                Ok(DialogueStep { messages, status: DialogueStatus::Completed(completion) })
            }
            Err(error) => {
                dialogue.finish(Outcome::Unsuccessful);
                Err(error)
            }
        }
    }
}
