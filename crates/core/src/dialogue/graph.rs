use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dialogue::pattern::ReplyPattern;
use crate::errors::DialogueError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadName(pub String);

impl ThreadName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Successful,
    Unsuccessful,
}

impl Outcome {
    pub fn is_successful(self) -> bool {
        matches!(self, Self::Successful)
    }
}

/// Stores a free-text reply into the draft.
pub type CaptureFn<D> = Arc<dyn Fn(&mut D, &str) + Send + Sync>;

#[derive(Clone, Debug)]
pub enum Branch {
    Match { pattern: ReplyPattern, next: ThreadName },
    Default { next: ThreadName },
}

impl Branch {
    pub fn matching(pattern: ReplyPattern, next: impl Into<ThreadName>) -> Self {
        Self::Match { pattern, next: next.into() }
    }

    pub fn fallback(next: impl Into<ThreadName>) -> Self {
        Self::Default { next: next.into() }
    }

    pub fn next(&self) -> &ThreadName {
        match self {
            Self::Match { next, .. } | Self::Default { next } => next,
        }
    }
}

/// Picks the thread a branch prompt moves to: the first `Match` whose pattern
/// accepts the reply, otherwise the `Default`.
pub fn select_branch<'a>(branches: &'a [Branch], reply: &str) -> Option<&'a ThreadName> {
    branches
        .iter()
        .find_map(|branch| match branch {
            Branch::Match { pattern, next } if pattern.matches(reply) => Some(next),
            _ => None,
        })
        .or_else(|| {
            branches.iter().find_map(|branch| match branch {
                Branch::Default { next } => Some(next),
                Branch::Match { .. } => None,
            })
        })
}

/// What happens after a message prompt has been emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageAction {
    Continue,
    Complete(Outcome),
    Redirect(ThreadName),
}

pub enum Prompt<D> {
    Capture { text: String, capture: CaptureFn<D>, next: ThreadName },
    Branch { text: String, branches: Vec<Branch> },
    Message { text: String, action: MessageAction },
}

impl<D> Prompt<D> {
    pub fn text(&self) -> &str {
        match self {
            Self::Capture { text, .. } | Self::Branch { text, .. } | Self::Message { text, .. } => {
                text
            }
        }
    }

    /// Questions suspend the dialogue until a reply arrives; messages do not.
    pub fn awaits_reply(&self) -> bool {
        matches!(self, Self::Capture { .. } | Self::Branch { .. })
    }

    fn targets(&self) -> Vec<&ThreadName> {
        match self {
            Self::Capture { next, .. } => vec![next],
            Self::Branch { branches, .. } => branches.iter().map(Branch::next).collect(),
            Self::Message { action: MessageAction::Redirect(next), .. } => vec![next],
            Self::Message { .. } => Vec::new(),
        }
    }
}

impl<D> fmt::Debug for Prompt<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture { text, next, .. } => {
                f.debug_struct("Capture").field("text", text).field("next", next).finish()
            }
            Self::Branch { text, branches } => {
                f.debug_struct("Branch").field("text", text).field("branches", branches).finish()
            }
            Self::Message { text, action } => {
                f.debug_struct("Message").field("text", text).field("action", action).finish()
            }
        }
    }
}

pub struct Thread<D> {
    pub prompts: Vec<Prompt<D>>,
    /// Disposition when the cursor runs past the last prompt.
    pub on_exhausted: Outcome,
}

impl<D> Default for Thread<D> {
    fn default() -> Self {
        Self { prompts: Vec::new(), on_exhausted: Outcome::Successful }
    }
}

impl<D> fmt::Debug for Thread<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("prompts", &self.prompts)
            .field("on_exhausted", &self.on_exhausted)
            .finish()
    }
}

/// Position of a dialogue inside its graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub thread: ThreadName,
    pub prompt_index: usize,
}

impl Cursor {
    pub fn start_of(thread: ThreadName) -> Self {
        Self { thread, prompt_index: 0 }
    }
}

/// Named threads of prompts. Built once through [`ThreadGraphBuilder`], which
/// guarantees that every referenced thread exists and every branch prompt
/// carries a default.
pub struct ThreadGraph<D> {
    threads: HashMap<ThreadName, Thread<D>>,
    prompt_count: usize,
}

impl<D> fmt::Debug for ThreadGraph<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGraph").field("threads", &self.threads).finish()
    }
}

impl<D> ThreadGraph<D> {
    pub fn builder() -> ThreadGraphBuilder<D> {
        ThreadGraphBuilder::default()
    }

    pub fn thread(&self, name: &ThreadName) -> Result<&Thread<D>, DialogueError> {
        self.threads
            .get(name)
            .ok_or_else(|| DialogueError::UnknownThread { thread: name.to_string() })
    }

    pub fn prompt_at(&self, cursor: &Cursor) -> Result<Option<&Prompt<D>>, DialogueError> {
        Ok(self.thread(&cursor.thread)?.prompts.get(cursor.prompt_index))
    }

    /// Upper bound on prompts visited between two replies; exceeding it means
    /// redirects are cycling through messages without ever asking a question.
    pub fn hop_limit(&self) -> usize {
        self.prompt_count + self.threads.len() + 1
    }
}

pub struct ThreadGraphBuilder<D> {
    threads: HashMap<ThreadName, Thread<D>>,
}

impl<D> Default for ThreadGraphBuilder<D> {
    fn default() -> Self {
        Self { threads: HashMap::new() }
    }
}

impl<D> ThreadGraphBuilder<D> {
    fn push(mut self, thread: impl Into<ThreadName>, prompt: Prompt<D>) -> Self {
        self.threads.entry(thread.into()).or_default().prompts.push(prompt);
        self
    }

    pub fn capture<F>(
        self,
        thread: impl Into<ThreadName>,
        text: impl Into<String>,
        capture: F,
        next: impl Into<ThreadName>,
    ) -> Self
    where
        F: Fn(&mut D, &str) + Send + Sync + 'static,
    {
        self.push(
            thread,
            Prompt::Capture { text: text.into(), capture: Arc::new(capture), next: next.into() },
        )
    }

    pub fn branch(
        self,
        thread: impl Into<ThreadName>,
        text: impl Into<String>,
        branches: Vec<Branch>,
    ) -> Self {
        self.push(thread, Prompt::Branch { text: text.into(), branches })
    }

    pub fn message(self, thread: impl Into<ThreadName>, text: impl Into<String>) -> Self {
        self.push(thread, Prompt::Message { text: text.into(), action: MessageAction::Continue })
    }

    pub fn terminal(
        self,
        thread: impl Into<ThreadName>,
        text: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        self.push(
            thread,
            Prompt::Message { text: text.into(), action: MessageAction::Complete(outcome) },
        )
    }

    pub fn redirect(
        self,
        thread: impl Into<ThreadName>,
        text: impl Into<String>,
        target: impl Into<ThreadName>,
    ) -> Self {
        self.push(
            thread,
            Prompt::Message { text: text.into(), action: MessageAction::Redirect(target.into()) },
        )
    }

    /// Declares a thread (possibly empty) and what running past its end means.
    pub fn on_exhausted(mut self, thread: impl Into<ThreadName>, outcome: Outcome) -> Self {
        self.threads.entry(thread.into()).or_default().on_exhausted = outcome;
        self
    }

    pub fn build(self) -> Result<ThreadGraph<D>, DialogueError> {
        if self.threads.is_empty() {
            return Err(DialogueError::EmptyGraph);
        }

        for (name, thread) in &self.threads {
            for prompt in &thread.prompts {
                if let Prompt::Branch { branches, .. } = prompt {
                    let has_default =
                        branches.iter().any(|branch| matches!(branch, Branch::Default { .. }));
                    if !has_default {
                        return Err(DialogueError::MissingDefaultBranch {
                            thread: name.to_string(),
                        });
                    }
                }

                if let Some(missing) =
                    prompt.targets().into_iter().find(|target| !self.threads.contains_key(*target))
                {
                    return Err(DialogueError::UnknownThread { thread: missing.to_string() });
                }
            }
        }

        let prompt_count = self.threads.values().map(|thread| thread.prompts.len()).sum();
        Ok(ThreadGraph { threads: self.threads, prompt_count })
    }
}
