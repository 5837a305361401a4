pub mod create_role;
pub mod engine;
pub mod graph;
pub mod pattern;

pub use create_role::{create_role_graph, CreateRoleFlow};
pub use engine::{
    Completion, CompletionHook, ConflictPolicy, Dialogue, DialogueEngine, DialogueStatus,
    DialogueStep,
};
pub use graph::{
    Branch, Cursor, MessageAction, Outcome, Prompt, Thread, ThreadGraph, ThreadGraphBuilder,
    ThreadName,
};
pub use pattern::{ReplyPattern, Utterance};
