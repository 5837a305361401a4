//! The guided flow behind a bare `add`: ask for a role name, then keep
//! offering to append steps until the party says no.

use std::sync::Arc;

use crate::dialogue::graph::{Branch, Outcome, ThreadGraph, ThreadName};
use crate::dialogue::pattern::ReplyPattern;
use crate::domain::role::Role;
use crate::errors::DialogueError;

pub const ROOT: &str = "root";
pub const SHOULD_ADD_STEP: &str = "should_add_step";
pub const YES_THREAD: &str = "yes_thread";
pub const NO_THREAD: &str = "no_thread";
pub const BAD_RESPONSE: &str = "bad_response";

pub const ASK_NAME: &str = "What is the name of the role?";
pub const ASK_ADD_STEP: &str = "Would you like to add another step to the role?";
pub const ASK_STEP: &str = "What is the step?";
pub const ROLE_CREATED: &str = "Okay, your role has been created.";
pub const NOT_UNDERSTOOD: &str = "Sorry I did not understand. Say `yes` or `no`";

pub fn create_role_graph() -> Result<ThreadGraph<Role>, DialogueError> {
    ThreadGraph::builder()
        .capture(
            ROOT,
            ASK_NAME,
            |role: &mut Role, reply: &str| role.name = reply.to_owned(),
            SHOULD_ADD_STEP,
        )
        .branch(
            SHOULD_ADD_STEP,
            ASK_ADD_STEP,
            vec![
                Branch::matching(ReplyPattern::yes(), YES_THREAD),
                Branch::matching(ReplyPattern::no(), NO_THREAD),
                Branch::fallback(BAD_RESPONSE),
            ],
        )
        .capture(
            YES_THREAD,
            ASK_STEP,
            |role: &mut Role, reply: &str| role.push_step(reply),
            SHOULD_ADD_STEP,
        )
        .terminal(NO_THREAD, ROLE_CREATED, Outcome::Successful)
        .redirect(BAD_RESPONSE, NOT_UNDERSTOOD, SHOULD_ADD_STEP)
        .build()
}

/// Graph, entry thread and empty draft for one create-role run.
#[derive(Clone, Debug)]
pub struct CreateRoleFlow {
    graph: Arc<ThreadGraph<Role>>,
}

impl CreateRoleFlow {
    pub fn new() -> Result<Self, DialogueError> {
        Ok(Self { graph: Arc::new(create_role_graph()?) })
    }

    pub fn graph(&self) -> Arc<ThreadGraph<Role>> {
        Arc::clone(&self.graph)
    }

    pub fn initial_thread(&self) -> ThreadName {
        ThreadName::from(ROOT)
    }

    pub fn draft(&self) -> Role {
        Role::default()
    }
}
