use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl Role {
    /// A role with no steps yet, as produced by `add <name>`.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), steps: Vec::new() }
    }

    pub fn push_step(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }
}
