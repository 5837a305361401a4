//! Plain-text rendering of roles for chat replies.
//!
//! Both renderers produce one `> `k`) text` line per entry, numbered from 1,
//! each terminated by a newline.

use crate::domain::{role::Role, user::User};
use crate::roles::list_roles;

pub fn role_list_text(user: &User) -> String {
    list_roles(user)
        .into_iter()
        .map(|entry| numbered_line(entry.display_index, &entry.role.name))
        .collect()
}

pub fn role_steps_text(role: &Role) -> String {
    let mut text = format!("Role: {}\n", role.name);
    for (position, step) in role.steps.iter().enumerate() {
        text.push_str(&numbered_line(position + 1, step));
    }
    text
}

fn numbered_line(display_index: usize, text: &str) -> String {
    format!("> `{display_index}`) {text}\n")
}
