use thiserror::Error;

use crate::domain::{role::Role, user::User};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoleLookupError {
    #[error("role {requested} is out of range; there are {count} roles")]
    OutOfRange { requested: i64, count: usize },
    #[error("`{0}` is not a role number")]
    NotANumber(String),
}

/// A role paired with its 1-based position as shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexedRole<'a> {
    pub display_index: usize,
    pub role: &'a Role,
}

pub fn list_roles(user: &User) -> Vec<IndexedRole<'_>> {
    user.roles
        .iter()
        .enumerate()
        .map(|(position, role)| IndexedRole { display_index: position + 1, role })
        .collect()
}

pub fn find_role_by_display_index(user: &User, requested: i64) -> Result<&Role, RoleLookupError> {
    let count = user.role_count();
    let out_of_range = RoleLookupError::OutOfRange { requested, count };

    if requested < 1 {
        return Err(out_of_range);
    }
    let position = usize::try_from(requested - 1).map_err(|_| out_of_range.clone())?;
    user.roles.get(position).ok_or(out_of_range)
}

/// Parses the argument of `edit <n>` / `view <n>`.
///
/// The argument must read as a number as a whole (decimal, exponent, or a
/// `0x`/`0o`/`0b` literal). The index is then its leading integer: `2.7` and
/// `1e1` address roles 2 and 1, `0x10` addresses role 16. Integers past the
/// `i64` range saturate so they report as out of range.
pub fn parse_display_index(raw: &str) -> Result<i64, RoleLookupError> {
    let trimmed = raw.trim();
    if !is_numeric_literal(trimmed) {
        return Err(RoleLookupError::NotANumber(trimmed.to_owned()));
    }
    leading_integer(trimmed).ok_or_else(|| RoleLookupError::NotANumber(trimmed.to_owned()))
}

fn radix_literal(text: &str) -> Option<(u32, &str)> {
    let lower = text.get(..2)?.to_ascii_lowercase();
    let radix = match lower.as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    Some((radix, &text[2..]))
}

fn is_numeric_literal(text: &str) -> bool {
    if let Some((radix, digits)) = radix_literal(text) {
        return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
    }

    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned == "Infinity" {
        return true;
    }
    unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && unsigned.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && unsigned.parse::<f64>().is_ok()
}

fn leading_integer(text: &str) -> Option<i64> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match radix_literal(unsigned) {
        Some((16, digits)) => (16, digits),
        _ => (10, unsigned),
    };

    let mut value: i64 = 0;
    let mut seen = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        seen = true;
        value = value.saturating_mul(i64::from(radix)).saturating_add(i64::from(digit));
    }
    seen.then(|| if negative { -value } else { value })
}
