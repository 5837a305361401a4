use regex::Regex;

/// Yes/no vocabularies recognized by branch prompts. A reply matches when its
/// trimmed, lowercased text starts with one of the listed words.
const YES_PREFIXES: &[&str] = &["yes", "yea", "yup", "yep", "ya", "sure", "ok", "y", "yeah", "yah"];
const NO_PREFIXES: &[&str] = &["no", "nah", "nope", "n"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Utterance {
    Yes,
    No,
}

impl Utterance {
    fn prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Yes => YES_PREFIXES,
            Self::No => NO_PREFIXES,
        }
    }

    pub fn matches(self, reply: &str) -> bool {
        let normalized = reply.trim().to_lowercase();
        self.prefixes().iter().any(|prefix| normalized.starts_with(prefix))
    }
}

/// How a branch prompt recognizes a reply. Replies are always matched as
/// text, so `"1"` is the string one and never a number.
#[derive(Clone, Debug)]
pub enum ReplyPattern {
    Utterance(Utterance),
    /// Case-insensitive substring match.
    Contains(String),
    Regex(Regex),
}

impl ReplyPattern {
    pub fn yes() -> Self {
        Self::Utterance(Utterance::Yes)
    }

    pub fn no() -> Self {
        Self::Utterance(Utterance::No)
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into().to_lowercase())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn matches(&self, reply: &str) -> bool {
        match self {
            Self::Utterance(utterance) => utterance.matches(reply),
            Self::Contains(needle) => reply.to_lowercase().contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(reply.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReplyPattern, Utterance};

    #[test]
    fn yes_vocabulary_is_case_insensitive_prefix_match() {
        for reply in ["yes", "Yes please", "YEAH", "sure thing", "ok", "  yep  ", "y"] {
            assert!(Utterance::Yes.matches(reply), "{reply:?} should read as yes");
        }
    }

    #[test]
    fn no_vocabulary_is_case_insensitive_prefix_match() {
        for reply in ["no", "No thanks", "NOPE", "nah", "n"] {
            assert!(Utterance::No.matches(reply), "{reply:?} should read as no");
        }
    }

    #[test]
    fn unrelated_replies_match_neither_vocabulary() {
        for reply in ["maybe", "", "1", "later", "I think so"] {
            assert!(!Utterance::Yes.matches(reply), "{reply:?} should not read as yes");
            assert!(!Utterance::No.matches(reply), "{reply:?} should not read as no");
        }
    }

    #[test]
    fn contains_pattern_ignores_case() {
        let pattern = ReplyPattern::contains("Skip");
        assert!(pattern.matches("please SKIP this one"));
        assert!(!pattern.matches("continue"));
    }

    #[test]
    fn regex_pattern_matches_text_not_numbers() {
        let pattern = ReplyPattern::regex(r"^0*1$").expect("valid regex");
        assert!(pattern.matches("1"));
        assert!(pattern.matches("001"));
        assert!(!pattern.matches("1.0"));
    }

    #[test]
    fn invalid_regex_is_reported() {
        assert!(ReplyPattern::regex("(unclosed").is_err());
    }
}
