use regex::Regex;
use std::sync::OnceLock;

/// Reddit username characters, anchored at the start only.
const AUTHOR_PATTERN: &str = r"^[A-Za-z0-9_-]+";

/// Season/week code such as `23-24 season3 7`.
const CLASS_PATTERN: &str = r"\d+-\d+ season\d+ \d+";

fn author_regex() -> &'static Regex {
    static AUTHOR: OnceLock<Regex> = OnceLock::new();
    AUTHOR.get_or_init(|| Regex::new(AUTHOR_PATTERN).expect("author pattern is valid"))
}

fn class_regex() -> &'static Regex {
    static CLASS: OnceLock<Regex> = OnceLock::new();
    CLASS.get_or_init(|| Regex::new(CLASS_PATTERN).expect("class pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorCheck {
    /// The whole name is made of username characters.
    Valid,
    /// Only a leading run matched. Accepted, but worth a warning.
    TrailingCharacters { matched: String },
    Invalid,
}

impl AuthorCheck {
    pub fn accepted(&self) -> bool {
        !matches!(self, AuthorCheck::Invalid)
    }
}

pub fn check_author(author: &str) -> AuthorCheck {
    match author_regex().find(author) {
        Some(m) if m.end() == author.len() => AuthorCheck::Valid,
        Some(m) => AuthorCheck::TrailingCharacters {
            matched: m.as_str().to_string(),
        },
        None => AuthorCheck::Invalid,
    }
}

/// First classification key in `body`, if any.
pub fn extract_class(body: &str) -> Option<&str> {
    class_regex().find(body).map(|m| m.as_str())
}
