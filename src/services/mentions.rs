// Mention Parser - extracts @username mentions from post and comment text

use regex::Regex;
use std::collections::HashSet;

/// Longest username accepted by the identity service
const MAX_USERNAME_CHARS: usize = 18;

pub trait MentionParser: Send + Sync {
    /// Candidate usernames in order of first appearance, without repeats
    fn mentions(&self, text: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct RegexMentionParser {
    pattern: Regex,
}

impl RegexMentionParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // "@" must not be glued to a word, so "rei@nerv.jp" is not a mention.
            pattern: Regex::new(r"(?:^|[^a-zA-Z0-9_@])@([a-zA-Z][a-zA-Z0-9_-]*)")?,
        })
    }
}

impl MentionParser for RegexMentionParser {
    fn mentions(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|username| username.len() <= MAX_USERNAME_CHARS)
            .filter(|username| seen.insert(username.to_lowercase()))
            .map(str::to_string)
            .collect()
    }
}
