// Text rules - trimming and validation applied to user-supplied text before any write

use regex::Regex;

use crate::error::{AppError, AppResult};

pub const MAX_CONTENT_CHARS: usize = 480;
pub const MAX_SPOILER_CHARS: usize = 64;

/// Usernames start with a letter and are at most 18 characters long
pub const USERNAME_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9_-]{0,17}$";

/// Compiled text rules. Built once at startup and shared by the stores.
#[derive(Debug, Clone)]
pub struct TextRules {
    username: Regex,
    horizontal_space: Regex,
    extra_line_breaks: Regex,
}

impl TextRules {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            username: Regex::new(USERNAME_PATTERN)?,
            horizontal_space: Regex::new(r"[^\S\n]+")?,
            extra_line_breaks: Regex::new(r"\n{3,}")?,
        })
    }

    /// Collapses whitespace runs inside each line, trims every line, keeps at
    /// most one blank line between paragraphs and trims the result.
    pub fn smart_trim(&self, s: &str) -> String {
        let lines: Vec<String> = s
            .split('\n')
            .map(|line| self.horizontal_space.replace_all(line, " ").trim().to_string())
            .collect();
        let joined = lines.join("\n");
        self.extra_line_breaks
            .replace_all(&joined, "\n\n")
            .trim()
            .to_string()
    }

    /// Trimmed post or comment body: 1..=480 Unicode scalar values
    pub fn content(&self, raw: &str) -> AppResult<String> {
        let content = self.smart_trim(raw);
        if content.is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::invalid_content());
        }
        Ok(content)
    }

    /// Trimmed spoiler title: 1..=64 Unicode scalar values
    pub fn spoiler(&self, raw: &str) -> AppResult<String> {
        let spoiler = self.smart_trim(raw);
        if spoiler.is_empty() || spoiler.chars().count() > MAX_SPOILER_CHARS {
            return Err(AppError::invalid_spoiler());
        }
        Ok(spoiler)
    }

    /// Trimmed username, or `InvalidArgument` when it does not match the pattern
    pub fn username<'a>(&self, raw: &'a str) -> AppResult<&'a str> {
        let username = raw.trim();
        if !self.username.is_match(username) {
            return Err(AppError::invalid_username());
        }
        Ok(username)
    }
}
