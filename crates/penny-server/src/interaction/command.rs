//! Chat command parsing.
//!
//! A command is a chat line starting with the configured prefix. It is split
//! with shell-style quoting, so `!so "cool streamer"` carries one argument.

use shlex::Shlex;
use thiserror::Error;

/// A parsed, prefixed chat instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased, prefix stripped
    pub name: String,
    pub args: Vec<String>,
    pub sender: String,
}

/// Commands the router knows how to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    ShoutOut,
    Search,
    Ask,
    Unknown,
}

impl CommandAction {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "so" | "shoutout" => CommandAction::ShoutOut,
            "search" => CommandAction::Search,
            "ask" | "penny" => CommandAction::Ask,
            _ => CommandAction::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("unterminated quote or dangling escape in {input:?}")]
    UnbalancedQuoting { input: String },
    #[error("command text is empty")]
    Empty,
}

impl Command {
    pub fn action(&self) -> CommandAction {
        CommandAction::from_name(&self.name)
    }

    /// Arguments joined back with single spaces
    pub fn joined_args(&self) -> String {
        self.args.join(" ")
    }
}

/// Split `text` into shell-style tokens
///
/// Only whitespace and quotes delimit; a `#` starting a word is kept as text.
pub fn tokenize(text: &str) -> Result<Vec<String>, ParseFailure> {
    let escaped = escape_word_hashes(text);
    let mut lexer = Shlex::new(&escaped);
    let tokens: Vec<String> = lexer.by_ref().collect();

    if lexer.had_error {
        return Err(ParseFailure::UnbalancedQuoting {
            input: text.to_string(),
        });
    }

    Ok(tokens)
}

/// Backslash-escape every unquoted `#` at the start of a word, so the lexer
/// does not read it as a comment
fn escape_word_hashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut word_start = true;

    for c in text.chars() {
        if escaped {
            escaped = false;
            word_start = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if word_start && !in_single && !in_double => out.push('\\'),
            _ => {}
        }

        word_start = !in_single && !in_double && c.is_whitespace();
        out.push(c);
    }

    out
}

/// Parse an already-trimmed command line that starts with `prefix`
pub fn parse_command(text: &str, prefix: char, sender: &str) -> Result<Command, ParseFailure> {
    let mut tokens = tokenize(text)?.into_iter();
    let first = tokens.next().ok_or(ParseFailure::Empty)?;

    let name = first
        .strip_prefix(prefix)
        .unwrap_or(first.as_str())
        .to_lowercase();

    Ok(Command {
        name,
        args: tokens.collect(),
        sender: sender.to_string(),
    })
}

/// Whether an unprefixed message addresses the bot
///
/// `bot_name` must already be lower-cased. An empty name never matches.
pub fn is_mention(text: &str, bot_name: &str) -> bool {
    if bot_name.is_empty() {
        return false;
    }

    let lowered = text.to_lowercase();
    lowered.contains(bot_name) || lowered.contains(&format!("@{}", bot_name))
}
