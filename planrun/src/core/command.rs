//! Shell command screening: POSIX-style tokenizing and allow/deny policy.
//!
//! Screening is pure. Running the command is the shell tool's job.

use thiserror::Error;

/// Substrings that are rejected anywhere in a command (compared lowercase).
pub const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "> /",
    "dd if=",
    "mkfs",
    ":(){:|:&};:",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("No closing quotation")]
    UnclosedQuote,
    #[error("No escaped character")]
    TrailingEscape,
}

/// Split a command line into words using POSIX shell quoting rules.
///
/// Supports single quotes, double quotes (with `\` escaping `"`, `\`, `$`
/// and `` ` ``) and backslash escapes outside quotes. Operators such as `|`
/// are not special; they are ordinary word characters here.
pub fn tokenize(cmd: &str) -> Result<Vec<String>, TokenizeError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = cmd.chars();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(TokenizeError::UnclosedQuote),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(TokenizeError::UnclosedQuote),
                        },
                        Some(c) => current.push(c),
                        None => return Err(TokenizeError::UnclosedQuote),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c) => {
                    in_word = true;
                    current.push(c);
                }
                None => return Err(TokenizeError::TrailingEscape),
            },
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Allow/deny lists applied to the base command of a shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

impl CommandPolicy {
    pub fn new(allow: Vec<String>, deny: Vec<String>) -> Self {
        Self { allow, deny }
    }

    /// Screen `cmd`, returning its words when it may run.
    ///
    /// Checks, in order: quoting, emptiness, deny list (also by basename of a
    /// path-like base command), allow list, dangerous substrings.
    pub fn screen(&self, cmd: &str) -> Result<Vec<String>, String> {
        let words = tokenize(cmd).map_err(|err| format!("Invalid command syntax: {}", err))?;
        let Some(base) = words.first() else {
            return Err("Empty command".to_string());
        };

        if self.is_denied(base) {
            return Err(format!("Command '{}' is not allowed (blacklisted)", base));
        }

        if !self.allow.iter().any(|allowed| allowed == base) {
            let mut allowed: Vec<&str> = self.allow.iter().map(String::as_str).collect();
            allowed.sort_unstable();
            return Err(format!(
                "Command '{}' is not in the allowed list: [{}]",
                base,
                allowed.join(", ")
            ));
        }

        if let Some(pattern) = dangerous_pattern(cmd) {
            return Err(format!("Command contains dangerous pattern: {}", pattern));
        }

        Ok(words)
    }

    fn is_denied(&self, base: &str) -> bool {
        let basename = base.rsplit('/').next().unwrap_or(base);
        self.deny
            .iter()
            .any(|denied| denied == base || denied == basename)
    }
}

/// First dangerous pattern contained in `cmd`, compared case-insensitively.
pub fn dangerous_pattern(cmd: &str) -> Option<&'static str> {
    let lowered = cmd.to_lowercase();
    DANGEROUS_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lowered.contains(pattern))
}
