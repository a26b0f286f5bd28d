//! Command admission policy.
//!
//! Decides whether a raw terminal command may be executed. The decision is a
//! pure function of the command string and two configurable sets:
//!
//! 1. empty input is denied
//! 2. any shell metacharacter anywhere in the input is denied
//! 3. a denylisted program is denied
//! 4. an allowlisted program is allowed
//! 5. everything else is denied
//!
//! The allowlist is the authoritative gate; the denylist only makes sure a
//! program can never be allowed by accident through configuration.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Read-only inspection tools that may run by default.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "ls", "dir", "pwd", "cd", "cat", "echo", "mkdir", "touch", "grep", "find", "head", "tail",
    "wc", "sort", "uniq", "date", "whoami", "uname", "df", "du", "free", "ps",
];

/// Destructive or privileged tools that are never allowed.
pub const DEFAULT_DENIED_COMMANDS: &[&str] = &[
    "rm", "rmdir", "mv", "cp", "sudo", "su", "chown", "chmod", "dd", "mkfs", "mount", "umount",
    "apt", "yum", "dnf", "pacman", "systemctl", "service", "init", "kill", "pkill",
];

/// Sequences that turn a single command into a compound or redirected one.
pub const SHELL_METACHARACTERS: &[&str] = &["|", ">", "<", ";", "&&"];

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Denial {
    /// Nothing but whitespace
    Empty,
    /// Contains a shell metacharacter
    Metacharacter(String),
    /// Program is on the denylist
    Forbidden(String),
    /// Program is on neither list
    NotAllowed(String),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Empty => write!(f, "empty command"),
            Denial::Metacharacter(m) => write!(f, "contains shell metacharacter '{}'", m),
            Denial::Forbidden(cmd) => write!(f, "'{}' is a forbidden command", cmd),
            Denial::NotAllowed(cmd) => write!(f, "'{}' is not in the allowlist", cmd),
        }
    }
}

/// Admission decision for a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed { program: String },
    Denied(Denial),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Allowlist/denylist policy for terminal commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
            denied: DEFAULT_DENIED_COMMANDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CommandPolicy {
    /// Policy with no entries; denies everything until extended.
    pub fn empty() -> Self {
        Self {
            allowed: BTreeSet::new(),
            denied: BTreeSet::new(),
        }
    }

    /// Add programs to the allowlist.
    pub fn allow<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(programs.into_iter().map(Into::into));
        self
    }

    /// Add programs to the denylist.
    pub fn deny<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied.extend(programs.into_iter().map(Into::into));
        self
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    pub fn denied(&self) -> impl Iterator<Item = &str> {
        self.denied.iter().map(String::as_str)
    }

    /// Classify a raw command.
    pub fn evaluate(&self, raw: &str) -> Admission {
        let Some(program) = raw.split_whitespace().next() else {
            return Admission::Denied(Denial::Empty);
        };

        // Checked against the whole string, so `ls>out` is caught too.
        if let Some(meta) = SHELL_METACHARACTERS.iter().find(|m| raw.contains(**m)) {
            return Admission::Denied(Denial::Metacharacter(meta.to_string()));
        }

        if self.denied.contains(program) {
            return Admission::Denied(Denial::Forbidden(program.to_string()));
        }

        if self.allowed.contains(program) {
            return Admission::Allowed {
                program: program.to_string(),
            };
        }

        Admission::Denied(Denial::NotAllowed(program.to_string()))
    }

    pub fn is_allowed(&self, raw: &str) -> bool {
        self.evaluate(raw).is_allowed()
    }
}

/// Check a command against the default policy.
pub fn is_allowed(raw: &str) -> bool {
    CommandPolicy::default().is_allowed(raw)
}
