use serde::{Deserialize, Serialize};

/// Attribution of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// One message in the transcript.
///
/// Turns are append-only. While a model response is streaming, the last turn
/// is the single mutable "in-flight" entry: its text grows monotonically as
/// fragments arrive, and it is frozen once the stream ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub is_error: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn { role: Role::User, text: text.into(), is_error: false }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Turn { role: Role::Model, text: text.into(), is_error: false }
    }
}

/// Bounds the history slice resent to the remote model on each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Resend the full history (the original, unbounded behavior).
    None,
    /// Keep only the most recent N turns.
    LastTurns(usize),
}

impl TruncationPolicy {
    pub fn apply<'a>(&self, turns: &'a [Turn]) -> &'a [Turn] {
        match *self {
            TruncationPolicy::None => turns,
            TruncationPolicy::LastTurns(n) => {
                let start = turns.len().saturating_sub(n);
                &turns[start..]
            }
        }
    }
}

/// Ordered transcript of a session. Lives only for the session; nothing is
/// persisted across a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Appends a fragment to the text of the last turn.
    ///
    /// Only valid while that turn is in flight; the session upholds the
    /// single-in-flight-turn invariant.
    pub(crate) fn append_to_last(&mut self, fragment: &str) {
        if let Some(last) = self.turns.last_mut() {
            last.text.push_str(fragment);
        }
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut()
    }
}
