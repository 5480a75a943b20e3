//! The ordered turn sequence of one conversation.
//!
//! A [`Transcript`] always starts with exactly one system turn. Nothing in the
//! public API can remove, replace, or reorder it: new turns are appended at
//! the end, and [`Transcript::splice_summary`] only collapses a prefix that
//! begins at index 1.

use serde::Serialize;

use crate::{Role, Turn};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// A fresh transcript holding only the system instruction.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// Rebuild a transcript from stored turns.
    ///
    /// Fails when the sequence is empty or does not start with a system turn.
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self, String> {
        match turns.first() {
            None => Err("transcript is empty".to_string()),
            Some(first) if first.role() != Role::System => Err(format!(
                "first turn has role {}, expected system",
                first.role()
            )),
            Some(_) => Ok(Self { turns }),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn system(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn last(&self) -> &Turn {
        &self.turns[self.turns.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always `false`: the system turn is never removed.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    /// Byte length of the compact JSON serialization.
    pub fn serialized_len(&self) -> u64 {
        serde_json::to_vec(self).map_or(0, |bytes| bytes.len() as u64)
    }

    /// Turns in `[1, split)`: everything after the system turn and before
    /// `split`. Empty when `split <= 1`.
    pub fn head(&self, split: usize) -> &[Turn] {
        let end = split.min(self.turns.len());
        if end <= 1 { &[] } else { &self.turns[1..end] }
    }

    /// Replace turns `[1, split)` with one assistant turn carrying `summary`.
    ///
    /// Returns the number of turns replaced. A `split` of 1 or less leaves the
    /// transcript untouched and returns 0.
    pub fn splice_summary(&mut self, split: usize, summary: impl Into<String>) -> usize {
        let end = split.min(self.turns.len());
        if end <= 1 {
            return 0;
        }
        let replaced = end - 1;
        self.turns.drain(1..end);
        self.turns.insert(1, Turn::assistant(summary));
        replaced
    }
}
