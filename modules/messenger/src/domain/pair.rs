use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

/// Order-independent key of a direct thread: `"<lower uuid>:<higher uuid>"`.
///
/// Stored in a unique column so that a pair of users can own at most one
/// direct thread, whichever order the users were given in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String);

impl PairKey {
    /// `None` when both ids are the same user.
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        if a == b {
            return None;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        Some(Self(format!("{lo}:{hi}")))
    }

    /// Key of a participant set; only sets of exactly two users have one.
    pub fn from_participants(participants: &BTreeSet<Uuid>) -> Option<Self> {
        let mut it = participants.iter();
        match (it.next(), it.next(), it.next()) {
            (Some(a), Some(b), None) => Self::new(*a, *b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
