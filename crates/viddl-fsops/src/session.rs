//! Collision-free job session identifiers.

use std::fmt::{self, Display, Formatter};

use rand::Rng;

/// 128 random bits rendered as 32 lowercase hex characters.
///
/// Used as the filename prefix `<session>_` that ties an artifact to exactly one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u128);

impl SessionId {
    /// Draw a fresh identifier from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::rng().random())
    }

    /// Filename prefix owned by this session.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{self}_")
    }
}

impl Display for SessionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:032x}", self.0)
    }
}
