use std::fmt::{self, Display, Formatter};

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// States in the Election lifecycle, derived from the voting window.
/// Never stored; always recomputed against the current time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    /// The voting window has not opened yet.
    Upcoming,
    /// The voting window is open; votes may be cast.
    Active,
    /// The voting window has closed.
    Closed,
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// Display name of the reserved "none of the above" pseudo-candidate.
pub const NOTA_NAME: &str = "None of the Above";

/// The reserved "none of the above" candidate ID.
///
/// It belongs to every election and is tally-eligible like any registered
/// candidate, but never appears in the candidate registry.
pub fn nota_id() -> Id {
    Id::from(ObjectId::from_bytes([0; 12]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nota_is_stable() {
        assert_eq!(nota_id(), nota_id());
        assert_eq!(nota_id().to_string(), "0".repeat(24));
    }
}
