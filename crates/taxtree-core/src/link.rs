//! The parent/child/rank link triple.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, RankCode};

/// An ordered triple stating "`child` belongs to `parent` with this rank".
///
/// Link identity is the *full* triple: a rank change on an otherwise
/// identical parent/child pair is a different link, handled as one deletion
/// plus one insertion, never as an in-place update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub parent: NodeId,
    pub child: NodeId,
    pub rank: RankCode,
}

impl Link {
    pub fn new(parent: NodeId, child: NodeId, rank: RankCode) -> Self {
        Link {
            parent,
            child,
            rank,
        }
    }

    /// A self-referential link. Only the root carries one.
    pub fn is_self_loop(&self) -> bool {
        self.parent == self.child
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.parent, self.child, self.rank)
    }
}
