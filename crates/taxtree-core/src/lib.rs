pub mod error;
pub mod id;
pub mod link;
pub mod nodes;
pub mod rank;

// Re-export commonly used types
pub use error::CoreError;
pub use id::{NodeId, RankCode, ROOT};
pub use link::Link;
pub use nodes::{GetOrCreate, NodeTable};
pub use rank::{RankRegistry, NO_RANK};
