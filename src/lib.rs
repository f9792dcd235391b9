pub mod config;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod index;
pub mod ledger;
pub mod locate;
pub mod substitute;
pub mod tree;
pub mod watch;

pub use config::EngineConfig;
pub use engine::{
    BoundaryEvent, Clock, Engine, EngineEvent,
    ManualClock, SystemClock,
};
pub use error::{Diagnostics, EngineError};
pub use highlight::{FixedLayout, HighlightResult, Layout, Rect};
pub use index::{Indexer, NodeMapEntry, TextIndex};
pub use ledger::{Ledger, RestoreReport};
pub use locate::ChunkLocator;
pub use substitute::{Dictionary, Substituter};
pub use tree::{ContentTree, Document, MutationRecord, NodeId, NodeKind, NodeSpec};
pub use watch::{Invalidation, MutationWatcher};
