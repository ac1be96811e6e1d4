mod meta_file;
mod node;
mod profile;

pub use meta_file::{ChunkRef, FileVersion, MetaFile};
pub use node::FileTreeNode;
pub use profile::{FileTree, ModelError, UserProfile};
