//! Template sources and the loader chain that resolves names across them.
//!
//! A [`LoaderChain`] holds an ordered list of [`Source`]s. Resolving a name
//! walks the chain in order and returns the first source that supplies it,
//! optionally starting strictly after the source recorded in a skip
//! [`Origin`]. That skip is what lets a template extend another template of
//! the same name found later in the search path.

mod chain;
mod error;
mod origin;
mod path;
mod source;
mod span;
mod system;

pub use chain::LoaderChain;
pub use error::SourceError;
pub use origin::Origin;
pub use origin::SourceId;
pub use path::clean_utf8_path;
pub use path::safe_join;
pub use path::SafeJoinError;
pub use source::FetchedTemplate;
pub use source::FilesystemSource;
pub use source::MemorySource;
pub use source::Source;
pub use span::Span;
pub use system::FileSystem;
pub use system::InMemoryFileSystem;
pub use system::OsFileSystem;
