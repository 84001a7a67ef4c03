//! Document composition.
//!
//! The composer entry point is [`Binder`]; the submodules each own one
//! phase of a save: page import and image synthesis in the merge pass,
//! attachment consolidation, outline relocation, and the metadata/
//! encryption stamp pass.

pub(crate) mod attachments;
pub(crate) mod binder;
pub(crate) mod bookmarks;
pub(crate) mod images;
pub(crate) mod stamp;

pub use binder::Binder;
pub use bookmarks::OutlineEntry;
