pub mod entry;
pub mod tag;
pub mod user;

pub use entry::{normalize_visibility, Entry};
pub use tag::{EntryTag, Tag};
pub use user::User;
