//! Resource services behind the HTTP handlers

pub mod notes;
pub mod users;

pub use notes::{NoteDraft, NoteService};
pub use users::{ProfileUpdate, UserService};
