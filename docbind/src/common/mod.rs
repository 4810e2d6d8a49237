//! Shared helpers used by the mapper: dotted field paths, time and id generation.

mod path;
mod snowflake;
mod time;

pub use path::*;
pub(crate) use snowflake::*;
pub use time::*;

/// Name of the identifier field on every stored document.
pub const DOC_ID: &str = "_id";

/// Separator between the segments of an embedded field path.
pub const FIELD_SEPARATOR: char = '.';

/// Event type under which model events are published on the event bus.
pub(crate) const MODEL_EVENT: &str = "docbind_model_event";
