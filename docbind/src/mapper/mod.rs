//! A small in-process document mapper.
//!
//! Named [Model]s are defined on a [Connection] from a [Schema]. Models run
//! queries and commands expressed as JSON filter, update and projection
//! documents and hand out [HydratedDocument]s that remember what changed,
//! whether they were ever saved, and which references were populated.
//!
//! Documents live in memory, in insertion order, and every query is a linear
//! scan. There are no indexes, no transactions and no persistence to disk.

mod config;
mod connection;
mod document;
mod event;
pub(crate) mod filter;
mod model;
mod options;
pub(crate) mod projection;
mod results;
mod schema;
pub(crate) mod update;

pub use config::*;
pub use connection::*;
pub use document::*;
pub use event::{ModelEventCallback, ModelEventInfo, ModelEventListener, ModelEvents, SubscriberRef};
pub use model::*;
pub use options::*;
pub use results::*;
pub use schema::*;

/// A raw document: an insertion-ordered JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;
