use crate::common::{get_current_time_or_zero, MODEL_EVENT};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Event types that can occur on a model.
///
/// - `Insert`: a document was written for the first time
/// - `Update`: a stored document was changed (update, replace or save)
/// - `Remove`: a document was deleted
/// - `Populate`: a reference path of a document was resolved against this model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvents {
    Insert,
    Update,
    Remove,
    Populate,
}

/// Information about an operation that happened on a model.
///
/// The item is the stored document after an insert or update, the deleted
/// document for a remove, and `{"path": .., "ids": [..]}` for a populate.
#[derive(Clone)]
pub struct ModelEventInfo {
    inner: Arc<ModelEventInner>,
}

impl ModelEventInfo {
    pub fn new(item: Option<Value>, event_type: ModelEvents, model_name: &str) -> Self {
        ModelEventInfo {
            inner: Arc::new(ModelEventInner {
                item,
                event_type,
                model_name: model_name.to_string(),
                timestamp: get_current_time_or_zero(),
            }),
        }
    }

    pub fn event_type(&self) -> ModelEvents {
        self.inner.event_type.clone()
    }

    pub fn item(&self) -> Option<Value> {
        self.inner.item.clone()
    }

    /// Name of the model the event originated from.
    pub fn model_name(&self) -> &str {
        &self.inner.model_name
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

impl Debug for ModelEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEventInfo")
            .field("item", &self.inner.item)
            .field("event_type", &self.inner.event_type)
            .field("model_name", &self.inner.model_name)
            .field("timestamp", &self.inner.timestamp)
            .finish()
    }
}

struct ModelEventInner {
    item: Option<Value>,
    event_type: ModelEvents,
    model_name: String,
    timestamp: u128,
}

/// Signature of a model event handler. Any matching closure implements it.
pub trait ModelEventCallback: Send + Sync + Fn(ModelEventInfo) -> DocbindResult<()> {}

impl<F> ModelEventCallback for F where F: Send + Sync + Fn(ModelEventInfo) -> DocbindResult<()> {}

/// Listener for model events, registered with [`Model::subscribe`](crate::mapper::Model::subscribe).
///
/// ```ignore
/// model.subscribe(ModelEventListener::new(|event| {
///     log::info!("{:?} on {}", event.event_type(), event.model_name());
///     Ok(())
/// }))?;
/// ```
#[derive(Clone)]
pub struct ModelEventListener {
    on_event: Arc<dyn ModelEventCallback>,
}

impl ModelEventListener {
    pub fn new(on_event: impl ModelEventCallback + 'static) -> Self {
        ModelEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<ModelEventInfo> for ModelEventListener {
    fn handle(&self, event: &Event<ModelEventInfo>) -> Result<(), BasuError> {
        match (self.on_event)(event.data.clone()) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for ModelEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEventListener").finish()
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug)]
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

/// Per-model event bus.
#[derive(Clone)]
pub(crate) struct ModelEventBus {
    inner: Arc<EventBus<ModelEventInfo>>,
}

impl ModelEventBus {
    pub(crate) fn new() -> Self {
        ModelEventBus {
            inner: Arc::new(EventBus::new()),
        }
    }

    pub(crate) fn register(&self, listener: ModelEventListener) -> DocbindResult<SubscriberRef> {
        match self.inner.subscribe(MODEL_EVENT, Box::new(listener)) {
            Ok(inner) => Ok(SubscriberRef { inner }),
            Err(e) => Err(event_error(e)),
        }
    }

    pub(crate) fn deregister(&self, subscriber: SubscriberRef) -> DocbindResult<()> {
        self.inner
            .unsubscribe(MODEL_EVENT, &subscriber.inner)
            .map_err(event_error)
    }

    pub(crate) fn has_listeners(&self) -> bool {
        match self.inner.get_handler_count(MODEL_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    /// Publishes to every listener. Skips building the event when nobody listens.
    pub(crate) fn publish(&self, item: impl FnOnce() -> Option<Value>, event_type: ModelEvents, model_name: &str) -> DocbindResult<()> {
        if !self.has_listeners() {
            return Ok(());
        }
        let event = Event::new(ModelEventInfo::new(item(), event_type, model_name));
        self.inner.publish(MODEL_EVENT, &event).map_err(event_error)
    }

    pub(crate) fn close(&self) -> DocbindResult<()> {
        self.inner.clear().map_err(event_error)
    }
}

fn event_error(e: BasuError) -> DocbindError {
    let message = match &e {
        BasuError::EventTypeNotFOUND => "Event bus error: no handler is registered for model events".to_string(),
        BasuError::MutexPoisoned => "Event bus error: internal lock was poisoned".to_string(),
        BasuError::HandlerError(err) => format!("Event handler failed: {}", err),
    };
    log::error!("{}", message);
    DocbindError::new(&message, ErrorKind::EventError)
}
