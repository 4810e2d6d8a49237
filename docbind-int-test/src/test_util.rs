use crate::fixtures::{Post, User};
use docbind::errors::DocbindResult;
use docbind::mapper::{
    Connection, ModelEventInfo, ModelEventListener, ModelEvents, Schema, SchemaField, SubscriberRef,
};
use docbind::{DocClassBuilder, Registry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fresh connection with `User` and `Post` registered.
#[derive(Clone)]
pub struct TestContext {
    registry: Registry,
    users: DocClassBuilder<User>,
    posts: DocClassBuilder<Post>,
}

impl TestContext {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn connection(&self) -> &Connection {
        self.registry.connection()
    }

    pub fn users(&self) -> &DocClassBuilder<User> {
        &self.users
    }

    pub fn posts(&self) -> &DocClassBuilder<Post> {
        &self.posts
    }
}

pub fn user_schema() -> Schema {
    Schema::new()
        .field("name", SchemaField::string().required())
        .field("email", SchemaField::string())
        .field("age", SchemaField::number())
        .field("active", SchemaField::boolean().default_value(serde_json::json!(true)))
        .field("friend", SchemaField::reference("User"))
}

pub fn post_schema() -> Schema {
    Schema::new()
        .field("title", SchemaField::string().required())
        .field("author", SchemaField::reference("User"))
        .field("readers", SchemaField::array(SchemaField::reference("User")))
        .field("likes", SchemaField::number().default_value(serde_json::json!(0)))
}

pub fn create_test_context() -> DocbindResult<TestContext> {
    let connection = Connection::builder().debug(true).build();
    let registry = Registry::new(connection);
    let users = registry.register::<User>("User", user_schema())?;
    let posts = registry.register::<Post>("Post", post_schema())?;
    Ok(TestContext {
        registry,
        users,
        posts,
    })
}

/// Counts events of one type on a model.
pub struct EventCounter {
    count: Arc<AtomicUsize>,
    subscriber: Option<SubscriberRef>,
}

impl EventCounter {
    pub fn attach<D: docbind::DocumentClass>(
        builder: &DocClassBuilder<D>,
        event_type: ModelEvents,
    ) -> DocbindResult<Self> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let subscriber = builder
            .model()
            .subscribe(ModelEventListener::new(move |event: ModelEventInfo| {
                if event.event_type() == event_type {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }))?;
        Ok(EventCounter {
            count,
            subscriber: Some(subscriber),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn detach<D: docbind::DocumentClass>(mut self, builder: &DocClassBuilder<D>) -> DocbindResult<()> {
        match self.subscriber.take() {
            Some(subscriber) => builder.model().unsubscribe(subscriber),
            None => Ok(()),
        }
    }
}
