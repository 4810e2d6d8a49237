use docbind::mapper::HydratedDocument;
use docbind_derive::DocumentClass;
use fake::faker::internet::en::FreeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};

#[derive(DocumentClass)]
pub struct User {
    #[document]
    document: HydratedDocument,
    pub greetings: u32,
}

impl User {
    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    pub fn greet(&mut self) -> String {
        self.greetings += 1;
        format!("Hello, {}", self.name().unwrap_or("stranger"))
    }
}

#[derive(DocumentClass)]
pub struct Post(HydratedDocument);

impl Post {
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }
}

pub fn fake_user() -> Value {
    let name: String = Name().fake();
    let email: String = FreeEmail().fake();
    let age: u8 = (18..90).fake();
    json!({
        "name": name,
        "email": email,
        "age": age,
    })
}

pub fn fake_users(count: usize) -> Vec<Value> {
    (0..count).map(|_| fake_user()).collect()
}
