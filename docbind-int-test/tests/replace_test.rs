use docbind::mapper::QueryOptions;
use docbind::{ops, CreateOptions, DocumentClass, ErrorKind, ObjectId, Replacement};
use docbind_int_test::fixtures::User;
use docbind_int_test::test_util::create_test_context;
use serde_json::{json, Value};

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}

async fn replace_record(id: &str, use_instance: bool) -> Value {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    ops::create_one(users, json!({"_id": id, "name": "Old", "age": 70}), None)
        .await
        .unwrap();
    let template = ops::create_one(
        users,
        json!({"_id": id, "name": "New", "email": "new@example.com"}),
        Some(CreateOptions::new().local(true)),
    )
    .await
    .unwrap();

    let replacement: Replacement<'_, User> = if use_instance {
        Replacement::Instance(&template)
    } else {
        Replacement::Raw(Value::Object(template.document().raw().clone()))
    };
    ops::find_one_and_replace(users, Some(json!({"_id": id})), Some(replacement), None)
        .await
        .unwrap();
    ops::find_by_id(users, id, None, None).await.unwrap().unwrap().to_json()
}

#[tokio::test]
async fn test_instance_replacement_equals_raw() {
    let id = ObjectId::new().to_hex();
    let by_instance = replace_record(&id, true).await;
    let by_raw = replace_record(&id, false).await;

    assert_eq!(by_instance, by_raw);
    assert_eq!(
        by_instance,
        json!({"_id": id, "name": "New", "email": "new@example.com", "active": true})
    );
}

#[tokio::test]
async fn test_replacement_returns_previous_or_new() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    let ann = ops::create_one(users, json!({"name": "Ann", "age": 20}), None).await.unwrap();

    let previous = ops::find_one_and_replace::<User>(
        users,
        Some(json!({"name": "Ann"})),
        Some(Replacement::Raw(json!({"name": "Anna"}))),
        None,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(previous.name(), Some("Ann"));

    let current = ops::find_one_and_replace::<User>(
        users,
        Some(json!({"name": "Anna"})),
        Some(Replacement::Raw(json!({"name": "Annie"}))),
        Some(QueryOptions::new().return_new(true)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(current.get_id(), ann.get_id());
    assert_eq!(current.name(), Some("Annie"));
    assert_eq!(current.document().get("age"), None);
}

#[tokio::test]
async fn test_instance_with_other_id_is_rejected() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    ops::create_one(users, json!({"name": "Ann"}), None).await.unwrap();
    let other = ops::create_one(users, json!({"name": "Bob"}), Some(CreateOptions::new().local(true)))
        .await
        .unwrap();

    let error = ops::find_one_and_replace(users, Some(json!({"name": "Ann"})), Some(Replacement::from(&other)), None)
        .await
        .err()
        .unwrap();
    assert_eq!(error.kind(), &ErrorKind::ImmutableField);
    assert_eq!(ops::count_documents(users, json!({"name": "Ann"}), None).await.unwrap(), 1);
}
