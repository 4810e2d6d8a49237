use docbind::mapper::{order_by, QueryOptions, SortOrder};
use docbind::{ops, DocumentClass, Id};
use docbind_int_test::fixtures::fake_users;
use docbind_int_test::test_util::create_test_context;
use serde_json::json;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}

#[tokio::test]
async fn test_create_then_find_by_id() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();

    let created = ops::create_one(users, json!({"name": "A"}), None).await.unwrap();
    let found = ops::find_by_id(users, created.get_id(), None, None).await.unwrap().unwrap();

    assert_eq!(found.get_id(), created.get_id());
    assert_eq!(
        found.to_json(),
        json!({"_id": created.get_id().to_string(), "name": "A", "active": true})
    );
    assert!(!found.is_new());
    assert!(!found.is_modified(None));
}

#[tokio::test]
async fn test_find_keeps_order_and_ids() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    let created = ops::create_many(users, fake_users(5), None).await.unwrap();
    let ids: Vec<Id> = created.iter().map(|user| user.get_id()).collect();

    let found = ops::find(users, json!({}), None, None).await.unwrap();
    let found_ids: Vec<Id> = found.iter().map(|user| user.get_id()).collect();
    assert_eq!(found_ids, ids);

    let sorted = ops::find(users, json!({}), None, Some(order_by("age", SortOrder::Descending)))
        .await
        .unwrap();
    let ages: Vec<i64> = sorted
        .iter()
        .filter_map(|user| user.document().get("age").and_then(|age| age.as_i64()))
        .collect();
    let mut expected = ages.clone();
    expected.sort_by(|a, b| b.cmp(a));
    assert_eq!(ages, expected);

    let page = ops::find(users, json!({}), None, Some(QueryOptions::new().skip(1).limit(2)))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].get_id(), ids[1]);
}

#[tokio::test]
async fn test_find_missing_returns_none() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    ops::create_one(users, json!({"name": "A"}), None).await.unwrap();

    assert!(ops::find_one(users, json!({"name": "B"}), None, None).await.unwrap().is_none());
    assert!(ops::find_by_id(users, docbind::ObjectId::new(), None, None)
        .await
        .unwrap()
        .is_none());
    assert!(ops::find(users, json!({"name": "B"}), None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_projection_limits_fields() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    let created = ops::create_one(users, json!({"name": "A", "email": "a@example.com"}), None)
        .await
        .unwrap();

    let found = ops::find_one(users, json!({"name": "A"}), Some(json!({"email": 1})), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        found.to_json(),
        json!({"_id": created.get_id().to_string(), "email": "a@example.com"})
    );
}

#[tokio::test]
async fn test_update_and_delete_results() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    ops::create_many(
        users,
        vec![
            json!({"name": "A", "age": 20}),
            json!({"name": "B", "age": 30}),
            json!({"name": "C", "age": 40}),
        ],
        None,
    )
    .await
    .unwrap();

    let result = ops::update_one(users, Some(json!({"age": {"$gte": 30}})), Some(json!({"$inc": {"age": 1}})), None)
        .await
        .unwrap();
    assert_eq!(result.matched_count, 1);
    assert_eq!(result.modified_count, 1);

    let result = ops::update_many(users, Some(json!({})), Some(json!({"$set": {"active": false}})), None)
        .await
        .unwrap();
    assert_eq!(result.matched_count, 3);
    assert_eq!(result.modified_count, 3);

    let result = ops::update_many(users, Some(json!({"name": "Z"})), Some(json!({"age": 1})), None)
        .await
        .unwrap();
    assert_eq!(result.matched_count, 0);
    assert_eq!(result.upserted_id, None);

    let b = ops::find_one(users, json!({"name": "B"}), None, None).await.unwrap().unwrap();
    assert_eq!(b.document().get("age"), Some(&json!(31)));

    let result = ops::delete_one(users, Some(json!({"age": {"$lt": 35}})), None).await.unwrap();
    assert!(result.acknowledged);
    assert_eq!(result.deleted_count, 1);

    let result = ops::delete_many(users, None, None).await.unwrap();
    assert_eq!(result.deleted_count, 2);
    assert_eq!(ops::count_documents(users, json!({}), None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_one_and_family() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    let ann = ops::create_one(users, json!({"name": "Ann", "age": 20}), None).await.unwrap();

    let before = ops::find_one_and_update(users, Some(json!({"name": "Ann"})), Some(json!({"age": 21})), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.document().get("age"), Some(&json!(20)));

    let after = ops::find_by_id_and_update(
        users,
        ann.get_id(),
        Some(json!({"$inc": {"age": 1}})),
        Some(QueryOptions::new().return_new(true)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(after.document().get("age"), Some(&json!(22)));

    let upserted = ops::find_one_and_update(
        users,
        Some(json!({"name": "Bob"})),
        Some(json!({"$set": {"age": 50}})),
        Some(QueryOptions::new().upsert(true).return_new(true)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(upserted.document().get("name"), Some(&json!("Bob")));

    let removed = ops::find_one_and_delete(users, Some(json!({"name": "Bob"})), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(removed.get_id(), upserted.get_id());
    assert!(ops::find_by_id_and_remove(users, upserted.get_id(), None).await.unwrap().is_none());

    let removed = ops::find_by_id_and_delete(users, ann.get_id(), None).await.unwrap().unwrap();
    assert_eq!(removed.get_id(), ann.get_id());
    assert!(ops::find_one_and_remove(users, None, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_count_and_exists() {
    let ctx = create_test_context().unwrap();
    let users = ctx.users();
    let ann = ops::create_one(users, json!({"name": "Ann", "age": 20}), None).await.unwrap();
    ops::create_one(users, json!({"name": "Bob", "age": 30}), None).await.unwrap();

    assert_eq!(ops::count_documents(users, json!({}), None).await.unwrap(), 2);
    assert_eq!(
        ops::count_documents(users, json!({"age": {"$gt": 25}}), None).await.unwrap(),
        1
    );
    assert_eq!(ops::exists(users, json!({"name": "Ann"})).await.unwrap(), Some(ann.get_id()));
    assert_eq!(ops::exists(users, json!({"name": "Cid"})).await.unwrap(), None);
    assert_eq!(ops::exists_by_id(users, ann.get_id()).await.unwrap(), Some(ann.get_id()));
    assert_eq!(
        ops::exists_by_id(users, docbind::ObjectId::new()).await.unwrap(),
        None
    );
}
