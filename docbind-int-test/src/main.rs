use docbind::errors::DocbindResult;
use docbind::ops;
use docbind_int_test::fixtures::fake_users;
use docbind_int_test::test_util::create_test_context;
use serde_json::json;

#[tokio::main]
async fn main() -> DocbindResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let users = ctx.users();

    let count = 10000;
    let start = std::time::Instant::now();
    ops::create_many(users, fake_users(count), None).await?;
    println!("Created {} users in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let adults = ops::count_documents(users, json!({"age": {"$gte": 18}}), None).await?;
    println!("Counted {} adults in {:?}", adults, start.elapsed());

    let start = std::time::Instant::now();
    let result = ops::update_many(users, Some(json!({})), Some(json!({"$set": {"active": false}})), None).await?;
    println!("Updated {} users in {:?}", result.modified_count, start.elapsed());

    let start = std::time::Instant::now();
    let result = ops::delete_many(users, Some(json!({"active": false})), None).await?;
    println!("Deleted {} users in {:?}", result.deleted_count, start.elapsed());

    Ok(())
}
