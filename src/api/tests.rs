//! Tests running real GraphQL operations against both API flavors, each on
//! its own temporary database.

use juniper::{graphql_value, DefaultScalarValue, ExecutionError, Value};

use crate::{
    db::{tests::util::TestDb, types::Key},
    prelude::*,
};

use super::{offset_root, relay_root, Id};


type QueryResult = (Value<DefaultScalarValue>, Vec<ExecutionError<DefaultScalarValue>>);

async fn run_offset(db: &TestDb, query: &str) -> Result<QueryResult> {
    let root = offset_root();
    let context = db.api_context().await?;
    juniper::execute(query, None, &root, &juniper::Variables::new(), &context)
        .await
        .map_err(|e| anyhow!("GraphQL execution failed: {e}"))
}

async fn run_relay(db: &TestDb, query: &str) -> Result<QueryResult> {
    let root = relay_root();
    let context = db.api_context().await?;
    juniper::execute(query, None, &root, &juniper::Variables::new(), &context)
        .await
        .map_err(|e| anyhow!("GraphQL execution failed: {e}"))
}

/// Walks into a response value along the given path of field names.
#[track_caller]
fn field<'a>(mut value: &'a Value, path: &[&str]) -> &'a Value {
    for segment in path {
        value = value.as_object_value()
            .and_then(|obj| obj.get_field_value(*segment))
            .unwrap_or_else(|| panic!("field '{segment}' missing in response"));
    }
    value
}

/// The raw number behind a key, as passed to the `Int!` mutation arguments.
fn n(key: Key) -> i64 {
    key.0 as i64
}

async fn add_users(db: &TestDb, usernames: &[&str]) -> Result<Vec<Key>> {
    let mut keys = Vec::new();
    for username in usernames {
        keys.push(db.add_user(username, false).await?);
    }
    Ok(keys)
}


// ===== Offset flavor ===========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn offset_users_pagination() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    add_users(&db, &["anna", "ben", "cleo", "dan", "emma"]).await?;

    // Default page size is larger than the dataset.
    let (data, errors) = run_offset(&db, "{ users { username } }").await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "users": [
            {"username": "anna"},
            {"username": "ben"},
            {"username": "cleo"},
            {"username": "dan"},
            {"username": "emma"},
        ],
    }));

    // Two consecutive pages are disjoint and contiguous.
    let (data, _) = run_offset(&db, "{ users(first: 2) { username } }").await?;
    assert_eq!(data, graphql_value!({
        "users": [{"username": "anna"}, {"username": "ben"}],
    }));

    let (data, _) = run_offset(&db, "{ users(first: 2, offset: 2) { username } }").await?;
    assert_eq!(data, graphql_value!({
        "users": [{"username": "cleo"}, {"username": "dan"}],
    }));

    // Slicing past the end is fine.
    let (data, _) = run_offset(&db, "{ users(first: 2, offset: 4) { username } }").await?;
    assert_eq!(data, graphql_value!({
        "users": [{"username": "emma"}],
    }));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn offset_pagination_arguments_are_validated() -> Result<()> {
    let db = TestDb::with_migrations().await?;

    for query in ["{ users(first: 0) { username } }", "{ users(offset: -1) { username } }"] {
        let (data, errors) = run_offset(&db, query).await?;
        assert_eq!(data, graphql_value!(null));
        assert!(format!("{errors:?}").contains("INVALID_INPUT"));
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn offset_user_lookup() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", true).await?;

    let (data, errors) = run_offset(
        &db,
        &format!("{{ user(id: \"{}\") {{ username isAdmin }} }}", n(anna)),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "user": {"username": "anna", "isAdmin": true},
    }));

    // Unknown ids are a typed error, not an unhandled fault.
    let (data, errors) = run_offset(&db, "{ user(id: \"1234\") { username } }").await?;
    assert_eq!(data, graphql_value!(null));
    assert!(format!("{errors:?}").contains("NOT_FOUND"));

    // Non-numeric ids can never refer to a user.
    let (data, errors) = run_offset(&db, "{ user(id: \"garbage\") { username } }").await?;
    assert_eq!(data, graphql_value!(null));
    assert!(!errors.is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn offset_books_fiction_filter() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    db.add_book("Dune", "Frank Herbert", true).await?;
    db.add_book("A Brief History of Time", "Stephen Hawking", false).await?;
    db.add_book("Neuromancer", "William Gibson", true).await?;

    let (data, errors) = run_offset(&db, "{ books { title fiction } }").await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "books": [
            {"title": "Dune", "fiction": true},
            {"title": "A Brief History of Time", "fiction": false},
            {"title": "Neuromancer", "fiction": true},
        ],
    }));

    let (data, _) = run_offset(&db, "{ books(fiction: true) { title } }").await?;
    assert_eq!(data, graphql_value!({
        "books": [{"title": "Dune"}, {"title": "Neuromancer"}],
    }));

    let (data, _) = run_offset(&db, "{ books(fiction: false) { title } }").await?;
    assert_eq!(data, graphql_value!({
        "books": [{"title": "A Brief History of Time"}],
    }));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rating_twice_keeps_one_record_and_updates_average() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let u1 = db.add_user("anna", false).await?;
    db.add_user("ben", false).await?;
    let b1 = db.add_book("Dune", "Frank Herbert", true).await?;

    let (data, errors) = run_offset(
        &db,
        &format!(
            "mutation {{ rateBook(book: {}, user: {}, rating: 4) {{ readRecord {{ rating }} }} }}",
            n(b1), n(u1),
        ),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "rateBook": {"readRecord": {"rating": 4}},
    }));

    // Rating the same book again updates the record instead of adding a
    // second one.
    let (data, errors) = run_offset(
        &db,
        &format!(
            "mutation {{ rateBook(book: {}, user: {}, rating: 2) {{ readRecord {{ rating }} }} }}",
            n(b1), n(u1),
        ),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "rateBook": {"readRecord": {"rating": 2}},
    }));

    let row = db.query_one("select count(*) from read_records", &[]).await?;
    assert_eq!(row.get::<_, i64>(0), 1);

    // Anna's average is the new rating, Ben has no ratings at all.
    let (data, errors) = run_offset(
        &db,
        "{ users { username averageRating readRecords { rating book { title } } } }",
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "users": [
            {
                "username": "anna",
                "averageRating": 2.0,
                "readRecords": [{"rating": 2, "book": {"title": "Dune"}}],
            },
            {
                "username": "ben",
                "averageRating": null,
                "readRecords": [],
            },
        ],
    }));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn average_rating_is_the_mean_of_all_ratings() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", false).await?;
    let dune = db.add_book("Dune", "Frank Herbert", true).await?;
    let neuromancer = db.add_book("Neuromancer", "William Gibson", true).await?;
    db.add_read_record(anna, dune, 4).await?;
    db.add_read_record(anna, neuromancer, 2).await?;

    let (data, errors) = run_offset(
        &db,
        &format!("{{ user(id: \"{}\") {{ averageRating }} }}", n(anna)),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "user": {"averageRating": 3.0},
    }));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rate_book_validates_input() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", false).await?;
    let dune = db.add_book("Dune", "Frank Herbert", true).await?;

    // Out of range ratings are rejected.
    for rating in [0, 6, -3] {
        let (data, errors) = run_offset(
            &db,
            &format!(
                "mutation {{ rateBook(book: {}, user: {}, rating: {rating}) {{ readRecord {{ rating }} }} }}",
                n(dune), n(anna),
            ),
        ).await?;
        assert_eq!(data, graphql_value!(null));
        assert!(format!("{errors:?}").contains("INVALID_INPUT"));
    }

    // Unknown user and book ids map to "not found" instead of leaking a
    // database error.
    let (data, errors) = run_offset(
        &db,
        &format!("mutation {{ rateBook(book: {}, user: 999, rating: 3) {{ readRecord {{ rating }} }} }}", n(dune)),
    ).await?;
    assert_eq!(data, graphql_value!(null));
    assert!(format!("{errors:?}").contains("NOT_FOUND"));

    let (data, errors) = run_offset(
        &db,
        &format!("mutation {{ rateBook(book: 999, user: {}, rating: 3) {{ readRecord {{ rating }} }} }}", n(anna)),
    ).await?;
    assert_eq!(data, graphql_value!(null));
    assert!(format!("{errors:?}").contains("NOT_FOUND"));

    // Nothing was written.
    let row = db.query_one("select count(*) from read_records", &[]).await?;
    assert_eq!(row.get::<_, i64>(0), 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_rating_removes_record_or_is_noop() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", false).await?;
    let ben = db.add_user("ben", false).await?;
    let dune = db.add_book("Dune", "Frank Herbert", true).await?;
    db.add_read_record(anna, dune, 4).await?;
    db.add_read_record(ben, dune, 5).await?;

    let delete_query = format!(
        "mutation {{ deleteRating(book: {}, user: {}) {{ removed previousRating }} }}",
        n(dune), n(anna),
    );

    let (data, errors) = run_offset(&db, &delete_query).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "deleteRating": {"removed": true, "previousRating": 4},
    }));

    // Ben's record is untouched.
    let row = db.query_one("select user_id, rating from read_records", &[]).await?;
    assert_eq!(row.get::<_, Key>(0), ben);
    assert_eq!(row.get::<_, i32>(1), 5);

    // Deleting again is a no-op, not an error.
    let (data, errors) = run_offset(&db, &delete_query).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "deleteRating": {"removed": false, "previousRating": null},
    }));
    let row = db.query_one("select count(*) from read_records", &[]).await?;
    assert_eq!(row.get::<_, i64>(0), 1);

    Ok(())
}


// ===== Relay flavor ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn relay_users_connection_pagination() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    add_users(&db, &["anna", "ben", "cleo", "dan", "emma"]).await?;

    let (data, errors) = run_relay(&db, "{ users(first: 2) { \
        totalCount \
        edges { node { username } } \
        pageInfo { hasNextPage hasPreviousPage endCursor } \
    } }").await?;
    assert!(errors.is_empty());
    assert_eq!(field(&data, &["users", "totalCount"]), &graphql_value!(5));
    assert_eq!(
        field(&data, &["users", "edges"]),
        &graphql_value!([
            {"node": {"username": "anna"}},
            {"node": {"username": "ben"}},
        ]),
    );
    assert_eq!(field(&data, &["users", "pageInfo", "hasNextPage"]), &graphql_value!(true));
    assert_eq!(field(&data, &["users", "pageInfo", "hasPreviousPage"]), &graphql_value!(false));

    // The end cursor continues the iteration exactly where the first page
    // ended.
    let cursor = field(&data, &["users", "pageInfo", "endCursor"])
        .as_string_value()
        .expect("endCursor is not a string")
        .to_owned();

    let (data, errors) = run_relay(&db, &format!("{{ users(first: 2, after: \"{cursor}\") {{ \
        edges {{ node {{ username }} }} \
        pageInfo {{ hasNextPage hasPreviousPage }} \
    }} }}")).await?;
    assert!(errors.is_empty());
    assert_eq!(
        field(&data, &["users", "edges"]),
        &graphql_value!([
            {"node": {"username": "cleo"}},
            {"node": {"username": "dan"}},
        ]),
    );
    assert_eq!(field(&data, &["users", "pageInfo", "hasNextPage"]), &graphql_value!(true));
    assert_eq!(field(&data, &["users", "pageInfo", "hasPreviousPage"]), &graphql_value!(true));

    // Without `first`, the rest of the collection is returned.
    let (data, errors) = run_relay(&db, "{ users { \
        edges { node { username } } \
        pageInfo { hasNextPage } \
    } }").await?;
    assert!(errors.is_empty());
    let edges = field(&data, &["users", "edges"]).as_list_value().unwrap();
    assert_eq!(edges.len(), 5);
    assert_eq!(field(&data, &["users", "pageInfo", "hasNextPage"]), &graphql_value!(false));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_books_connection_filter_matches_offset_flavor() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    db.add_book("Dune", "Frank Herbert", true).await?;
    db.add_book("A Brief History of Time", "Stephen Hawking", false).await?;
    db.add_book("Neuromancer", "William Gibson", true).await?;

    let (data, errors) = run_relay(&db, "{ books(fiction: true) { \
        totalCount \
        edges { node { title } } \
    } }").await?;
    assert!(errors.is_empty());
    assert_eq!(field(&data, &["books", "totalCount"]), &graphql_value!(2));
    assert_eq!(
        field(&data, &["books", "edges"]),
        &graphql_value!([
            {"node": {"title": "Dune"}},
            {"node": {"title": "Neuromancer"}},
        ]),
    );

    // Both flavors agree on the result set, only the envelope differs.
    let (offset_data, _) = run_offset(&db, "{ books(fiction: true) { title } }").await?;
    let offset_titles = field(&offset_data, &["books"]).as_list_value().unwrap()
        .iter()
        .map(|book| field(book, &["title"]).as_string_value().unwrap().to_owned())
        .collect::<Vec<_>>();
    let relay_titles = field(&data, &["books", "edges"]).as_list_value().unwrap()
        .iter()
        .map(|edge| field(edge, &["node", "title"]).as_string_value().unwrap().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(offset_titles, relay_titles);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_user_by_global_id() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", true).await?;
    let dune = db.add_book("Dune", "Frank Herbert", true).await?;

    let id = Id::user(anna);
    let (data, errors) = run_relay(
        &db,
        &format!("{{ user(id: \"{id}\") {{ id username isAdmin }} }}"),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "user": {
            "id": (id.to_string()),
            "username": "anna",
            "isAdmin": true,
        },
    }));

    // A book id does not refer to a user, even with the same key. Malformed
    // ids behave exactly the same as unknown ones.
    for bad_id in [Id::book(dune).to_string(), "garbage".into(), Id::user(Key(999)).to_string()] {
        let (data, errors) = run_relay(
            &db,
            &format!("{{ user(id: \"{bad_id}\") {{ username }} }}"),
        ).await?;
        assert_eq!(data, graphql_value!(null));
        assert!(format!("{errors:?}").contains("NOT_FOUND"));
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_node_lookup() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", false).await?;
    let dune = db.add_book("Dune", "Frank Herbert", true).await?;

    let user_id = Id::user(anna);
    let (data, errors) = run_relay(
        &db,
        &format!("{{ node(id: \"{user_id}\") {{ id ... on User {{ username }} }} }}"),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "node": {"id": (user_id.to_string()), "username": "anna"},
    }));

    let book_id = Id::book(dune);
    let (data, errors) = run_relay(
        &db,
        &format!("{{ node(id: \"{book_id}\") {{ id ... on Book {{ title }} }} }}"),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "node": {"id": (book_id.to_string()), "title": "Dune"},
    }));

    // Unknown and malformed ids resolve to `null` here, without error.
    for bad_id in [Id::user(Key(999)).to_string(), "garbage".into()] {
        let (data, errors) = run_relay(
            &db,
            &format!("{{ node(id: \"{bad_id}\") {{ id }} }}"),
        ).await?;
        assert!(errors.is_empty());
        assert_eq!(data, graphql_value!({ "node": null }));
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_mutations() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", false).await?;
    let dune = db.add_book("Dune", "Frank Herbert", true).await?;

    let (data, errors) = run_relay(
        &db,
        &format!(
            "mutation {{ rateBook(book: {}, user: {}, rating: 5) {{ \
                readRecord {{ rating user {{ username }} book {{ title }} }} \
            }} }}",
            n(dune), n(anna),
        ),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "rateBook": {
            "readRecord": {
                "rating": 5,
                "user": {"username": "anna"},
                "book": {"title": "Dune"},
            },
        },
    }));

    let (data, errors) = run_relay(
        &db,
        &format!(
            "mutation {{ deleteRating(book: {}, user: {}) {{ removed previousRating }} }}",
            n(dune), n(anna),
        ),
    ).await?;
    assert!(errors.is_empty());
    assert_eq!(data, graphql_value!({
        "deleteRating": {"removed": true, "previousRating": 5},
    }));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_connection_arguments_are_validated() -> Result<()> {
    let db = TestDb::with_migrations().await?;

    let (data, errors) = run_relay(&db, "{ users(first: 0) { totalCount } }").await?;
    assert_eq!(data, graphql_value!(null));
    assert!(format!("{errors:?}").contains("INVALID_INPUT"));

    let (data, errors) = run_relay(
        &db,
        "{ books(after: \"certainly not a valid cursor\") { totalCount } }",
    ).await?;
    assert_eq!(data, graphql_value!(null));
    assert!(format!("{errors:?}").contains("INVALID_INPUT"));

    Ok(())
}
