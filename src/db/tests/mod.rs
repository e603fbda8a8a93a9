use crate::prelude::*;
use self::util::TestDb;

pub(crate) mod util;


#[tokio::test(flavor = "multi_thread")]
async fn migrations_create_all_tables() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    for table in ["users", "books", "read_records"] {
        let row = db.query_one(format!("select count(*) from {table}").as_str(), &[]).await?;
        assert_eq!(row.get::<_, i64>(0), 0);
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn read_records_are_unique_per_user_and_book() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let user = db.add_user("anna", false).await?;
    let book = db.add_book("Dune", "Frank Herbert", true).await?;

    db.add_read_record(user, book, 4).await?;
    assert!(db.add_read_record(user, book, 2).await.is_err());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_user_removes_their_read_records() -> Result<()> {
    let db = TestDb::with_migrations().await?;
    let anna = db.add_user("anna", false).await?;
    let ben = db.add_user("ben", false).await?;
    let book = db.add_book("Dune", "Frank Herbert", true).await?;
    db.add_read_record(anna, book, 4).await?;
    db.add_read_record(ben, book, 5).await?;

    db.execute("delete from users where id = $1", &[&anna]).await?;

    let row = db.query_one("select count(*) from read_records", &[]).await?;
    assert_eq!(row.get::<_, i64>(0), 1);
    let row = db.query_one("select user_id from read_records", &[]).await?;
    assert_eq!(row.get::<_, crate::db::types::Key>(0), ben);

    Ok(())
}
