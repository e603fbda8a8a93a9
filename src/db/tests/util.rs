use std::ops::Deref;
use secrecy::ExposeSecret;
use tokio_postgres::{Client, NoTls};

use crate::{api, db::types::Key, prelude::*};
use crate::db::DbConfig;


async fn conn(config: &DbConfig) -> Result<Client> {
    let (client, connection) = tokio_postgres::config::Config::new()
        .user(&config.user)
        .password(config.password.expose_secret())
        .dbname(&config.database)
        .host(&config.host)
        .port(config.port)
        .application_name("Bookshelf DB tests")
        .connect(NoTls)
        .await
        .context("could not connect to DB in test")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            panic!("PG connection error: {e}");
        }
    });

    Ok(client)
}

/// A temporary DB used for a single unit test. Is removed on drop.
///
/// Be sure to use the multi threaded Tokio runtime or else `drop` will hang
/// indefinitely!
pub(crate) struct TestDb {
    client: Option<Client>,
    pool: Option<deadpool_postgres::Pool>,
    controller: Client,
    db_name: String,
}

impl TestDb {
    /// Creates a new temporary database with connection data from the dev
    /// config.
    pub(crate) async fn new() -> Result<Self> {
        let config = crate::config::Config::load_from("util/dev-config/config.toml")
            .context("failed to load config")?;

        // Create connection to original database and create a new temporary
        // one.
        let controller = conn(&config.db).await?;
        let db_name = format!("bookshelf_test_{}", rand::random::<u64>());
        controller.execute(format!("create database {db_name}").as_str(), &[]).await
            .context("failed to create temporary test DB")?;

        // Connect to temporary database
        let db_config = DbConfig { database: db_name.clone(), ..config.db };
        let client = conn(&db_config).await?;
        let pool = crate::db::create_pool(&db_config).await?;

        Ok(Self {
            controller,
            client: Some(client),
            pool: Some(pool),
            db_name,
        })
    }

    pub(crate) async fn with_migrations() -> Result<Self> {
        let mut out = Self::new().await?;
        crate::db::migrate(out.client.as_mut().unwrap()).await
            .context("failed to run migrations on test DB")?;

        Ok(out)
    }

    /// Returns an API context with its own pooled connection to the
    /// temporary database. Drop it before the `TestDb` itself.
    pub(crate) async fn api_context(&self) -> Result<api::Context> {
        let db = self.pool.as_ref().unwrap().get().await?;
        Ok(api::Context { db })
    }

    pub(crate) async fn add_user(&self, username: &str, is_staff: bool) -> Result<Key> {
        let row = self.query_one(
            "insert into users (username, is_staff) values ($1, $2) returning id",
            &[&username, &is_staff],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }

    pub(crate) async fn add_book(&self, title: &str, author: &str, fiction: bool) -> Result<Key> {
        let row = self.query_one(
            "insert into books (title, author, fiction) values ($1, $2, $3) returning id",
            &[&title, &author, &fiction],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }

    pub(crate) async fn add_read_record(&self, user: Key, book: Key, rating: i32) -> Result<Key> {
        let row = self.query_one(
            "insert into read_records (user_id, book_id, rating) \
                values ($1, $2, $3) returning id",
            &[&user, &book, &rating],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }
}

impl Deref for TestDb {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().unwrap()
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        // Since there is no "async drop" in Rust yet, this is a bit annoying.
        // First we need to drop the pool and the client to close all
        // connections to the temporary database. Then we drop the database
        // within `block_on`.
        //
        // This code requires the multi threaded Tokio runtime! :(
        drop(self.pool.take());
        drop(self.client.take());
        futures::executor::block_on(async move {
            self.controller
                .execute(format!("drop database {} with (force)", self.db_name).as_str(), &[])
                .await
                .expect("failed to drop temporary test DB");
        });
    }
}
