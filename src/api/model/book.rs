use crate::{
    api::{Context, err::ApiResult},
    db::types::Key,
};

use super::Page;


/// A book, as stored in the `books` table.
#[derive(Debug, Clone)]
pub(crate) struct Book {
    pub(crate) key: Key,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) fiction: bool,
}

impl Book {
    fn from_row(row: &tokio_postgres::Row) -> Self {
        Self {
            key: row.get("id"),
            title: row.get("title"),
            author: row.get("author"),
            fiction: row.get("fiction"),
        }
    }

    pub(crate) async fn load_by_key(key: Key, context: &Context) -> ApiResult<Option<Self>> {
        let row = context.db
            .query_opt("select id, title, author, fiction from books where id = $1", &[&key])
            .await?;
        Ok(row.map(|row| Self::from_row(&row)))
    }

    /// Loads `limit` books starting at `offset`, in stable id order. If
    /// `fiction` is given, only books with exactly that flag are loaded.
    pub(crate) async fn load_page(
        fiction: Option<bool>,
        limit: i64,
        offset: i64,
        context: &Context,
    ) -> ApiResult<Vec<Self>> {
        let rows = match fiction {
            Some(fiction) => {
                context.db.query(
                    "select id, title, author, fiction from books \
                        where fiction = $1 order by id limit $2 offset $3",
                    &[&fiction, &limit, &offset],
                ).await?
            }
            None => {
                context.db.query(
                    "select id, title, author, fiction from books \
                        order by id limit $1 offset $2",
                    &[&limit, &offset],
                ).await?
            }
        };
        Ok(rows.iter().map(Self::from_row).collect())
    }

    /// Loads up to `limit` books with keys greater than `after`, in stable id
    /// order, optionally filtered by their fiction flag.
    pub(crate) async fn load_page_after(
        fiction: Option<bool>,
        limit: i64,
        after: Option<Key>,
        context: &Context,
    ) -> ApiResult<Page<Self>> {
        match fiction {
            Some(fiction) => {
                super::load_page_after(
                    "select id, title, author, fiction, \
                        row_number() over(order by id) as row_num, \
                        count(*) over() as total_count \
                        from books where fiction = $1",
                    "select count(*) from books where fiction = $1",
                    &[&fiction],
                    after,
                    limit,
                    Self::from_row,
                    context,
                ).await
            }
            None => {
                super::load_page_after(
                    "select id, title, author, fiction, \
                        row_number() over(order by id) as row_num, \
                        count(*) over() as total_count \
                        from books",
                    "select count(*) from books",
                    &[],
                    after,
                    limit,
                    Self::from_row,
                    context,
                ).await
            }
        }
    }
}
