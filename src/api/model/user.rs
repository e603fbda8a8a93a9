use crate::{
    api::{Context, err::ApiResult},
    db::types::Key,
};

use super::Page;


/// A user account, as stored in the `users` table.
#[derive(Debug, Clone)]
pub(crate) struct User {
    pub(crate) key: Key,
    pub(crate) username: String,
    pub(crate) is_staff: bool,
}

impl User {
    fn from_row(row: &tokio_postgres::Row) -> Self {
        Self {
            key: row.get("id"),
            username: row.get("username"),
            is_staff: row.get("is_staff"),
        }
    }

    pub(crate) async fn load_by_key(key: Key, context: &Context) -> ApiResult<Option<Self>> {
        let row = context.db
            .query_opt("select id, username, is_staff from users where id = $1", &[&key])
            .await?;
        Ok(row.map(|row| Self::from_row(&row)))
    }

    /// Loads `limit` users starting at `offset`, in stable id order.
    pub(crate) async fn load_page(
        limit: i64,
        offset: i64,
        context: &Context,
    ) -> ApiResult<Vec<Self>> {
        let rows = context.db
            .query(
                "select id, username, is_staff from users order by id limit $1 offset $2",
                &[&limit, &offset],
            )
            .await?;
        Ok(rows.iter().map(Self::from_row).collect())
    }

    /// Loads up to `limit` users with keys greater than `after`, in stable id
    /// order.
    pub(crate) async fn load_page_after(
        limit: i64,
        after: Option<Key>,
        context: &Context,
    ) -> ApiResult<Page<Self>> {
        super::load_page_after(
            "select id, username, is_staff, \
                row_number() over(order by id) as row_num, \
                count(*) over() as total_count \
                from users",
            "select count(*) from users",
            &[],
            after,
            limit,
            Self::from_row,
            context,
        ).await
    }

    /// The arithmetic mean of all this user's ratings, or `None` if they have
    /// not rated anything yet. Always computed from the current read records,
    /// never stored.
    pub(crate) async fn average_rating(&self, context: &Context) -> ApiResult<Option<f64>> {
        let row = context.db
            .query_one(
                "select avg(rating)::double precision from read_records where user_id = $1",
                &[&self.key],
            )
            .await?;
        Ok(row.get(0))
    }
}
