use crate::{
    api::{
        Context,
        err::{ApiResult, invalid_input, map_db_err, not_found},
    },
    db::types::Key,
};


/// The record that a user has read (and rated) a book, as stored in the
/// `read_records` table. There is at most one record per (user, book) pair.
#[derive(Debug, Clone)]
pub(crate) struct ReadRecord {
    pub(crate) key: Key,
    pub(crate) user: Key,
    pub(crate) book: Key,
    pub(crate) rating: i32,
}

impl ReadRecord {
    fn from_row(row: &tokio_postgres::Row) -> Self {
        Self {
            key: row.get("id"),
            user: row.get("user_id"),
            book: row.get("book_id"),
            rating: row.get("rating"),
        }
    }

    pub(crate) async fn load_by_key(key: Key, context: &Context) -> ApiResult<Option<Self>> {
        let row = context.db
            .query_opt(
                "select id, user_id, book_id, rating from read_records where id = $1",
                &[&key],
            )
            .await?;
        Ok(row.map(|row| Self::from_row(&row)))
    }

    /// Loads all read records of the given user, in stable order.
    pub(crate) async fn load_for_user(user: Key, context: &Context) -> ApiResult<Vec<Self>> {
        let rows = context.db
            .query(
                "select id, user_id, book_id, rating from read_records \
                    where user_id = $1 order by id",
                &[&user],
            )
            .await?;
        Ok(rows.iter().map(Self::from_row).collect())
    }

    /// Creates or updates the rating of `user` for `book`. This is a single
    /// atomic upsert: concurrent calls for the same pair can never create two
    /// records, the last write just wins.
    pub(crate) async fn rate(
        user: Key,
        book: Key,
        rating: i32,
        context: &Context,
    ) -> ApiResult<Self> {
        if !(1..=5).contains(&rating) {
            return Err(invalid_input!(
                key = "rating.out-of-range",
                "rating has to be between 1 and 5, but is {rating}",
            ));
        }

        let result = context.db
            .query_one(
                "insert into read_records (user_id, book_id, rating) \
                    values ($1, $2, $3) \
                    on conflict (user_id, book_id) do update set rating = excluded.rating \
                    returning id, user_id, book_id, rating",
                &[&user, &book, &rating],
            )
            .await;

        let row = map_db_err!(result, {
            if constraint == "read_records_user_id_fkey"
                => not_found!(key = "rate.unknown-user", "no user with id {}", user.0 as i64),
            if constraint == "read_records_book_id_fkey"
                => not_found!(key = "rate.unknown-book", "no book with id {}", book.0 as i64),
        })?;

        Ok(Self::from_row(&row))
    }

    /// Removes the rating of `user` for `book`, returning the removed
    /// record's rating. Removing a rating that does not exist is a no-op.
    pub(crate) async fn delete(
        user: Key,
        book: Key,
        context: &Context,
    ) -> ApiResult<Option<i32>> {
        let row = context.db
            .query_opt(
                "delete from read_records where user_id = $1 and book_id = $2 returning rating",
                &[&user, &book],
            )
            .await?;
        Ok(row.map(|row| row.get("rating")))
    }
}


/// Return value of the `deleteRating` mutation.
#[derive(juniper::GraphQLObject)]
pub(crate) struct DeleteRatingPayload {
    /// Whether a rating was actually removed.
    pub(crate) removed: bool,

    /// The rating of the removed record, if one was removed.
    pub(crate) previous_rating: Option<i32>,
}
