//! The offset/limit flavor of the API: list queries take plain `first` and
//! `offset` arguments and object ids are the raw numeric keys.

use juniper::{graphql_object, GraphQLObject, ID};

use crate::db::types::Key;

use super::{
    Context,
    err::{ApiResult, internal_server_error, invalid_input, not_found},
    model,
};


/// Default and maximum number of items returned by the list queries.
const DEFAULT_COUNT: i32 = 10;
const MAX_COUNT: i32 = 100;


/// The root query object.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    /// Returns up to `first` users, starting at `offset`, in stable id
    /// order.
    async fn users(
        #[graphql(default = DEFAULT_COUNT)] first: i32,
        #[graphql(default = 0)] offset: i32,
        context: &Context,
    ) -> ApiResult<Vec<User>> {
        let (limit, offset) = page_args(first, offset)?;
        let users = model::User::load_page(limit, offset, context).await?;
        Ok(users.into_iter().map(User).collect())
    }

    /// Returns the user with the given id. Errors if no user with that id
    /// exists.
    async fn user(id: ID, context: &Context) -> ApiResult<User> {
        let key = parse_key(&id)?;
        model::User::load_by_key(key, context).await?
            .map(User)
            .ok_or_else(|| not_found!(key = "user.not-found", "no user with id {}", &*id))
    }

    /// Returns up to `first` books, starting at `offset`, in stable id
    /// order. If `fiction` is given, only books with exactly that flag are
    /// returned.
    async fn books(
        fiction: Option<bool>,
        #[graphql(default = DEFAULT_COUNT)] first: i32,
        #[graphql(default = 0)] offset: i32,
        context: &Context,
    ) -> ApiResult<Vec<Book>> {
        let (limit, offset) = page_args(first, offset)?;
        let books = model::Book::load_page(fiction, limit, offset, context).await?;
        Ok(books.into_iter().map(Book).collect())
    }
}


/// The root mutation object.
pub(crate) struct Mutation;

#[graphql_object(Context = Context)]
impl Mutation {
    /// Creates or updates the rating of the given user for the given book.
    /// This is an upsert: rating a book the user has already rated replaces
    /// the old rating instead of adding a second record.
    async fn rate_book(
        book: i32,
        user: i32,
        rating: i32,
        context: &Context,
    ) -> ApiResult<RateBookPayload> {
        let record = model::ReadRecord::rate(
            Key(user as u64),
            Key(book as u64),
            rating,
            context,
        ).await?;
        Ok(RateBookPayload { read_record: ReadRecord(record) })
    }

    /// Removes the given user's rating for the given book. Removing a rating
    /// that does not exist is a no-op, reported via `removed` in the payload.
    async fn delete_rating(
        book: i32,
        user: i32,
        context: &Context,
    ) -> ApiResult<model::DeleteRatingPayload> {
        let previous_rating = model::ReadRecord::delete(
            Key(user as u64),
            Key(book as u64),
            context,
        ).await?;
        Ok(model::DeleteRatingPayload {
            removed: previous_rating.is_some(),
            previous_rating,
        })
    }
}

/// Return value of the `rateBook` mutation.
#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct RateBookPayload {
    /// The read record that was created or updated.
    read_record: ReadRecord,
}


pub(crate) struct User(model::User);

#[graphql_object(name = "User", Context = Context)]
impl User {
    fn id(&self) -> ID {
        key_id(self.0.key)
    }

    /// The username, a unique string identifying the user.
    fn username(&self) -> &str {
        &self.0.username
    }

    /// Whether this user is a staff/administrator account.
    fn is_admin(&self) -> bool {
        self.0.is_staff
    }

    /// The mean of this user's ratings, or `null` if they have not rated
    /// anything yet.
    async fn average_rating(&self, context: &Context) -> ApiResult<Option<f64>> {
        self.0.average_rating(context).await
    }

    /// All records of books this user has read.
    async fn read_records(&self, context: &Context) -> ApiResult<Vec<ReadRecord>> {
        let records = model::ReadRecord::load_for_user(self.0.key, context).await?;
        Ok(records.into_iter().map(ReadRecord).collect())
    }
}


pub(crate) struct Book(model::Book);

#[graphql_object(name = "Book", Context = Context)]
impl Book {
    fn id(&self) -> ID {
        key_id(self.0.key)
    }

    fn title(&self) -> &str {
        &self.0.title
    }

    fn author(&self) -> &str {
        &self.0.author
    }

    fn fiction(&self) -> bool {
        self.0.fiction
    }
}


pub(crate) struct ReadRecord(model::ReadRecord);

#[graphql_object(name = "ReadRecord", Context = Context)]
impl ReadRecord {
    fn id(&self) -> ID {
        key_id(self.0.key)
    }

    fn rating(&self) -> i32 {
        self.0.rating
    }

    /// The user who read the book.
    async fn user(&self, context: &Context) -> ApiResult<User> {
        model::User::load_by_key(self.0.user, context).await?
            .map(User)
            .ok_or_else(|| internal_server_error!("read record references missing user"))
    }

    /// The book that was read.
    async fn book(&self, context: &Context) -> ApiResult<Book> {
        model::Book::load_by_key(self.0.book, context).await?
            .map(Book)
            .ok_or_else(|| internal_server_error!("read record references missing book"))
    }
}


/// Renders a key the way this API flavor exposes ids: as plain number.
fn key_id(key: Key) -> ID {
    ID::new((key.0 as i64).to_string())
}

/// Parses a raw numeric `ID` argument into a key.
fn parse_key(id: &str) -> ApiResult<Key> {
    id.parse::<i64>()
        .map(|n| Key(n as u64))
        .map_err(|_| invalid_input!("'{id}' is not a valid id"))
}

/// Validates the pagination arguments and converts them for SQL use. The
/// page size is capped.
fn page_args(first: i32, offset: i32) -> ApiResult<(i64, i64)> {
    if first <= 0 {
        return Err(invalid_input!("argument 'first' has to be > 0, but is {first}"));
    }
    if offset < 0 {
        return Err(invalid_input!("argument 'offset' has to be >= 0, but is {offset}"));
    }

    Ok((std::cmp::min(first, MAX_COUNT).into(), offset.into()))
}
