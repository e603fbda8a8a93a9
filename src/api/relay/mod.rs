//! The cursor-connection ("relay") flavor of the API: list queries return
//! connections (`edges`/`node`/`pageInfo`) paginated with opaque cursors, and
//! every object carries a globally unique id implementing the `Node`
//! interface.

use juniper::{graphql_object, GraphQLObject};

use crate::db::types::Key;

use super::{
    Context, Id,
    err::{ApiResult, internal_server_error, invalid_input, not_found},
    model,
};

mod connection;
mod node;

pub(crate) use self::{
    connection::{Cursor, PageInfo},
    node::{Node, NodeValue},
};


/// Maximum number of items returned per page. Applied even when `first` is
/// not given.
const MAX_COUNT: i32 = 100;


/// The root query object.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    /// Returns a connection over all users, in stable id order.
    async fn users(
        first: Option<i32>,
        after: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<UserConnection> {
        let (limit, after) = page_args(first, after)?;
        let page = model::User::load_page_after(limit, after, context).await?;
        Ok(UserConnection::build(page))
    }

    /// Returns the user with the given id. Errors if the id does not refer
    /// to a user.
    async fn user(id: Id, context: &Context) -> ApiResult<User> {
        User::load_by_id(id, context).await?
            .ok_or_else(|| not_found!(key = "user.not-found", "no user with id {id}"))
    }

    /// Returns a connection over all books, in stable id order. If `fiction`
    /// is given, only books with exactly that flag are part of the
    /// connection.
    async fn books(
        fiction: Option<bool>,
        first: Option<i32>,
        after: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<BookConnection> {
        let (limit, after) = page_args(first, after)?;
        let page = model::Book::load_page_after(fiction, limit, after, context).await?;
        Ok(BookConnection::build(page))
    }

    /// Retrieve a node by its globally unique ID. Mostly useful for relay.
    async fn node(id: Id, context: &Context) -> ApiResult<Option<NodeValue>> {
        match id.kind() {
            Id::USER_KIND => Ok(User::load_by_id(id, context).await?.map(NodeValue::from)),
            Id::BOOK_KIND => Ok(Book::load_by_id(id, context).await?.map(NodeValue::from)),
            Id::READ_RECORD_KIND
                => Ok(ReadRecord::load_by_id(id, context).await?.map(NodeValue::from)),
            _ => Ok(None),
        }
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

impl Node for User {
    fn id(&self) -> Id {
        Id::user(self.0.key)
    }
}

impl User {
    async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        match id.key_for(Id::USER_KIND) {
            None => Ok(None),
            Some(key) => Ok(model::User::load_by_key(key, context).await?.map(Self)),
        }
    }
}

#[graphql_object(name = "User", Context = Context, impl = NodeValue)]
impl User {
    fn id(&self) -> Id {
        Node::id(self)
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

impl Node for Book {
    fn id(&self) -> Id {
        Id::book(self.0.key)
    }
}

impl Book {
    async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        match id.key_for(Id::BOOK_KIND) {
            None => Ok(None),
            Some(key) => Ok(model::Book::load_by_key(key, context).await?.map(Self)),
        }
    }
}

#[graphql_object(name = "Book", Context = Context, impl = NodeValue)]
impl Book {
    fn id(&self) -> Id {
        Node::id(self)
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

impl Node for ReadRecord {
    fn id(&self) -> Id {
        Id::read_record(self.0.key)
    }
}

impl ReadRecord {
    async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        match id.key_for(Id::READ_RECORD_KIND) {
            None => Ok(None),
            Some(key) => Ok(model::ReadRecord::load_by_key(key, context).await?.map(Self)),
        }
    }
}

#[graphql_object(name = "ReadRecord", Context = Context, impl = NodeValue)]
impl ReadRecord {
    fn id(&self) -> Id {
        Node::id(self)
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


#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct UserConnection {
    page_info: PageInfo,
    edges: Vec<UserEdge>,
    total_count: i32,
}

#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct UserEdge {
    cursor: Cursor,
    node: User,
}

impl UserConnection {
    fn build(page: model::Page<model::User>) -> Self {
        let edges = page.items.into_iter()
            .map(|user| UserEdge {
                cursor: Cursor::new(user.key),
                node: User(user),
            })
            .collect::<Vec<_>>();

        Self {
            page_info: PageInfo {
                has_next_page: page.has_next_page,
                has_previous_page: page.has_previous_page,
                start_cursor: edges.first().map(|e| e.cursor.clone()),
                end_cursor: edges.last().map(|e| e.cursor.clone()),
            },
            total_count: page.total_count.try_into().expect("more than 2^31 users"),
            edges,
        }
    }
}


#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct BookConnection {
    page_info: PageInfo,
    edges: Vec<BookEdge>,
    total_count: i32,
}

#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct BookEdge {
    cursor: Cursor,
    node: Book,
}

impl BookConnection {
    fn build(page: model::Page<model::Book>) -> Self {
        let edges = page.items.into_iter()
            .map(|book| BookEdge {
                cursor: Cursor::new(book.key),
                node: Book(book),
            })
            .collect::<Vec<_>>();

        Self {
            page_info: PageInfo {
                has_next_page: page.has_next_page,
                has_previous_page: page.has_previous_page,
                start_cursor: edges.first().map(|e| e.cursor.clone()),
                end_cursor: edges.last().map(|e| e.cursor.clone()),
            },
            total_count: page.total_count.try_into().expect("more than 2^31 books"),
            edges,
        }
    }
}


/// Validates the pagination arguments and decodes the cursor. The page size
/// is capped, also when `first` is not given at all.
fn page_args(first: Option<i32>, after: Option<Cursor>) -> ApiResult<(i64, Option<Key>)> {
    if let Some(first) = first {
        if first <= 0 {
            return Err(invalid_input!("argument 'first' has to be > 0, but is {first}"));
        }
    }
    let limit = std::cmp::min(first.unwrap_or(MAX_COUNT), MAX_COUNT).into();
    let after = after.map(|cursor| cursor.deserialize::<Key>()).transpose()?;

    Ok((limit, after))
}
