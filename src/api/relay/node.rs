use crate::api::{Context, Id};

use super::{Book, ReadRecord, User};


/// A node with a globally unique ID. Mostly useful for relay.
#[juniper::graphql_interface(Context = Context, for = [User, Book, ReadRecord])]
pub(crate) trait Node {
    fn id(&self) -> Id;
}
