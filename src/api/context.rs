use crate::db::DbConnection;


/// The context that is accessible to every resolver in our API. Holds the
/// database connection checked out for the current request.
pub(crate) struct Context {
    pub(crate) db: DbConnection,
}

impl juniper::Context for Context {}
