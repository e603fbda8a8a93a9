//! Definition of the GraphQL API.
//!
//! There are two flavors of the API speaking the same domain: `offset` uses
//! plain `first`/`offset` list arguments, `relay` uses the cursor-connection
//! convention. Which one the server speaks is a configuration choice.

use juniper::EmptySubscription;

use crate::prelude::*;

pub(crate) mod err;
pub(crate) mod model;
pub(crate) mod offset;
pub(crate) mod relay;

mod context;
mod id;

#[cfg(test)]
mod tests;

pub(crate) use self::{
    context::Context,
    id::Id,
};


#[derive(Debug, Clone, confique::Config)]
pub(crate) struct ApiConfig {
    /// Which flavor of pagination the GraphQL schema offers: "offset" for
    /// plain `first`/`offset` list arguments or "relay" for cursor based
    /// connections with global object ids.
    #[config(default = "offset")]
    pub(crate) pagination: PaginationStyle,
}

/// Which pagination convention the GraphQL schema speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum PaginationStyle {
    Offset,
    Relay,
}


/// Type of the root node of the offset/limit flavored API.
pub(crate) type OffsetRoot = juniper::RootNode<
    'static,
    offset::Query,
    offset::Mutation,
    EmptySubscription<Context>,
>;

/// Type of the root node of the relay flavored API.
pub(crate) type RelayRoot = juniper::RootNode<
    'static,
    relay::Query,
    relay::Mutation,
    EmptySubscription<Context>,
>;

/// Creates and returns the root node of the offset/limit flavored API.
pub(crate) fn offset_root() -> OffsetRoot {
    OffsetRoot::new(offset::Query, offset::Mutation, EmptySubscription::new())
}

/// Creates and returns the root node of the relay flavored API.
pub(crate) fn relay_root() -> RelayRoot {
    RelayRoot::new(relay::Query, relay::Mutation, EmptySubscription::new())
}

/// Exports the schema of the given API flavor in the GraphQL schema
/// language.
pub(crate) fn export_schema(pagination: PaginationStyle, target: Option<&std::path::Path>) -> Result<()> {
    let schema = match pagination {
        PaginationStyle::Offset => offset_root().as_sdl(),
        PaginationStyle::Relay => relay_root().as_sdl(),
    };

    match target {
        Some(target) => {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, schema)
                .context(format!("failed to write schema to '{}'", target.display()))?;
        }
        None => println!("{schema}"),
    }

    Ok(())
}
