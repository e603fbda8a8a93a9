use hyper::{Body, Method, StatusCode};
use std::sync::Arc;

use crate::{api::{self, PaginationStyle}, prelude::*};
use super::{Context, Request, Response, response};


/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request<Body>, ctx: Arc<Context>) -> Response {
    trace!(
        "Incoming HTTP {:?} request to '{}{}'",
        req.method(),
        req.uri().path(),
        req.uri().query().map(|q| format!("?{}", q)).unwrap_or_default(),
    );

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/');

    match path {
        // The GraphQL endpoint. This is the only path for which POST is
        // allowed.
        "/graphql" if method == Method::POST => handle_api(req, &ctx).await,

        // From this point on, we only support GET and HEAD requests. All
        // others will result in 405.
        _ if method != Method::GET && method != Method::HEAD => {
            Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header("Content-Type", "text/plain; charset=UTF-8")
                .body(Body::from("405 Method not allowed"))
                .unwrap()
        }

        // The interactive GraphQL explorer/IDE. We actually keep this in
        // production as it does not hurt and in particular: does not expose
        // any information that isn't already exposed by the API itself.
        "/graphiql" => {
            let html = juniper::http::graphiql::graphiql_source("/graphql", None);
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/html; charset=UTF-8")
                .body(Body::from(html))
                .unwrap()
        }

        _ => response::not_found(),
    }
}

/// Handles a request to `/graphql`.
async fn handle_api(req: Request<Body>, ctx: &Context) -> Response {
    // Get a connection for this request.
    let connection = match ctx.db_pool.get().await {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to obtain DB connection for API request: {}", e);
            return response::service_unavailable();
        }
    };

    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to download API request body: {}", e);
            return response::bad_request(None);
        }
    };

    let gql_request = match serde_json::from_slice::<juniper::http::GraphQLRequest>(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!("Failed to deserialize GraphQL request: {}", e);
            return response::bad_request(Some("invalid GraphQL request body"));
        }
    };

    let api_context = api::Context { db: connection };
    let gql_response = match ctx.config.api.pagination {
        PaginationStyle::Offset => gql_request.execute(&ctx.offset_root, &api_context).await,
        PaginationStyle::Relay => gql_request.execute(&ctx.relay_root, &api_context).await,
    };

    // Failing to execute the operation at all (parse errors, validation
    // errors, ...) is a client error; errors during execution are part of a
    // normal `"errors": []` response.
    let status = if gql_response.is_ok() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    let body = match serde_json::to_string(&gql_response) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize GraphQL response: {}", e);
            return response::internal_server_error();
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}
