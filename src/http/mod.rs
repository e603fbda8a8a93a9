//! The HTTP server and routing.
//!
//! This file itself contains fairly little business logic and just sets up
//! the `hyper` server and catches errors. The main logic is in
//! `handlers.rs`.

use deadpool_postgres::Pool;
use futures::FutureExt;
use hyper::{
    Body, Server,
    service::{make_service_fn, service_fn},
};
use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    panic::AssertUnwindSafe,
    sync::Arc,
};

use crate::{api, config::Config, prelude::*};
use self::handlers::handle;

mod handlers;
pub(crate) mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 3080)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,
}


// Our requests and responses always use the hyper provided body type.
type Response<T = Body> = hyper::Response<T>;
type Request<T = Body> = hyper::Request<T>;


/// Context that the request handler has access to.
struct Context {
    offset_root: api::OffsetRoot,
    relay_root: api::RelayRoot,
    db_pool: Pool,
    config: Config,
}


/// Starts the HTTP server. The future returned by this function must be
/// awaited to actually run it.
pub(crate) async fn serve(config: Config, db: Pool) -> Result<()> {
    let addr = SocketAddr::new(config.http.address, config.http.port);
    let ctx = Arc::new(Context {
        offset_root: api::offset_root(),
        relay_root: api::relay_root(),
        db_pool: db,
        config,
    });

    // A hyper "service" is something that can handle requests. The outer
    // closure is called whenever hyper needs a new service instance, the
    // inner closure is called once per incoming request. All our logic lives
    // in `handle`; the only thing happening here is cloning the `Arc` with
    // the context.
    let factory = make_service_fn(move |_| {
        let ctx = Arc::clone(&ctx);
        async {
            Ok::<_, Infallible>(service_fn(move |req| {
                handle_internal_errors(handle(req, Arc::clone(&ctx)))
            }))
        }
    });

    let server = Server::bind(&addr).serve(factory);
    info!("Listening on http://{}", server.local_addr());
    server.await?;

    Ok(())
}

/// This just wraps another future and catches all panics that might occur
/// when resolving/polling that given future. This ensures that we always
/// answer with `500` instead of just crashing the thread and closing the
/// connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // The `AssertUnwindSafe` is unfortunately necessary. The whole story of
    // unwind safety is strange. What we are basically saying here is: "if
    // the future panicks, the global/remaining application state is not
    // 'broken'. It is safe to continue with the program in case of a panic."
    //
    // Hyper catches panics for us anyway, so this changes nothing except
    // that our response is better.
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // The `panic` information is just an `Any` object representing
            // the value the panic was invoked with. For most panics (which
            // use `panic!` like `println!`), this is either `&str` or
            // `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().map(|s| *s));

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}
