//! wiretap - an operator-controlled HTTP intercepting proxy
//!
//! A per-connection proxy that rewrites client-form HTTP/1.x requests to
//! origin form, optionally stalls either half of a transaction for a human
//! operator to inspect and edit over a WebSocket control channel, forwards
//! the (possibly edited) message, and persists both halves of every
//! transaction once it completes.
//!
//! # Layout
//!
//! - [`engine`] is the interception core: wire rewriting ([`engine::wire`]),
//!   the operator control protocol ([`engine::control`]), per-session state
//!   ([`engine::session`]), and the per-connection transaction state machine
//!   ([`engine::connection`]) driven by a sequential [`engine::Router`].
//! - [`store`] persists `Project`/`Request`/`Response` rows to SQLite.
//! - [`api`] is the ambient surface an operator drives the proxy through:
//!   REST project/history routes plus the control-channel WebSocket upgrade.
//! - [`config`] holds the plain, no-file startup configuration the binary
//!   constructs in `main`.
//!
//! The HTTP primitives the ambient REST surface is built on (`http`,
//! `server`, `errors`, `limits`) are a general-purpose zero-allocation
//! HTTP/1.x server, dogfooded rather than reimplemented: see the
//! [`Handler`]/[`Server`] quick start below.
//!
//! ## `Handler`/`Server` quick start
//! ```no_run
//! use wiretap::{Server, Handler, Request, Response, Handled, StatusCode};
//! use tokio::net::TcpListener;
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
//!         resp.status(StatusCode::Ok).body("Hello World!")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .handler(MyHandler)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
pub mod api;
pub mod config;
pub mod engine;
pub mod store;

pub(crate) mod http {
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    http::{
        query,
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Handled, Response,
        },
        types::{Method, StatusCode, Url, Version},
    },
    server::{
        connection::{ConnectionData, ConnectionFilter},
        server_impl::{Handler, Server, ServerBuilder},
    },
};

#[doc(hidden)]
pub fn run_test<F: FnOnce(&Request, &mut Response) -> Handled>(f: F) {
    f(
        &Request::new(&crate::limits::ReqLimits::default()),
        &mut Response::new(&crate::limits::RespLimits::default()),
    );
}

#[doc(hidden)]
#[macro_export]
macro_rules! impt_default_handler {
    ($name:ident) => {
        use wiretap::{Handled, Handler, Request, Response, StatusCode};
        struct $name;

        // `<()>` to check functionality
        impl Handler<()> for $name {
            async fn handle(&self, _: &mut (), _: &Request, resp: &mut Response) -> Handled {
                resp.status(StatusCode::Ok).body("Hello world!")
            }
        }
    };
}

#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str(value: Option<&[u8]>) -> Option<&str> {
        Some(from_utf8(value?).unwrap())
    }

    #[inline]
    pub(crate) fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub(crate) fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
