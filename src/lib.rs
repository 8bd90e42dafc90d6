//! pixbord: image posts, comments and follows behind signed-cookie sessions.
//!
//! Handlers take Spin `Request`s and produce Spin `Response`s over any
//! [`KvStore`]. The Spin component opens the configured key-value store per
//! request; the native binary and the tests use [`MemoryStore`].

pub mod auth;
pub mod comments;
pub mod config;
pub mod core;
pub mod follow;
pub mod handlers;
pub mod models;
pub mod posts;
pub mod templates;
pub mod users;

#[cfg(target_arch = "wasm32")]
mod component;

use spin_sdk::http::{Request, Response};

pub use crate::config::Config;
pub use crate::core::store::{KvStore, KvStoreExt, MemoryStore};

pub struct App<S: KvStore> {
    store: S,
    config: Config,
}

impl<S: KvStore> App<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self, req: &Request) -> Response {
        handlers::route(&self.store, &self.config, req)
    }
}
