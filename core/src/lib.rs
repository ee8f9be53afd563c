//! Typed client core for the Tasker todo service.
//!
//! # Overview
//! One set of Rust types describes the wire format, the published OpenAPI
//! document and the client-side form rules. On top of that sit a stateless
//! request builder/parser, a bearer-injecting API client, and a query cache
//! whose entries are invalidated by a hand-maintained table of writes.
//!
//! # Design
//! - `TodoClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network (host-does-IO). `ApiClient` runs
//!   them over a `Transport`, which is `ureq` in production and scripted in
//!   tests.
//! - `contract::OPERATIONS` is the single table of paths, methods, bodies
//!   and statuses; both `client` and `openapi` read from it.
//! - `QueryClient` is what a UI consumes: cached reads, writes that
//!   invalidate on success, placeholders for first render.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod contract;
pub mod email;
pub mod error;
pub mod hooks;
pub mod http;
pub mod invalidation;
pub mod openapi;
pub mod transport;
pub mod types;

pub use api::{ApiClient, StaticToken, TokenProvider};
pub use cache::{KeyFilter, QueryCache, QueryClientOptions, QueryKey, QueryScope};
pub use client::TodoClient;
pub use config::{Config, ConfigError, Environment};
pub use error::ApiError;
pub use hooks::QueryClient;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use invalidation::Mutation;
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    Attachment, Category, Comment, CreateCategory, CreateTodo, PopulatedTodo, Todo, TodoStats,
    UpdateCategory, UpdateTodo,
};
