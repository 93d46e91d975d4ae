//! HireMatch client layer: session and role resolution, route guarding,
//! an authenticated HTTP adapter, and view models over two interchangeable
//! recruitment backends (BaaS tables or the REST API).

pub mod backend;
pub mod config;
pub mod errors;
pub mod guard;
pub mod models;
pub mod remote;
pub mod session;
pub mod state;
pub mod validation;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use errors::{AuthFailure, ClientError, ClientResult};
pub use state::AppContext;
