//! # Cloud Databases client for Rust
//!
//! Client for the Rackspace Cloud Databases management API (v1.0):
//! authenticate once, then manage database instances, databases, users,
//! and flavors. Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clouddb::{Connection, Region};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dbaas = Connection::builder()
//!         .username("YOUR_USERNAME")
//!         .api_key("YOUR_API_KEY")
//!         .region(Region::Dfw)
//!         .connect()
//!         .await?;
//!
//!     for instance in dbaas.list_instances().await? {
//!         println!("{} ({})", instance.name, instance.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Creating resources
//!
//! Request parameters use builders that enforce the required fields at
//! compile time:
//!
//! ```no_run
//! # use clouddb::{Connection, CreateInstanceParams, DatabaseSpec, UserSpec, Volume};
//! # async fn example(dbaas: Connection) -> clouddb::Result<()> {
//! let params = CreateInstanceParams::builder()
//!     .flavor_ref("https://dfw.databases.api.rackspacecloud.com/v1.0/1234/flavors/1")
//!     .name("test_instance")
//!     .volume(Volume::new(1))
//!     .databases(vec![DatabaseSpec::named("testdb")])
//!     .build();
//!
//! let instance = dbaas.create_instance(params).await?;
//! instance
//!     .create_user(
//!         UserSpec::builder()
//!             .name("test")
//!             .password("password")
//!             .databases(vec![DatabaseSpec::named("testdb")])
//!             .build(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Authentication and token expiry
//!
//! The connection authenticates eagerly when built and holds the
//! resulting session (bearer token + account-scoped service location).
//! When the API signals token expiry with a 401, the connection
//! transparently re-authenticates and re-issues the request; disable
//! this with [`ConnectionBuilder::retry_auth`]. Transport-level failures
//! are retried a bounded number of times before surfacing as
//! [`CloudDbError::Connection`].
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, CloudDbError>`](Result).
//! Faults reported by the API are classified into [`FaultKind`]s:
//!
//! ```no_run
//! # use clouddb::{CloudDbError, Connection, FaultKind};
//! # async fn example(dbaas: Connection) {
//! match dbaas.instance("692d8418-7a8f-47f1-8060-59846c6e024f").await {
//!     Ok(instance) => println!("status: {:?}", instance.info().status),
//!     Err(CloudDbError::Api(fault)) if fault.kind == FaultKind::ItemNotFound => {
//!         eprintln!("no such instance: {}", fault.message);
//!     }
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`connection`]: the [`Connection`], its builder, and the request
//!   pipeline every operation funnels through
//! - [`auth`]: credential exchange and session/service-location types
//! - [`instance`], [`database`], [`user`], [`flavor`]: resource handles
//!   and payload types
//! - [`error`]: error types and remote-fault classification
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for
//! structured logging of request dispatch, retries, and
//! re-authentication. Events are zero-cost when no subscriber is
//! attached; attach one in your application to see them:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod connection;
pub mod database;
pub mod error;
pub mod flavor;
pub mod instance;
pub mod user;

// Re-export commonly used types
pub use auth::{Credentials, Region, ServiceLocation, Session};
pub use connection::{ApiResponse, AUTH_UK, AUTH_USA, Connection, ConnectionBuilder};
pub use database::{Database, DatabaseInfo, DatabaseSpec};
pub use error::{ApiFault, CloudDbError, FaultKind, Result};
pub use flavor::{Flavor, FlavorInfo};
pub use instance::{
    CreateInstanceParams, Instance, InstanceFlavor, InstanceInfo, InstanceStatus, Link, RootUser,
    Volume,
};
pub use user::{User, UserInfo, UserSpec};

/// Version of the client crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed identifying user-agent sent on every request
pub(crate) const USER_AGENT: &str = concat!("Cloud Databases Rust API ", env!("CARGO_PKG_VERSION"));
