//! Client-side authentication state and API access.
//!
//! Everything here is advisory: it decides what a UI should offer, never what
//! the server will accept. The server re-checks every write.

mod api;
mod filter;
mod session;
mod store;

pub use api::{ApiClient, ClientError};
pub use filter::PostFilter;
pub use session::{AuthSession, TOKEN_KEY, USER_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
