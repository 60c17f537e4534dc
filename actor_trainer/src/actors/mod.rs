//! Actor-side view of the trainer protocol.
//!
//! - [`ActorClient`]: submits experience and queries actions over an
//!   [`Endpoint`](crate::transport::Endpoint)

pub mod actor_client;

pub use actor_client::{ActorClient, ClientError};
