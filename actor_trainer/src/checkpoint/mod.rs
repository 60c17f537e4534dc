//! Model persistence for trained agents.
//!
//! Every agent is stored as two burn records in one directory, its online
//! model and its target model:
//!
//! ```text
//! <dir>/
//!   policy.bin          online weights of agent "policy"
//!   policy_target.bin   target weights of agent "policy"
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use actor_trainer::checkpoint::{ModelKind, ModelStore};
//!
//! let store = ModelStore::new("./models")?;
//! store.save(&model, "policy", ModelKind::Online)?;
//!
//! // Later, into a freshly initialized model of the same architecture:
//! let model = store.load(Model::new(&device), "policy", ModelKind::Online, &device)?;
//! ```

pub mod model_store;

pub use model_store::{CheckpointError, ModelKind, ModelStore, StoredModel};
