//! SliceStore - durable key-value storage of JSON slices
//!
//! Every key maps to one JSON document that is always written whole. Slices
//! are independent of each other: there are no cross-key transactions, and a
//! damaged slice never prevents the others from loading.
//!
//! # Architecture
//!
//! ```text
//! {store_path}/
//! ├── .lock                # fs2 advisory lock, held only while reading/writing
//! ├── tasky_sessions.json
//! ├── tasky_profile.json
//! ├── tasky_tasks.json
//! └── tasky_health.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use slicestore::SliceStore;
//!
//! let store = SliceStore::open("/tmp/tasky")?;
//! store.save("tasky_tasks", &tasks)?;
//! let tasks: Option<Vec<Task>> = store.load("tasky_tasks")?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{SliceInfo, SliceStore, is_valid_key};

/// File extension used for slice documents
pub const SLICE_EXTENSION: &str = "json";
