//! `techradar` - A catalog of technologies and their adoption stages
//!
//! This library provides the technology document model, `SQLite`-backed
//! storage, filtered catalog listings with metadata, lifecycle operations
//! with stage-transition history, and the HTTP API that exposes them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod server;
pub mod storage;
pub mod technology;

pub use catalog::{CatalogMetadata, TechnologyFilter, TechnologyListing};
pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::LifecycleManager;
pub use logging::init_logging;
pub use storage::{Storage, TechnologyStore};
pub use technology::{
    Category, History, NewTechnology, Stage, StageTransition, StageTransitionRequest, Technology,
    TechnologyUpdate,
};
