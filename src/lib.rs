//! Layered configuration engine.
//!
//! Sources are loaded into immutable [`ConfigNode`] trees, registered with
//! a set of [`Tags`] and merged into one root per overlay. Lookups resolve
//! the overlays that apply to a request, walk the merged view by path and
//! decode the node through a priority-ordered [`DecoderRegistry`]. Problems
//! with the data come back as leveled diagnostics in a [`Validated`] result
//! rather than as errors.

pub mod cli;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod logging;
pub mod merge;
pub mod node;
pub mod path;
pub mod source;
pub mod strategy;
pub mod tags;
pub mod validated;
pub mod watcher;

pub use config::EngineSettings;
pub use decoder::{Decoder, DecoderRegistry, Priority, TypeCapture};
pub use engine::OverlayConfig;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationLevel};
pub use merge::{ConfigNodeContainer, ConfigNodeManager};
pub use node::ConfigNode;
pub use tags::{Tag, Tags};
pub use validated::Validated;
