//! # Scriptlet
//!
//! Ordered, idempotent lifecycle units.
//!
//! A deployment is described as a configured list of named scriptlets. Each
//! scriptlet owns one layer of the installation and implements `spawn`,
//! `respawn` and `destroy` for it. The sequencer runs the list forward for
//! spawn and respawn and backward for destroy, stopping at the first failure.
//!
//! ## Core Concepts
//!
//! - **Scriptlet**: A named unit with spawn/respawn/destroy
//! - **Registry**: Compile-time map from configured names to factories
//! - **Sequencer**: Runs one phase over a resolved list, fail-fast
//! - **ProgressCallback**: Receives progress updates
//!
//! ## Example
//!
//! ```ignore
//! use scriptlet::{NoProgress, Phase, Registry, parse_list, run};
//!
//! let registry = Registry::new()
//!     .register("infrastructure_layout", || Box::new(Infrastructure))
//!     .register("instance_layout", || Box::new(Instance));
//!
//! let names = parse_list("infrastructure_layout instance_layout");
//! let scriptlets = registry.resolve_all(&names)?;
//!
//! run(Phase::Spawn, &scriptlets, &deployer, &mut NoProgress)?;
//! // ... later, children first:
//! run(Phase::Destroy, &scriptlets, &deployer, &mut NoProgress)?;
//! ```

pub mod context;
pub mod error;
pub mod registry;
pub mod scriptlet;
pub mod sequencer;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback};
pub use error::{Error, Result};
pub use registry::{Factory, Registry, parse_list};
pub use scriptlet::{BoxedScriptlet, Scriptlet};
pub use sequencer::{Sequencer, run};
pub use types::{Phase, SequenceReport, SequenceState};
