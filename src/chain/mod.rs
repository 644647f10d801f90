//! Chain execution subsystem.
//!
//! # Data Flow
//! ```text
//! ChainRegistry::run(name)
//!     → registry.rs (resolve, iterate steps, skip/delay, depth guard)
//!     → engine.rs (copy → import → exchange → events → resend → export)
//!         → exchange.rs (template imports, variable exports)
//!         → event.rs (condition matching)
//!     → vars.rs (shared variable store, persisted after each export)
//! ```

pub mod engine;
pub mod event;
pub mod exchange;
pub mod registry;
pub mod template;
pub mod vars;

pub use engine::RunOutcome;
pub use event::{Condition, ConditionKind, Event, Triggers};
pub use registry::{Chain, ChainOutcome, ChainRegistry, RunContext, Step};
pub use vars::{GlobalVars, JsonFilePersistence, NoPersistence, Persistence};
