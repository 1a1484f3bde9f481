//! Data models for feedgroups.
//!
//! This module contains the core data structures used throughout the system.

mod events;
pub mod group;
mod source;
mod transition;

pub use events::{EventMeta, StoreEvent};
pub use group::{GroupSnapshot, SourceGroup, check_invariants, position_of};
pub use source::{Source, SourceId, SourceOpenTarget, SourceRequest, SourceTable};
pub use transition::{Transition, TransitionRecord};
