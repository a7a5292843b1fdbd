//! # System Module
//!
//! Stage assessment for relationship progressions.
//!
//! The stage is derived, never stored independently: the assessor is a pure
//! function of the milestone set, and the fold in [`crate::progression`]
//! writes its result onto the progression record.

mod stage;

pub use stage::*;
