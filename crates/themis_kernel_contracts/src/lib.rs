#![forbid(unsafe_code)]

pub mod attribute;
pub mod batch;
pub mod common;
pub mod disclosure;
pub mod roster;

pub use common::{
    ContractViolation, MonotonicTimeNs, ReasonCodeId, RefuseKind, Refusal, SchemaVersion, Validate,
};
