#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod actor;
pub mod classification;

pub use actor::{Actor, ActorBuilder};
pub use classification::{Classification, DEFAULT_OWNER_FIELD, classify, is_owner};
