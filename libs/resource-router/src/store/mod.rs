//! Persistence contract.
//!
//! The router treats storage as a black box: it fetches, finds, inserts,
//! replaces and removes whole records of a resolved model. Concurrency control
//! (if any) belongs to the implementation.

mod filter;
mod memory;

use async_trait::async_trait;

pub use filter::{compare_values, matches};
pub use memory::{MemoryDatabase, MemoryStore};

use crate::error::StoreError;
use crate::model::Record;
use crate::query::FindQuery;
use crate::variant::ResolvedModel;

/// Every method fails with [`StoreError::Validation`] for documents the
/// schema rejects and [`StoreError::Internal`] for engine failures.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch one record by primary key. A variant model only sees its own
    /// records; the base model sees every record of the collection.
    async fn find_by_id(&self, model: &ResolvedModel, id: &str)
    -> Result<Option<Record>, StoreError>;

    /// Filter, sort, skip and limit.
    async fn find(&self, model: &ResolvedModel, query: &FindQuery)
    -> Result<Vec<Record>, StoreError>;

    /// Validate and persist a new record; returns it as stored.
    async fn insert(&self, model: &ResolvedModel, record: Record) -> Result<Record, StoreError>;

    /// Validate and overwrite the record with the same primary key.
    async fn replace(&self, model: &ResolvedModel, record: Record) -> Result<Record, StoreError>;

    async fn remove(&self, model: &ResolvedModel, id: &str) -> Result<(), StoreError>;

    /// Expand reference ids at `paths` into the referenced records.
    async fn populate(
        &self,
        _model: &ResolvedModel,
        records: Vec<Record>,
        _paths: &[String],
    ) -> Result<Vec<Record>, StoreError> {
        Ok(records)
    }
}
