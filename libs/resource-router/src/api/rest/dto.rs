use serde::{Deserialize, Serialize};

use crate::model::Record;
use crate::router::ListPage;

/// Single-record (or created-batch) response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    #[must_use]
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// List response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope {
    pub data: Vec<Record>,
    pub more: bool,
    pub page: u64,
    pub limit: u64,
}

impl From<ListPage> for ListEnvelope {
    fn from(page: ListPage) -> Self {
        Self {
            data: page.data,
            more: page.more,
            page: page.page,
            limit: page.limit,
        }
    }
}
