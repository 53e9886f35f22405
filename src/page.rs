//! Paging request and page result.

use serde::{Deserialize, Serialize};

/// Which slice of a filtered result to return. `total` asks for the count of all matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
    #[serde(default)]
    pub total: bool,
}

impl PagingParams {
    pub fn new(skip: Option<i64>, take: Option<i64>, total: bool) -> Self {
        PagingParams { skip, take, total }
    }

    /// Requested page size, defaulting to and capped at `max_page_size` (at least 1).
    pub fn take(&self, max_page_size: i64) -> i64 {
        let max_page_size = max_page_size.max(1);
        match self.take {
            Some(take) if take >= 0 => take.min(max_page_size),
            _ => max_page_size,
        }
    }

    /// Rows to skip; `None` when unset or negative.
    pub fn skip(&self) -> Option<i64> {
        self.skip.filter(|s| *s >= 0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPage<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl<T> DataPage<T> {
    pub fn new(data: Vec<T>, total: Option<i64>) -> Self {
        DataPage { data, total }
    }
}
