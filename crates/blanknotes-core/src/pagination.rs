//! Pagination query normalization
//!
//! List endpoints accept `sort`, `order`, `limit` and `page` straight from
//! the query string. Out-of-range values are clamped and unknown sort keys
//! fall back to defaults instead of being rejected, so a listing request
//! never fails on its paging parameters.

use serde::{Deserialize, Serialize};

/// Largest page size a client may ask for
pub const MAX_LIMIT: u32 = 100;

/// Page size used when the client asks for less than one row
pub const DEFAULT_LIMIT: u32 = 10;

/// Sort column used when the requested one is not allowed
pub const DEFAULT_SORT: &str = "created_at";

/// Raw paging parameters as sent by the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// Normalized paging parameters plus result totals.
///
/// `sort` is always one of the allowed columns handed to
/// [`PageRequest::normalize`], so storage backends may interpolate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub sort: String,
    pub order: String,
    pub total_records: u64,
    pub total_page: u32,
    pub limit: u32,
    pub page: u32,
}

impl Metadata {
    /// Rows to skip before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn is_descending(&self) -> bool {
        self.order == "desc"
    }
}

impl PageRequest {
    /// Clamp the request against `total_records` rows.
    ///
    /// Rules: limit above [`MAX_LIMIT`] becomes [`MAX_LIMIT`], below 1
    /// becomes [`DEFAULT_LIMIT`]; the page is clamped to
    /// `1..=total_page` where `total_page` is at least 1; a sort column not
    /// in `allowed_sorts` becomes [`DEFAULT_SORT`]; an order other than
    /// `asc`/`desc` becomes `asc`.
    pub fn normalize(&self, total_records: u64, allowed_sorts: &[&str]) -> Metadata {
        let limit = match self.limit.unwrap_or(0) {
            l if l > MAX_LIMIT => MAX_LIMIT,
            0 => DEFAULT_LIMIT,
            l => l,
        };

        let total_page = total_records
            .div_ceil(u64::from(limit))
            .clamp(1, u64::from(u32::MAX)) as u32;

        let page = self.page.unwrap_or(1).clamp(1, total_page);

        let sort = self
            .sort
            .as_deref()
            .filter(|s| allowed_sorts.contains(s))
            .unwrap_or(DEFAULT_SORT)
            .to_string();

        let order = match self.order.as_deref().map(str::to_lowercase).as_deref() {
            Some("desc") => "desc",
            _ => "asc",
        }
        .to_string();

        Metadata {
            sort,
            order,
            total_records,
            total_page,
            limit,
            page,
        }
    }
}

/// One page of results together with its metadata
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub metadata: Metadata,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            metadata: self.metadata,
        }
    }
}
