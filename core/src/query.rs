//! Pagination and ledger query filters.

use crate::cache::CacheNamespace;
use crate::state::{OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A zero-based page request with a clamped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page number.
    pub page: u32,
    /// Page size, `1..=MAX_PAGE_SIZE`.
    pub size: u32,
}

impl PageRequest {
    /// Build a page request, clamping `size` into `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub const fn new(page: u32, size: u32) -> Self {
        let size = if size == 0 {
            DEFAULT_PAGE_SIZE
        } else if size > MAX_PAGE_SIZE {
            MAX_PAGE_SIZE
        } else {
            size
        };
        Self { page, size }
    }

    /// Row offset of this page.
    #[must_use]
    pub const fn offset(self) -> i64 {
        self.page as i64 * self.size as i64
    }

    /// Row limit of this page.
    #[must_use]
    pub const fn limit(self) -> i64 {
        self.size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page, newest first for ledger queries.
    pub items: Vec<T>,
    /// Zero-based page number.
    pub page: u32,
    /// Requested page size.
    pub size: u32,
    /// Total matching rows across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Whether this page carries no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Filter for ledger history queries.
///
/// Each filtered query is a pure function of its filter and page request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LedgerFilter {
    /// No filter: the full ledger.
    All,
    /// Entries for one product.
    Product(ProductId),
    /// Entries performed by one user.
    User(UserId),
    /// Entries caused by one order.
    Order(OrderId),
    /// Entries inside a closed timestamp range.
    ///
    /// Never cached: the parameter space is unbounded and would grow the
    /// cache without limit.
    DateRange {
        /// Inclusive start of the range.
        from: DateTime<Utc>,
        /// Inclusive end of the range.
        to: DateTime<Utc>,
    },
}

impl LedgerFilter {
    /// Cache key for this query, incorporating every filter parameter and
    /// the page number/size so distinct queries can never collide.
    ///
    /// Returns `None` for queries excluded from caching.
    #[must_use]
    pub fn cache_key(&self, page: PageRequest) -> Option<String> {
        let suffix = match self {
            Self::All => format!("all-{}-{}", page.page, page.size),
            Self::Product(id) => format!("product-{id}-{}-{}", page.page, page.size),
            Self::User(id) => format!("user-{id}-{}-{}", page.page, page.size),
            Self::Order(id) => format!("order-{id}-{}-{}", page.page, page.size),
            Self::DateRange { .. } => return None,
        };
        Some(CacheNamespace::Ledger.key(&suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_size() {
        assert_eq!(PageRequest::new(0, 0).size, DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(0, 500).size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(0, 25).size, 25);
    }

    #[test]
    fn page_offset_and_limit() {
        let page = PageRequest::new(3, 20);
        assert_eq!(page.offset(), 60);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn cache_keys_incorporate_all_parameters() {
        let product = ProductId::new();
        let a = LedgerFilter::Product(product).cache_key(PageRequest::new(0, 20));
        let b = LedgerFilter::Product(product).cache_key(PageRequest::new(1, 20));
        let c = LedgerFilter::Product(product).cache_key(PageRequest::new(0, 50));
        assert!(a.is_some());
        assert_ne!(a, b);
        assert_ne!(a, c);

        let other = LedgerFilter::Product(ProductId::new()).cache_key(PageRequest::new(0, 20));
        assert_ne!(a, other);
    }

    #[test]
    fn distinct_filters_never_collide() {
        let id = uuid::Uuid::new_v4();
        let page = PageRequest::default();
        let by_product = LedgerFilter::Product(ProductId(id)).cache_key(page);
        let by_user = LedgerFilter::User(UserId(id)).cache_key(page);
        let by_order = LedgerFilter::Order(OrderId(id)).cache_key(page);
        assert_ne!(by_product, by_user);
        assert_ne!(by_user, by_order);
    }

    #[test]
    fn date_range_queries_are_never_cached() {
        let filter = LedgerFilter::DateRange {
            from: Utc::now() - chrono::Duration::days(1),
            to: Utc::now(),
        };
        assert_eq!(filter.cache_key(PageRequest::default()), None);
    }
}
