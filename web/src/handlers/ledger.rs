//! Ledger history endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use stockpile_core::{
    LedgerEntry, LedgerFilter, OrderId, Page, PageRequest, ProductId, UserId,
};

/// Query parameters for ledger history.
///
/// At most one filter dimension may be supplied: `product_id`, `user_id`,
/// `order_id`, or the `from`/`to` pair. None at all means the full ledger.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    /// Filter to one product's history.
    pub product_id: Option<ProductId>,
    /// Filter to one user's actions.
    pub user_id: Option<UserId>,
    /// Filter to one order's entries.
    pub order_id: Option<OrderId>,
    /// Inclusive start of a timestamp range; requires `to`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive end of a timestamp range; requires `from`.
    pub to: Option<DateTime<Utc>>,
    /// Zero-based page number.
    #[serde(default)]
    pub page: u32,
    /// Page size; clamped server-side.
    #[serde(default)]
    pub size: u32,
}

impl LedgerQuery {
    fn filter(&self) -> Result<LedgerFilter, AppError> {
        let dimensions = usize::from(self.product_id.is_some())
            + usize::from(self.user_id.is_some())
            + usize::from(self.order_id.is_some())
            + usize::from(self.from.is_some() || self.to.is_some());
        if dimensions > 1 {
            return Err(AppError::bad_request(
                "At most one ledger filter may be supplied",
            ));
        }

        if let Some(product_id) = self.product_id {
            return Ok(LedgerFilter::Product(product_id));
        }
        if let Some(user_id) = self.user_id {
            return Ok(LedgerFilter::User(user_id));
        }
        if let Some(order_id) = self.order_id {
            return Ok(LedgerFilter::Order(order_id));
        }
        match (self.from, self.to) {
            (Some(from), Some(to)) => {
                if from > to {
                    return Err(AppError::bad_request("`from` must not be after `to`"));
                }
                Ok(LedgerFilter::DateRange { from, to })
            }
            (None, None) => Ok(LedgerFilter::All),
            _ => Err(AppError::bad_request(
                "Date-range queries require both `from` and `to`",
            )),
        }
    }
}

/// `GET /api/v1/ledger`
///
/// Paginated, newest first. Unknown ids are not an error; they match no
/// entries.
pub async fn query_ledger(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Page<LedgerEntry>>, AppError> {
    let filter = query.filter()?;
    let page = PageRequest::new(query.page, query.size);
    let result = state.ledger.query(&filter, page).await?;
    Ok(Json(result))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn empty_query() -> LedgerQuery {
        LedgerQuery {
            product_id: None,
            user_id: None,
            order_id: None,
            from: None,
            to: None,
            page: 0,
            size: 0,
        }
    }

    #[test]
    fn no_parameters_means_the_full_ledger() {
        let filter = empty_query().filter().expect("filter");
        assert_eq!(filter, LedgerFilter::All);
    }

    #[test]
    fn combined_filters_are_rejected() {
        let query = LedgerQuery {
            product_id: Some(ProductId::new()),
            user_id: Some(UserId::new()),
            ..empty_query()
        };
        assert!(query.filter().is_err());
    }

    #[test]
    fn half_open_date_ranges_are_rejected() {
        let query = LedgerQuery {
            from: Some(Utc::now()),
            ..empty_query()
        };
        assert!(query.filter().is_err());
    }

    #[test]
    fn inverted_date_ranges_are_rejected() {
        let query = LedgerQuery {
            from: Some(Utc::now()),
            to: Some(Utc::now() - chrono::Duration::hours(1)),
            ..empty_query()
        };
        assert!(query.filter().is_err());
    }
}
