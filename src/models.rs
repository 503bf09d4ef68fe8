use crate::catalog::CategoryDescriptor;
use crate::catalog::normalize::NormalizedRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Caller input for one catalog run. Defaults match the storefront form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineRequest {
    pub url: String,
    #[serde(default = "PipelineRequest::default_low_price")]
    pub low_price: u64,
    #[serde(default = "PipelineRequest::default_top_price")]
    pub top_price: u64,
    /// `null` sends the catalog's "no discount" sentinel.
    #[serde(default = "PipelineRequest::default_discount")]
    pub discount: Option<u8>,
}

/// Upper bound of the price band, in major units.
pub const MAX_PRICE: u64 = 1_000_000;

impl PipelineRequest {
    pub fn new(url: impl Into<String>, low_price: u64, top_price: u64, discount: u8) -> Self {
        Self {
            url: url.into(),
            low_price,
            top_price,
            discount: Some(discount),
        }
    }

    fn default_low_price() -> u64 {
        1
    }

    fn default_top_price() -> u64 {
        MAX_PRICE
    }

    fn default_discount() -> Option<u8> {
        Some(0)
    }

    /// Returns the offending field name when a bound is violated.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.url.trim().is_empty() {
            return Err("url_missing");
        }
        if self.low_price < 1 {
            return Err("low_price_below_one");
        }
        if self.top_price < self.low_price {
            return Err("top_price_below_low_price");
        }
        if self.top_price > MAX_PRICE {
            return Err("top_price_above_max");
        }
        if self.discount.is_some_and(|d| d > 100) {
            return Err("discount_out_of_range");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductsResponse {
    pub run_id: String,
    pub category: CategoryDescriptor,
    pub pages: Vec<PageReport>,
    pub total: usize,
    pub records: Vec<NormalizedRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PageReport {
    pub page: u32,
    pub records: usize,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
}

impl PageReport {
    pub fn new(page: u32, records: usize, elapsed_ms: u128) -> Self {
        Self {
            page,
            records,
            elapsed_ms,
            timestamp: Utc::now(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub kind: Option<String>,
    pub detail: Option<String>,
}
