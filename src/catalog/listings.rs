use crate::catalog::config::{
    APP_TYPE, CURRENCY, DEST, LISTINGS_USER_AGENT, LOCALE, NO_DISCOUNT, SORT, SPP,
};
use crate::http::{RetryError, RetryPolicy, retry};
use reqwest::{Client, header};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ListingsError {
    #[error("listings request failed: {0}")]
    Request(String),
    #[error("listings endpoint returned HTTP {0}")]
    Status(u16),
    #[error("listings payload could not be parsed: {0}")]
    Parse(String),
}

/// Query parameters that are the same for every page of every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingParams {
    pub app_type: u32,
    pub currency: String,
    pub dest: String,
    pub locale: String,
    pub sort: String,
    pub spp: u32,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            app_type: APP_TYPE,
            currency: CURRENCY.as_str().to_string(),
            dest: DEST.as_str().to_string(),
            locale: LOCALE.as_str().to_string(),
            sort: SORT.to_string(),
            spp: SPP,
        }
    }
}

/// One page request for a resolved category.
#[derive(Debug, Clone, Copy)]
pub struct PageQuery<'a> {
    pub page: u32,
    pub shard: &'a str,
    pub query: &'a str,
    pub low_price: u64,
    pub top_price: u64,
    pub discount: Option<u8>,
}

impl PageQuery<'_> {
    /// `priceU` bound pair in minor units.
    pub fn price_band(&self) -> String {
        format!(
            "{};{}",
            self.low_price.saturating_mul(100),
            self.top_price.saturating_mul(100)
        )
    }

    pub fn discount_param(&self) -> String {
        self.discount
            .map(|value| value.to_string())
            .unwrap_or_else(|| NO_DISCOUNT.to_string())
    }

    /// The category query fragment is opaque and goes in verbatim, so the
    /// URL is assembled by hand rather than through an encoder.
    pub fn url(&self, root: &str, params: &ListingParams) -> String {
        format!(
            "{root}/catalog/{shard}/catalog?appType={app_type}&curr={curr}&dest={dest}&locale={locale}&page={page}&priceU={price}&sort={sort}&spp={spp}&{query}&discount={discount}",
            root = root.trim_end_matches('/'),
            shard = self.shard,
            app_type = params.app_type,
            curr = params.currency,
            dest = params.dest,
            locale = params.locale,
            page = self.page,
            price = self.price_band(),
            sort = params.sort,
            spp = params.spp,
            query = self.query,
            discount = self.discount_param(),
        )
    }
}

async fn fetch_once(client: &Client, url: &str, page: u32) -> Result<Value, ListingsError> {
    let response = client
        .get(url)
        .header(header::USER_AGENT, LISTINGS_USER_AGENT)
        .send()
        .await
        .map_err(|err| ListingsError::Request(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ListingsError::Status(status.as_u16()));
    }
    info!(target = "wb.listings", status = status.as_u16(), page, "page_received");

    response
        .json::<Value>()
        .await
        .map_err(|err| ListingsError::Parse(err.to_string()))
}

/// Fetches one listings page, retrying any failure per `policy`.
pub async fn fetch_page(
    client: &Client,
    root: &str,
    params: &ListingParams,
    query: &PageQuery<'_>,
    policy: RetryPolicy,
) -> Result<Value, RetryError<ListingsError>> {
    let url = query.url(root, params);
    let url = url.as_str();
    let page = query.page;
    retry(policy, "fetch_page", |_| fetch_once(client, url, page)).await
}
