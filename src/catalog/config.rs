use once_cell::sync::Lazy;
use std::{env, time::Duration};

pub static TAXONOMY_URL: Lazy<String> = Lazy::new(|| {
    env::var("WB_TAXONOMY_URL").unwrap_or_else(|_| {
        "https://static-basket-01.wbbasket.ru/vol0/data/main-menu-ru-ru-v3.json".to_string()
    })
});

pub static CATALOG_ROOT: Lazy<String> = Lazy::new(|| {
    env::var("WB_CATALOG_ROOT")
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "https://catalog.wb.ru".to_string())
});

/// Storefront origin: stripped from user URLs and used for product links.
pub static SITE_ROOT: Lazy<String> = Lazy::new(|| {
    env::var("WB_SITE_ROOT")
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "https://www.wildberries.ru".to_string())
});

pub static DEST: Lazy<String> =
    Lazy::new(|| env::var("WB_DEST").unwrap_or_else(|_| "-1257786".to_string()));

pub static LOCALE: Lazy<String> =
    Lazy::new(|| env::var("WB_LOCALE").unwrap_or_else(|_| "ru".to_string()));

pub static CURRENCY: Lazy<String> =
    Lazy::new(|| env::var("WB_CURRENCY").unwrap_or_else(|_| "rub".to_string()));

pub const APP_TYPE: u32 = 1;
pub const SORT: &str = "popular";
pub const SPP: u32 = 0;

/// Upstream never serves more than this many pages per query.
pub const MAX_PAGES: u32 = 50;

pub const RETRY_ATTEMPTS: u32 = 5;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Sent as `discount=` when the caller gave no discount.
pub const NO_DISCOUNT: &str = "None";

pub const TAXONOMY_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
pub const LISTINGS_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0)";
