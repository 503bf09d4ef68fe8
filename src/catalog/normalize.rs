use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Listing fields as the catalog sends them. Types drift between
/// categories, so every field is kept loose until normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    id: Option<Value>,
    name: Option<Value>,
    price_u: Option<Value>,
    sale_price_u: Option<Value>,
    feedback_points: Option<Value>,
    sale: Option<Value>,
    brand: Option<Value>,
    rating: Option<Value>,
    supplier: Option<Value>,
    supplier_rating: Option<Value>,
    feedbacks: Option<Value>,
    review_rating: Option<Value>,
    promo_text_card: Option<Value>,
    promo_text_cat: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub price: i64,
    pub sale_price: i64,
    pub cashback: Option<i64>,
    pub sale: Option<i64>,
    pub brand: Option<String>,
    pub rating: Option<f64>,
    pub supplier: Option<String>,
    pub supplier_rating: Option<f64>,
    pub feedbacks: Option<u64>,
    pub review_rating: Option<f64>,
    pub promo_text_card: Option<String>,
    pub promo_text_cat: Option<String>,
    pub link: String,
}

/// Major units, floored. Missing or non-numeric input counts as zero.
pub fn minor_to_major(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                v.div_euclid(100)
            } else if let Some(v) = n.as_u64() {
                (v / 100) as i64
            } else {
                n.as_f64().map(|v| (v / 100.0).floor() as i64).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

/// Storefront link for a listing id, passed through as sent. A missing id
/// still yields a link, with `None` in its place.
pub fn product_link(site_root: &str, id: Option<&Value>) -> String {
    let id = match id {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    format!(
        "{}/catalog/{id}/detail.aspx?targetUrl=BP",
        site_root.trim_end_matches('/')
    )
}

fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn int(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v.trunc() as i64))
}

fn float(value: Option<&Value>) -> Option<f64> {
    value?.as_f64()
}

fn normalize_one(raw: RawListing, site_root: &str) -> NormalizedRecord {
    let link = product_link(site_root, raw.id.as_ref());
    NormalizedRecord {
        id: raw.id.filter(|v| !v.is_null()),
        name: text(raw.name),
        price: minor_to_major(raw.price_u.as_ref()),
        sale_price: minor_to_major(raw.sale_price_u.as_ref()),
        cashback: int(raw.feedback_points.as_ref()),
        sale: int(raw.sale.as_ref()),
        brand: text(raw.brand),
        rating: float(raw.rating.as_ref()),
        supplier: text(raw.supplier),
        supplier_rating: float(raw.supplier_rating.as_ref()),
        feedbacks: raw.feedbacks.as_ref().and_then(Value::as_u64),
        review_rating: float(raw.review_rating.as_ref()),
        promo_text_card: text(raw.promo_text_card),
        promo_text_cat: text(raw.promo_text_cat),
        link,
    }
}

/// Maps `data.products` of a listings page to records. A page without
/// products is an empty result, not an error.
pub fn normalize_page(body: &Value, site_root: &str) -> Vec<NormalizedRecord> {
    let products = body
        .get("data")
        .and_then(|data| data.get("products"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if products.is_empty() {
        warn!(target = "wb.listings", "page_has_no_products");
        return Vec::new();
    }

    products
        .iter()
        .map(|item| {
            let raw = RawListing::deserialize(item).unwrap_or_else(|err| {
                warn!(target = "wb.listings", error = %err, "listing_not_an_object");
                RawListing::default()
            });
            normalize_one(raw, site_root)
        })
        .collect()
}
