use crate::catalog::config::TAXONOMY_USER_AGENT;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy request failed: {0}")]
    Request(String),
    #[error("taxonomy endpoint returned HTTP {0}")]
    Status(u16),
    #[error("taxonomy payload could not be parsed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub name: String,
    pub shard: Option<String>,
    pub url_suffix: String,
    pub query_suffix: Option<String>,
}

impl CategoryDescriptor {
    /// Reads a menu object without rejecting it: non-string fields are
    /// rendered as their JSON text, `null` counts as absent.
    fn from_node(node: &Map<String, Value>) -> Self {
        Self {
            name: field(node, "name").unwrap_or_default(),
            shard: field(node, "shard"),
            url_suffix: field(node, "url").unwrap_or_default(),
            query_suffix: field(node, "query"),
        }
    }
}

fn field(node: &Map<String, Value>, key: &str) -> Option<String> {
    match node.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parses a menu payload. Nesting depth is not capped, since the menu is
/// walked iteratively afterwards.
pub fn parse_taxonomy(bytes: &[u8]) -> Result<Value, TaxonomyError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let tree = Value::deserialize(&mut deserializer)
        .map_err(|err| TaxonomyError::Parse(err.to_string()))?;
    deserializer
        .end()
        .map_err(|err| TaxonomyError::Parse(err.to_string()))?;
    Ok(tree)
}

pub async fn fetch_taxonomy(client: &Client, url: &str) -> Result<Value, TaxonomyError> {
    let response = client
        .get(url)
        .header(header::ACCEPT, "*/*")
        .header(header::USER_AGENT, TAXONOMY_USER_AGENT)
        .send()
        .await
        .map_err(|err| TaxonomyError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(TaxonomyError::Status(response.status().as_u16()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| TaxonomyError::Request(err.to_string()))?;
    parse_taxonomy(&bytes)
}

/// Walks the tree with an explicit stack and emits one descriptor per
/// object node, parents included. Arrays are descended, as is `childs` when
/// it holds an array. Output order is not meaningful.
pub fn flatten(root: &Value) -> Vec<CategoryDescriptor> {
    let mut out = Vec::new();
    let mut skipped = 0usize;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node {
            Value::Object(category) => {
                out.push(CategoryDescriptor::from_node(category));
                match category.get("childs") {
                    Some(Value::Array(children)) => stack.extend(children.iter()),
                    Some(Value::Null) | None => {}
                    Some(other) => stack.push(other),
                }
            }
            Value::Array(items) => stack.extend(items.iter()),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(target = "wb.taxonomy", skipped, "taxonomy_scalars_skipped");
    }
    debug!(target = "wb.taxonomy", descriptors = out.len(), "taxonomy_flattened");
    out
}

/// Path part of a storefront URL: everything after the last occurrence of
/// `site_root`, or the whole input when the origin is absent.
pub fn url_path<'a>(url: &'a str, site_root: &str) -> &'a str {
    if site_root.is_empty() {
        return url;
    }
    url.rsplit(site_root).next().unwrap_or(url)
}

/// First descriptor whose `url_suffix` equals the path of `url` exactly.
pub fn resolve<'a>(
    url: &str,
    site_root: &str,
    catalog: &'a [CategoryDescriptor],
) -> Option<&'a CategoryDescriptor> {
    let path = url_path(url, site_root);
    let found = catalog.iter().find(|entry| entry.url_suffix == path);
    if let Some(entry) = found {
        info!(target = "wb.taxonomy", name = %entry.name, url = %entry.url_suffix, "category_matched");
    }
    found
}
