//! In-process stand-ins for the menu and listings endpoints.

use crate::catalog::listings::ListingParams;
use crate::http::RetryPolicy;
use crate::pipeline::PipelineConfig;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Clone)]
pub struct StubCatalog {
    taxonomy: Value,
    taxonomy_status: StatusCode,
    pages: Vec<Value>,
    endless: bool,
    failing_pages: usize,
}

impl StubCatalog {
    /// One "Test" category and a first page with `products` listings.
    pub fn single_page(products: usize) -> Self {
        Self {
            taxonomy: json!([{
                "name": "Test",
                "shard": "test-shard",
                "url": "/catalog/test",
                "query": "cat=1"
            }]),
            taxonomy_status: StatusCode::OK,
            pages: vec![products_page(products, 1)],
            endless: false,
            failing_pages: 0,
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: Value) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn with_pages(mut self, pages: Vec<Value>) -> Self {
        self.pages = pages;
        self
    }

    /// Pages past the configured ones repeat the last one.
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// The first `count` listings requests answer 503.
    pub fn failing_pages(mut self, count: usize) -> Self {
        self.failing_pages = count;
        self
    }

    pub fn taxonomy_down(mut self) -> Self {
        self.taxonomy_status = StatusCode::INTERNAL_SERVER_ERROR;
        self
    }

    fn page(&self, number: usize) -> Value {
        let index = number.saturating_sub(1);
        match self.pages.get(index) {
            Some(page) => page.clone(),
            None if self.endless => self.pages.last().cloned().unwrap_or_else(empty_page),
            None => empty_page(),
        }
    }
}

pub fn empty_page() -> Value {
    json!({"data": {"products": []}})
}

pub fn products_page(count: usize, first_id: u64) -> Value {
    let products: Vec<Value> = (0..count as u64)
        .map(|i| {
            json!({
                "id": first_id + i,
                "name": format!("Товар {}", first_id + i),
                "priceU": 30000,
                "salePriceU": 90150,
                "feedbackPoints": 0,
                "sale": 20,
                "brand": "Acme",
                "rating": 5,
                "supplier": "Supplier",
                "supplierRating": 4.9,
                "feedbacks": 10,
                "reviewRating": 4.8
            })
        })
        .collect();
    json!({"state": 0, "data": {"products": products}})
}

struct StubState {
    catalog: StubCatalog,
    taxonomy_hits: AtomicUsize,
    page_hits: AtomicUsize,
    last_query: Mutex<Option<HashMap<String, String>>>,
    last_shard: Mutex<Option<String>>,
    taxonomy_headers: Mutex<HeaderMap>,
    listings_headers: Mutex<HeaderMap>,
}

pub struct StubServer {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubServer {
    pub fn taxonomy_url(&self) -> String {
        format!("{}/menu.json", self.base_url)
    }

    pub fn taxonomy_hits(&self) -> usize {
        self.state.taxonomy_hits.load(Ordering::SeqCst)
    }

    pub fn page_hits(&self) -> usize {
        self.state.page_hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<HashMap<String, String>> {
        self.state.last_query.lock().unwrap().clone()
    }

    pub fn last_discount(&self) -> Option<String> {
        self.last_query()?.get("discount").cloned()
    }

    pub fn last_shard(&self) -> Option<String> {
        self.state.last_shard.lock().unwrap().clone()
    }

    /// Header `name` on the latest menu request.
    pub fn taxonomy_header(&self, name: &str) -> Option<String> {
        header_value(&self.state.taxonomy_headers, name)
    }

    /// Header `name` on the latest listings request.
    pub fn listings_header(&self, name: &str) -> Option<String> {
        header_value(&self.state.listings_headers, name)
    }

    /// Loopback client that ignores any proxy set in the environment.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("stub client")
    }

    /// Pipeline settings aimed at this stub, without retry delay.
    pub fn config(&self, max_pages: u32) -> PipelineConfig {
        PipelineConfig {
            taxonomy_url: self.taxonomy_url(),
            catalog_root: self.base_url.clone(),
            site_root: "https://www.wildberries.ru".to_string(),
            listing: ListingParams::default(),
            max_pages,
            retry: RetryPolicy::new(5, Duration::ZERO),
        }
    }
}

fn header_value(headers: &Mutex<HeaderMap>, name: &str) -> Option<String> {
    headers
        .lock()
        .unwrap()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn menu(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.taxonomy_hits.fetch_add(1, Ordering::SeqCst);
    *state.taxonomy_headers.lock().unwrap() = headers;
    if state.catalog.taxonomy_status != StatusCode::OK {
        return state.catalog.taxonomy_status.into_response();
    }
    Json(state.catalog.taxonomy.clone()).into_response()
}

async fn listings(
    State(state): State<Arc<StubState>>,
    Path(shard): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let hit = state.page_hits.fetch_add(1, Ordering::SeqCst);
    *state.listings_headers.lock().unwrap() = headers;
    let page = params
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(1);
    *state.last_query.lock().unwrap() = Some(params);
    *state.last_shard.lock().unwrap() = Some(shard);
    if hit < state.catalog.failing_pages {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(state.catalog.page(page)).into_response()
}

pub async fn spawn_stub(catalog: StubCatalog) -> StubServer {
    let state = Arc::new(StubState {
        catalog,
        taxonomy_hits: AtomicUsize::new(0),
        page_hits: AtomicUsize::new(0),
        last_query: Mutex::new(None),
        last_shard: Mutex::new(None),
        taxonomy_headers: Mutex::new(HeaderMap::new()),
        listings_headers: Mutex::new(HeaderMap::new()),
    });
    let app = Router::new()
        .route("/menu.json", get(menu))
        .route("/catalog/{shard}/catalog", get(listings))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    StubServer {
        base_url: format!("http://{addr}"),
        state,
    }
}
