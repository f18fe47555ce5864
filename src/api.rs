use derive_more::{Display, Error};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub static DEFAULT_BASE_URL: &str = "https://api.escuelajs.co/api/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub price: f64,
    pub description: String,
    #[serde(rename = "categoryId")]
    pub category_id: i64,
    pub images: Vec<String>,
}

/// Failures are kept distinguishable so call sites can degrade
/// differently for unreachable upstream, rejected request, and
/// unreadable body.
#[derive(Debug, Display, Error)]
pub enum ApiError {
    #[display("Unable to reach the product API: {_0}")]
    Connect(reqwest::Error),
    #[error(ignore)]
    #[display("Server error {}", status.as_u16())]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[display("Invalid response from the product API: {_0}")]
    Decode(serde_json::Error),
}

impl ApiError {
    pub fn is_connect(&self) -> bool {
        matches!(self, ApiError::Connect(_))
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn list_products(
        &self,
        search: Option<&str>,
        category_id: Option<&str>,
    ) -> Result<Vec<Product>, ApiError> {
        let query = product_query(search, category_id);
        let resp = self
            .http
            .get(format!("{}/products", self.base))
            .query(&query)
            .send()
            .await
            .map_err(ApiError::Connect)?;
        decode(resp).await
    }

    pub async fn get_product(&self, id: i64) -> Result<Product, ApiError> {
        let resp = self
            .http
            .get(format!("{}/products/{id}", self.base))
            .send()
            .await
            .map_err(ApiError::Connect)?;
        decode(resp).await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        let resp = self
            .http
            .post(format!("{}/products/", self.base))
            .json(product)
            .send()
            .await
            .map_err(ApiError::Connect)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(ApiError::Connect)?;
        // The upstream answers a successful create with 201 specifically.
        if status != StatusCode::CREATED {
            return Err(ApiError::Status {
                status,
                message: parse_error_message(&body),
            });
        }
        serde_json::from_slice(&body).map_err(ApiError::Decode)
    }

    pub async fn update_product(
        &self,
        id: i64,
        payload: &serde_json::Value,
    ) -> Result<Product, ApiError> {
        let resp = self
            .http
            .put(format!("{}/products/{id}", self.base))
            .json(payload)
            .send()
            .await
            .map_err(ApiError::Connect)?;
        decode(resp).await
    }

    pub async fn delete_product(&self, id: i64) -> Result<(), ApiError> {
        let resp = self
            .http
            .delete(format!("{}/products/{id}", self.base))
            .send()
            .await
            .map_err(ApiError::Connect)?;
        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let body = resp.bytes().await.map_err(ApiError::Connect)?;
        Err(ApiError::Status {
            status,
            message: parse_error_message(&body),
        })
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let resp = self
            .http
            .get(format!("{}/categories", self.base))
            .send()
            .await
            .map_err(ApiError::Connect)?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(ApiError::Connect)?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            message: parse_error_message(&body),
        });
    }
    serde_json::from_slice(&body).map_err(ApiError::Decode)
}

fn product_query(search: Option<&str>, category_id: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        query.push(("title", search.to_string()));
    }
    if let Some(category_id) = category_id.map(str::trim).filter(|s| !s.is_empty()) {
        query.push(("categoryId", category_id.to_string()));
    }
    query
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<serde_json::Value>,
}

// Error bodies carry `message` either as a string or as an array of
// strings (validation errors).
fn parse_error_message(body: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(body).ok()?;
    match body.message? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => {
            let messages = items
                .into_iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join(", "))
            }
        }
        _ => None,
    }
}
