//! Row access over named relations: filterable reads plus insert, update
//! and delete. Filters accumulate on a builder and render as query
//! parameters; rows come back as [`serde_json::Value`] and are mapped to
//! typed entities by the caller.

use std::fmt::Display;

use reqwest::Method;
use serde_json::Value;

use crate::Backend;
use crate::error::{Result, check_status};

impl Backend {
    /// Start a query against `relation`.
    pub fn table(&self, relation: &str) -> QueryBuilder {
        QueryBuilder {
            backend: self.clone(),
            relation: relation.to_string(),
            params: Vec::new(),
        }
    }
}

pub struct QueryBuilder {
    backend: Backend,
    relation: String,
    params: Vec<(String, String)>,
}

impl QueryBuilder {
    /// Column projection, including embedded relations
    /// (`"id, user:user_id(id, username)"`).
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.into(), format!("eq.{value}")));
        self
    }

    pub fn in_(mut self, column: &str, values: impl IntoIterator<Item = impl Display>) -> Self {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.params.push((column.into(), format!("in.({joined})")));
        self
    }

    pub fn like(mut self, column: &str, pattern: &str) -> Self {
        self.params.push((column.into(), format!("like.{pattern}")));
        self
    }

    /// Disjunction of filters, e.g. `"user_id.eq.<id>,contact_id.eq.<id>"`.
    pub fn or(mut self, filters: &str) -> Self {
        self.params.push(("or".into(), format!("({filters})")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".into(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, count: u32) -> Self {
        self.params.push(("limit".into(), count.to_string()));
        self
    }

    /// Offset pagination: `count` rows starting at `offset`.
    pub fn range(mut self, offset: u32, count: u32) -> Self {
        self.params.push(("offset".into(), offset.to_string()));
        self.params.push(("limit".into(), count.to_string()));
        self
    }

    /// Fetch all matching rows.
    pub async fn fetch(self) -> Result<Vec<Value>> {
        let response = self.request(Method::GET).await?.send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Fetch at most one row; `None` when nothing matches.
    pub async fn fetch_maybe(self) -> Result<Option<Value>> {
        let mut rows = self.limit(1).fetch().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Insert one or more rows; returns the stored representation.
    pub async fn insert(self, rows: Value) -> Result<Vec<Value>> {
        let response = self
            .request(Method::POST)
            .await?
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Update every row matching the accumulated filters.
    pub async fn update(self, patch: Value) -> Result<Vec<Value>> {
        let response = self
            .request(Method::PATCH)
            .await?
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Delete every row matching the accumulated filters.
    pub async fn delete(self) -> Result<Vec<Value>> {
        let response = self
            .request(Method::DELETE)
            .await?
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.backend.config().base_url,
            self.relation
        )
    }

    async fn request(&self, method: Method) -> Result<reqwest::RequestBuilder> {
        let bearer = self.backend.bearer().await;
        Ok(self
            .backend
            .http()
            .request(method, self.endpoint())
            .header("apikey", &self.backend.config().anon_key)
            .bearer_auth(bearer)
            .query(&self.params))
    }
}
