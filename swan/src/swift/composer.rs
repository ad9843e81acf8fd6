//! # Storage Operation URLs
//!
//! A SWAN write starts with a GET to the access node's create endpoint.
//! The query string carries the publisher's own parameters, whatever the
//! calling flow injects, and the dataset name. The access node answers
//! with the URL of the first hop of the signed-storage chain, which the
//! relay hands back untouched.
//!
//! Fields destined for storage are named `field<YYYY-MM-DD`, the date being
//! when the stored value expires. Internally that is a [`CompositeKey`];
//! the string form exists only in the query string.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, Utc};
use url::Url;

use super::client::{access_node_url, StorageOperationClient};
use super::resolver::AccessNodeResolver;
use crate::config::{
    COMPOSITE_DATE_FORMAT, CREATE_PATH, DATASET_TABLE, FETCH_EXPIRY_MONTHS, TABLE_PARAM,
};
use crate::error::{Result, SwanError};

// ---------------------------------------------------------------------------
// Query Parameters
// ---------------------------------------------------------------------------

/// Ordered multi-map of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, keeping any existing values for `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.pairs.retain(|(n, _)| *n != name);
        self.pairs.push((name, value.into()));
    }

    /// Removes every value of `name`, returning the first one.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let first = self.get(name).map(str::to_string);
        self.pairs.retain(|(n, _)| n != name);
        first
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Writes every pair into `url`'s query string, replacing what was
    /// there.
    pub fn apply_to(&self, url: &mut Url) {
        url.set_query(None);
        if self.pairs.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (name, value) in &self.pairs {
            query.append_pair(name, value);
        }
    }
}

impl FromIterator<(String, String)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Composite Keys
// ---------------------------------------------------------------------------

/// A stored field together with the date its value expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    pub field: String,
    pub expires: NaiveDate,
}

impl CompositeKey {
    pub fn new(field: impl Into<String>, expires: NaiveDate) -> Self {
        Self {
            field: field.into(),
            expires,
        }
    }
}

/// Serializes as `field<YYYY-MM-DD`.
impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<{}",
            self.field,
            self.expires.format(COMPOSITE_DATE_FORMAT)
        )
    }
}

/// The date fetch-created fields expire: today (UTC) plus
/// [`FETCH_EXPIRY_MONTHS`].
pub fn storage_expiry_date(now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    today
        .checked_add_months(Months::new(FETCH_EXPIRY_MONTHS))
        .unwrap_or(today)
}

/// Injection used by the fetch flow: a fresh common browser ID plus empty
/// `email` and `allow` placeholders, all expiring on `expires`.
pub fn inject_fetch_defaults(params: &mut QueryParams, expires: NaiveDate) {
    let cbid = uuid::Uuid::new_v4();
    params.set(CompositeKey::new("cbid", expires).to_string(), cbid.to_string());
    params.set(CompositeKey::new("email", expires).to_string(), "");
    params.set(CompositeKey::new("allow", expires).to_string(), "");
}

/// Fields the update flow lifts from plain parameters into stored fields.
pub const UPDATE_FIELDS: [&str; 3] = ["cbid", "email", "allow"];

/// Injection used by the update flow: every plain `cbid`, `email` or
/// `allow` parameter becomes a stored field expiring on `expires`.
pub fn inject_update_values(params: &mut QueryParams, expires: NaiveDate) {
    for field in UPDATE_FIELDS {
        if let Some(value) = params.remove(field) {
            params.set(CompositeKey::new(field, expires).to_string(), value);
        }
    }
}

// ---------------------------------------------------------------------------
// Composer
// ---------------------------------------------------------------------------

/// Builds create URLs against the resolved access node and issues them.
#[derive(Clone)]
pub struct StorageUrlComposer {
    scheme: String,
    resolver: Arc<AccessNodeResolver>,
    client: Arc<dyn StorageOperationClient>,
}

impl StorageUrlComposer {
    pub fn new(
        scheme: &str,
        resolver: Arc<AccessNodeResolver>,
        client: Arc<dyn StorageOperationClient>,
    ) -> Self {
        Self {
            scheme: scheme.to_string(),
            resolver,
            client,
        }
    }

    /// Builds the create URL without calling it.
    ///
    /// `inject` runs after the publisher parameters are in place; the
    /// dataset name is set last and always wins.
    pub async fn build_url<F>(&self, mut params: QueryParams, inject: F) -> Result<Url>
    where
        F: FnOnce(&mut QueryParams),
    {
        let node = self.resolver.resolve().await?;
        let mut url = access_node_url(&self.scheme, &node)?;
        url.set_path(CREATE_PATH);

        inject(&mut params);
        params.set(TABLE_PARAM, DATASET_TABLE);
        params.apply_to(&mut url);
        Ok(url)
    }

    /// Builds the create URL, calls it, and returns the next-hop URL.
    pub async fn create_storage_operation_url<F>(
        &self,
        params: QueryParams,
        inject: F,
    ) -> Result<String>
    where
        F: FnOnce(&mut QueryParams),
    {
        let url = self.build_url(params, inject).await?;
        let next = self.client.create_operation(&url).await?;
        if next.trim().is_empty() {
            return Err(SwanError::Upstream {
                url: url.to_string(),
                status: 200,
                body: next,
            });
        }
        Ok(next)
    }
}
