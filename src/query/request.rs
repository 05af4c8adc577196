//! Request descriptors for paged and histogram queries
//!
//! A descriptor is a value object rebuilt on every parameter change. It owns
//! the compiled fragments and renders the `(path, query)` pair handed to the
//! data source.
//!
//! Paged query strings have the shape
//!
//! ```text
//! <filter fragment><date-range fragment>&limit=<n>&skip=<offset>&count
//! ```
//!
//! with the leading `&` removed.

use crate::error::{Error, Result};
use crate::filter::{join_tokens, FilterDraft, TOKEN_SEPARATOR};
use crate::types::DateRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters of one page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Collection path below the namespace, e.g. `tokens/transfers`
    pub entity_path: String,
    /// Active filters, in the order they were added
    #[serde(default)]
    pub filters: Vec<FilterDraft>,
    /// Optional look-back window on `created`
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Rows to skip
    #[serde(default)]
    pub offset: usize,
    /// Rows per page
    pub limit: usize,
}

impl PageQuery {
    /// Create a query for the first page of a collection
    pub fn new(entity_path: impl Into<String>, limit: usize) -> Self {
        Self {
            entity_path: entity_path.into(),
            filters: Vec::new(),
            date_range: None,
            offset: 0,
            limit,
        }
    }

    /// Add a filter
    pub fn filter(mut self, draft: FilterDraft) -> Self {
        self.filters.push(draft);
        self
    }

    /// Restrict to a date range
    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Select a zero-based page of `limit` rows
    ///
    /// The offset saturates at `usize::MAX`.
    pub fn page(mut self, page: usize) -> Self {
        self.offset = page.saturating_mul(self.limit);
        self
    }

    /// Set the raw offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Fully assembled page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Namespace the request is scoped to
    pub namespace: String,
    /// Collection path below the namespace
    pub entity_path: String,
    /// `&`-prefixed filter tokens
    pub filter_fragment: String,
    /// `&created=>=<epoch>` or empty
    pub date_range_fragment: String,
    /// Rows to skip
    pub offset: usize,
    /// Rows per page
    pub limit: usize,
}

impl RequestDescriptor {
    /// Compile a page query relative to `now`
    ///
    /// Fails if the entity path is empty or `limit` is outside
    /// `1..=max_limit`.
    pub fn build(
        namespace: &str,
        query: &PageQuery,
        now: DateTime<Utc>,
        max_limit: usize,
    ) -> Result<Self> {
        let entity_path = query.entity_path.trim_matches('/');
        if entity_path.is_empty() {
            return Err(Error::InvalidRequest("entity path is empty".to_string()));
        }
        if query.limit == 0 || query.limit > max_limit {
            return Err(Error::InvalidRequest(format!(
                "limit {} outside 1..={}",
                query.limit, max_limit
            )));
        }

        let tokens: Vec<_> = query.filters.iter().map(FilterDraft::compile_encoded).collect();
        let date_range_fragment = query
            .date_range
            .map(|range| join_tokens([&range.token(now)]))
            .unwrap_or_default();

        Ok(Self {
            namespace: namespace.to_string(),
            entity_path: entity_path.to_string(),
            filter_fragment: join_tokens(&tokens),
            date_range_fragment,
            offset: query.offset,
            limit: query.limit,
        })
    }

    /// Request path
    pub fn path(&self) -> String {
        format!("/namespaces/{}/{}", self.namespace, self.entity_path)
    }

    /// Query string without the leading `?`
    pub fn query(&self) -> String {
        let mut query = String::with_capacity(
            self.filter_fragment.len() + self.date_range_fragment.len() + 32,
        );
        query.push_str(&self.filter_fragment);
        query.push_str(&self.date_range_fragment);
        query.push_str(&format!(
            "{sep}limit={}{sep}skip={}{sep}count",
            self.limit,
            self.offset,
            sep = TOKEN_SEPARATOR
        ));
        query
            .strip_prefix(TOKEN_SEPARATOR)
            .map(str::to_string)
            .unwrap_or(query)
    }
}

/// Request for bucketed counts from the charts endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramRequest {
    /// Namespace the request is scoped to
    pub namespace: String,
    /// Charted collection, e.g. `tokentransfers`
    pub collection: String,
    /// Window start, Unix seconds
    pub start: i64,
    /// Window end, Unix seconds
    pub end: i64,
    /// Number of buckets
    pub buckets: usize,
}

impl HistogramRequest {
    /// Request covering a named range ending at `now`
    pub fn for_range(
        namespace: &str,
        collection: &str,
        range: DateRange,
        now: DateTime<Utc>,
        buckets: usize,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            collection: collection.to_string(),
            start: range.start_epoch(now),
            end: now.timestamp(),
            buckets: buckets.max(1),
        }
    }

    /// Request path
    pub fn path(&self) -> String {
        format!(
            "/namespaces/{}/charts/histogram/{}",
            self.namespace, self.collection
        )
    }

    /// Query string without the leading `?`
    pub fn query(&self) -> String {
        format!(
            "startTime={}&endTime={}&buckets={}",
            self.start, self.end, self.buckets
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_plain_page_query() {
        let query = PageQuery::new("tokens/transfers", 25).page(2);
        let desc = RequestDescriptor::build("default", &query, now(), 100).unwrap();

        assert_eq!(desc.path(), "/namespaces/default/tokens/transfers");
        assert_eq!(desc.query(), "limit=25&skip=50&count");
    }

    #[test]
    fn test_reserved_characters_in_values_are_encoded() {
        let query = PageQuery::new("events", 10)
            .filter(FilterDraft::new("topic", Operator::Eq, "#fff&limit=1 x"))
            .filter(FilterDraft::new("tx", Operator::Eq, "plain-id_1.2"));
        let desc = RequestDescriptor::build("ns1", &query, now(), 100).unwrap();

        assert_eq!(
            desc.query(),
            "topic==%23fff%26limit%3D1%20x&tx==plain-id_1.2&limit=10&skip=0&count"
        );
    }

    #[test]
    fn test_huge_page_number_saturates() {
        let query = PageQuery::new("events", 50).page(usize::MAX);
        assert_eq!(query.offset, usize::MAX);

        let desc = RequestDescriptor::build("ns1", &query, now(), 100).unwrap();
        assert_eq!(desc.query(), format!("limit=50&skip={}&count", usize::MAX));
    }

    #[test]
    fn test_filters_then_date_then_pagination() {
        let query = PageQuery::new("/events/", 10)
            .filter(FilterDraft::new("type", Operator::Eq, "transaction_submitted"))
            .filter(
                FilterDraft::new("topic", Operator::Contains, "Pay")
                    .case_insensitive(true),
            )
            .date_range(DateRange::LastHour);
        let desc = RequestDescriptor::build("ns1", &query, now(), 100).unwrap();

        assert_eq!(desc.entity_path, "events");
        assert_eq!(
            desc.filter_fragment,
            "&type==transaction_submitted&topic=:@Pay"
        );
        assert_eq!(desc.date_range_fragment, "&created=>=1699996400");
        assert_eq!(
            desc.query(),
            "type==transaction_submitted&topic=:@Pay&created=>=1699996400&limit=10&skip=0&count"
        );
    }

    #[test]
    fn test_limit_validation() {
        let too_big = PageQuery::new("events", 500);
        assert!(RequestDescriptor::build("ns1", &too_big, now(), 100).is_err());

        let zero = PageQuery::new("events", 0);
        assert!(RequestDescriptor::build("ns1", &zero, now(), 100).is_err());

        let no_path = PageQuery::new("/", 10);
        assert!(RequestDescriptor::build("ns1", &no_path, now(), 100).is_err());
    }

    #[test]
    fn test_histogram_request() {
        let req = HistogramRequest::for_range(
            "ns1",
            "tokentransfers",
            DateRange::Last24Hours,
            now(),
            24,
        );
        assert_eq!(req.path(), "/namespaces/ns1/charts/histogram/tokentransfers");
        assert_eq!(
            req.query(),
            "startTime=1699913600&endTime=1700000000&buckets=24"
        );
    }
}
