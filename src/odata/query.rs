//! OData query builder
//!
//! Turns filters, ordering and raw parameters into the system query options
//! (`$filter`, `$orderby`, `$select`) sent with a collection request.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// A single filter predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `field eq 'value'`
    Eq { field: String, value: String },
    /// `field ge <timestamp>`
    Ge { field: String, value: DateTime<Utc> },
    /// `field gt <timestamp>`
    Gt { field: String, value: DateTime<Utc> },
}

impl Filter {
    /// Equality against a string literal
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Inclusive lower bound on a timestamp
    pub fn ge(field: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::Ge {
            field: field.into(),
            value,
        }
    }

    /// Exclusive lower bound on a timestamp
    pub fn gt(field: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::Gt {
            field: field.into(),
            value,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { field, value } => {
                write!(f, "{field} eq '{}'", value.replace('\'', "''"))
            }
            Filter::Ge { field, value } => write!(f, "{field} ge {}", timestamp_literal(*value)),
            Filter::Gt { field, value } => write!(f, "{field} gt {}", timestamp_literal(*value)),
        }
    }
}

fn timestamp_literal(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Sort direction for `$orderby`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// A query against one entity set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Target entity set
    pub entity_set: String,
    /// Predicates, combined with `and`
    pub filters: Vec<Filter>,
    /// Ordering
    pub order_by: Option<(String, SortOrder)>,
    /// Projected attributes (empty selects everything)
    pub select: Vec<String>,
    /// Extra parameters passed through verbatim
    pub raw: Vec<(String, String)>,
}

impl Query {
    /// Query every row of an entity set
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            filters: Vec::new(),
            order_by: None,
            select: Vec::new(),
            raw: Vec::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add a non-system parameter such as `savedQuery=<id>`
    #[must_use]
    pub fn raw(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw.push((key.into(), value.into()));
        self
    }

    /// Query-string parameters for the first page
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.filters.is_empty() {
            let filter = self
                .filters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" and ");
            params.push(("$filter".to_string(), filter));
        }
        if let Some((field, order)) = &self.order_by {
            params.push(("$orderby".to_string(), format!("{field} {order}")));
        }
        if !self.select.is_empty() {
            params.push(("$select".to_string(), self.select.join(",")));
        }
        params.extend(self.raw.iter().cloned());
        params
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity_set)?;
        let params = self.to_params();
        for (i, (key, value)) in params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}
