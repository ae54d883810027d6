//! Resource query and mutation descriptors.
//!
//! The target platform exposes a filterable, field-selectable resource model;
//! these types describe one read or write against it without committing to a
//! transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A filter expression against a resource field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Exact match: `field:eq:value`.
    Eq { field: String, value: String },
    /// Membership: `field:in:[a,b,c]`.
    In { field: String, values: Vec<String> },
    /// Case-sensitive substring: `field:like:value`.
    Like { field: String, value: String },
    /// Case-insensitive substring: `field:ilike:value`.
    Ilike { field: String, value: String },
}

impl Filter {
    /// Exact-match filter.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Membership filter.
    pub fn is_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Case-sensitive substring filter.
    pub fn like(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Like {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive substring filter.
    pub fn ilike(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Ilike {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Render into the target platform's `field:op:value` grammar.
    pub fn render(&self) -> String {
        match self {
            Filter::Eq { field, value } => format!("{field}:eq:{value}"),
            Filter::In { field, values } => format!("{field}:in:[{}]", values.join(",")),
            Filter::Like { field, value } => format!("{field}:like:{value}"),
            Filter::Ilike { field, value } => format!("{field}:ilike:{value}"),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// How multiple filters combine at the query root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RootJunction {
    /// All filters must match.
    #[default]
    And,
    /// Any filter may match.
    Or,
}

impl RootJunction {
    /// Query-parameter value expected by the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            RootJunction::And => "AND",
            RootJunction::Or => "OR",
        }
    }
}

/// A read against one resource collection.
#[derive(Debug, Clone)]
pub struct ResourceQuery {
    /// Resource path, e.g. `organisationUnits` or `dataStore/Dhis2-MFRApproval`.
    pub resource: String,
    /// Field selection expression; empty means the platform default.
    pub fields: Option<String>,
    /// Filters, combined per `root_junction`.
    pub filters: Vec<Filter>,
    /// Filter combination at the root.
    pub root_junction: RootJunction,
    /// Page number (1-based); `None` disables paging.
    pub page: Option<u32>,
    /// Page size; only meaningful with `page`.
    pub page_size: Option<u32>,
}

impl ResourceQuery {
    /// Create an unfiltered, unpaged query for a resource.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            fields: None,
            filters: Vec::new(),
            root_junction: RootJunction::And,
            page: None,
            page_size: None,
        }
    }

    /// Set the field selection expression.
    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Add a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the root junction.
    #[must_use]
    pub fn with_root_junction(mut self, junction: RootJunction) -> Self {
        self.root_junction = junction;
        self
    }

    /// Request one page.
    #[must_use]
    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Render the query-string parameters in a stable order.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(ref fields) = self.fields {
            params.push(("fields".to_string(), fields.clone()));
        }
        for filter in &self.filters {
            params.push(("filter".to_string(), filter.render()));
        }
        if self.root_junction == RootJunction::Or {
            params.push(("rootJunction".to_string(), "OR".to_string()));
        }
        match (self.page, self.page_size) {
            (Some(page), Some(size)) => {
                params.push(("page".to_string(), page.to_string()));
                params.push(("pageSize".to_string(), size.to_string()));
            }
            _ => params.push(("paging".to_string(), "false".to_string())),
        }
        params
    }
}

/// Type of write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationType::Create => write!(f, "create"),
            MutationType::Update => write!(f, "update"),
            MutationType::Delete => write!(f, "delete"),
        }
    }
}

/// A write against one resource.
#[derive(Debug, Clone)]
pub struct ResourceMutation {
    /// Resource path.
    pub resource: String,
    /// Kind of write.
    pub mutation_type: MutationType,
    /// Object id appended to the path (updates and deletes of single objects).
    pub id: Option<String>,
    /// Request body; `None` for deletes.
    pub payload: Option<Value>,
}

impl ResourceMutation {
    /// POST a new object or bulk payload.
    pub fn create(resource: impl Into<String>, payload: Value) -> Self {
        Self {
            resource: resource.into(),
            mutation_type: MutationType::Create,
            id: None,
            payload: Some(payload),
        }
    }

    /// PUT an object or datastore key.
    pub fn update(resource: impl Into<String>, id: Option<String>, payload: Value) -> Self {
        Self {
            resource: resource.into(),
            mutation_type: MutationType::Update,
            id,
            payload: Some(payload),
        }
    }

    /// DELETE an object or datastore key.
    pub fn delete(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            mutation_type: MutationType::Delete,
            id: Some(id.into()),
            payload: None,
        }
    }

    /// Full path including the object id, when present.
    pub fn path(&self) -> String {
        match &self.id {
            Some(id) => format!("{}/{}", self.resource, id),
            None => self.resource.clone(),
        }
    }
}
