//! List arguments: per-field filters, sort terms and pagination.
//!
//! Wire shapes:
//! - scalar field: `{operator, value}` (operator defaults to `EQ`)
//! - relation or embedded field: `{terms: [{operator, value, path}]}`
//! - `sort`: `{terms: [{field, order}]}`
//! - `pagination`: `{page, size, count}`

use std::fmt;
use std::str::FromStr;

use morph_core::{Document, Value};

use crate::{QueryError, QueryResult};

/// Filter comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Eq,
    Lt,
    Gt,
    Lte,
    Gte,
    /// Inclusive range from a two-element value.
    Btw,
    Ne,
    In,
    Nin,
    /// Unanchored substring match.
    Like,
}

impl Operator {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Lt => "LT",
            Operator::Gt => "GT",
            Operator::Lte => "LTE",
            Operator::Gte => "GTE",
            Operator::Btw => "BTW",
            Operator::Ne => "NE",
            Operator::In => "IN",
            Operator::Nin => "NIN",
            Operator::Like => "LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EQ" => Ok(Operator::Eq),
            "LT" => Ok(Operator::Lt),
            "GT" => Ok(Operator::Gt),
            "LTE" => Ok(Operator::Lte),
            "GTE" => Ok(Operator::Gte),
            "BTW" => Ok(Operator::Btw),
            "NE" => Ok(Operator::Ne),
            "IN" => Ok(Operator::In),
            "NIN" => Ok(Operator::Nin),
            "LIKE" => Ok(Operator::Like),
            other => Err(QueryError::invalid_argument(format!("unknown operator {}", other))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            other => Err(QueryError::invalid_argument(format!("unknown sort order {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub operator: Operator,
    pub value: Value,
}

/// A filter term addressed through a dotted path into a related or embedded entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFilterTerm {
    pub operator: Operator,
    pub value: Value,
    pub path: String,
}

/// The filter given for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Term(FilterTerm),
    Terms(Vec<PathFilterTerm>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
    pub count: bool,
}

impl Pagination {
    /// Documents to skip: `size × (page − 1)`. Saturates; wire input is
    /// bounds-checked when parsed.
    pub fn skip(&self) -> u64 {
        self.size.saturating_mul(self.page.saturating_sub(1))
    }

    /// Limit applied before the skip: `size + skip`.
    pub fn limit(&self) -> u64 {
        self.size.saturating_add(self.skip())
    }

    fn checked_limit(&self) -> Option<u64> {
        self.size
            .checked_mul(self.page.saturating_sub(1))
            .and_then(|skip| skip.checked_add(self.size))
    }

    /// Both page and size are set.
    pub fn is_active(&self) -> bool {
        self.page > 0 && self.size > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub field: String,
    pub order: SortOrder,
}

/// Parsed arguments of a list entry point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListArgs {
    /// Field filters in argument order.
    pub filters: Vec<(String, FieldFilter)>,
    pub pagination: Option<Pagination>,
    pub sort: Vec<SortTerm>,
}

impl ListArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.filters.push((
            field.into(),
            FieldFilter::Term(FilterTerm {
                operator,
                value: value.into(),
            }),
        ));
        self
    }

    pub fn filter_path(
        mut self,
        field: impl Into<String>,
        path: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        let field = field.into();
        let term = PathFilterTerm {
            operator,
            value: value.into(),
            path: path.into(),
        };
        match self.filters.iter_mut().find(|(name, _)| *name == field) {
            Some((_, FieldFilter::Terms(terms))) => terms.push(term),
            _ => self.filters.push((field, FieldFilter::Terms(vec![term]))),
        }
        self
    }

    pub fn paginate(mut self, page: u64, size: u64, count: bool) -> Self {
        self.pagination = Some(Pagination { page, size, count });
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortTerm {
            field: field.into(),
            order,
        });
        self
    }

    /// Whether a count was requested.
    pub fn wants_count(&self) -> bool {
        self.pagination.map(|p| p.count).unwrap_or(false)
    }

    /// Parse the wire form.
    pub fn from_document(args: &Document) -> QueryResult<Self> {
        let mut parsed = ListArgs::new();
        for (key, value) in args {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "pagination" => parsed.pagination = Some(parse_pagination(value)?),
                "sort" => parsed.sort = parse_sort(value)?,
                _ => parsed.filters.push((key.clone(), parse_filter(key, value)?)),
            }
        }
        Ok(parsed)
    }
}

fn object<'a>(value: &'a Value, what: &str) -> QueryResult<&'a Document> {
    value
        .as_object()
        .ok_or_else(|| QueryError::invalid_argument(format!("{} must be an object", what)))
}

fn parse_operator(doc: &Document) -> QueryResult<Operator> {
    match doc.get("operator") {
        None | Some(Value::Null) => Ok(Operator::Eq),
        Some(Value::String(name)) => name.parse(),
        Some(other) => Err(QueryError::invalid_argument(format!(
            "operator must be a name, got {}",
            other
        ))),
    }
}

fn parse_filter(field: &str, value: &Value) -> QueryResult<FieldFilter> {
    let doc = object(value, field)?;
    if let Some(terms) = doc.get("terms") {
        let terms = terms
            .as_list()
            .ok_or_else(|| QueryError::invalid_argument(format!("{}.terms must be a list", field)))?;
        return terms
            .iter()
            .map(|term| {
                let term = object(term, field)?;
                let path = term
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| QueryError::invalid_argument(format!("{} term without path", field)))?;
                Ok(PathFilterTerm {
                    operator: parse_operator(term)?,
                    value: term.get("value").cloned().unwrap_or_default(),
                    path: path.to_string(),
                })
            })
            .collect::<QueryResult<Vec<_>>>()
            .map(FieldFilter::Terms);
    }
    Ok(FieldFilter::Term(FilterTerm {
        operator: parse_operator(doc)?,
        value: doc.get("value").cloned().unwrap_or_default(),
    }))
}

fn parse_pagination(value: &Value) -> QueryResult<Pagination> {
    let doc = object(value, "pagination")?;
    let number = |key: &str| -> QueryResult<u64> {
        match doc.get(key).and_then(Value::as_int) {
            Some(n) if n >= 0 => Ok(n as u64),
            Some(n) => Err(QueryError::invalid_argument(format!("pagination.{} must not be negative, got {}", key, n))),
            None => Err(QueryError::invalid_argument(format!("pagination.{} is required", key))),
        }
    };
    let pagination = Pagination {
        page: number("page")?,
        size: number("size")?,
        count: doc.get("count").and_then(Value::as_bool).unwrap_or(false),
    };
    if pagination.checked_limit().is_none() {
        return Err(QueryError::invalid_argument(format!(
            "pagination page {} of size {} is out of range",
            pagination.page, pagination.size
        )));
    }
    Ok(pagination)
}

fn parse_sort(value: &Value) -> QueryResult<Vec<SortTerm>> {
    let doc = object(value, "sort")?;
    let Some(terms) = doc.get("terms").and_then(Value::as_list) else {
        return Ok(Vec::new());
    };
    terms
        .iter()
        .map(|term| {
            let term = object(term, "sort term")?;
            let field = term
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::invalid_argument("sort term without field"))?;
            let order = match term.get("order").and_then(Value::as_str) {
                Some(order) => order.parse()?,
                None => SortOrder::Asc,
            };
            Ok(SortTerm {
                field: field.to_string(),
                order,
            })
        })
        .collect()
}
