use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query description accepted by list endpoints and `Repository`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NIn,
    Between,
    Null,
}

impl FilterOp {
    /// Operator for a `$`-prefixed key; `$neq` is accepted for `$ne`
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$null" => FilterOp::Null,
            _ => return None,
        })
    }
}

/// One predicate of a where-document, ANDed with its siblings
#[derive(Debug, Clone)]
pub enum WhereTerm {
    Field {
        column: String,
        operator: FilterOp,
        data: Value,
    },
    /// `$and` / `$or` / `$not` group, already rendered
    Group(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(dir: &str) -> Option<Self> {
        if dir.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }

    pub fn to_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Rendered statement and its positional parameters
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
