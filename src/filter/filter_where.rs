use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{FilterOp, WhereTerm};

/// Renders a JSON where-document into a parameterised SQL predicate.
///
/// `{ "status": "draft", "total_gross": { "$gte": 1000 }, "$or": [ ... ] }`
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Render `where_data`, numbering placeholders after `starting_param_index`
    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.render(where_data)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn render(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(String::new()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut conditions = Vec::new();
        for term in self.parse_object(obj)? {
            conditions.push(self.build_sql_condition(term)?);
        }
        Ok(conditions.join(" AND "))
    }

    fn parse_object(&mut self, obj: &Map<String, Value>) -> Result<Vec<WhereTerm>, FilterError> {
        let mut terms = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                terms.push(self.parse_logical_operator(key, value)?);
            } else {
                validate_identifier(key).map_err(FilterError::InvalidColumn)?;
                terms.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(terms)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<WhereTerm, FilterError> {
        let sql = match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Err(FilterError::InvalidOperatorData(format!("{} requires at least one clause", op)));
                }
                let mut parts = Vec::new();
                for clause in arr {
                    let sql = self.render(clause)?;
                    parts.push(format!("({})", if sql.is_empty() { "1=1".to_string() } else { sql }));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                format!("({})", parts.join(joiner))
            }
            "$not" => {
                let sql = self.render(value)?;
                format!("NOT ({})", if sql.is_empty() { "1=1".to_string() } else { sql })
            }
            _ => return Err(FilterError::UnsupportedOperator(op.to_string())),
        };
        Ok(WhereTerm::Group(sql))
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<WhereTerm>, FilterError> {
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => obj
                .iter()
                .map(|(op_key, op_val)| {
                    let operator = FilterOp::from_key(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    Ok(WhereTerm::Field {
                        column: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    })
                })
                .collect(),
            // Implicit equality: { field: value }
            _ => Ok(vec![WhereTerm::Field {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            }]),
        }
    }

    fn build_sql_condition(&mut self, term: WhereTerm) -> Result<String, FilterError> {
        let (column, operator, data) = match term {
            WhereTerm::Group(sql) => return Ok(sql),
            WhereTerm::Field { column, operator, data } => (column, operator, data),
        };

        let col = format!("\"{}\"", column);
        let data = &data;
        let sql = match operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", col),
            FilterOp::Eq => format!("{} = {}", col, self.param(data.clone())),
            FilterOp::Ne if data.is_null() => format!("{} IS NOT NULL", col),
            FilterOp::Ne => format!("{} <> {}", col, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", col, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", col, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", col, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", col, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", col, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", col, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                let negate = operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", col, keyword, params.join(", "))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => format!(
                    "{} BETWEEN {} AND {}",
                    col,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                ),
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            },
            FilterOp::Null => match data {
                Value::Bool(true) => format!("{} IS NULL", col),
                Value::Bool(false) => format!("{} IS NOT NULL", col),
                _ => return Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        };
        Ok(sql)
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_operators() {
        let (sql, params) = FilterWhere::generate(
            &json!({ "status": "draft", "total_gross": { "$gte": 100 } }),
            0,
        )
        .unwrap();
        assert_eq!(sql, "\"status\" = $1 AND \"total_gross\" >= $2");
        assert_eq!(params, vec![json!("draft"), json!(100)]);
    }

    #[test]
    fn nested_or_keeps_parameter_numbering() {
        let (sql, params) = FilterWhere::generate(
            &json!({ "$or": [ { "status": "sent" }, { "status": "expired" } ], "year": 2024 }),
            0,
        )
        .unwrap();
        assert_eq!(sql, "((\"status\" = $1) OR (\"status\" = $2)) AND \"year\" = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn starting_index_is_respected() {
        let (sql, _) = FilterWhere::generate(&json!({ "sku": "MIC-01" }), 2).unwrap();
        assert_eq!(sql, "\"sku\" = $3");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({ "id": { "$in": [] } }), 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn null_checks() {
        let (sql, _) = FilterWhere::generate(&json!({ "calendar_event_id": { "$null": false } }), 0).unwrap();
        assert_eq!(sql, "\"calendar_event_id\" IS NOT NULL");
        let (sql, _) = FilterWhere::generate(&json!({ "event_id": null }), 0).unwrap();
        assert_eq!(sql, "\"event_id\" IS NULL");
    }

    #[test]
    fn rejects_injection_in_column_names() {
        let err = FilterWhere::generate(&json!({ "name\"; DROP TABLE users; --": 1 }), 0);
        assert!(matches!(err, Err(FilterError::InvalidColumn(_))));
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = FilterWhere::generate(&json!({ "name": { "$regex": ".*" } }), 0);
        assert!(matches!(err, Err(FilterError::UnsupportedOperator(_))));
    }
}
