use serde_json::Value;

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                // Expect array of strings like ["start_at desc", "title asc"]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        _ => return Err(FilterError::InvalidColumn("order entries must be strings".to_string())),
                    }
                }
                out
            }
            Value::Object(obj) => {
                // { "start_at": "desc", "title": "asc" }
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = Self::parse_direction(v.as_str().unwrap_or("asc"))?;
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                out
            }
            _ => vec![],
        };

        for info in &infos {
            validate_identifier(&info.column).map_err(FilterError::InvalidColumn)?;
        }
        Ok(infos)
    }

    /// Parses a caller-supplied order and rejects columns outside `sortable`
    pub fn restrict(order: &str, sortable: &[&str]) -> Result<Value, FilterError> {
        let infos = Self::parse_order_string(order)?;
        if let Some(info) = infos.iter().find(|i| !sortable.contains(&i.column.as_str())) {
            return Err(FilterError::InvalidColumn(format!(
                "cannot sort by '{}'; sortable columns: {}",
                info.column,
                sortable.join(", ")
            )));
        }
        Ok(Value::String(order.to_string()))
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        // split on commas, then each token into column and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        SortDirection::parse(dir)
            .ok_or_else(|| FilterError::InvalidColumn(format!("invalid sort direction: {}", dir)))
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
