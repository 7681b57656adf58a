use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgConnection};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

/// Builds and runs filtered SELECTs against one table.
///
/// Queries run on a borrowed connection so the same builder serves both the
/// user-scoped transaction and the service client.
pub struct QueryBuilder<T> {
    table_name: String,
    filter: Option<Filter>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        // Reuse Filter table name validation
        Filter::new(name.as_str())?;
        Ok(Self {
            table_name: name,
            filter: None,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        let mut filter = Filter::new(self.table_name.as_str())?;
        filter.assign(filter_data)?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub async fn select_all(self, conn: &mut PgConnection) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(&mut *conn).await?)
    }

    pub async fn select_one(self, conn: &mut PgConnection) -> Result<T, DatabaseError> {
        let sql_result = self.sql_result()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_one(&mut *conn).await?)
    }

    fn sql_result(&self) -> Result<SqlResult, DatabaseError> {
        match &self.filter {
            Some(filter) => Ok(filter.to_sql()?),
            None => Ok(SqlResult {
                query: format!("SELECT * FROM \"{}\"", self.table_name),
                params: vec![],
            }),
        }
    }
}

/// Typed form of a JSON filter parameter.
///
/// Postgres has no implicit cast from text to uuid or timestamptz, so strings
/// that parse as one of those are bound with the matching type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Text(String),
    Json(Value),
}

impl From<&Value> for BindValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    // Postgres doesn't have u64
                    BindValue::Int(u as i64)
                } else if let Some(f) = n.as_f64() {
                    BindValue::Float(f)
                } else {
                    BindValue::Text(n.to_string())
                }
            }
            Value::String(s) => {
                if let Ok(id) = Uuid::parse_str(s) {
                    BindValue::Uuid(id)
                } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    BindValue::Timestamp(ts.with_timezone(&Utc))
                } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    BindValue::Date(date)
                } else {
                    BindValue::Text(s.clone())
                }
            }
            // Arrays are expanded by FilterWhere; anything left is bound as JSONB
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }
}

macro_rules! bind_typed {
    ($q:expr, $v:expr) => {
        match BindValue::from($v) {
            BindValue::Null => $q.bind(None::<String>),
            BindValue::Bool(b) => $q.bind(b),
            BindValue::Int(i) => $q.bind(i),
            BindValue::Float(f) => $q.bind(f),
            BindValue::Uuid(id) => $q.bind(id),
            BindValue::Timestamp(ts) => $q.bind(ts),
            BindValue::Date(d) => $q.bind(d),
            BindValue::Text(s) => $q.bind(s),
            BindValue::Json(j) => $q.bind(j),
        }
    };
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    bind_typed!(q, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_bind_with_inferred_types() {
        let id = Uuid::new_v4();
        assert_eq!(BindValue::from(&json!(id.to_string())), BindValue::Uuid(id));
        assert!(matches!(
            BindValue::from(&json!("2024-06-01T18:00:00Z")),
            BindValue::Timestamp(_)
        ));
        assert!(matches!(BindValue::from(&json!("2024-06-01")), BindValue::Date(_)));
        assert_eq!(BindValue::from(&json!("draft")), BindValue::Text("draft".into()));
    }

    #[test]
    fn numbers_and_nulls() {
        assert_eq!(BindValue::from(&json!(2024)), BindValue::Int(2024));
        assert_eq!(BindValue::from(&json!(1.5)), BindValue::Float(1.5));
        assert_eq!(BindValue::from(&Value::Null), BindValue::Null);
    }
}
