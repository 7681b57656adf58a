use serde::Serialize;
use serde_json::json;
use sqlx::{self, postgres::PgRow, FromRow, PgConnection};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;

/// Read-side access to one table through the JSON filter language.
pub struct Repository<T> {
    table_name: &'static str,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize,
{
    pub fn new(table_name: &'static str) -> Self {
        Self {
            table_name,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(
        &self,
        conn: &mut PgConnection,
        filter_data: FilterData,
    ) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(self.table_name)?
            .filter(filter_data)?
            .select_all(conn)
            .await
    }

    pub async fn select_404(
        &self,
        conn: &mut PgConnection,
        filter_data: FilterData,
    ) -> Result<T, DatabaseError> {
        match QueryBuilder::<T>::new(self.table_name)?
            .filter(filter_data)?
            .select_one(conn)
            .await
        {
            Ok(row) => Ok(row),
            Err(DatabaseError::Sqlx(sqlx::Error::RowNotFound)) => {
                Err(DatabaseError::NotFound(format!("{} record not found", self.table_name)))
            }
            Err(other) => Err(other),
        }
    }

    pub async fn select_by_id(&self, conn: &mut PgConnection, id: Uuid) -> Result<T, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(json!({ "id": id })),
            limit: Some(1),
            ..Default::default()
        };
        self.select_404(conn, filter).await
    }
}
