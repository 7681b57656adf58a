use thiserror::Error;

/// Rejected list query; every variant maps to 400
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid where clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operand: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}
