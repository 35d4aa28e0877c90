// src/error.rs

//! Error and result types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("schema creation failed: {0} statements did not apply")]
    SchemaCreation(usize),

    #[error("no transaction record for package {pid} in transaction {tid}")]
    MissingTransRecord { pid: i64, tid: i64 },

    #[error("parse error: {0}")]
    ParseError(String),
}
