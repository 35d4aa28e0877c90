// src/db/models/mod.rs

//! Row models for the history store

mod group;
mod output;
mod package;
mod repo;
mod trans_data;
mod transaction;

pub use group::{
    Environment, Group, log_group_trans, removable_with_group, resolve_group_origin,
};
pub use output::{OutputKind, append as append_output, exists as output_exists, load as load_output};
pub use package::{Package, PackageData};
pub use repo::Repo;
pub use trans_data::{Action, Reason, TransData};
pub use transaction::Transaction;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::schema;
    use rusqlite::Connection;

    pub fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }
}
