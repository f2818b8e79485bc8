//! Adapters: concrete implementations of `domain::ports` traits against
//! real infrastructure. Currently only a SQLite backend is shipped; any
//! other store only needs to implement the ports in `domain::ports`.

pub mod sqlite;
