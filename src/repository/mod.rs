pub mod database;
pub mod local;
pub mod store;
