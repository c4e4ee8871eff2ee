pub mod connection;
pub mod map_usage;
pub mod properties;

pub use connection::{init_db, Database};
