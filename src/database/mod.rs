pub mod diagnose;
pub mod executor;
pub mod manager;
pub mod migrate;
pub mod rows;

pub use executor::{PgExecutor, RoutineExecutor};
pub use manager::{Database, DatabaseError};
pub use rows::Row;
