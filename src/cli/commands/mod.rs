pub mod call;
pub mod health;
pub mod migrate;
pub mod serve;

pub const DEFAULT_URL: &str = "http://localhost:3000";
