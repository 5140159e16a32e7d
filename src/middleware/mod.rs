pub mod identity;
pub mod privilege;
pub mod response;

pub use identity::{CookieSettings, Identity};
pub use privilege::authorize;
pub use response::{ApiResponse, ApiResult};
