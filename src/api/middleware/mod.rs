pub mod admin_auth;
pub mod timing;

pub use admin_auth::AdminAuth;
pub use timing::{RequestTimer, path_key};
