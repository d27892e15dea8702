/// Middleware module
///
/// Access guard (bearer JWT), role/premium authorization, and the
/// development-mode error detail renderer.

mod authorization;
mod error_details;
mod jwt_middleware;

pub use authorization::{check_premium, check_roles, Authorization};
pub use error_details::ErrorDetails;
pub use jwt_middleware::JwtMiddleware;
