//! Session handling: password hashing, the auth cookie, and the middleware that
//! guards the protected routes.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod token;

pub use cookie::DEFAULT_COOKIE_DURATION;
pub(crate) use cookie::{invalidate_auth_cookie, set_auth_cookie};
pub use log_in::{LogInData, SessionState, post_log_in};
pub use log_out::post_log_out;
pub use middleware::{AuthState, auth_guard};
pub use password::{PasswordHash, ValidatedPassword};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
