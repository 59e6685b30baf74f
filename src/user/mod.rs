//! Registered users and the endpoints for managing their accounts.

mod core;
mod me_endpoints;
mod register_endpoint;

pub use core::{
    NewUser, User, UserID, UserProfile, count_users, create_user, create_user_table, delete_user,
    get_user_by_email, get_user_by_id, parse_email, update_password, update_profile,
};
pub use me_endpoints::{PasswordChange, ProfileData, change_password, delete_me, get_me, update_me};
pub use register_endpoint::{RegisterData, register_user};
