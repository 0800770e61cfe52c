mod auth;
mod health_check;
mod users;

pub use auth::{login, logout, refresh, register};
pub use health_check::health_check;
pub use users::{delete_current_user, get_current_user, update_current_user};
