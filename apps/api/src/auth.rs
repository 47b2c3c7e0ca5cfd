mod password;
mod password_reset;
mod session;

pub use password::{login_handler, register_handler};
pub use password_reset::{forgot_password_handler, reset_password_handler};
pub use session::{logout_handler, me_handler};

pub const SESSION_USER_KEY: &str = "user_identity";
