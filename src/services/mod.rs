pub mod auth;
pub mod clock;
pub mod email;
pub mod password_reset;
pub mod session;

pub use auth::AuthService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use email::{EmailSender, EmailService, LogEmailSender};
pub use password_reset::PasswordResetService;
pub use session::SessionService;
