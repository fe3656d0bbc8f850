pub mod config;
pub mod controller;
pub mod elevation;
mod error;
pub mod events;
#[cfg(any(test, feature = "fakes"))]
pub mod fakes;
pub mod http;
pub mod machine;
pub mod planner;
pub mod services;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionHandle, SessionServices, SessionSnapshot};
pub use error::{ServiceError, SessionError};
pub use events::SessionEvent;
pub use machine::{SessionInput, SessionState};
