// redirect-flash - redirects that carry state across one round-trip
// Flash input and validation errors into the session, attach cookies, set fragments

pub mod config;
pub mod error;
pub mod message_bag;
pub mod redirector;
pub mod request_context;
pub mod response;
pub mod session;
pub mod value;

// Re-export core types
pub use config::{Config, FlashKeys};
pub use error::RedirectError;
pub use message_bag::{ErrorSource, MessageBag, MessageProvider, ViewErrorBag};
pub use redirector::Redirector;
pub use request_context::{InputRejection, RequestContext};
pub use response::RedirectResponse;
pub use session::{Session, SessionData};
pub use value::{InputMap, InputValue, UploadedFile};

// Re-export commonly used types from dependencies
pub use axum;
pub use axum::http::StatusCode;
pub use cookie::Cookie;
