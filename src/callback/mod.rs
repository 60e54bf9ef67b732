//! OAuth callback plumbing
//!
//! - [`dispatcher`] -- pushes `code`/`state` to the callback URL the way a
//!   browser redirect would
//! - [`receiver`]   -- a loopback listener that accepts that redirect

pub mod dispatcher;
pub mod receiver;

pub use dispatcher::{CallbackDispatcher, DispatchOutcome, CALLBACK_PATH, DEFAULT_CALLBACK_PORT};
pub use receiver::{AuthorizationCallback, CallbackReceiver};
