//! Push dispatch for queued "number called" notifications.
//!
//! The [`dispatcher::Dispatcher`] owns the whole decision: skip, reject or
//! send-then-retire. The messaging platform, the record store and the clock
//! are injected behind traits so hosting surfaces (the Redis worker, the
//! HTTP trigger) and tests can supply their own.

pub mod clock;
pub mod dispatcher;
pub mod message;
pub mod messaging;
pub mod store;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
