//! Script-side message dispatcher for host-embedded execution contexts.
//!
//! A host process pushes discrete JSON messages into a script context through
//! a single inbound hook. The script consumes them with single-use, type-keyed
//! receive registrations: each registration claims the next message of its
//! type (or, for the wildcard key `"*"`, the next message no exact
//! registration claims) and can block the script with
//! [`PendingOperation::wait`] until that message has been handled.
//!
//! # Architecture
//!
//! - [`Message`] and [`TypeKey`]: decoded inbound values and registration keys
//! - [`Dispatcher`]: owns the inbound queue and the table of pending operations
//! - [`PendingOperation`]: the handle returned for each registration
//! - [`Host`]: the collaborator seam for outbound sends, inbound delivery, and
//!   the single-step event pump
//! - [`Session`]: the per-context facade bundling dispatch, outbound messaging,
//!   logging passthrough, and memory staging
//!
//! Everything runs on one thread of control. The only suspension point is
//! the host pump invoked from [`PendingOperation::wait`], which may re-enter
//! the dispatcher before it returns.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tether::{Dispatcher, Host, HostError, InboundHook, Message};
//!
//! /// Host whose event loop delivers a single `ping`.
//! #[derive(Default)]
//! struct OnePing {
//!     hook: RefCell<Option<InboundHook>>,
//! }
//!
//! impl Host for OnePing {
//!     fn send(&self, _envelope: &str, _data: Option<&[u8]>) -> Result<(), HostError> {
//!         Ok(())
//!     }
//!
//!     fn set_incoming_handler(&self, hook: InboundHook) {
//!         *self.hook.borrow_mut() = Some(hook);
//!     }
//!
//!     fn pump(&self) -> Result<(), HostError> {
//!         let hook = self.hook.borrow_mut().take();
//!         let hook = hook.ok_or_else(|| HostError::new("event loop is idle"))?;
//!         hook.deliver(r#"{"type":"ping","payload":7}"#)?;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(Rc::new(OnePing::default()));
//! let pending = dispatcher.recv_type("ping", |message: Message| {
//!     assert_eq!(message.payload(), Some(&serde_json::json!(7)));
//!     Ok(())
//! })?;
//! pending.wait()?;
//! assert!(pending.is_completed());
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod error;
mod host;
mod memory;
mod message;
mod operation;
mod session;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatcher, WeakDispatcher};
pub use error::{CallbackError, DispatchError, HostError, WaitError};
pub use host::{Host, InboundHook};
pub use memory::{Memory, MemoryError, NativePointer, PointerParseError, duplicate};
pub use message::{Message, Outbound, TypeKey, WILDCARD};
pub use operation::PendingOperation;
pub use session::{Session, SessionError};
