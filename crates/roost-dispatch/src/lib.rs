//! Command dispatch engine.
//!
//! Routes inbound Telegram events to pluggable command handlers. Commands
//! are registered in a [`DispatchEngine`], implement the [`Command`] trait,
//! and keep per-user wizard state in a [`SessionStore`].
//!
//! # Architecture
//!
//! - [`command`]: core types -- [`EventCtx`], the [`Command`] trait, and
//!   [`Middleware`] guards.
//! - [`session`]: [`SessionStore`], the reusable per-command session
//!   bookkeeping component.
//! - [`engine`]: [`DispatchEngine`] -- registration, command routing,
//!   callback-action matching, session-scoped free-text routing.

pub mod command;
pub mod engine;
pub mod session;

pub use command::{ActionHandler, CallbackRef, Command, CommandEvent, EventCtx, Middleware};
pub use engine::{DispatchEngine, TextOutcome, COMMAND_PREFIX};
pub use session::SessionStore;
