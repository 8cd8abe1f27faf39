//! `stepline-debug` - Debug session control for Python debuggees.
//!
//! - **Breakpoints and watches**: user entities with their persisted form
//! - **Collections**: observable lists the controller subscribes to
//! - **Protocol**: method vocabulary and the line-delimited JSON-RPC envelope
//! - **Controller**: session state machine, inbound dispatch, outbound
//!   commands, and breakpoint synchronization
//! - **Stdio host**: transport and console front end used by the binary

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod breakpoint;
pub mod collection;
pub mod config;
pub mod controller;
mod error;
pub mod ports;
pub mod project;
pub mod protocol;
pub mod stdio;
pub mod watch;

pub use breakpoint::{Breakpoint, BreakpointRecord};
pub use collection::{
    BreakpointCollection, CollectionObserver, ObservableList, Toggle, WatchCollection,
};
pub use config::{DebugSettings, RunParameters, SessionConfig};
pub use controller::{DebugSessionController, DeferredTask, RunAction, SessionState};
pub use error::DebuggerError;
pub use ports::{DebugEvent, DebugUi, ExceptionReport, Transport};
pub use project::{NoProject, ProjectDir, ProjectRoot};
pub use protocol::{Envelope, ForkTarget, StackFrame};
pub use watch::{WatchExpression, WatchSpecial};
