//! Collaborators the session controller talks to.

use serde_json::Value;

use crate::breakpoint::Breakpoint;
use crate::controller::SessionState;
use crate::error::DebuggerError;
use crate::protocol::{CallSite, ForkTarget, StackFrame, ThreadInfo};

/// Delivers commands to the debuggee.
pub trait Transport {
    fn send_command(&mut self, method: &str, params: Option<Value>) -> Result<(), DebuggerError>;
}

/// An exception as presented to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionReport {
    pub kind: String,
    pub message: String,
    pub stack: Vec<StackFrame>,
    pub unhandled: bool,
}

/// Something the user interface should show.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    StateChanged(SessionState),
    /// Current position. `for_stack` marks an explicit stack request.
    Stopped {
        file: String,
        line: u32,
        for_stack: bool,
    },
    Stack {
        frames: Vec<StackFrame>,
        for_stack: bool,
    },
    Exception(ExceptionReport),
    SyntaxError {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },
    ConditionError {
        file: String,
        line: u32,
    },
    ThreadList {
        current_id: i64,
        threads: Vec<ThreadInfo>,
    },
    Variables {
        scope: i32,
        variables: Vec<Value>,
    },
    /// The inspected variable path followed by its members.
    Variable {
        scope: i32,
        variables: Vec<Value>,
    },
    CallTrace {
        is_call: bool,
        from: CallSite,
        to: CallSite,
    },
    StatementOutput(String),
    StatementError(String),
    Signal {
        message: String,
        file: String,
        line: u32,
        function: String,
        arguments: String,
    },
    ThreadSet,
}

/// The user-facing side of a session.
///
/// `ask_fork_target` and `edit_breakpoint` block until the user decides.
pub trait DebugUi {
    fn enter_debug_mode(&mut self) {}
    fn exit_debug_mode(&mut self) {}
    fn notify(&mut self, _event: DebugEvent) {}

    fn ask_fork_target(&mut self) -> ForkTarget;

    /// `None` when the user cancels.
    fn edit_breakpoint(&mut self, current: &Breakpoint) -> Option<Breakpoint>;
}
