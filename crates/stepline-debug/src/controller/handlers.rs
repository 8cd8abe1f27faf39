//! Inbound message dispatch.
//! - table: method name -> handler, built once per controller
//! - on_incoming_message/on_incoming_line: session filter + dispatch
//! - handle_*: one handler per inbound method

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::DebuggerError;
use crate::ports::{DebugEvent, ExceptionReport};
use crate::protocol::{
    methods, CallTracePayload, Envelope, ExceptionPayload, ExecTextPayload, ExitCodePayload,
    FileLinePayload, ForkTarget, ForkToParams, SignalPayload, StackPayload, SyntaxErrorPayload,
    ThreadListPayload, VariablePayload, VariablesPayload,
};

use super::sync::to_params;
use super::{DebugSessionController, DeferredTask, SessionState};

pub(super) type Handler = fn(&mut DebugSessionController, Value) -> Result<(), DebuggerError>;

/// File name the debuggee reports for dynamically executed code.
const DYNAMIC_CODE_FILE: &str = "<string>";

pub(super) fn table() -> FxHashMap<&'static str, Handler> {
    let mut table: FxHashMap<&'static str, Handler> = FxHashMap::default();
    table.insert(methods::LINE, DebugSessionController::handle_line);
    table.insert(methods::STACK, DebugSessionController::handle_stack);
    table.insert(methods::THREAD_LIST, DebugSessionController::handle_thread_list);
    table.insert(methods::VARIABLES, DebugSessionController::handle_variables);
    table.insert(methods::VARIABLE, DebugSessionController::handle_variable);
    table.insert(methods::DEBUG_STARTUP, DebugSessionController::handle_startup);
    table.insert(methods::FORK_TO, DebugSessionController::handle_fork);
    table.insert(methods::CLEAR_BP, DebugSessionController::handle_clear_breakpoint);
    table.insert(methods::SYNTAX_ERROR, DebugSessionController::handle_syntax_error);
    table.insert(
        methods::BP_CONDITION_ERROR,
        DebugSessionController::handle_condition_error,
    );
    table.insert(methods::EXCEPTION, DebugSessionController::handle_exception);
    table.insert(methods::CALL_TRACE, DebugSessionController::handle_call_trace);
    table.insert(
        methods::EXEC_STATEMENT_ERROR,
        DebugSessionController::handle_statement_error,
    );
    table.insert(
        methods::EXEC_STATEMENT_OUTPUT,
        DebugSessionController::handle_statement_output,
    );
    table.insert(methods::SIGNAL, DebugSessionController::handle_signal);
    table.insert(methods::THREAD_SET, DebugSessionController::handle_thread_set);
    table.insert(methods::EPILOGUE_EXIT_CODE, DebugSessionController::handle_exit);
    table
}

/// The debuggee prefixes uncaught exception types with `Unhandled`, in any case.
fn is_unhandled_kind(kind: &str) -> bool {
    const PREFIX: &str = "unhandled";
    kind.get(..PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(PREFIX))
}

/// Missing parameters read as an empty object.
fn payload<T: DeserializeOwned>(params: Value) -> Result<T, DebuggerError> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    Ok(serde_json::from_value(params)?)
}

impl DebugSessionController {
    /// Handle one message from the debuggee of session `session_id`.
    pub fn on_incoming_message(&mut self, session_id: &str, method: &str, params: Value) {
        if !self.is_current_session(session_id) {
            debug!(session = session_id, method, "message for another session ignored");
            return;
        }
        // Once stopped, only the exit message is accepted.
        if self.state() == SessionState::Stopped && method != methods::EPILOGUE_EXIT_CODE {
            debug!(method, "message after session stop ignored");
            return;
        }
        let Some(handler) = self.handlers.get(method).copied() else {
            error!(method, "unknown debugger method");
            return;
        };
        if let Err(err) = handler(self, params) {
            error!(method, "message dropped: {err}");
        }
    }

    /// Decode one wire line and dispatch it.
    pub fn on_incoming_line(&mut self, line: &str) -> Result<(), DebuggerError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let envelope = Envelope::decode(line)?;
        self.on_incoming_message(&envelope.procuuid, &envelope.method, envelope.params);
        Ok(())
    }

    fn handle_line(&mut self, params: Value) -> Result<(), DebuggerError> {
        self.handle_stop(params, false)
    }

    fn handle_stack(&mut self, params: Value) -> Result<(), DebuggerError> {
        self.handle_stop(params, true)
    }

    fn handle_stop(&mut self, params: Value, for_stack: bool) -> Result<(), DebuggerError> {
        let StackPayload { stack } = payload(params)?;
        if !self.stop_at_first_line {
            self.stop_at_first_line = true;
            self.defer(DeferredTask::Continue);
            return Ok(());
        }
        if let Some(top) = stack.first() {
            self.notify(DebugEvent::Stopped {
                file: top.file.clone(),
                line: top.line,
                for_stack,
            });
        }
        self.notify(DebugEvent::Stack {
            frames: stack,
            for_stack,
        });
        self.set_state(SessionState::SuspendedInIde);
        Ok(())
    }

    fn handle_thread_list(&mut self, params: Value) -> Result<(), DebuggerError> {
        let list: ThreadListPayload = payload(params)?;
        self.notify(DebugEvent::ThreadList {
            current_id: list.current_id,
            threads: list.thread_list,
        });
        Ok(())
    }

    fn handle_variables(&mut self, params: Value) -> Result<(), DebuggerError> {
        let VariablesPayload { scope, variables } = payload(params)?;
        self.notify(DebugEvent::Variables { scope, variables });
        Ok(())
    }

    fn handle_variable(&mut self, params: Value) -> Result<(), DebuggerError> {
        let VariablePayload {
            scope,
            variable,
            variables,
        } = payload(params)?;
        let mut entries = Vec::with_capacity(variables.len() + 1);
        entries.push(variable);
        entries.extend(variables);
        self.notify(DebugEvent::Variable {
            scope,
            variables: entries,
        });
        Ok(())
    }

    /// The debuggee is ready: drop stale breakpoints, then send the rest.
    fn handle_startup(&mut self, _params: Value) -> Result<(), DebuggerError> {
        let removed = self.validate_breakpoints();
        if removed > 0 {
            info!(removed, "stale breakpoints removed");
        }
        self.send_all_breakpoints()?;
        self.send_watch_expressions();
        Ok(())
    }

    fn handle_fork(&mut self, _params: Value) -> Result<(), DebuggerError> {
        let automatic = self
            .debug_settings()
            .filter(|settings| settings.autofork)
            .map(|settings| {
                if settings.follow_child {
                    ForkTarget::Child
                } else {
                    ForkTarget::Parent
                }
            });
        let target = match automatic {
            Some(target) => target,
            None => self.ui.ask_fork_target(),
        };
        debug!(?target, "answering fork request");
        let params = to_params(&ForkToParams { target })?;
        self.link.borrow_mut().send(methods::FORK_TO, params)
    }

    /// The debuggee found a breakpoint it can never reach.
    fn handle_clear_breakpoint(&mut self, params: Value) -> Result<(), DebuggerError> {
        let FileLinePayload { filename, line } = payload(params)?;
        let Some(index) = self
            .breakpoints
            .index_of(&*self.project, Path::new(&filename), line)
        else {
            return Ok(());
        };
        let valid = self
            .breakpoints
            .get(index)
            .is_some_and(|bp| bp.is_valid(&*self.project));
        if valid {
            info!("debuggee cleared breakpoint {filename}:{line}");
            self.breakpoints.remove_at(index);
        }
        Ok(())
    }

    fn handle_syntax_error(&mut self, params: Value) -> Result<(), DebuggerError> {
        let error: SyntaxErrorPayload = payload(params)?;
        error!(
            "syntax error in {} at {}:{}: {}",
            error.filename, error.line, error.characternumber, error.message
        );
        self.notify(DebugEvent::SyntaxError {
            file: error.filename,
            line: error.line,
            column: error.characternumber,
            message: error.message,
        });
        Ok(())
    }

    /// Offer to fix a breakpoint whose condition failed to evaluate.
    fn handle_condition_error(&mut self, params: Value) -> Result<(), DebuggerError> {
        let FileLinePayload { filename, line } = payload(params)?;
        error!("breakpoint condition at {filename}:{line} failed to evaluate");
        self.notify(DebugEvent::ConditionError {
            file: filename.clone(),
            line,
        });
        let Some(index) = self
            .breakpoints
            .index_of(&*self.project, Path::new(&filename), line)
        else {
            return Ok(());
        };
        let Some(current) = self.breakpoints.get(index).cloned() else {
            return Ok(());
        };
        match self.ui.edit_breakpoint(&current) {
            Some(edited) if edited != current => {
                self.breakpoints.update_at(index, edited);
            }
            _ => debug!("breakpoint condition left unchanged"),
        }
        Ok(())
    }

    fn handle_exception(&mut self, params: Value) -> Result<(), DebuggerError> {
        let ExceptionPayload {
            kind,
            message,
            mut stack,
        } = payload(params)?;
        self.set_state(SessionState::SuspendedInIde);

        if let Some(script) = self.script_path().map(|path| path.to_string_lossy().into_owned()) {
            for frame in &mut stack {
                if frame.file != DYNAMIC_CODE_FILE {
                    break;
                }
                frame.file.clone_from(&script);
            }
        }

        let unhandled = stack.is_empty()
            || kind
                .as_deref()
                .is_none_or(is_unhandled_kind);
        let report = if stack.is_empty() {
            ExceptionReport {
                unhandled,
                ..ExceptionReport::default()
            }
        } else {
            ExceptionReport {
                kind: kind.unwrap_or_default(),
                message: message.unwrap_or_default(),
                stack,
                unhandled,
            }
        };
        let kind = report.kind.clone();
        let no_stack = report.stack.is_empty();
        self.notify(DebugEvent::Exception(report));

        if unhandled {
            let detail = if no_stack { ": no stack trace reported" } else { "" };
            error!("Unhandled exception{detail}. The debugging session is closed");
            self.defer(DeferredTask::StopSession);
            return Ok(());
        }
        if self.ignored_exceptions.contains(&kind) {
            info!("ignored exception {kind}, repeating {:?}", self.last_action);
            return self.repeat(self.last_action);
        }
        warn!("exception {kind} raised in the debuggee");
        self.thread_list()?;
        self.client_variables(1, 0, Vec::new())?;
        self.client_variables(0, 0, Vec::new())
    }

    fn handle_call_trace(&mut self, params: Value) -> Result<(), DebuggerError> {
        let CallTracePayload { event, from, to } = payload(params)?;
        self.notify(DebugEvent::CallTrace {
            is_call: event == "c",
            from,
            to,
        });
        Ok(())
    }

    fn handle_statement_error(&mut self, params: Value) -> Result<(), DebuggerError> {
        let ExecTextPayload { text } = payload(params)?;
        error!("statement failed: {text}");
        self.notify(DebugEvent::StatementError(text));
        Ok(())
    }

    fn handle_statement_output(&mut self, params: Value) -> Result<(), DebuggerError> {
        let ExecTextPayload { text } = payload(params)?;
        if text.is_empty() {
            info!("No output generated");
        } else {
            info!("{text}");
        }
        self.notify(DebugEvent::StatementOutput(text));
        Ok(())
    }

    fn handle_signal(&mut self, params: Value) -> Result<(), DebuggerError> {
        let signal: SignalPayload = payload(params)?;
        error!(
            "signal in {} at line {}: {}",
            signal.filename, signal.linenumber, signal.message
        );
        self.notify(DebugEvent::Stopped {
            file: signal.filename.clone(),
            line: signal.linenumber,
            for_stack: false,
        });
        self.notify(DebugEvent::Signal {
            message: signal.message,
            file: signal.filename,
            line: signal.linenumber,
            function: signal.function,
            arguments: signal.arguments,
        });
        Ok(())
    }

    fn handle_thread_set(&mut self, _params: Value) -> Result<(), DebuggerError> {
        self.notify(DebugEvent::ThreadSet);
        Ok(())
    }

    fn handle_exit(&mut self, params: Value) -> Result<(), DebuggerError> {
        let ExitCodePayload { exit_code } = payload(params)?;
        if let Some(id) = self.session_id().map(str::to_owned) {
            self.on_process_exit(&id, exit_code);
        }
        Ok(())
    }
}
