//! Outbound commands.
//! - step/step_over/step_out/continue_: hand control to the debuggee
//! - thread_list/client_variables/client_variable/execute_statement/set_thread
//! - breakpoint commands, call tracing, stop_session

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::DebuggerError;
use crate::protocol::{
    methods, CallTraceParams, ContinueParams, ExecuteStatementParams, StepQuitParams,
    ThreadSetParams, VariableParams, VariablesParams,
};

use super::sync::{send_enable, send_ignore, send_set_breakpoint, to_params};
use super::{DebugSessionController, RunAction, SessionState};

fn wire_name(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

impl DebugSessionController {
    fn send(&mut self, method: &str, params: Option<Value>) -> Result<(), DebuggerError> {
        self.link.borrow_mut().send(method, params)
    }

    fn resume(
        &mut self,
        action: RunAction,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), DebuggerError> {
        self.send(method, params)?;
        self.last_action = action;
        self.set_state(SessionState::RunningInDebuggee);
        Ok(())
    }

    pub fn step(&mut self) -> Result<(), DebuggerError> {
        self.resume(RunAction::Step, methods::STEP, None)
    }

    pub fn step_over(&mut self) -> Result<(), DebuggerError> {
        self.resume(RunAction::StepOver, methods::STEP_OVER, None)
    }

    pub fn step_out(&mut self) -> Result<(), DebuggerError> {
        self.resume(RunAction::StepOut, methods::STEP_OUT, None)
    }

    /// `special` continues until the current frame returns to its caller.
    pub fn continue_(&mut self, special: bool) -> Result<(), DebuggerError> {
        let params = to_params(&ContinueParams { special })?;
        self.resume(RunAction::Continue, methods::CONTINUE, params)
    }

    /// Run `action` again.
    pub fn repeat(&mut self, action: RunAction) -> Result<(), DebuggerError> {
        match action {
            RunAction::Continue => self.continue_(false),
            RunAction::Step => self.step(),
            RunAction::StepOver => self.step_over(),
            RunAction::StepOut => self.step_out(),
        }
    }

    pub fn thread_list(&mut self) -> Result<(), DebuggerError> {
        self.send(methods::THREAD_LIST, None)
    }

    /// Variables of `frame`; scope 0 is locals, 1 is globals.
    pub fn client_variables(
        &mut self,
        scope: i32,
        frame: u32,
        filters: Vec<String>,
    ) -> Result<(), DebuggerError> {
        let params = VariablesParams {
            frame_number: frame,
            scope,
            filters,
        };
        self.send(methods::VARIABLES, to_params(&params)?)
    }

    /// Members of the variable at the path `variable`.
    pub fn client_variable(
        &mut self,
        scope: i32,
        variable: Vec<String>,
        frame: u32,
        filters: Vec<String>,
    ) -> Result<(), DebuggerError> {
        let params = VariableParams {
            frame_number: frame,
            variable,
            scope,
            filters,
        };
        self.send(methods::VARIABLE, to_params(&params)?)
    }

    pub fn execute_statement(&mut self, statement: &str, frame: u32) -> Result<(), DebuggerError> {
        let params = ExecuteStatementParams {
            statement: statement.to_owned(),
            frame_number: frame,
        };
        self.send(methods::EXECUTE_STATEMENT, to_params(&params)?)
    }

    pub fn set_thread(&mut self, thread_id: i64) -> Result<(), DebuggerError> {
        self.send(methods::THREAD_SET, to_params(&ThreadSetParams { thread_id })?)
    }

    /// Set (`set == true`) or clear a breakpoint in the debuggee.
    pub fn set_breakpoint(
        &mut self,
        file: &Path,
        line: u32,
        set: bool,
        condition: Option<&str>,
        temporary: bool,
    ) -> Result<(), DebuggerError> {
        let mut link = self.link.borrow_mut();
        send_set_breakpoint(&mut link, wire_name(file), line, set, condition, temporary)
    }

    pub fn clear_breakpoint(&mut self, file: &Path, line: u32) -> Result<(), DebuggerError> {
        self.set_breakpoint(file, line, false, None, false)
    }

    pub fn set_breakpoint_enabled(
        &mut self,
        file: &Path,
        line: u32,
        enable: bool,
    ) -> Result<(), DebuggerError> {
        let mut link = self.link.borrow_mut();
        send_enable(&mut link, wire_name(file), line, enable)
    }

    pub fn set_breakpoint_ignore_count(
        &mut self,
        file: &Path,
        line: u32,
        count: u32,
    ) -> Result<(), DebuggerError> {
        let mut link = self.link.borrow_mut();
        send_ignore(&mut link, wire_name(file), line, count)
    }

    pub fn start_call_trace(&mut self) -> Result<(), DebuggerError> {
        self.send(methods::CALL_TRACE, to_params(&CallTraceParams { enable: true })?)
    }

    pub fn stop_call_trace(&mut self) -> Result<(), DebuggerError> {
        self.send(methods::CALL_TRACE, to_params(&CallTraceParams { enable: false })?)
    }

    /// Ask the debuggee to quit and consider the session over right away.
    /// The process exit is reconciled by `on_process_exit`.
    pub fn stop_session(&mut self, exit_code: Option<i32>) -> Result<(), DebuggerError> {
        let attached = self.link.borrow().transport.is_some();
        let sent = if attached {
            let params = match exit_code {
                Some(exit_code) => to_params(&StepQuitParams { exit_code })?,
                None => None,
            };
            self.send(methods::STEP_QUIT, params)
        } else {
            Ok(())
        };
        info!(?exit_code, "stopping debug session");
        self.set_state(SessionState::Stopped);
        sent
    }
}
