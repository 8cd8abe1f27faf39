//! Line-oriented stdio host.
//! - LineTransport: writes command envelopes, one per line
//! - ProtocolLog: optional transcript of wire traffic
//! - ConsoleUi: reports session events through tracing
//! - run_session: read loop feeding the controller

use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::rc::Rc;

use serde_json::Value;
use smol_str::SmolStr;
use tracing::{error, info, warn};

use crate::breakpoint::Breakpoint;
use crate::controller::DebugSessionController;
use crate::error::DebuggerError;
use crate::ports::{DebugEvent, DebugUi, Transport};
use crate::protocol::{Envelope, ForkTarget};

pub const PROTOCOL_LOG_ENV: &str = "STEPLINE_PROTOCOL_LOG";
pub const PROTOCOL_VERBOSE_ENV: &str = "STEPLINE_PROTOCOL_VERBOSE";

pub fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_ascii_lowercase();
            matches!(value.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => false,
    }
}

/// Appends `<-`/`->` lines to a transcript file.
#[derive(Clone)]
pub struct ProtocolLog {
    writer: Rc<RefCell<BufWriter<File>>>,
    failed: Rc<Cell<bool>>,
}

impl ProtocolLog {
    /// Open the transcript named by `STEPLINE_PROTOCOL_LOG`, if set.
    pub fn from_env() -> Option<Self> {
        let path = std::env::var(PROTOCOL_LOG_ENV).ok()?;
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(Self::new(file)),
            Err(err) => {
                warn!("cannot open protocol log {path}: {err}");
                None
            }
        }
    }

    pub fn new(file: File) -> Self {
        Self {
            writer: Rc::new(RefCell::new(BufWriter::new(file))),
            failed: Rc::new(Cell::new(false)),
        }
    }

    pub fn record(&self, direction: &str, payload: &str) -> io::Result<()> {
        let mut writer = self.writer.borrow_mut();
        writeln!(writer, "{direction} {}", payload.trim_end())?;
        writer.flush()
    }

    /// Record a line, warning on the first failure only. Returns whether the
    /// line was written.
    pub fn append(&self, direction: &str, payload: &str) -> bool {
        match self.record(direction, payload) {
            Ok(()) => true,
            Err(err) => {
                if !self.failed.replace(true) {
                    warn!("protocol log write failed, further failures are silent: {err}");
                }
                false
            }
        }
    }
}

/// Sends commands as newline-terminated envelopes.
pub struct LineTransport<W: Write> {
    writer: W,
    session_id: SmolStr,
    log: Option<ProtocolLog>,
    verbose: bool,
}

impl<W: Write> LineTransport<W> {
    pub fn new(writer: W, session_id: &str) -> Self {
        Self {
            writer,
            session_id: SmolStr::new(session_id),
            log: None,
            verbose: false,
        }
    }

    #[must_use]
    pub fn with_log(mut self, log: Option<ProtocolLog>) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for LineTransport<W> {
    fn send_command(&mut self, method: &str, params: Option<Value>) -> Result<(), DebuggerError> {
        let line = Envelope::new(method, &self.session_id, params).encode()?;
        if let Some(log) = &self.log {
            log.append("->", &line);
        }
        if self.verbose {
            info!("[protocol->] {}", line.trim_end());
        }
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|err| DebuggerError::Transport(SmolStr::new(err.to_string())))
    }
}

/// Terminal front end. Fork requests follow `follow_child`; breakpoint
/// edits are declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleUi {
    pub follow_child: bool,
}

impl DebugUi for ConsoleUi {
    fn enter_debug_mode(&mut self) {
        info!("entering debug mode");
    }

    fn exit_debug_mode(&mut self) {
        info!("leaving debug mode");
    }

    fn notify(&mut self, event: DebugEvent) {
        match event {
            DebugEvent::StateChanged(_) => {}
            DebugEvent::Stopped { file, line, .. } => info!("stopped at {file}:{line}"),
            DebugEvent::Stack { frames, .. } => {
                for (depth, frame) in frames.iter().enumerate() {
                    info!(
                        "  #{depth} {}:{} {}({})",
                        frame.file, frame.line, frame.function, frame.arguments
                    );
                }
            }
            DebugEvent::Exception(report) => {
                let scope = if report.unhandled { "unhandled" } else { "handled" };
                info!("{scope} exception {}: {}", report.kind, report.message);
            }
            DebugEvent::SyntaxError {
                file,
                line,
                column,
                message,
            } => error!("{file}:{line}:{column}: {message}"),
            DebugEvent::ConditionError { file, line } => {
                warn!("condition of breakpoint {file}:{line} needs fixing");
            }
            DebugEvent::ThreadList {
                current_id,
                threads,
            } => info!(current_id, count = threads.len(), "threads"),
            DebugEvent::Variables { scope, variables } => {
                info!(scope, count = variables.len(), "variables");
            }
            DebugEvent::Variable { scope, variables } => {
                info!(scope, count = variables.len().saturating_sub(1), "variable members");
            }
            DebugEvent::CallTrace { is_call, from, to } => {
                let arrow = if is_call { "->" } else { "<-" };
                info!(
                    "{}:{} {} {arrow} {}:{} {}",
                    from.filename,
                    from.linenumber,
                    from.codename,
                    to.filename,
                    to.linenumber,
                    to.codename
                );
            }
            DebugEvent::StatementOutput(_) | DebugEvent::StatementError(_) => {}
            DebugEvent::Signal { message, .. } => warn!("signal: {message}"),
            DebugEvent::ThreadSet => info!("thread switched"),
        }
    }

    fn ask_fork_target(&mut self) -> ForkTarget {
        if self.follow_child {
            ForkTarget::Child
        } else {
            ForkTarget::Parent
        }
    }

    fn edit_breakpoint(&mut self, current: &Breakpoint) -> Option<Breakpoint> {
        warn!(
            "breakpoint at line {} keeps its condition {:?}",
            current.line(),
            current.condition()
        );
        None
    }
}

/// Feed `reader` to the controller until the debuggee exits. End of input
/// counts as an exit with code 0. Returns the exit code.
pub fn run_session<R: BufRead>(
    controller: &mut DebugSessionController,
    reader: &mut R,
    log: Option<&ProtocolLog>,
    verbose: bool,
) -> io::Result<i32> {
    let mut line = String::new();
    loop {
        let Some(session_id) = controller.session_id().map(str::to_owned) else {
            break;
        };
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            info!("debuggee closed its output");
            controller.on_process_exit(&session_id, 0);
            break;
        }
        if let Some(log) = log {
            log.append("<-", &line);
        }
        if verbose {
            info!("[protocol<-] {}", line.trim_end());
        }
        if let Err(err) = controller.on_incoming_line(&line) {
            error!("invalid message: {err}");
        }
        controller.run_pending();
    }
    Ok(controller.last_exit_code().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugSettings, RunParameters};
    use crate::controller::SessionState;
    use crate::project::NoProject;
    use std::io::Cursor;

    #[test]
    fn transport_writes_envelope_lines() {
        let mut transport = LineTransport::new(Vec::new(), "s1");
        transport
            .send_command("CONTINUE", Some(serde_json::json!({"special": false})))
            .unwrap();
        transport.send_command("STEP", None).unwrap();
        let written = String::from_utf8(transport.into_inner()).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(
            lines,
            [
                r#"{"jsonrpc":"2.0","method":"CONTINUE","procuuid":"s1","params":{"special":false}}"#,
                r#"{"jsonrpc":"2.0","method":"STEP","procuuid":"s1","params":null}"#,
            ]
        );
    }

    #[test]
    fn env_flag_accepts_common_spellings() {
        let name = "STEPLINE_TEST_FLAG_SPELLINGS";
        std::env::set_var(name, " Yes ");
        assert!(env_flag(name));
        std::env::set_var(name, "0");
        assert!(!env_flag(name));
        std::env::remove_var(name);
        assert!(!env_flag(name));
    }

    #[test]
    fn session_runs_until_exit_code() {
        let mut controller =
            DebugSessionController::new(Rc::new(NoProject), Box::new(ConsoleUi::default()));
        controller
            .start_session(
                Box::new(LineTransport::new(io::sink(), "s1")),
                "s1",
                "/tmp/main.py",
                RunParameters::default(),
                DebugSettings::default(),
            )
            .unwrap();
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"LINE","procuuid":"s1","params":{"stack":[["/tmp/main.py",1,"<module>",""]]}}"#,
            "\n",
            "garbage\n",
            r#"{"jsonrpc":"2.0","method":"EPILOGUE_EXIT_CODE","procuuid":"s1","params":{"exitCode":3}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"LINE","procuuid":"s1","params":{}}"#,
            "\n",
        );
        let code = run_session(&mut controller, &mut Cursor::new(input), None, false).unwrap();
        assert_eq!(code, 3);
        assert_eq!(controller.state(), SessionState::Stopped);
        assert!(controller.session_id().is_none());
    }

    #[test]
    fn protocol_log_reports_write_failures() {
        let path = std::env::temp_dir().join(format!(
            "stepline-protocol-{}.log",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let log = ProtocolLog::new(File::create(&path).unwrap());
        assert!(log.append("->", "{\"method\":\"STEP\"}\n"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "-> {\"method\":\"STEP\"}\n"
        );

        let read_only = ProtocolLog::new(File::open(&path).unwrap());
        assert!(!read_only.append("<-", "line"));
        assert!(!read_only.append("<-", "line"));
        assert!(read_only.failed.get());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn end_of_input_ends_the_session() {
        let mut controller =
            DebugSessionController::new(Rc::new(NoProject), Box::new(ConsoleUi::default()));
        controller
            .start_session(
                Box::new(LineTransport::new(io::sink(), "s2")),
                "s2",
                "/tmp/main.py",
                RunParameters::default(),
                DebugSettings::default(),
            )
            .unwrap();
        let code = run_session(&mut controller, &mut Cursor::new(""), None, false).unwrap();
        assert_eq!(code, 0);
        assert_eq!(controller.state(), SessionState::Stopped);
    }
}
