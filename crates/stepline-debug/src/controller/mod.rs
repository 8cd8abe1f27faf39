//! Debug session controller module map.
//! - mod: session state, startup, shutdown, deferred tasks, accessors
//! - handlers: inbound method table and handlers
//! - commands: outbound commands
//! - sync: breakpoint mirroring and startup validation
//! - tests: controller unit tests

mod commands;
mod handlers;
mod sync;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use serde_json::Value;
use smol_str::SmolStr;
use tracing::{debug, error, info};

use stepline_syntax::BreakLineCache;

use crate::collection::{BreakpointCollection, WatchCollection};
use crate::config::{DebugSettings, RunParameters};
use crate::error::DebuggerError;
use crate::ports::{DebugEvent, DebugUi, Transport};
use crate::project::ProjectRoot;

use self::handlers::Handler;
use self::sync::BreakpointMirror;

/// Where control of the debuggee currently lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Stopped,
    RunningInDebuggee,
    SuspendedInIde,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::RunningInDebuggee => "running",
            Self::SuspendedInIde => "suspended",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user command that hands control back to the debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunAction {
    #[default]
    Continue,
    Step,
    StepOver,
    StepOut,
}

/// Work queued for the next turn of the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    Continue,
    StopSession,
}

/// State shared with the breakpoint collection observer.
struct Link {
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    project: Rc<dyn ProjectRoot>,
    mirroring: bool,
}

impl Link {
    fn send(&mut self, method: &str, params: Option<Value>) -> Result<(), DebuggerError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(DebuggerError::TransportUnavailable {
                method: SmolStr::new(method),
            });
        };
        debug!(method, "send command");
        transport.send_command(method, params)
    }

    fn mirrors_edits(&self) -> bool {
        self.mirroring && self.state != SessionState::Stopped
    }
}

/// Fields that live exactly as long as one debuggee process.
#[derive(Debug, Clone)]
struct Session {
    id: SmolStr,
    script_path: PathBuf,
    run_parameters: RunParameters,
    debug_settings: DebugSettings,
    /// Ignored exception types added from `debug_settings` for this session only.
    seeded_exceptions: Vec<String>,
}

/// Drives one debuggee at a time and keeps its breakpoints in sync.
pub struct DebugSessionController {
    link: Rc<RefCell<Link>>,
    project: Rc<dyn ProjectRoot>,
    ui: Box<dyn DebugUi>,
    breakpoints: BreakpointCollection,
    watches: WatchCollection,
    cache: BreakLineCache,
    handlers: FxHashMap<&'static str, Handler>,
    pending: VecDeque<DeferredTask>,
    session: Option<Session>,
    last_exit_code: Option<i32>,
    stop_at_first_line: bool,
    last_action: RunAction,
    ignored_exceptions: IndexSet<String>,
}

impl DebugSessionController {
    pub fn new(project: Rc<dyn ProjectRoot>, ui: Box<dyn DebugUi>) -> Self {
        let link = Rc::new(RefCell::new(Link {
            state: SessionState::Stopped,
            transport: None,
            project: Rc::clone(&project),
            mirroring: true,
        }));
        let mut breakpoints = BreakpointCollection::new();
        breakpoints.subscribe(Box::new(BreakpointMirror::new(Rc::clone(&link))));
        Self {
            link,
            project,
            ui,
            breakpoints,
            watches: WatchCollection::new(),
            cache: BreakLineCache::default(),
            handlers: handlers::table(),
            pending: VecDeque::new(),
            session: None,
            last_exit_code: None,
            stop_at_first_line: true,
            last_action: RunAction::Continue,
            ignored_exceptions: IndexSet::new(),
        }
    }

    /// Attach to a freshly launched debuggee.
    pub fn start_session(
        &mut self,
        transport: Box<dyn Transport>,
        session_id: &str,
        script_path: impl Into<PathBuf>,
        run_parameters: RunParameters,
        debug_settings: DebugSettings,
    ) -> Result<(), DebuggerError> {
        if self.state() != SessionState::Stopped {
            return Err(DebuggerError::SessionActive);
        }
        let script_path = script_path.into();
        info!(
            session = session_id,
            script = %script_path.display(),
            "starting debug session"
        );
        self.stop_at_first_line = debug_settings.stop_at_first_line;
        self.last_action = RunAction::Continue;
        self.end_session();
        let seeded_exceptions = debug_settings
            .ignored_exceptions
            .iter()
            .filter(|kind| self.ignored_exceptions.insert((*kind).clone()))
            .cloned()
            .collect();
        self.pending.clear();
        self.session = Some(Session {
            id: SmolStr::new(session_id),
            script_path,
            run_parameters,
            debug_settings,
            seeded_exceptions,
        });
        self.link.borrow_mut().transport = Some(transport);
        self.ui.enter_debug_mode();
        self.set_state(SessionState::RunningInDebuggee);
        Ok(())
    }

    /// The debuggee process went away.
    pub fn on_process_exit(&mut self, session_id: &str, exit_code: i32) {
        if !self.is_current_session(session_id) {
            debug!(session = session_id, "exit of a foreign session ignored");
            return;
        }
        info!(session = session_id, exit_code, "debuggee exited");
        self.end_session();
        self.last_exit_code = Some(exit_code);
        self.pending.clear();
        self.link.borrow_mut().transport = None;
        self.set_state(SessionState::Stopped);
        self.ui.exit_debug_mode();
    }

    /// Run the tasks queued so far. Tasks queued while running wait for the
    /// next call.
    pub fn run_pending(&mut self) -> usize {
        let batch: Vec<DeferredTask> = self.pending.drain(..).collect();
        let count = batch.len();
        for task in batch {
            let result = match task {
                DeferredTask::Continue => {
                    if self.state() == SessionState::Stopped {
                        debug!("session ended before the deferred continue");
                        continue;
                    }
                    self.continue_(false)
                }
                DeferredTask::StopSession => self.stop_session(None),
            };
            if let Err(err) = result {
                error!("deferred {task:?} failed: {err}");
            }
        }
        count
    }

    /// Forget the current session along with the exception types its
    /// settings added to the ignore list.
    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            for kind in &session.seeded_exceptions {
                self.ignored_exceptions.shift_remove(kind);
            }
        }
    }

    fn defer(&mut self, task: DeferredTask) {
        debug!(?task, "deferring");
        self.pending.push_back(task);
    }

    fn set_state(&mut self, state: SessionState) {
        let previous = std::mem::replace(&mut self.link.borrow_mut().state, state);
        if previous != state {
            info!("session state {previous} -> {state}");
        }
        self.ui.notify(DebugEvent::StateChanged(state));
    }

    fn is_current_session(&self, session_id: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.id == session_id)
    }

    fn notify(&mut self, event: DebugEvent) {
        self.ui.notify(event);
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.link.borrow().state
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.id.as_str())
    }

    #[must_use]
    pub fn script_path(&self) -> Option<&Path> {
        self.session
            .as_ref()
            .map(|session| session.script_path.as_path())
    }

    #[must_use]
    pub fn run_parameters(&self) -> Option<&RunParameters> {
        self.session.as_ref().map(|session| &session.run_parameters)
    }

    #[must_use]
    pub fn debug_settings(&self) -> Option<&DebugSettings> {
        self.session.as_ref().map(|session| &session.debug_settings)
    }

    /// Exit code of the most recently finished debuggee.
    #[must_use]
    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    /// Whether the next automatic stop is shown to the user.
    #[must_use]
    pub fn stop_at_first_line(&self) -> bool {
        self.stop_at_first_line
    }

    #[must_use]
    pub fn last_run_action(&self) -> RunAction {
        self.last_action
    }

    #[must_use]
    pub fn pending_tasks(&self) -> impl Iterator<Item = DeferredTask> + '_ {
        self.pending.iter().copied()
    }

    #[must_use]
    pub fn project(&self) -> &dyn ProjectRoot {
        &*self.project
    }

    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointCollection {
        &self.breakpoints
    }

    /// Edits made through this handle reach the debuggee while a session
    /// runs.
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointCollection {
        &mut self.breakpoints
    }

    #[must_use]
    pub fn watches(&self) -> &WatchCollection {
        &self.watches
    }

    pub fn watches_mut(&mut self) -> &mut WatchCollection {
        &mut self.watches
    }

    pub fn cache_mut(&mut self) -> &mut BreakLineCache {
        &mut self.cache
    }

    #[must_use]
    pub fn ignored_exceptions(&self) -> &IndexSet<String> {
        &self.ignored_exceptions
    }

    pub fn ignore_exception(&mut self, kind: impl Into<String>) -> bool {
        self.ignored_exceptions.insert(kind.into())
    }

    pub fn unignore_exception(&mut self, kind: &str) -> bool {
        self.ignored_exceptions.shift_remove(kind)
    }
}

impl fmt::Debug for DebugSessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSessionController")
            .field("state", &self.state())
            .field("session", &self.session)
            .field("breakpoints", &self.breakpoints.len())
            .field("watches", &self.watches.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
