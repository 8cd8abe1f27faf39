//! Breakpoint synchronization.
//! - BreakpointMirror: forwards collection edits to the debuggee
//! - validate_breakpoints: drop stale breakpoints at startup
//! - send_all_breakpoints / send_watch_expressions: startup handshake

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use tracing::{debug, warn};

use stepline_syntax::BreakLineCache;

use crate::breakpoint::Breakpoint;
use crate::collection::CollectionObserver;
use crate::error::DebuggerError;
use crate::project::ProjectRoot;
use crate::protocol::{
    methods, BreakpointEnableParams, BreakpointIgnoreParams, SetBreakpointParams,
};

use super::{DebugSessionController, Link};

pub(super) fn to_params<T: serde::Serialize>(
    value: &T,
) -> Result<Option<serde_json::Value>, DebuggerError> {
    Ok(Some(serde_json::to_value(value)?))
}

/// `SET_BP`; clearing never carries a condition.
pub(super) fn send_set_breakpoint(
    link: &mut Link,
    filename: String,
    line: u32,
    set: bool,
    condition: Option<&str>,
    temporary: bool,
) -> Result<(), DebuggerError> {
    let params = SetBreakpointParams {
        filename,
        line,
        set_breakpoint: set,
        condition: if set { condition.map(str::to_owned) } else { None },
        temporary: set && temporary,
    };
    link.send(methods::SET_BP, to_params(&params)?)
}

pub(super) fn send_enable(
    link: &mut Link,
    filename: String,
    line: u32,
    enable: bool,
) -> Result<(), DebuggerError> {
    let params = BreakpointEnableParams {
        filename,
        line,
        enable,
    };
    link.send(methods::BP_ENABLE, to_params(&params)?)
}

pub(super) fn send_ignore(
    link: &mut Link,
    filename: String,
    line: u32,
    count: u32,
) -> Result<(), DebuggerError> {
    let params = BreakpointIgnoreParams {
        filename,
        line,
        count,
    };
    link.send(methods::BP_IGNORE, to_params(&params)?)
}

fn wire_filename(link: &Link, bp: &Breakpoint) -> Option<String> {
    let path = bp.absolute_path(&*link.project)?;
    Some(path.to_string_lossy().into_owned())
}

/// Set one breakpoint in the debuggee, followed by its enable and ignore
/// state when those differ from the defaults.
fn send_breakpoint(link: &mut Link, bp: &Breakpoint) -> Result<(), DebuggerError> {
    let Some(filename) = wire_filename(link, bp) else {
        warn!("breakpoint without a file not sent");
        return Ok(());
    };
    send_set_breakpoint(
        link,
        filename.clone(),
        bp.line(),
        true,
        Some(bp.condition()),
        bp.is_temporary(),
    )?;
    if !bp.is_enabled() {
        send_enable(link, filename.clone(), bp.line(), false)?;
    }
    if bp.ignore_count() > 0 {
        send_ignore(link, filename, bp.line(), bp.ignore_count())?;
    }
    Ok(())
}

fn clear_breakpoint(link: &mut Link, bp: &Breakpoint) -> Result<(), DebuggerError> {
    let Some(filename) = wire_filename(link, bp) else {
        return Ok(());
    };
    send_set_breakpoint(link, filename, bp.line(), false, None, false)
}

type SendFn = fn(&mut Link, &Breakpoint) -> Result<(), DebuggerError>;

/// Subscribed to the breakpoint collection; mirrors every edit while a
/// session is running.
pub(super) struct BreakpointMirror {
    link: Rc<RefCell<Link>>,
}

impl BreakpointMirror {
    pub(super) fn new(link: Rc<RefCell<Link>>) -> Self {
        Self { link }
    }

    fn each(&self, items: &[Breakpoint], send: SendFn) {
        let mut link = self.link.borrow_mut();
        if !link.mirrors_edits() {
            return;
        }
        for bp in items {
            if let Err(err) = send(&mut *link, bp) {
                let location = bp.location(&*link.project, true);
                warn!("breakpoint {location} not mirrored: {err}");
            }
        }
    }
}

impl CollectionObserver<Breakpoint> for BreakpointMirror {
    fn on_inserted(&mut self, _range: Range<usize>, items: &[Breakpoint]) {
        self.each(items, send_breakpoint);
    }

    fn on_about_to_remove(&mut self, _range: Range<usize>, items: &[Breakpoint]) {
        self.each(items, clear_breakpoint);
    }

    fn on_about_to_change(&mut self, _index: usize, old: &Breakpoint) {
        self.each(std::slice::from_ref(old), clear_breakpoint);
    }

    fn on_changed(&mut self, _index: usize, new: &Breakpoint) {
        self.each(std::slice::from_ref(new), send_breakpoint);
    }
}

/// Why `bp` can no longer stop the debuggee, if it cannot.
fn stale_reason(
    bp: &Breakpoint,
    project: &dyn ProjectRoot,
    cache: &mut BreakLineCache,
) -> Option<&'static str> {
    let Some(path) = bp.absolute_path(project) else {
        return Some("it has no file");
    };
    if !bp.is_valid(project) {
        return Some("its file is gone or its line is unset");
    }
    match cache.breakable_lines(&path, None, true, true) {
        None => Some("its file does not compile"),
        Some(lines) if !lines.contains(&bp.line()) => Some("its line is not breakable"),
        Some(_) => None,
    }
}

impl DebugSessionController {
    /// Remove breakpoints that cannot be hit any more. Removals are not
    /// mirrored.
    pub(super) fn validate_breakpoints(&mut self) -> usize {
        self.link.borrow_mut().mirroring = false;
        let mut removed = 0;
        for index in (0..self.breakpoints.len()).rev() {
            let Some(bp) = self.breakpoints.get(index) else {
                continue;
            };
            let Some(reason) = stale_reason(bp, &*self.project, &mut self.cache) else {
                continue;
            };
            warn!(
                "removing breakpoint {} because {reason}",
                bp.location(&*self.project, true)
            );
            self.breakpoints.remove_at(index);
            removed += 1;
        }
        self.link.borrow_mut().mirroring = true;
        removed
    }

    pub(super) fn send_all_breakpoints(&mut self) -> Result<(), DebuggerError> {
        let mut link = self.link.borrow_mut();
        for bp in &self.breakpoints {
            send_breakpoint(&mut *link, bp)?;
        }
        Ok(())
    }

    pub(super) fn send_watch_expressions(&self) {
        debug!(
            count = self.watches.len(),
            "watch expressions stay with the controller"
        );
    }
}
