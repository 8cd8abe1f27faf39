use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use super::*;
use crate::breakpoint::Breakpoint;
use crate::ports::ExceptionReport;
use crate::project::{NoProject, ProjectDir};
use crate::protocol::{ForkTarget, StackFrame};

type Sent = Rc<RefCell<Vec<(String, Option<Value>)>>>;

struct RecordingTransport {
    sent: Sent,
}

impl Transport for RecordingTransport {
    fn send_command(&mut self, method: &str, params: Option<Value>) -> Result<(), DebuggerError> {
        self.sent.borrow_mut().push((method.to_owned(), params));
        Ok(())
    }
}

#[derive(Default)]
struct UiLog {
    events: Vec<DebugEvent>,
    entered: usize,
    exited: usize,
    fork_questions: usize,
    edits: usize,
}

struct StubUi {
    log: Rc<RefCell<UiLog>>,
    fork_answer: ForkTarget,
    edit_answer: Option<Breakpoint>,
}

impl DebugUi for StubUi {
    fn enter_debug_mode(&mut self) {
        self.log.borrow_mut().entered += 1;
    }

    fn exit_debug_mode(&mut self) {
        self.log.borrow_mut().exited += 1;
    }

    fn notify(&mut self, event: DebugEvent) {
        self.log.borrow_mut().events.push(event);
    }

    fn ask_fork_target(&mut self) -> ForkTarget {
        self.log.borrow_mut().fork_questions += 1;
        self.fork_answer
    }

    fn edit_breakpoint(&mut self, _current: &Breakpoint) -> Option<Breakpoint> {
        self.log.borrow_mut().edits += 1;
        self.edit_answer.clone()
    }
}

struct Harness {
    controller: DebugSessionController,
    sent: Sent,
    ui: Rc<RefCell<UiLog>>,
}

impl Harness {
    fn new(project: Rc<dyn ProjectRoot>) -> Self {
        Self::with_edit(project, None)
    }

    fn with_edit(project: Rc<dyn ProjectRoot>, edit_answer: Option<Breakpoint>) -> Self {
        let ui = Rc::new(RefCell::new(UiLog::default()));
        let controller = DebugSessionController::new(
            project,
            Box::new(StubUi {
                log: Rc::clone(&ui),
                fork_answer: ForkTarget::Parent,
                edit_answer,
            }),
        );
        Self {
            controller,
            sent: Rc::new(RefCell::new(Vec::new())),
            ui,
        }
    }

    fn start(&mut self, settings: DebugSettings) {
        self.controller
            .start_session(
                Box::new(RecordingTransport {
                    sent: Rc::clone(&self.sent),
                }),
                "s1",
                "/work/main.py",
                RunParameters::default(),
                settings,
            )
            .unwrap();
    }

    fn receive(&mut self, method: &str, params: Value) {
        self.controller.on_incoming_message("s1", method, params);
    }

    fn methods(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|(method, _)| method.clone()).collect()
    }

    fn take_sent(&self) -> Vec<(String, Option<Value>)> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    fn events(&self) -> Vec<DebugEvent> {
        self.ui
            .borrow()
            .events
            .iter()
            .filter(|event| !matches!(event, DebugEvent::StateChanged(_)))
            .cloned()
            .collect()
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("stepline-{name}-{stamp}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn frame(file: &str, line: u32) -> Value {
    json!([file, line, "run", ""])
}

#[test]
fn start_session_enters_debug_mode() {
    let mut h = Harness::new(Rc::new(NoProject));
    assert_eq!(h.controller.state(), SessionState::Stopped);
    h.start(DebugSettings::default());
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
    assert_eq!(h.controller.session_id(), Some("s1"));
    assert_eq!(h.controller.script_path(), Some(Path::new("/work/main.py")));
    assert_eq!(h.ui.borrow().entered, 1);

    let again = h.controller.start_session(
        Box::new(RecordingTransport {
            sent: Rc::clone(&h.sent),
        }),
        "s2",
        "/work/other.py",
        RunParameters::default(),
        DebugSettings::default(),
    );
    assert!(matches!(again, Err(DebuggerError::SessionActive)));
    assert_eq!(h.controller.session_id(), Some("s1"));
}

#[test]
fn first_stop_is_swallowed_when_not_stopping_at_first_line() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings {
        stop_at_first_line: false,
        ..DebugSettings::default()
    });
    h.receive("LINE", json!({"stack": [frame("/work/main.py", 1)]}));

    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
    assert!(h.controller.stop_at_first_line());
    assert!(h.sent.borrow().is_empty());
    assert_eq!(
        h.controller.pending_tasks().collect::<Vec<_>>(),
        [DeferredTask::Continue]
    );
    assert!(h.events().is_empty());

    assert_eq!(h.controller.run_pending(), 1);
    assert_eq!(
        h.take_sent(),
        [("CONTINUE".to_owned(), Some(json!({"special": false})))]
    );
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);

    h.receive("LINE", json!({"stack": [frame("/work/main.py", 4)]}));
    assert_eq!(h.controller.state(), SessionState::SuspendedInIde);
}

#[test]
fn line_stop_surfaces_top_frame_and_stack() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "LINE",
        json!({"stack": [frame("/work/lib.py", 7), frame("/work/main.py", 2)]}),
    );
    assert_eq!(h.controller.state(), SessionState::SuspendedInIde);
    let events = h.events();
    assert_eq!(
        events[0],
        DebugEvent::Stopped {
            file: "/work/lib.py".into(),
            line: 7,
            for_stack: false,
        }
    );
    assert!(matches!(&events[1], DebugEvent::Stack { frames, for_stack: false } if frames.len() == 2));

    h.receive("STACK", json!({"stack": [frame("/work/lib.py", 8)]}));
    assert!(matches!(
        h.events().last(),
        Some(DebugEvent::Stack { for_stack: true, .. })
    ));
}

#[test]
fn foreign_sessions_and_unknown_methods_are_dropped() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.controller
        .on_incoming_message("s1", "LINE", json!({"stack": [frame("/a.py", 1)]}));
    assert!(h.events().is_empty());

    h.start(DebugSettings::default());
    h.controller
        .on_incoming_message("other", "LINE", json!({"stack": [frame("/a.py", 1)]}));
    h.receive("NOT_A_METHOD", Value::Null);
    h.receive("CLEAR_BP", json!({"line": 3}));
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
    assert!(h.events().is_empty());
}

#[test]
fn incoming_lines_are_decoded() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.controller
        .on_incoming_line(
            r#"{"jsonrpc":"2.0","method":"THREAD_SET","procuuid":"s1","params":{}}"#,
        )
        .unwrap();
    assert_eq!(h.events(), [DebugEvent::ThreadSet]);
    assert!(h.controller.on_incoming_line("{").is_err());
    assert!(h.controller.on_incoming_line("   ").is_ok());
}

#[test]
fn inserted_breakpoints_are_mirrored_while_running() {
    let mut h = Harness::new(Rc::new(NoProject));
    let disabled = Breakpoint::new(
        &NoProject,
        Some(PathBuf::from("/work/a.py")),
        3,
        "x > 1",
        false,
        false,
        0,
    );
    let counted = Breakpoint::new(
        &NoProject,
        Some(PathBuf::from("/work/b.py")),
        5,
        "",
        true,
        true,
        2,
    );
    h.controller.breakpoints_mut().append(disabled.clone());
    assert!(h.sent.borrow().is_empty());

    h.start(DebugSettings::default());
    h.controller.breakpoints_mut().remove_at(0);
    h.controller
        .breakpoints_mut()
        .insert(vec![disabled, counted], 0);
    let sent = h.take_sent();
    assert_eq!(
        sent,
        [
            (
                "SET_BP".to_owned(),
                Some(json!({"filename": "/work/a.py", "line": 3, "setBreakpoint": false, "condition": null, "temporary": false}))
            ),
            (
                "SET_BP".to_owned(),
                Some(json!({"filename": "/work/a.py", "line": 3, "setBreakpoint": true, "condition": "x > 1", "temporary": false}))
            ),
            (
                "BP_ENABLE".to_owned(),
                Some(json!({"filename": "/work/a.py", "line": 3, "enable": false}))
            ),
            (
                "SET_BP".to_owned(),
                Some(json!({"filename": "/work/b.py", "line": 5, "setBreakpoint": true, "condition": "", "temporary": true}))
            ),
            (
                "BP_IGNORE".to_owned(),
                Some(json!({"filename": "/work/b.py", "line": 5, "count": 2}))
            ),
        ]
    );

    h.controller.stop_session(None).unwrap();
    assert_eq!(h.methods(), ["STEP_QUIT"]);
    h.take_sent();
    h.controller
        .breakpoints_mut()
        .append(Breakpoint::at(&NoProject, "/work/c.py", 1));
    h.controller.breakpoints_mut().delete_all();
    assert!(h.sent.borrow().is_empty());
}

#[test]
fn n_breakpoints_send_n_set_commands() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    for line in 1..=4 {
        h.controller
            .breakpoints_mut()
            .append(Breakpoint::at(&NoProject, "/work/a.py", line));
    }
    assert_eq!(h.methods(), ["SET_BP"; 4]);
}

#[test]
fn updated_breakpoint_is_cleared_then_set() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.controller
        .breakpoints_mut()
        .append(Breakpoint::at(&NoProject, "/work/a.py", 3));
    h.start(DebugSettings::default());
    h.controller.breakpoints_mut().update_line_at(0, 4);
    let sent = h.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].1.as_ref().unwrap()["setBreakpoint"], json!(false));
    assert_eq!(sent[0].1.as_ref().unwrap()["line"], json!(3));
    assert_eq!(sent[1].1.as_ref().unwrap()["setBreakpoint"], json!(true));
    assert_eq!(sent[1].1.as_ref().unwrap()["line"], json!(4));
}

#[test]
fn startup_validates_then_sends_breakpoints() {
    let dir = temp_dir("startup");
    let script = dir.join("main.py");
    std::fs::write(&script, "def f():\n    pass\n\nx = 1\n").expect("write script");
    let broken = dir.join("broken.py");
    std::fs::write(&broken, "return 1\n").expect("write broken");
    let project: Rc<dyn ProjectRoot> = Rc::new(ProjectDir::new(&dir));

    let mut h = Harness::new(Rc::clone(&project));
    for bp in [
        Breakpoint::at(&*project, &script, 2),
        Breakpoint::at(&*project, &script, 3),
        Breakpoint::at(&*project, &broken, 1),
        Breakpoint::at(&*project, dir.join("gone.py"), 1),
        Breakpoint::at(&*project, &script, 4),
    ] {
        h.controller.breakpoints_mut().append(bp);
    }
    h.start(DebugSettings::default());
    h.receive("DEBUG_STARTUP", Value::Null);

    let lines: Vec<u32> = h.controller.breakpoints().iter().map(Breakpoint::line).collect();
    assert_eq!(lines, [2, 4]);
    let sent = h.take_sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(method, params)| method == "SET_BP"
        && params.as_ref().unwrap()["setBreakpoint"] == json!(true)));
    assert_eq!(
        sent[0].1.as_ref().unwrap()["filename"],
        json!(script.to_string_lossy())
    );
    assert_eq!(h.controller.cache_mut().get(&broken), Some(&None));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn debuggee_clear_removes_valid_breakpoint() {
    let dir = temp_dir("clear-bp");
    let script = dir.join("main.py");
    std::fs::write(&script, "x = 1\ny = 2\n").expect("write script");
    let project: Rc<dyn ProjectRoot> = Rc::new(ProjectDir::new(&dir));
    let mut h = Harness::new(Rc::clone(&project));
    h.controller
        .breakpoints_mut()
        .append(Breakpoint::at(&*project, &script, 2));
    h.start(DebugSettings::default());

    h.receive(
        "CLEAR_BP",
        json!({"filename": script.to_string_lossy(), "line": 1}),
    );
    assert_eq!(h.controller.breakpoints().len(), 1);

    h.receive(
        "CLEAR_BP",
        json!({"filename": script.to_string_lossy(), "line": 2}),
    );
    assert!(h.controller.breakpoints().is_empty());
    assert_eq!(h.methods(), ["SET_BP"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn condition_error_offers_an_edit() {
    let original = Breakpoint::new(
        &NoProject,
        Some(PathBuf::from("/work/a.py")),
        3,
        "x >",
        false,
        true,
        0,
    );
    let fixed = Breakpoint::new(
        &NoProject,
        Some(PathBuf::from("/work/a.py")),
        3,
        "x > 1",
        false,
        true,
        0,
    );
    let mut h = Harness::with_edit(Rc::new(NoProject), Some(fixed.clone()));
    h.controller.breakpoints_mut().append(original);
    h.start(DebugSettings::default());

    h.receive("BP_CONDITION_ERROR", json!({"filename": "/work/a.py", "line": 3}));
    assert_eq!(h.ui.borrow().edits, 1);
    assert_eq!(h.controller.breakpoints().get(0), Some(&fixed));
    let sent = h.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1.as_ref().unwrap()["condition"], json!("x > 1"));
    assert!(h.events().contains(&DebugEvent::ConditionError {
        file: "/work/a.py".into(),
        line: 3,
    }));

    h.receive("BP_CONDITION_ERROR", json!({"filename": "/work/b.py", "line": 3}));
    assert_eq!(h.ui.borrow().edits, 1);
}

#[test]
fn cancelled_or_identical_edit_changes_nothing() {
    let bp = Breakpoint::at(&NoProject, "/work/a.py", 3);
    let mut h = Harness::with_edit(Rc::new(NoProject), Some(bp.clone()));
    h.controller.breakpoints_mut().append(bp);
    h.start(DebugSettings::default());
    h.receive("BP_CONDITION_ERROR", json!({"filename": "/work/a.py", "line": 3}));
    assert_eq!(h.ui.borrow().edits, 1);
    assert!(h.sent.borrow().is_empty());
}

#[test]
fn empty_stack_exception_is_unhandled_with_empty_fields() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "EXCEPTION",
        json!({"type": "ValueError", "message": "bad", "stack": []}),
    );
    assert_eq!(h.controller.state(), SessionState::SuspendedInIde);
    assert_eq!(
        h.events(),
        [DebugEvent::Exception(ExceptionReport {
            unhandled: true,
            ..ExceptionReport::default()
        })]
    );
    assert_eq!(
        h.controller.pending_tasks().collect::<Vec<_>>(),
        [DeferredTask::StopSession]
    );
    h.controller.run_pending();
    assert_eq!(h.methods(), ["STEP_QUIT"]);
    assert_eq!(h.controller.state(), SessionState::Stopped);
}

#[test]
fn empty_exception_payload_is_unhandled() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive("EXCEPTION", Value::Null);
    assert!(matches!(
        h.events().as_slice(),
        [DebugEvent::Exception(report)] if report.unhandled && report.kind.is_empty()
    ));
}

#[test]
fn unhandled_type_prefix_is_unhandled() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "EXCEPTION",
        json!({"type": "unhandled KeyError", "message": "'k'", "stack": [frame("/work/main.py", 3)]}),
    );
    assert!(matches!(
        h.events().as_slice(),
        [DebugEvent::Exception(report)] if report.unhandled && report.kind == "unhandled KeyError"
    ));
    assert_eq!(
        h.controller.pending_tasks().collect::<Vec<_>>(),
        [DeferredTask::StopSession]
    );
}

#[test]
fn capitalized_unhandled_type_stops_the_session() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "EXCEPTION",
        json!({
            "type": "Unhandled <class 'ValueError'>",
            "message": "bad",
            "stack": [frame("/work/main.py", 3)]
        }),
    );
    assert!(matches!(
        h.events().as_slice(),
        [DebugEvent::Exception(report)] if report.unhandled
    ));
    assert!(h.sent.borrow().is_empty());
    assert_eq!(
        h.controller.pending_tasks().collect::<Vec<_>>(),
        [DeferredTask::StopSession]
    );
    h.controller.run_pending();
    assert_eq!(h.methods(), ["STEP_QUIT"]);
}

#[test]
fn unhandled_prefix_needs_the_whole_word() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "EXCEPTION",
        json!({"type": "Unhand", "message": "", "stack": [frame("/work/main.py", 3)]}),
    );
    assert!(h.controller.pending_tasks().next().is_none());
    assert_eq!(h.methods(), ["THREAD_LIST", "VARIABLES", "VARIABLES"]);
}

#[test]
fn handled_exception_requests_threads_and_variables() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "EXCEPTION",
        json!({
            "type": "ValueError",
            "message": "bad",
            "stack": [["<string>", 1, "<module>", ""], ["<string>", 2, "<module>", ""], ["/work/lib.py", 9, "f", ""]]
        }),
    );
    let events = h.events();
    let [DebugEvent::Exception(report)] = events.as_slice() else {
        panic!("expected one exception event, got {events:?}");
    };
    assert!(!report.unhandled);
    let files: Vec<&str> = report.stack.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(files, ["/work/main.py", "/work/main.py", "/work/lib.py"]);
    assert_eq!(h.methods(), ["THREAD_LIST", "VARIABLES", "VARIABLES"]);
    let sent = h.take_sent();
    assert_eq!(
        sent[1].1,
        Some(json!({"frameNumber": 0, "scope": 1, "filters": []}))
    );
    assert_eq!(h.controller.state(), SessionState::SuspendedInIde);
    assert!(h.controller.pending_tasks().next().is_none());
}

#[test]
fn ignored_exception_repeats_last_run_action() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings {
        ignored_exceptions: ["StopIteration".to_owned()].into_iter().collect(),
        ..DebugSettings::default()
    });
    h.receive("LINE", json!({"stack": [frame("/work/main.py", 1)]}));
    h.controller.step_over().unwrap();
    h.take_sent();

    h.receive(
        "EXCEPTION",
        json!({"type": "StopIteration", "message": "", "stack": [frame("/work/main.py", 2)]}),
    );
    assert_eq!(h.methods(), ["STEP_OVER"]);
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
    assert_eq!(h.controller.last_run_action(), RunAction::StepOver);

    assert!(h.controller.unignore_exception("StopIteration"));
    assert!(h.controller.ignore_exception("KeyError"));
    assert!(!h.controller.ignore_exception("KeyError"));
}

#[test]
fn fork_request_asks_or_follows_settings() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive("FORK_TO", Value::Null);
    assert_eq!(h.ui.borrow().fork_questions, 1);
    assert_eq!(
        h.take_sent(),
        [("FORK_TO".to_owned(), Some(json!({"target": "parent"})))]
    );

    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings {
        autofork: true,
        follow_child: true,
        ..DebugSettings::default()
    });
    h.receive("FORK_TO", Value::Null);
    assert_eq!(h.ui.borrow().fork_questions, 0);
    assert_eq!(
        h.take_sent(),
        [("FORK_TO".to_owned(), Some(json!({"target": "child"})))]
    );
}

#[test]
fn reports_are_forwarded_to_the_ui() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive(
        "THREAD_LIST",
        json!({"currentID": 1, "threadList": [{"id": 1, "name": "MainThread", "broken": true}]}),
    );
    h.receive("VARIABLES", json!({"scope": 0, "variables": [["a", "int", "1"]]}));
    h.receive(
        "VARIABLE",
        json!({"scope": 1, "variable": ["obj"], "variables": [["x", "int", "2"]]}),
    );
    h.receive(
        "CALL_TRACE",
        json!({
            "event": "c",
            "from": {"filename": "/a.py", "linenumber": 1, "codename": "<module>"},
            "to": {"filename": "/a.py", "linenumber": 3, "codename": "f"}
        }),
    );
    h.receive("EXEC_STATEMENT_OUTPUT", json!({"text": ""}));
    h.receive("EXEC_STATEMENT_ERROR", json!({"text": "NameError"}));
    h.receive(
        "SYNTAX_ERROR",
        json!({"message": "invalid syntax", "filename": "/a.py", "linenumber": 4, "characternumber": 7}),
    );
    h.receive(
        "SIGNAL",
        json!({"message": "SIGSEGV", "filename": "/a.py", "linenumber": 5, "function": "f", "arguments": ""}),
    );

    let events = h.events();
    assert_eq!(events.len(), 9);
    assert!(matches!(&events[0], DebugEvent::ThreadList { current_id: 1, threads } if threads[0].broken));
    assert_eq!(
        events[2],
        DebugEvent::Variable {
            scope: 1,
            variables: vec![json!(["obj"]), json!(["x", "int", "2"])],
        }
    );
    assert!(matches!(&events[3], DebugEvent::CallTrace { is_call: true, to, .. } if to.linenumber == 3));
    assert_eq!(events[4], DebugEvent::StatementOutput(String::new()));
    assert_eq!(
        events[6],
        DebugEvent::SyntaxError {
            file: "/a.py".into(),
            line: 4,
            column: 7,
            message: "invalid syntax".into(),
        }
    );
    assert_eq!(
        events[7],
        DebugEvent::Stopped {
            file: "/a.py".into(),
            line: 5,
            for_stack: false,
        }
    );
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
    assert!(h.sent.borrow().is_empty());
}

#[test]
fn outbound_commands_and_transitions() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive("LINE", json!({"stack": [frame("/work/main.py", 1)]}));

    h.controller.step().unwrap();
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
    h.controller.step_out().unwrap();
    h.controller.continue_(true).unwrap();
    h.controller.thread_list().unwrap();
    h.controller
        .client_variable(0, vec!["obj".into(), "attr".into()], 1, vec!["__".into()])
        .unwrap();
    h.controller.execute_statement("print(x)", 2).unwrap();
    h.controller.set_thread(5).unwrap();
    h.controller
        .set_breakpoint(Path::new("/a.py"), 3, true, Some("x"), true)
        .unwrap();
    h.controller.clear_breakpoint(Path::new("/a.py"), 3).unwrap();
    h.controller
        .set_breakpoint_enabled(Path::new("/a.py"), 3, true)
        .unwrap();
    h.controller
        .set_breakpoint_ignore_count(Path::new("/a.py"), 3, 4)
        .unwrap();
    h.controller.start_call_trace().unwrap();
    h.controller.stop_call_trace().unwrap();
    h.controller.stop_session(Some(2)).unwrap();

    let sent = h.take_sent();
    let methods: Vec<&str> = sent.iter().map(|(method, _)| method.as_str()).collect();
    assert_eq!(
        methods,
        [
            "STEP",
            "STEP_OUT",
            "CONTINUE",
            "THREAD_LIST",
            "VARIABLE",
            "EXECUTE_STATEMENT",
            "THREAD_SET",
            "SET_BP",
            "SET_BP",
            "BP_ENABLE",
            "BP_IGNORE",
            "CALL_TRACE",
            "CALL_TRACE",
            "STEP_QUIT",
        ]
    );
    assert_eq!(sent[2].1, Some(json!({"special": true})));
    assert_eq!(
        sent[4].1,
        Some(json!({"frameNumber": 1, "variable": ["obj", "attr"], "scope": 0, "filters": ["__"]}))
    );
    assert_eq!(
        sent[5].1,
        Some(json!({"statement": "print(x)", "frameNumber": 2}))
    );
    assert_eq!(sent[6].1, Some(json!({"threadID": 5})));
    assert_eq!(
        sent[7].1,
        Some(json!({"filename": "/a.py", "line": 3, "setBreakpoint": true, "condition": "x", "temporary": true}))
    );
    assert_eq!(sent[11].1, Some(json!({"enable": true})));
    assert_eq!(sent[13].1, Some(json!({"exitCode": 2})));
    assert_eq!(h.controller.state(), SessionState::Stopped);
}

#[test]
fn commands_without_transport_fail() {
    let mut h = Harness::new(Rc::new(NoProject));
    let err = h.controller.step().unwrap_err();
    assert!(matches!(err, DebuggerError::TransportUnavailable { ref method } if method == "STEP"));
    assert_eq!(h.controller.state(), SessionState::Stopped);
    assert!(h.controller.stop_session(None).is_ok());
}

#[test]
fn process_exit_clears_the_session() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.controller.on_process_exit("other", 1);
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);

    h.receive("EPILOGUE_EXIT_CODE", json!({"exitCode": 4}));
    assert_eq!(h.controller.state(), SessionState::Stopped);
    assert_eq!(h.controller.session_id(), None);
    assert_eq!(h.controller.script_path(), None);
    assert_eq!(h.controller.last_exit_code(), Some(4));
    assert_eq!(h.ui.borrow().exited, 1);
    assert!(matches!(
        h.controller.thread_list(),
        Err(DebuggerError::TransportUnavailable { .. })
    ));

    h.start(DebugSettings::default());
    assert_eq!(h.controller.state(), SessionState::RunningInDebuggee);
}

#[test]
fn deferred_continue_is_skipped_after_exit() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings {
        stop_at_first_line: false,
        ..DebugSettings::default()
    });
    h.receive("LINE", json!({"stack": [frame("/work/main.py", 1)]}));
    h.controller.stop_session(None).unwrap();
    h.take_sent();
    assert_eq!(h.controller.run_pending(), 1);
    assert!(h.sent.borrow().is_empty());
}

#[test]
fn messages_after_stop_session_leave_the_state_stopped() {
    let project = Rc::new(NoProject);
    let mut h = Harness::new(project.clone());
    h.start(DebugSettings::default());
    h.controller.stop_session(None).unwrap();
    assert_eq!(h.methods(), ["STEP_QUIT"]);
    h.take_sent();

    h.receive("LINE", json!({"stack": [frame("/work/main.py", 4)]}));
    h.receive(
        "EXCEPTION",
        json!({"type": "ValueError", "message": "", "stack": [frame("/work/main.py", 4)]}),
    );
    assert_eq!(h.controller.state(), SessionState::Stopped);

    h.controller
        .breakpoints_mut()
        .append(Breakpoint::at(&*project, "/work/main.py", 4));
    assert!(h.sent.borrow().is_empty());

    h.receive("EPILOGUE_EXIT_CODE", json!({"exitCode": 0}));
    assert_eq!(h.controller.session_id(), None);
    assert_eq!(h.controller.last_exit_code(), Some(0));
}

#[test]
fn configured_ignored_exceptions_last_one_session() {
    let mut h = Harness::new(Rc::new(NoProject));
    assert!(h.controller.ignore_exception("StopIteration"));
    h.start(DebugSettings {
        ignored_exceptions: ["KeyError".to_owned(), "StopIteration".to_owned()]
            .into_iter()
            .collect(),
        ..DebugSettings::default()
    });
    assert!(h.controller.ignored_exceptions().contains("KeyError"));
    h.receive("EPILOGUE_EXIT_CODE", json!({"exitCode": 0}));

    let remaining: Vec<&str> = h
        .controller
        .ignored_exceptions()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(remaining, ["StopIteration"]);

    h.start(DebugSettings::default());
    assert!(!h.controller.ignored_exceptions().contains("KeyError"));
}

#[test]
fn stack_frames_keep_their_order() {
    let mut h = Harness::new(Rc::new(NoProject));
    h.start(DebugSettings::default());
    h.receive("STACK", json!({"stack": [frame("/b.py", 2), frame("/a.py", 1)]}));
    let events = h.events();
    let Some(DebugEvent::Stack { frames, .. }) = events.last() else {
        panic!("expected a stack event");
    };
    assert_eq!(
        frames[1],
        StackFrame {
            file: "/a.py".into(),
            line: 1,
            function: "run".into(),
            arguments: String::new(),
        }
    );
}
