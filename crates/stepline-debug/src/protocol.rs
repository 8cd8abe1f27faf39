//! Line-debugging protocol vocabulary and wire envelope.
//! - methods: literal method identifiers, both directions
//! - Envelope: one JSON-RPC 2.0 object per line
//! - inbound payloads: what the debuggee reports
//! - outbound params: what the controller sends

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::DebuggerError;

/// Method identifiers.
pub mod methods {
    // Inbound.
    pub const LINE: &str = "LINE";
    pub const STACK: &str = "STACK";
    pub const DEBUG_STARTUP: &str = "DEBUG_STARTUP";
    pub const CLEAR_BP: &str = "CLEAR_BP";
    pub const SYNTAX_ERROR: &str = "SYNTAX_ERROR";
    pub const BP_CONDITION_ERROR: &str = "BP_CONDITION_ERROR";
    pub const EXCEPTION: &str = "EXCEPTION";
    pub const EXEC_STATEMENT_ERROR: &str = "EXEC_STATEMENT_ERROR";
    pub const EXEC_STATEMENT_OUTPUT: &str = "EXEC_STATEMENT_OUTPUT";
    pub const SIGNAL: &str = "SIGNAL";
    pub const EPILOGUE_EXIT_CODE: &str = "EPILOGUE_EXIT_CODE";

    // Both directions.
    pub const THREAD_LIST: &str = "THREAD_LIST";
    pub const VARIABLES: &str = "VARIABLES";
    pub const VARIABLE: &str = "VARIABLE";
    pub const FORK_TO: &str = "FORK_TO";
    pub const CALL_TRACE: &str = "CALL_TRACE";
    pub const THREAD_SET: &str = "THREAD_SET";

    // Outbound.
    pub const STEP: &str = "STEP";
    pub const STEP_OVER: &str = "STEP_OVER";
    pub const STEP_OUT: &str = "STEP_OUT";
    pub const CONTINUE: &str = "CONTINUE";
    pub const EXECUTE_STATEMENT: &str = "EXECUTE_STATEMENT";
    pub const SET_BP: &str = "SET_BP";
    pub const BP_ENABLE: &str = "BP_ENABLE";
    pub const BP_IGNORE: &str = "BP_IGNORE";
    pub const STEP_QUIT: &str = "STEP_QUIT";
}

pub const JSONRPC_VERSION: &str = "2.0";

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: SmolStr,
    pub method: SmolStr,
    #[serde(default)]
    pub procuuid: SmolStr,
    #[serde(default)]
    pub params: Value,
}

impl Envelope {
    pub fn new(method: &str, session_id: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: SmolStr::new_inline(JSONRPC_VERSION),
            method: SmolStr::new(method),
            procuuid: SmolStr::new(session_id),
            params: params.unwrap_or(Value::Null),
        }
    }

    /// Encode as one line, newline included.
    pub fn encode(&self) -> Result<String, DebuggerError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self, DebuggerError> {
        let envelope: Self = serde_json::from_str(line.trim_end_matches(['\r', '\n']))?;
        if envelope.jsonrpc != JSONRPC_VERSION {
            return Err(DebuggerError::Transport(SmolStr::new(format!(
                "unsupported jsonrpc version {}",
                envelope.jsonrpc
            ))));
        }
        Ok(envelope)
    }
}

/// One stack frame, sent as `[file, line, function, arguments]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub arguments: String,
}

impl<'de> Deserialize<'de> for StackFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Vec::<Value>::deserialize(deserializer)?;
        let text = |index: usize| match fields.get(index) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let file = match fields.first() {
            Some(Value::String(file)) => file.clone(),
            _ => return Err(D::Error::custom("stack frame without a file name")),
        };
        Ok(Self {
            file,
            line: fields.get(1).map_or(0, lenient_line),
            function: text(2),
            arguments: text(3),
        })
    }
}

/// Line numbers arrive as integers or numeric strings.
fn lenient_line(value: &Value) -> u32 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|line| u32::try_from(line).ok())
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn deserialize_line<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(lenient_line(&Value::deserialize(deserializer)?))
}

/// `LINE` / `STACK`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StackPayload {
    #[serde(default)]
    pub stack: Vec<StackFrame>,
}

/// `EXCEPTION`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExceptionPayload {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Vec<StackFrame>,
}

/// `CLEAR_BP` / `BP_CONDITION_ERROR`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileLinePayload {
    pub filename: String,
    #[serde(deserialize_with = "deserialize_line")]
    pub line: u32,
}

/// `SYNTAX_ERROR`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyntaxErrorPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default, alias = "linenumber", deserialize_with = "deserialize_line")]
    pub line: u32,
    #[serde(default, deserialize_with = "deserialize_line")]
    pub characternumber: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub broken: bool,
}

/// `THREAD_LIST`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadListPayload {
    #[serde(rename = "currentID", default)]
    pub current_id: i64,
    #[serde(default)]
    pub thread_list: Vec<ThreadInfo>,
}

/// `VARIABLES`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariablesPayload {
    #[serde(default)]
    pub scope: i32,
    #[serde(default)]
    pub variables: Vec<Value>,
}

/// `VARIABLE`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariablePayload {
    #[serde(default)]
    pub scope: i32,
    #[serde(default)]
    pub variable: Value,
    #[serde(default)]
    pub variables: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallSite {
    #[serde(default)]
    pub filename: String,
    #[serde(default, deserialize_with = "deserialize_line")]
    pub linenumber: u32,
    #[serde(default)]
    pub codename: String,
}

/// `CALL_TRACE`. Event `c` is a call, anything else a return.
#[derive(Debug, Clone, Deserialize)]
pub struct CallTracePayload {
    pub event: String,
    #[serde(default)]
    pub from: CallSite,
    #[serde(default)]
    pub to: CallSite,
}

/// `EXEC_STATEMENT_OUTPUT` / `EXEC_STATEMENT_ERROR`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecTextPayload {
    #[serde(default)]
    pub text: String,
}

/// `SIGNAL`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default, deserialize_with = "deserialize_line")]
    pub linenumber: u32,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub arguments: String,
}

/// `EPILOGUE_EXIT_CODE`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitCodePayload {
    #[serde(default)]
    pub exit_code: i32,
}

/// Which process to follow after a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkTarget {
    Child,
    Parent,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForkToParams {
    pub target: ForkTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContinueParams {
    pub special: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesParams {
    pub frame_number: u32,
    pub scope: i32,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableParams {
    pub frame_number: u32,
    pub variable: Vec<String>,
    pub scope: i32,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteStatementParams {
    pub statement: String,
    pub frame_number: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointParams {
    pub filename: String,
    pub line: u32,
    pub set_breakpoint: bool,
    pub condition: Option<String>,
    pub temporary: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakpointEnableParams {
    pub filename: String,
    pub line: u32,
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakpointIgnoreParams {
    pub filename: String,
    pub line: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadSetParams {
    #[serde(rename = "threadID")]
    pub thread_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepQuitParams {
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallTraceParams {
    pub enable: bool,
}
