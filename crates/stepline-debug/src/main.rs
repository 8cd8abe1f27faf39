//! Drive one debug session over stdio.

use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use stepline_debug::stdio::{
    env_flag, run_session, ConsoleUi, LineTransport, ProtocolLog, PROTOCOL_VERBOSE_ENV,
};
use stepline_debug::{
    BreakpointRecord, DebugSessionController, NoProject, ProjectDir, ProjectRoot, SessionConfig,
};

#[derive(Debug, Parser)]
#[command(
    name = "stepline-debug",
    about = "Control a Python debuggee speaking the line protocol on stdin/stdout"
)]
struct Args {
    /// Session configuration file.
    #[arg(long, value_name = "FILE", default_value = "stepline.toml")]
    config: PathBuf,
    /// Session id carried in every envelope. Generated when omitted.
    #[arg(long, value_name = "ID")]
    session_id: Option<String>,
    /// JSON file with persisted breakpoints, rewritten when the session ends.
    #[arg(long, value_name = "FILE")]
    breakpoints: Option<PathBuf>,
    /// Script being debugged.
    script: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("stepline-debug error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> anyhow::Result<i32> {
    let config = SessionConfig::load(&args.config)?;
    let project: Rc<dyn ProjectRoot> = match &config.project_root {
        Some(root) => Rc::new(ProjectDir::new(root)),
        None => Rc::new(NoProject),
    };
    let session_id = args.session_id.unwrap_or_else(generate_session_id);
    let ui = ConsoleUi {
        follow_child: config.debug.follow_child,
    };

    let mut controller = DebugSessionController::new(Rc::clone(&project), Box::new(ui));
    if let Some(path) = &args.breakpoints {
        let records = read_breakpoints(path)?;
        let kept = controller.breakpoints_mut().restore(&records, &*project);
        info!("restored {kept} of {} breakpoints", records.len());
    }

    let log = ProtocolLog::from_env();
    let verbose = env_flag(PROTOCOL_VERBOSE_ENV);
    let transport = LineTransport::new(io::stdout(), &session_id)
        .with_log(log.clone())
        .verbose(verbose);
    controller.start_session(
        Box::new(transport),
        &session_id,
        &args.script,
        config.run,
        config.debug,
    )?;

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let exit_code = run_session(&mut controller, &mut reader, log.as_ref(), verbose)?;

    if let Some(path) = &args.breakpoints {
        let records = controller.breakpoints().records();
        let contents = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, contents)
            .with_context(|| format!("writing breakpoints to {}", path.display()))?;
    }
    Ok(exit_code)
}

fn read_breakpoints(path: &Path) -> anyhow::Result<Vec<BreakpointRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading breakpoints from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing breakpoints from {}", path.display()))
}

fn generate_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    format!("{:x}-{nanos:x}", std::process::id())
}
