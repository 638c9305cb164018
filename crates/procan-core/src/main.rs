//! procan - process analysis daemon.
//!
//! Modes:
//! - `interactive`: analyzer in the background, line commands on stdin
//! - `daemon`: foreground service driven by signals
//! - `pipe`: daemon that also prints every score change to stdout
//! - `check`: resolve and validate configuration, print it as JSON

use clap::{Args, Parser, Subcommand};
use procan_common::Error;
use procan_config::{load_config, ConfigError, ConfigOptions, ResolvedConfig};
use procan_core::analyzer::{
    snapshot_ranking, Analyzer, Control, RunSummary, Service, SignalBridge,
};
use procan_core::backend::{BackendKind, Dispatcher};
use procan_core::collect::{ProcCollector, SnapshotSource};
use procan_core::display::render_tracked;
use procan_core::exit_codes::ExitCode;
use procan_core::history::read_table;
use procan_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use procan_core::scoring::{PipeSink, ScoreSink, TraceSink};
use procan_core::unix_now;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};

/// Process analyzer: flags processes with sustained CPU activity or memory growth
#[derive(Parser)]
#[command(name = "procan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Configuration file (legacy `key: value` format, or TOML with a .toml extension)
    #[arg(long, global = true, env = "PROCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Sampling and analysis interval in milliseconds
    #[arg(long, global = true, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..))]
    interval_ms: u64,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analyzer and accept commands on stdin (p, s, r, q)
    Interactive(RunArgs),

    /// Run as a foreground service until SIGTERM/SIGINT
    Daemon(RunArgs),

    /// Like daemon, and print every score change to stdout
    Pipe(RunArgs),

    /// Resolve and validate configuration, then print it as JSON
    Check,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Notification backend (log, mail, script); repeat for several
    #[arg(short = 'b', long = "backend", value_parser = parse_backend)]
    backends: Vec<BackendKind>,
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    s.parse()
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let exit_code = match cli.command {
        Commands::Interactive(args) => run_interactive(&cli.global, &args),
        Commands::Daemon(args) => run_daemon(&cli.global, &args, false),
        Commands::Pipe(args) => run_daemon(&cli.global, &args, true),
        Commands::Check => run_check(&cli.global),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared setup
// ============================================================================

fn config_options(global: &GlobalOpts) -> ConfigOptions {
    ConfigOptions {
        config_path: global.config.clone(),
        search_paths: None,
    }
}

fn config_error(err: ConfigError) -> Error {
    match err {
        ConfigError::NotFound { path } => Error::ConfigNotFound {
            path: path.display().to_string(),
        },
        other => Error::InvalidConfig(other.to_string()),
    }
}

fn fail(err: &Error) -> ExitCode {
    eprintln!("{}", err.to_human());
    ExitCode::for_error(err)
}

fn load(global: &GlobalOpts) -> Result<ResolvedConfig, Error> {
    let resolved = load_config(&config_options(global)).map_err(config_error)?;
    info!(
        source = %resolved.source,
        path = ?resolved.path,
        warnings = resolved.warnings.len(),
        "configuration loaded"
    );
    Ok(resolved)
}

/// Backend kinds in command-line order with duplicates removed.
fn selected_backends(args: &RunArgs) -> Vec<BackendKind> {
    let mut kinds = Vec::new();
    for kind in &args.backends {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }
    kinds
}

fn start_service(
    global: &GlobalOpts,
    args: &RunArgs,
    sink: Box<dyn ScoreSink + Send>,
) -> Result<Service, Error> {
    let resolved = load(global)?;
    let kinds = selected_backends(args);
    let analyzer = Analyzer::new(resolved.config, Dispatcher::for_kinds(&kinds), unix_now())
        .with_sink(sink);
    let interval = Duration::from_millis(global.interval_ms);

    // The first sample proves /proc is usable and seeds the CPU tick baseline.
    let mut collector = ProcCollector::new();
    let first = collector.collect().map_err(Error::from)?;
    info!(
        backends = ?kinds,
        interval_ms = global.interval_ms,
        processes = first.len(),
        "starting analyzer"
    );
    Service::start(analyzer, Box::new(collector), interval).map_err(Error::Io)
}

fn start_signals(global: &GlobalOpts, service: &Service) -> Result<SignalBridge, Error> {
    let options = config_options(global);
    SignalBridge::spawn(service.controller(), move || match load_config(&options) {
        Ok(resolved) => Some(resolved.config),
        Err(e) => {
            error!(error = %e, code = e.code(), "configuration reload failed");
            None
        }
    })
    .map_err(Error::Io)
}

// ============================================================================
// Modes
// ============================================================================

fn run_daemon(global: &GlobalOpts, args: &RunArgs, pipe: bool) -> ExitCode {
    let run_id = generate_run_id();
    let sink: Box<dyn ScoreSink + Send> = if pipe {
        Box::new(PipeSink::stdout())
    } else {
        Box::new(TraceSink)
    };
    let service = match start_service(global, args, sink) {
        Ok(service) => service,
        Err(e) => return fail(&e),
    };
    let bridge = match start_signals(global, &service) {
        Ok(bridge) => bridge,
        Err(e) => {
            service.shutdown();
            service.wait();
            return fail(&e);
        }
    };
    info!(%run_id, pid = std::process::id(), "procan running");

    let summary = service.wait();
    bridge.close();
    info!(%run_id, cycles = summary.cycles, "procan stopped");
    finish(summary)
}

/// Exit code for a finished run.
fn finish(summary: RunSummary) -> ExitCode {
    match summary.failure {
        Some(e) => fail(&e),
        None => ExitCode::Clean,
    }
}

fn run_interactive(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    let service = match start_service(global, args, Box::new(TraceSink)) {
        Ok(service) => service,
        Err(e) => return fail(&e),
    };
    let bridge = match start_signals(global, &service) {
        Ok(bridge) => Some(bridge),
        Err(e) => {
            warn!(error = %e, "signal handling unavailable");
            None
        }
    };

    let (line_tx, line_rx) = mpsc::channel::<String>();
    let reader = std::thread::Builder::new()
        .name("procan-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = reader {
        service.shutdown();
        service.wait();
        return fail(&Error::Io(e));
    }

    let table = service.table();
    let controller = service.controller();
    let mut stdout = std::io::stdout();
    print_help(&mut stdout);

    while service.is_running() {
        let line = match line_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let output = match line.trim() {
            "p" => render_tracked(&read_table(&table), unix_now()),
            "s" => snapshot_ranking(&table).render(),
            "r" => {
                let _ = controller.send(Control::Reset);
                "statistics reset\n".to_string()
            }
            "q" => break,
            "" => continue,
            _ => {
                print_help(&mut stdout);
                continue;
            }
        };
        let _ = stdout.write_all(output.as_bytes());
        let _ = stdout.flush();
    }

    service.shutdown();
    let summary = service.wait();
    if let Some(bridge) = bridge {
        bridge.close();
    }
    finish(summary)
}

fn print_help(out: &mut impl Write) {
    let _ = writeln!(
        out,
        "commands: p = tracked processes, s = statistics, r = reset statistics, q = quit"
    );
    let _ = out.flush();
}

fn run_check(global: &GlobalOpts) -> ExitCode {
    let resolved = match load(global) {
        Ok(resolved) => resolved,
        Err(e) => return fail(&e),
    };
    let report = serde_json::json!({
        "status": "ok",
        "source": resolved.source.to_string(),
        "path": resolved.path.as_ref().map(|p| p.display().to_string()),
        "warnings": resolved.warnings,
        "config": resolved.config,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => fail(&Error::Json(e)),
    }
}
