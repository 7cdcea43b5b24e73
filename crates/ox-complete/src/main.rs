//! ox-complete entrypoint: type keys into a document with insert-mode
//! completion attached and print the resulting line, menu and messages.
use anyhow::{Context, Result};
use clap::Parser;
use core_complete::{Backends, FsFileSource, FsPathExpander, StatusClass};
use core_config::load_from;
use core_events::parse_keys;
use core_state::{Document, DocumentSet};
use core_text::Position;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod replay;

use replay::{Outcome, Replay, Screen};

const LOG_FILE: &str = "ox-complete.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ox-complete", version, about = "Insert-mode completion driver")]
struct Args {
    /// Document to type into. An empty scratch document is used when omitted.
    pub path: Option<PathBuf>,
    /// Keys typed in insert mode, in key notation (`fo<C-n><C-y>`).
    #[arg(short, long, default_value = "")]
    pub keys: String,
    /// Cursor line, 1-based. Defaults to the last line.
    #[arg(long)]
    pub line: Option<usize>,
    /// Cursor column in bytes, 1-based. Defaults to the end of the line.
    #[arg(long)]
    pub col: Option<usize>,
    /// Optional configuration file path (overrides discovery of `ox-complete.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Extra dictionary file, after the configured ones. Repeatable.
    #[arg(long = "dict")]
    pub dict: Vec<PathBuf>,
    /// Another file loaded as an open document. Repeatable.
    #[arg(long = "open")]
    pub open: Vec<PathBuf>,
    /// Print every finished session as a JSON line.
    #[arg(long)]
    pub json: bool,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join(LOG_FILE);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
        .ok()
        // A subscriber is already installed; dropping the guard shuts the writer down.
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn open_current(args: &Args) -> Result<Document> {
    let mut doc = match args.path.as_ref() {
        Some(path) => match Document::open(path) {
            Ok(doc) => doc,
            Err(e) => {
                error!(target: "io", error = %e, "file_open_error");
                Document::new("untitled", "")?
            }
        },
        None => Document::new("untitled", "")?,
    };
    let last = doc.line_count().saturating_sub(1);
    let line = args.line.map_or(last, |l| l.saturating_sub(1));
    let byte = match args.col {
        Some(c) => c.saturating_sub(1),
        None => doc.line(line).map_or(0, |l| l.len()),
    };
    doc.set_cursor(Position::new(line, byte));
    Ok(doc)
}

fn open_documents(args: &Args) -> Result<DocumentSet> {
    let mut docs = DocumentSet::new();
    let current = docs.add(open_current(args)?);
    docs.set_current(current);
    for path in &args.open {
        match Document::open(path) {
            Ok(mut doc) => {
                doc.visible = true;
                docs.add(doc);
            }
            Err(e) => warn!(target: "io", file = %path.display(), error = %e, "other_document_skipped"),
        }
    }
    Ok(docs)
}

fn print_outcome(out: &Outcome, screen: &Screen, json: bool) -> Result<()> {
    println!("{}", out.line);
    if let Some(menu) = screen.menu.as_ref() {
        for (idx, row) in menu.rows.iter().enumerate() {
            let mark = if menu.selected == Some(idx) { '>' } else { ' ' };
            println!("{mark} {row}");
        }
    }
    for (msg, class) in &screen.status {
        match class {
            StatusClass::Error(kind) => println!("-- {msg} ({kind:?})"),
            _ => println!("-- {msg}"),
        }
    }
    for err in &out.errors {
        eprintln!("error: {err}");
    }
    if json {
        for done in &out.done {
            println!("{}", serde_json::to_string(done).context("encoding session result")?);
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = load_from(args.config.clone())?;
    let completion = &mut config.file.completion;
    completion.dictionary.extend(args.dict.iter().cloned());

    let keys = parse_keys(&args.keys).with_context(|| format!("parsing keys {:?}", args.keys))?;
    let docs = open_documents(&args)?;

    let mut paths = FsPathExpander::new().ignore_case(completion.fileignorecase);
    if let Some(dir) = args
        .path
        .as_deref()
        .and_then(Path::parent)
        .filter(|d| !d.as_os_str().is_empty())
    {
        paths = paths.with_base(dir);
    }
    let backends = Backends::default().with_files(FsFileSource).with_paths(paths);

    info!(
        target: "runtime.startup",
        path = args.path.as_ref().map(|p| p.display().to_string()).as_deref(),
        keys = keys.len(),
        open = args.open.len(),
        config_override = args.config.is_some(),
        "bootstrap_complete"
    );

    let mut replay = Replay::new(completion.clone(), backends, docs);
    replay.type_ahead(keys);
    let out = replay.run()?;
    let screen = replay.screen();
    let screen = screen.borrow();
    print_outcome(&out, &screen, args.json)
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let result = run(Args::parse());
    if let Err(e) = &result {
        error!(target: "runtime", error = %e, "run_failed");
    }
    info!(target: "runtime", "shutdown");
    result
}
