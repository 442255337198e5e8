use std::ffi::OsStr;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use catdiff::engine::compute_dissimilarity;
use catdiff::input::{check_pair, InputSource};
use catdiff::render::{DEFAULT_LEFT_LABEL, DEFAULT_RIGHT_LABEL, DEFAULT_TAB_SIZE};
use catdiff::terminal::{self, TerminalOptions};
use catdiff::highlight::Highlighter;
use catdiff::{
    align, compute_diff_highlighted, format_percent, DiffOptions, DEFAULT_CONTEXT_LINES,
};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Quiet period after a change event before re-rendering.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(120);

fn system_open<S: AsRef<OsStr>>(arg: S) -> Result<()> {
    #[cfg(target_os = "macos")]
    let status = Command::new("open").arg(arg).status()?;

    #[cfg(all(unix, not(target_os = "macos")))]
    let status = Command::new("xdg-open").arg(arg).status()?;

    #[cfg(target_os = "windows")]
    let status = Command::new("cmd")
        .args(["/C", "start", ""])
        .arg(arg)
        .status()?;

    if !status.success() {
        return Err(anyhow!("system open command failed with status {status}"));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Self-contained HTML fragment with legend and embedded styles.
    Html,
    /// Side-by-side text for the terminal.
    Terminal,
}

#[derive(Debug, Parser)]
#[command(
    name = "catdiff",
    version,
    about = "Compare two texts side by side and report how different they are"
)]
struct Cli {
    /// Previous version. Use '-' to read from stdin.
    previous: String,

    /// Current version. Use '-' to read from stdin.
    current: String,

    /// Unchanged lines kept around each change.
    #[arg(short, long, default_value_t = DEFAULT_CONTEXT_LINES)]
    context: usize,

    /// Show every line, not just the changes and their context.
    #[arg(long)]
    full: bool,

    #[arg(long, default_value = DEFAULT_LEFT_LABEL)]
    left_label: String,

    #[arg(long, default_value = DEFAULT_RIGHT_LABEL)]
    right_label: String,

    #[arg(long, default_value_t = DEFAULT_TAB_SIZE)]
    tab_size: usize,

    /// Wrap HTML cells longer than this many characters.
    #[arg(long, value_name = "COLUMNS")]
    wrap: Option<usize>,

    /// Color cell text by syntax, guessed from the file extension.
    #[arg(long)]
    highlight: bool,

    /// Language name or extension to highlight as (implies --highlight).
    #[arg(long, value_name = "TOKEN")]
    syntax: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Format::Html)]
    format: Format,

    /// Write the rendering here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Open the written HTML with the system viewer.
    #[arg(long)]
    open: bool,

    /// Render again whenever an input file changes (file inputs only).
    #[arg(long)]
    watch: bool,

    /// Width of each text column in terminal format.
    #[arg(long, default_value_t = 60)]
    width: usize,

    /// Never emit ANSI colors in terminal format.
    #[arg(long)]
    no_color: bool,
}

struct Inputs {
    previous: InputSource,
    current: InputSource,
}

struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
}

fn is_tty_stdout() -> bool {
    io::stdout().is_terminal()
}

fn validate(cli: &Cli, inputs: &Inputs) -> Result<()> {
    check_pair(&inputs.previous, &inputs.current)?;

    if cli.open && cli.output.is_none() {
        return Err(anyhow!("--open requires --output"));
    }
    if cli.open && cli.format != Format::Html {
        return Err(anyhow!("--open only works with --format html"));
    }
    if cli.watch {
        if cli.output.is_none() {
            return Err(anyhow!("--watch requires --output"));
        }
        if inputs.previous.path().is_none() || inputs.current.path().is_none() {
            return Err(anyhow!("--watch requires file input"));
        }
    }
    Ok(())
}

fn resolve_syntax(cli: &Cli, inputs: &Inputs) -> Option<String> {
    if cli.syntax.is_some() {
        return cli.syntax.clone();
    }
    if !cli.highlight {
        return None;
    }
    let guessed = inputs
        .previous
        .extension()
        .or_else(|| inputs.current.extension())
        .map(str::to_string);
    if guessed.is_none() {
        warn!("--highlight given but no file extension to guess the syntax from");
    }
    guessed
}

fn diff_options(cli: &Cli, inputs: &Inputs) -> DiffOptions {
    DiffOptions {
        context_lines: cli.context,
        full: cli.full,
        left_label: cli.left_label.clone(),
        right_label: cli.right_label.clone(),
        tab_size: cli.tab_size,
        wrap_column: cli.wrap,
        syntax: resolve_syntax(cli, inputs),
    }
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Everything that stays the same across watch reloads.
struct Session {
    options: DiffOptions,
    highlighter: Option<Highlighter>,
}

impl Session {
    fn new(cli: &Cli, inputs: &Inputs) -> Self {
        let options = diff_options(cli, inputs);
        let highlighter = match options.syntax.as_deref() {
            Some(token) if cli.format == Format::Html => {
                let highlighter = Highlighter::for_token(token);
                if highlighter.is_none() {
                    warn!("no syntax found for {token:?}, rendering without colors");
                }
                highlighter
            }
            _ => None,
        };
        Self {
            options,
            highlighter,
        }
    }
}

fn run_once(cli: &Cli, session: &Session, inputs: &Inputs) -> Result<()> {
    let options = &session.options;
    let previous = inputs.previous.read()?;
    let current = inputs.current.read()?;

    let (rendering, percent) = match cli.format {
        Format::Html => {
            let comparison = compute_diff_highlighted(
                &previous,
                &current,
                options,
                session.highlighter.as_ref(),
            );
            (comparison.rendered_fragment, comparison.dissimilarity_percent)
        }
        Format::Terminal => {
            let aligned = align(&previous, &current, options.context_lines);
            let terminal_options = TerminalOptions {
                width: cli.width,
                color: !cli.no_color && cli.output.is_none() && is_tty_stdout(),
                full: options.full,
                tab_size: options.tab_size,
            };
            let text = terminal::render(
                &aligned,
                &options.left_label,
                &options.right_label,
                &terminal_options,
            );
            (text, compute_dissimilarity(&previous, &current))
        }
    };

    let metric = format!("Code Difference: {}%", format_percent(percent));
    match cli.output.as_deref() {
        Some(path) => {
            write_output(path, &rendering)?;
            println!("{metric}");
        }
        None => {
            print!("{rendering}");
            eprintln!("{metric}");
        }
    }
    Ok(())
}

fn start_watcher(inputs: &Inputs) -> Result<FileWatcher> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        Config::default(),
    )?;

    for path in [inputs.previous.path(), inputs.current.path()]
        .into_iter()
        .flatten()
    {
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        debug!("watching {}", path.display());
    }

    Ok(FileWatcher {
        _watcher: watcher,
        rx,
    })
}

fn is_content_change(event: &notify::Result<Event>) -> bool {
    match event {
        Ok(event) => matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
        ),
        Err(err) => {
            warn!("watch error: {err}");
            false
        }
    }
}

fn run_watch(cli: &Cli, session: &Session, inputs: &Inputs) -> Result<()> {
    let watcher = start_watcher(inputs)?;
    eprintln!("Watching for changes, press Ctrl-C to stop");

    while let Ok(event) = watcher.rx.recv() {
        if !is_content_change(&event) {
            continue;
        }
        // editors often write in several steps
        while watcher.rx.recv_timeout(WATCH_DEBOUNCE).is_ok() {}

        if let Err(err) = run_once(cli, session, inputs) {
            eprintln!("Reload failed: {err:#}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let inputs = Inputs {
        previous: InputSource::parse(&cli.previous),
        current: InputSource::parse(&cli.current),
    };
    validate(&cli, &inputs)?;

    let session = Session::new(&cli, &inputs);
    run_once(&cli, &session, &inputs)?;

    if cli.open {
        if let Some(path) = cli.output.as_deref() {
            system_open(path)?;
        }
    }

    if cli.watch {
        return run_watch(&cli, &session, &inputs);
    }
    Ok(())
}
