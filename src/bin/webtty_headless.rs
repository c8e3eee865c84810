//! webtty headless renderer
//!
//! Feeds a byte stream through the terminal engine and prints the resulting
//! screen, either as text or as a JSON dump of the screen model.
//!
//! ```bash
//! printf 'Hello\x1b[31mRed\x1b[0m' | webtty-headless --cols 40 --rows 5
//! webtty-headless --file session.bin --json
//! ```
//!
//! The scrollback capacity comes from the config file unless `--scrollback`
//! overrides it.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use webtty::app::{self, Config};
use webtty::Terminal;

#[derive(Parser, Debug)]
#[command(name = "webtty-headless", version, about = "Render a terminal byte stream without a client")]
struct Args {
    /// Terminal columns
    #[arg(short, long, default_value_t = 80)]
    cols: u16,

    /// Terminal rows
    #[arg(short, long, default_value_t = 24)]
    rows: u16,

    /// Scrollback capacity in lines (defaults to the config's `scrollback`)
    #[arg(long)]
    scrollback: Option<usize>,

    /// Config file (defaults to ~/.webtty/config.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Input file (stdin if not specified)
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Print the screen model as JSON instead of text
    #[arg(short, long)]
    json: bool,
}

fn main() -> ExitCode {
    app::init_logging();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let scrollback = match args.scrollback {
        Some(lines) => lines,
        None => Config::load_or_default(args.config.as_deref())?.scrollback,
    };

    let input = match &args.file {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let mut terminal = Terminal::with_scrollback(
        usize::from(args.cols.max(1)),
        usize::from(args.rows.max(1)),
        scrollback,
    );
    tracing::debug!(cols = args.cols, rows = args.rows, scrollback, "rendering");
    terminal.process(&input);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, terminal.screen())?;
        writeln!(out)?;
    } else {
        for line in terminal.screen().text() {
            writeln!(out, "{}", line.trim_end())?;
        }
    }
    Ok(())
}
