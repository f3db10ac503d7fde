//! rfewer - Filtering Pager for Large Text Files
//!
//! Non-interactive driver: indexes the file, applies the filters given on the
//! command line, positions the view and prints it.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgGroup, Command};
use rfewer::progress::WriterProgress;
use rfewer::{FewerError, Session, Settings, MAX_FILTER_SLOTS};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("rfewer")
        .version(rfewer::VERSION)
        .about("A filtering pager for large text files")
        .long_about(
            "rfewer shows the lines of a file that pass every given regex filter. \
             Filters take the form /pattern/flags with flags i (ignore case) and \
             ! (keep non-matching lines); bare text is wrapped in slashes and a \
             leading ! negates it.",
        )
        .arg(
            Arg::new("file")
                .help("Path to the file to view")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("regex")
                .long("regex")
                .short('e')
                .help("Filter expression (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("search")
                .long("search")
                .short('s')
                .help("Search expression; the view starts at its first match"),
        )
        .arg(
            Arg::new("line")
                .long("line")
                .short('l')
                .help("Start the view at this line number")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("percent")
                .long("percent")
                .short('p')
                .help("Start the view this far through the displayed lines")
                .value_parser(clap::value_parser!(u64)),
        )
        .group(ArgGroup::new("position").args(["line", "percent"]))
        .arg(
            Arg::new("count")
                .long("count")
                .short('c')
                .help("Print at most this many lines")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("line-numbers")
                .short('n')
                .long("line-numbers")
                .help("Prefix each line with its line number")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log debug output to stderr")
                .action(ArgAction::SetTrue),
        )
}

fn run() -> Result<()> {
    let matches = cli().get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let file_path = PathBuf::from(
        matches
            .get_one::<String>("file")
            .context("file argument is required")?,
    );
    let filters: Vec<&String> = matches
        .get_many::<String>("regex")
        .map(|values| values.collect())
        .unwrap_or_default();
    if filters.len() > MAX_FILTER_SLOTS {
        return Err(FewerError::invalid_argument(format!(
            "at most {} filters are supported, got {}",
            MAX_FILTER_SLOTS,
            filters.len()
        ))
        .into());
    }

    let settings = Settings::load()?;
    let poll_interval = settings.poll_interval();
    let mut session = Session::open(&file_path, settings)?;
    session.parse_all(&mut WriterProgress::stderr("parsing line: "));

    for (slot, text) in filters.iter().enumerate() {
        session.set_filter(slot, text)?;
        if let Some(message) = session.take_info() {
            eprintln!("filter {}: {}", slot + 1, message);
        }
    }
    while !session.wait_for_filters(poll_interval) {
        if let Some(status) = session.take_info() {
            log::info!("{}", status);
        }
    }

    if let Some(line) = matches.get_one::<u64>("line") {
        if !session.go_to_line(*line) {
            eprintln!("{}", session.take_info().unwrap_or_default());
        }
    } else if let Some(percent) = matches.get_one::<u64>("percent") {
        session.go_to_percent(*percent);
    }

    if let Some(text) = matches.get_one::<String>("search") {
        session.set_search(text)?;
        if !session.search_next()? {
            eprintln!("{}", session.take_info().unwrap_or_default());
        }
    }

    let count = matches.get_one::<usize>("count").copied().unwrap_or(usize::MAX);
    let numbered = matches.get_flag("line-numbers");
    print_view(&mut session, count, numbered)?;

    log::info!("{}", session.command_line());
    Ok(())
}

/// Write up to `count` displayed lines from the view top to stdout
fn print_view(session: &mut Session, count: usize, numbered: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let index = std::sync::Arc::clone(session.index());
    let viewport = session.viewport_mut();

    if count == 0 || !viewport.start() {
        return Ok(());
    }
    let mut written = 0;
    loop {
        let record = index.line(viewport.current())?;
        if numbered {
            write!(out, "{:>7} ", record.number)?;
        }
        out.write_all(index.line_bytes(&record))?;
        out.write_all(b"\n")?;
        written += 1;
        if written == count || !viewport.next() {
            break;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("rfewer: {:#}", err);
        let status = err
            .downcast_ref::<FewerError>()
            .map(FewerError::exit_status)
            .unwrap_or(1);
        std::process::exit(status);
    }
}
