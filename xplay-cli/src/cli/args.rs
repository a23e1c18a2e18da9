//! CLI argument definitions for `xplay`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser.
pub fn build_cli() -> Command {
    Command::new("XPlay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play a source through the XPlay synchronization engine")
        .arg_required_else_help(true)
        .arg(
            Arg::new("SOURCE")
                .help("Source descriptor, e.g. synthetic:fps=30,frames=90")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("settings-json")
                .long("settings-json")
                .short('S')
                .value_name("PATH")
                .help("Path to a JSON file with sync settings"),
        )
        .arg(
            Arg::new("sync")
                .long("sync")
                .value_name("CLOCK")
                .value_parser(["video", "external"])
                .help("Master clock the video is synchronized to"),
        )
        .arg(
            Arg::new("framedrop")
                .long("framedrop")
                .value_name("POLICY")
                .value_parser(["auto", "always", "never"])
                .help("Late frame dropping policy"),
        )
        .arg(
            Arg::new("seek")
                .long("seek")
                .short('s')
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .help("Start playback at the given position"),
        )
        .arg(
            Arg::new("seek-at")
                .long("seek-at")
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .help("After this much wall time, seek to --seek-to"),
        )
        .arg(
            Arg::new("seek-to")
                .long("seek-to")
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .requires("seek-at")
                .help("Target of the --seek-at seek (defaults to 0)"),
        )
        .arg(
            Arg::new("max-seconds")
                .long("max-seconds")
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .help("Stop after this much wall time even if playback is not finished"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the summary as JSON and suppress per-frame lines"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Suppress per-frame lines"),
        )
}
