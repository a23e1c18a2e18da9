//! # XPlay
//!
//! A command-line host that drives the XPlay playback engine and reports what
//! it presented.

use log::error;

mod cli;
mod logging;
mod report;
mod runner;

fn main() {
    logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}
