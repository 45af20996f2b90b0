use clap::Parser;
use log::{error, info};

use splice_event_map::cli::Args;
use splice_event_map::run;

fn main() {
    // Bad or missing arguments end the run with status 0.
    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(0);
        }
    };

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .init();

    let cfg = match args.to_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(0);
        }
    };

    match run(&cfg) {
        Ok(summary) => info!("{summary}"),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}
