mod args;
mod qualrow;

use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

fn main() {
    let args = args::Args::parse();
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    debug!("args: {:?}", args);

    let res = qualrow::run_report(&args);
    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
