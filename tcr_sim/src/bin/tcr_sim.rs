// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

use clap::Parser;
use log::error;
use tcr_sim::cli::Cli;
use tcr_sim::run::run;

fn main() {
    let cli = Cli::parse();
    let level = match cli.log_level.parse::<log::LevelFilter>() {
        Ok(level) => level,
        Err(_) => {
            eprintln!(
                "tcr_sim: configuration error: unknown log level \"{}\"",
                cli.log_level
            );
            std::process::exit(2);
        }
    };
    env_logger::Builder::new().filter_level(level).init();

    if let Err(e) = cli.to_params().and_then(|params| run(&params)) {
        error!("{}", e);
        eprintln!("tcr_sim: {}", e);
        std::process::exit(e.exit_code());
    }
}
