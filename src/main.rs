use std::path::PathBuf;
use std::sync::Arc;

use metricbridge::config::{load_config, print_schema, DEFAULT_CONFIG_PATH, DOCKER_CONFIG_PATH};
use metricbridge::startup;
use metricbridge::utils::logger::init_logging;
use tracing::error;

struct Args {
    config_path: PathBuf,
    print_schema: bool,
}

fn parse_args() -> Args {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut print_schema = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--docker" => config_path = PathBuf::from(DOCKER_CONFIG_PATH),
            "--schema" => print_schema = true,
            "--config" => match args.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => {
                    eprintln!("--config needs a path");
                    std::process::exit(2);
                }
            },
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(2);
            }
        }
    }

    Args {
        config_path,
        print_schema,
    }
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    if args.print_schema {
        if let Err(e) = print_schema() {
            eprintln!("Error printing schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error initializing logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = startup::run(Arc::new(config)).await {
        error!(error = %e, "metricbridge stopped with an error");
        std::process::exit(1);
    }
}
