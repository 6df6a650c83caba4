mod app;
mod config;
mod overlay;
mod plc;

use crate::{app::App, config::Config};
use std::{env, process};

fn main() {
    env_logger::init();

    let config_path = Config::path_from_args(env::args());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(error) => {
            log::error!("{}", error);
            process::exit(1);
        }
    };

    match App::new(config) {
        Ok(app) => app.run(),
        Err(error) => {
            log::error!("Failed to start Voortman3D: {}", error);
            process::exit(1);
        }
    }
}
