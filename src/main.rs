use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;

use diorama::config::AppConfig;
use diorama::time::SystemClock;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.txt"));

    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to read config '{}'", config_path.display()))?;
    log::info!("Loaded config '{}'", config_path.display());

    diorama::app::run(config, Rc::new(SystemClock::new()))
}
