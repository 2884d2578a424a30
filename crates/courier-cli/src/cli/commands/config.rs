//! `courier config` – print config location and effective values.

use anyhow::Result;
use courier_core::config::{self, CourierConfig, Environment};

pub fn run_config(cfg: &CourierConfig) -> Result<()> {
    let path = config::config_path()?;
    let env = Environment::current();
    println!("# config file: {}", path.display());
    println!("# environment: {:?}", env);
    println!("# base url:    {}", cfg.base_url_for(env));
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
