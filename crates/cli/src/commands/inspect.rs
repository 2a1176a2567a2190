use std::path::Path;

use eyre::Result;
use keystone_bootstrap::{Bootstrap, BootstrapOptions};

pub fn handle_inspect(properties: Option<&Path>) -> Result<()> {
    let mut options = BootstrapOptions::default();
    if let Some(path) = properties {
        options = options.with_properties_file(path);
    }

    let bootstrap = Bootstrap::new(options, Vec::new())?;
    let config = bootstrap.extensions_config()?;

    println!("Bootstrap run: {}", bootstrap.run().id);
    println!("{}", serde_json::to_string_pretty(config.as_ref())?);
    Ok(())
}
