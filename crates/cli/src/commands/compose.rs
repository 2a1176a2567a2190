use std::path::Path;

use eyre::Result;
use keystone_bootstrap::{Bootstrap, BootstrapOptions};

pub fn handle_compose(properties: Option<&Path>) -> Result<()> {
    let mut options = BootstrapOptions::default();
    if let Some(path) = properties {
        options = options.with_properties_file(path);
    }

    let composed = Bootstrap::new(options, Vec::new())?.compose()?;

    println!("Composed {} modules:", composed.modules().len());
    for (position, module) in composed.modules().iter().enumerate() {
        println!("  {:>2}. {} ({})", position + 1, module.name, module.origin);
    }

    let extensions = composed.codecs().json().registered_extensions();
    if extensions.is_empty() {
        println!("No serialization extensions registered");
    } else {
        println!("Serialization extensions: {}", extensions.join(", "));
    }
    Ok(())
}
