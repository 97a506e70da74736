use anyhow::{Context, Result};
use pegboard_infrastructure::{ConfigService, PegboardPaths};

/// Prints the effective configuration, defaults filled in.
pub fn show(paths: &PegboardPaths) -> Result<()> {
    let service = ConfigService::new(paths.config_file());
    let config = service.get_config();
    let rendered = config
        .to_toml_string()
        .context("Failed to render configuration")?;

    println!("# {}", service.path().display());
    print!("{}", rendered);
    Ok(())
}
