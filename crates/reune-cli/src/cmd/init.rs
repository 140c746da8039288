use anyhow::Context;
use reune_core::{config::Config, io, paths, Store};
use std::path::Path;

pub fn run(root: &Path, organization: Option<&str>) -> anyhow::Result<()> {
    let organization = organization
        .map(str::to_string)
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "organization".to_string());

    println!("Initializing reune in: {}", root.display());

    let dir = paths::reune_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    let config = if !config_path.exists() {
        let cfg = Config::new(organization);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config")?
    };

    let db_path = config.database_path(root);
    let existed = db_path.exists();
    Store::open(&db_path).with_context(|| format!("failed to open {}", db_path.display()))?;
    let label = if existed { "exists: " } else { "created:" };
    println!("  {label} {}", db_path.display());

    println!();
    println!("Next: reune user add <username> --staff");
    Ok(())
}
