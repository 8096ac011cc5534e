use clap::Subcommand;
use pantry_core::config::PantryConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Initialize ~/.pantry/ with a default config
    Init,
    /// Show current configuration
    Show,
}

pub fn run(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let home = PantryConfig::init()?;
            println!("Initialized pantry at {}", home.display());
            println!("  config: {}", PantryConfig::config_path()?.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = PantryConfig::load()?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
            Ok(())
        }
    }
}
