use std::path::PathBuf;

use clap::Parser;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // берётся из Cargo.toml
pub struct Cli {
    /// Путь к YAML-файлу конфигурации
    #[arg(
        env = "BRIDGE_CONFIG",
        long = "config",
        short = 'c',
        value_name = "path",
        default_value = "./config/bridge.yaml"
    )]
    pub config: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_can_be_given() {
        let cli = Cli::try_parse_from(["snmp-iothub-bridge", "--config", "/etc/bridge.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/bridge.yaml"));
    }
}
