use crate::blueprint::DEFAULT_BLUEPRINT_PATH;
use clap::Parser;
use std::path::PathBuf;

/// dotwizard - interactive Arch Linux desktop provisioning
#[derive(Parser, Debug)]
#[command(name = "dotwizard")]
#[command(about = "Pick your desktop components, then let dotwizard install and configure them")]
#[command(version)]
pub struct Cli {
    /// Blueprint describing the selectable components (YAML, or JSON by extension)
    #[arg(short, long, default_value = DEFAULT_BLUEPRINT_PATH)]
    pub config: PathBuf,

    /// Use pre-authorised sudo instead of asking for a password.
    ///
    /// Requires `sudo -n true` to succeed, for example after `--root-setup`.
    #[arg(long)]
    pub passwordless: bool,

    /// Write logs here instead of the cache directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Install the sudoers drop-in that keeps sudo authenticated until reboot, then exit.
    /// Must be run as root.
    #[arg(long, conflicts_with_all = ["config", "passwordless"])]
    pub root_setup: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dotwizard"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("install_config.yaml"));
        assert!(!cli.passwordless);
        assert!(!cli.root_setup);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_passwordless_with_custom_config() {
        let cli =
            Cli::try_parse_from(["dotwizard", "--config", "desk.json", "--passwordless"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("desk.json"));
        assert!(cli.passwordless);
    }

    #[test]
    fn test_root_setup_rejects_passwordless() {
        assert!(Cli::try_parse_from(["dotwizard", "--root-setup", "--passwordless"]).is_err());
    }
}
