//! `preview serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use preview_config::{CliSettings, Config};
use preview_server::{run_server, script_tag, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover preview.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Site directory to serve (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long, env = "PREVIEW_HOST")]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "PREVIEW_PORT")]
    port: Option<u16>,

    /// Enable verbose output (log connections and reloads).
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the site directory is
    /// missing, or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config_path = self.config.clone();
        let cli_settings = self.into_cli_settings();
        let config = Config::load(config_path.as_deref(), Some(&cli_settings))?;
        tracing::debug!(?config, "Loaded configuration");

        let root_dir = &config.site_resolved.root_dir;
        if !root_dir.is_dir() {
            return Err(CliError::Validation(format!(
                "Site directory not found: {}",
                root_dir.display()
            )));
        }

        // Print startup info
        output.highlight(&format!(
            "Serving http://{}:{}/",
            config.server.host, config.server.port
        ));
        output.field("Site directory", root_dir.display());
        if let Some(path) = &config.config_path {
            output.field("Config", path.display());
        }
        if config.live_reload.enabled {
            output.field("Live reload", config.watch_patterns().join(", "));
            output.field("Injected", script_tag(config.server.port));
        } else {
            output.warning("Live reload: disabled");
        }

        run_server(server_config_from_config(&config)).await?;

        Ok(())
    }

    /// Build config overrides from the parsed flags.
    fn into_cli_settings(self) -> CliSettings {
        let live_reload_enabled = self.resolve_live_reload_enabled();
        CliSettings {
            host: self.host,
            port: self.port,
            root_dir: self.root,
            live_reload_enabled,
        }
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        TestCli::try_parse_from(std::iter::once("serve").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_no_flags_leave_config_untouched() {
        let settings = parse(&[]).into_cli_settings();

        assert_eq!(settings.root_dir, None);
        assert_eq!(settings.live_reload_enabled, None);
    }

    #[test]
    fn test_flags_become_cli_settings() {
        let settings = parse(&["--root", "public", "--port", "35729", "--host", "0.0.0.0"])
            .into_cli_settings();

        assert_eq!(settings.root_dir, Some(PathBuf::from("public")));
        assert_eq!(settings.port, Some(35729));
        assert_eq!(settings.host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn test_live_reload_flags() {
        assert_eq!(
            parse(&["--no-live-reload"]).resolve_live_reload_enabled(),
            Some(false)
        );
        assert_eq!(
            parse(&["--live-reload", "true"]).resolve_live_reload_enabled(),
            Some(true)
        );
        assert_eq!(parse(&[]).resolve_live_reload_enabled(), None);
    }

    #[test]
    fn test_live_reload_flags_conflict() {
        let result = TestCli::try_parse_from(["serve", "--live-reload", "true", "--no-live-reload"]);

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_execute_rejects_missing_site_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("preview.toml");
        std::fs::write(&config_path, "[site]\nroot_dir = \"missing\"\n").unwrap();

        let args = parse(&["--config", config_path.to_str().unwrap()]);
        let result = args.execute().await;

        assert!(matches!(result, Err(CliError::Validation(_))));
    }
}
