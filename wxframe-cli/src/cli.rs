use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wxframe_core::{Config, ForecastClient, StageError, chart, compose, nws, satellite};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wxframe", version, about = "Weather dashboard image pipeline")]
pub struct Cli {
    /// Path to the TOML configuration file; platform default when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the latest satellite image.
    FetchImage,

    /// Fetch the forecast and render the chart.
    RenderForecast,

    /// Composite the chart onto the satellite image.
    Compose,

    /// Run all three stages in order.
    Run,

    /// Write a configuration file with the default settings.
    InitConfig,
}

impl Cli {
    pub async fn run(self) -> Result<(), StageError> {
        if let Command::InitConfig = self.command {
            let path = Config::default().save(self.config.as_deref())?;
            log::info!("wrote default configuration to {}", path.display());
            return Ok(());
        }

        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Command::FetchImage => fetch_image(&config).await,
            Command::RenderForecast => render_forecast(&config).await,
            Command::Compose => compose::compose(&config),
            Command::Run => {
                fetch_image(&config).await?;
                render_forecast(&config).await?;
                compose::compose(&config)
            }
            Command::InitConfig => unreachable!("handled above"),
        }
    }
}

async fn fetch_image(config: &Config) -> Result<(), StageError> {
    let client = nws::default_client()?;
    satellite::fetch_satellite_image(&client, &config.satellite_url, &config.satellite_path).await
}

async fn render_forecast(config: &Config) -> Result<(), StageError> {
    let client = ForecastClient::new(&config.forecast_api_url)?;
    let now = chrono::Utc::now();

    let forecast = client.fetch(config.latitude, config.longitude, now).await?;
    let now_local = now.with_timezone(&forecast.location.timezone);
    chart::render_chart(&forecast, config, now_local, &config.chart_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["wxframe", "run", "--config", "/tmp/wx.toml"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/wx.toml")));
        assert!(matches!(cli.command, Command::Run));
    }
}
