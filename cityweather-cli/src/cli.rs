use std::{process::ExitCode, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cityweather_core::{Config, DetailState, DetailView, ForecastDays, Theme, Units};
use inquire::Password;

use crate::{app::App, browse, prompt, views, watch};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "cityweather",
    version,
    about = "Current weather and forecasts for popular cities"
)]
pub struct Cli {
    /// More log output on stderr (-v, -vv, -vvv). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `list`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com key.
    Configure {
        /// Key to store; prompted for when absent.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// List the available cities.
    List,

    /// Show current weather and forecast for a city.
    Show {
        /// City id, as printed by `list`.
        city: String,

        /// Forecast length for this run only (1-7).
        #[arg(long)]
        days: Option<ForecastDays>,
    },

    /// Keep a city's weather on screen and follow settings changes.
    Watch {
        city: String,

        /// How often to check the preferences file, in seconds.
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },

    /// Show or change display settings.
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Navigate cities and settings interactively.
    Browse,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    Show,

    /// Change one or more settings.
    Set {
        /// light, dark or system
        #[arg(long)]
        theme: Option<Theme>,

        /// c or f
        #[arg(long)]
        units: Option<Units>,

        /// 1-7
        #[arg(long)]
        days: Option<ForecastDays>,
    },

    /// Change settings with interactive prompts.
    Edit,
}

impl Cli {
    /// Failures the views already printed end in `ExitCode::FAILURE` rather
    /// than an error.
    pub async fn run(self) -> Result<ExitCode> {
        match self.command.unwrap_or(Command::List) {
            Command::Configure { api_key } => configure(api_key).await?,
            Command::List => {
                let app = App::load()?;
                print!("{}", views::list::render(&app.catalog, &app.palette));
            }
            Command::Show { city, days } => {
                if !show(App::load()?, &city, days).await {
                    return Ok(ExitCode::FAILURE);
                }
            }
            Command::Watch { city, interval } => {
                let mut app = App::load()?;
                watch::run(&mut app, &city, Duration::from_secs(interval.max(1))).await?;
            }
            Command::Settings { action } => settings(App::load()?, action).await?,
            Command::Browse => {
                let mut app = App::load()?;
                browse::run(&mut app).await?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

async fn configure(api_key: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    let api_key = match api_key {
        Some(key) => key,
        None => {
            let answer = prompt::ask(|| {
                Password::new("WeatherAPI.com key:")
                    .without_confirmation()
                    .with_help_message("Get one at https://www.weatherapi.com/my/")
                    .prompt()
            })
            .await?;
            match answer {
                Some(key) => key,
                None => return Ok(()),
            }
        }
    };

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key);
    config.save()?;
    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Render the detail view once. Returns whether the weather was shown.
async fn show(app: App, city: &str, days: Option<ForecastDays>) -> bool {
    let prefs = app.settings.current();
    let mut view = DetailView::new(app.client.clone(), app.catalog.clone());

    let state = view.load(city, days.unwrap_or(prefs.days)).await;
    print!("{}", views::detail::render(state, prefs.units, &app.palette));

    matches!(state, DetailState::Ready(_))
}

async fn settings(mut app: App, action: Option<SettingsAction>) -> Result<()> {
    match action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => views::settings::show(&app),
        SettingsAction::Set { theme, units, days } => {
            if let Some(theme) = theme {
                app.settings.set_theme(theme).context("Failed to save theme")?;
                app.sync_theme();
            }
            if let Some(units) = units {
                app.settings.set_units(units).context("Failed to save units")?;
            }
            if let Some(days) = days {
                app.settings.set_days(days).context("Failed to save forecast days")?;
            }
            views::settings::show(&app);
        }
        SettingsAction::Edit => views::settings::edit(&mut app).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::app_in;

    #[test]
    fn no_subcommand_means_list() {
        let cli = Cli::try_parse_from(["cityweather"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn show_accepts_day_override_in_range_only() {
        let cli = Cli::try_parse_from(["cityweather", "show", "tokyo", "--days", "5"]).unwrap();
        match cli.command {
            Some(Command::Show { city, days }) => {
                assert_eq!(city, "tokyo");
                assert_eq!(days.map(ForecastDays::get), Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["cityweather", "show", "tokyo", "--days", "8"]).is_err());
        assert!(Cli::try_parse_from(["cityweather", "show", "tokyo", "--days", "0"]).is_err());
    }

    #[test]
    fn settings_set_parses_every_flag() {
        let cli = Cli::try_parse_from([
            "cityweather",
            "-vv",
            "settings",
            "set",
            "--theme",
            "dark",
            "--units",
            "f",
            "--days",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Settings {
                action: Some(SettingsAction::Set { theme, units, days }),
            }) => {
                assert_eq!(theme, Some(Theme::Dark));
                assert_eq!(units, Some(Units::Fahrenheit));
                assert_eq!(days.map(ForecastDays::get), Some(7));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn invalid_setting_values_are_rejected() {
        let parse = |flag: &str, value: &str| {
            Cli::try_parse_from(["cityweather", "settings", "set", flag, value])
        };
        assert!(parse("--theme", "blue").is_err());
        assert!(parse("--units", "k").is_err());
    }

    #[test]
    fn watch_interval_defaults_to_two_seconds() {
        let cli = Cli::try_parse_from(["cityweather", "watch", "rome"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Watch { interval: 2, .. })));
    }

    #[tokio::test]
    async fn show_reports_failure_without_an_error() {
        let dir = tempfile::TempDir::new().unwrap();

        assert!(!show(app_in(&dir), "atlantis", None).await);
        // No API key in the test app: the view prints the error itself.
        assert!(!show(app_in(&dir), "london", None).await);
    }
}
