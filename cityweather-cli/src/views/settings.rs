use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use cityweather_core::{ColorScheme, Config, ForecastDays, PreferenceKey, Preferences, Theme, Units};

use crate::{app::App, prompt, terminal::Palette};

fn theme_label(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "Light",
        Theme::Dark => "Dark",
        Theme::System => "System",
    }
}

fn radio<T: PartialEq + Copy>(
    options: &[T],
    chosen: T,
    label: impl Fn(T) -> &'static str,
) -> String {
    options
        .iter()
        .map(|&option| {
            let mark = if option == chosen { "(•)" } else { "( )" };
            format!("{mark} {}", label(option))
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn render(
    prefs: &Preferences,
    effective: ColorScheme,
    config: &Config,
    stored_at: &Path,
    palette: &Palette,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.heading("Settings"));
    let _ = writeln!(
        out,
        "{}",
        palette.muted("Adjust theme and weather settings. Changes are saved automatically.")
    );

    let _ = writeln!(out, "\n{}", palette.heading("Theme"));
    let _ = writeln!(out, "  {}", radio(Theme::all(), prefs.theme, theme_label));
    let _ = writeln!(out, "  Effective now: {}", palette.accent(effective.as_str()));

    let _ = writeln!(out, "\n{}", palette.heading("Temperature Units"));
    let _ = writeln!(
        out,
        "  {}",
        radio(&[Units::Celsius, Units::Fahrenheit], prefs.units, |u| u.label())
    );
    let _ = writeln!(out, "  {}", palette.muted(&format!("Storage key: {}", PreferenceKey::Units)));

    let _ = writeln!(out, "\n{}", palette.heading("Forecast Days"));
    let _ = writeln!(
        out,
        "  {} days (between {} and {})",
        prefs.days,
        ForecastDays::MIN,
        ForecastDays::MAX
    );
    let _ = writeln!(
        out,
        "  {}",
        palette.muted(&format!("Storage key: {}", PreferenceKey::ForecastDays))
    );

    let _ = writeln!(out, "\n{}", palette.muted(&format!("Stored in {}", stored_at.display())));
    if config.is_api_key_configured() {
        let _ = writeln!(out, "{}", palette.muted("WeatherAPI key: configured"));
    } else {
        let _ = writeln!(
            out,
            "{}",
            palette.error("WeatherAPI key: not configured (run `cityweather configure`)")
        );
    }
    out
}

/// Print the settings view for the app's current state.
pub fn show(app: &App) {
    let prefs = app.settings.current();
    let effective = app.theme.effective();
    print!("{}", render(&prefs, effective, &app.config, app.store.path(), &app.palette));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Theme,
    Units,
    Days,
    Back,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Field::Theme => "Theme",
            Field::Units => "Temperature units",
            Field::Days => "Forecast days",
            Field::Back => "← Back",
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ThemeChoice(Theme);

impl std::fmt::Display for ThemeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(theme_label(self.0))
    }
}

#[derive(Debug, Clone, Copy)]
struct UnitsChoice(Units);

impl std::fmt::Display for UnitsChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.label())
    }
}

fn position<T: PartialEq>(options: &[T], current: &T) -> usize {
    options.iter().position(|o| o == current).unwrap_or(0)
}

/// Interactive settings. Every change is written through immediately and the
/// theme is re-applied before the view is shown again.
pub async fn edit(app: &mut App) -> Result<()> {
    let fields = vec![Field::Theme, Field::Units, Field::Days, Field::Back];
    let mut cursor = 0;

    loop {
        show(app);
        let Some(field) = prompt::select("Change a setting", fields.clone(), cursor).await? else {
            return Ok(());
        };
        cursor = position(&fields, &field);
        let prefs = app.settings.current();

        match field {
            Field::Back => return Ok(()),
            Field::Theme => {
                let options: Vec<ThemeChoice> =
                    Theme::all().iter().copied().map(ThemeChoice).collect();
                let at = position(Theme::all(), &prefs.theme);
                if let Some(ThemeChoice(theme)) = prompt::select("Theme", options, at).await? {
                    app.settings.set_theme(theme).context("Failed to save theme")?;
                    app.sync_theme();
                }
            }
            Field::Units => {
                let units = [Units::Celsius, Units::Fahrenheit];
                let options: Vec<UnitsChoice> = units.iter().copied().map(UnitsChoice).collect();
                let at = position(&units, &prefs.units);
                if let Some(UnitsChoice(units)) =
                    prompt::select("Temperature units", options, at).await?
                {
                    app.settings.set_units(units).context("Failed to save units")?;
                }
            }
            Field::Days => {
                let options: Vec<ForecastDays> = (ForecastDays::MIN..=ForecastDays::MAX)
                    .filter_map(ForecastDays::new)
                    .collect();
                let at = position(&options, &prefs.days);
                if let Some(days) = prompt::select("Forecast days", options, at).await? {
                    app.settings.set_days(days).context("Failed to save forecast days")?;
                }
            }
        }
        println!();
    }
}
