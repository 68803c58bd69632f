//! Terminal presentation: ambient color-scheme detection and the palette
//! that carries the global dark flag.

use cityweather_core::{
    AmbientColorScheme, ColorScheme, DarkFlag, Subscription, ThemeSink, theme::SchemeCallback,
};
use colored::{ColoredString, Colorize};

/// Explicit override, e.g. `CITYWEATHER_COLOR_SCHEME=dark`.
pub const COLOR_SCHEME_ENV: &str = "CITYWEATHER_COLOR_SCHEME";

/// Reads the terminal's color scheme from the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvColorScheme;

impl EnvColorScheme {
    fn probe(lookup: impl Fn(&str) -> Option<String>) -> ColorScheme {
        if let Some(explicit) = lookup(COLOR_SCHEME_ENV) {
            match explicit.trim().to_lowercase().as_str() {
                "dark" => return ColorScheme::Dark,
                "light" => return ColorScheme::Light,
                _ => {}
            }
        }

        if lookup("GTK_THEME").is_some_and(|t| t.to_lowercase().contains("dark")) {
            return ColorScheme::Dark;
        }

        // COLORFGBG is "fg;bg" (sometimes "fg;default;bg"); backgrounds 0-6 and 8 are dark.
        let background = lookup("COLORFGBG")
            .and_then(|v| v.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()));
        if let Some(bg) = background {
            return if bg <= 6 || bg == 8 { ColorScheme::Dark } else { ColorScheme::Light };
        }

        ColorScheme::Light
    }
}

impl AmbientColorScheme for EnvColorScheme {
    fn current(&self) -> ColorScheme {
        Self::probe(|name| std::env::var(name).ok())
    }

    // The process environment does not change underneath us.
    fn subscribe(&self, _callback: SchemeCallback) -> Subscription {
        Subscription::noop()
    }
}

/// Text styles keyed off the dark flag.
#[derive(Debug, Default)]
pub struct Palette {
    dark: DarkFlag,
}

impl ThemeSink for Palette {
    fn apply(&self, scheme: ColorScheme) {
        self.dark.apply(scheme);
    }
}

impl Palette {
    pub fn is_dark(&self) -> bool {
        self.dark.is_dark()
    }

    pub fn heading(&self, text: &str) -> ColoredString {
        if self.is_dark() { text.bold().bright_white() } else { text.bold().black() }
    }

    pub fn accent(&self, text: &str) -> ColoredString {
        if self.is_dark() { text.bright_cyan() } else { text.blue() }
    }

    pub fn muted(&self, text: &str) -> ColoredString {
        if self.is_dark() { text.bright_black() } else { text.dimmed() }
    }

    pub fn error(&self, text: &str) -> ColoredString {
        if self.is_dark() { text.bright_red() } else { text.red() }
    }
}
