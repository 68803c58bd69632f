use std::fmt::Write;

use cityweather_core::{DetailState, Units, WeatherReport};

use crate::terminal::Palette;

pub fn render(state: &DetailState, units: Units, palette: &Palette) -> String {
    match state {
        DetailState::Idle => String::new(),
        DetailState::NotFound { .. } => format!("{}\n", palette.error("City not found.")),
        DetailState::Loading => "Loading…\n".to_string(),
        DetailState::Failed(err) => format!("{}\n", palette.error(&format!("Error: {err}"))),
        DetailState::Ready(report) => render_report(report, units, palette),
    }
}

fn render_report(report: &WeatherReport, units: Units, palette: &Palette) -> String {
    let rendered = report.render(units);
    let current = &rendered.current;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}",
        palette.heading(&format!("{}, {}", report.city.name, report.city.country_code))
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}  {}", palette.heading(&current.temperature), current.condition);
    let _ = writeln!(out, "{}", current.summary_line());
    let _ = writeln!(out, "{}", palette.muted(&format!("Local time: {}", current.local_time)));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", palette.heading(&rendered.forecast_heading));

    for day in &rendered.days {
        let _ = writeln!(
            out,
            "{}  {}  Max: {} • Min: {}",
            palette.accent(&day.date),
            day.condition,
            day.max,
            day.min
        );
    }
    out
}
