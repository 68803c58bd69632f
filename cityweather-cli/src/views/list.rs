use std::fmt::Write;

use cityweather_core::{Catalog, City};

use crate::terminal::Palette;

/// One line per city as shown in selection prompts.
pub fn city_label(city: &City) -> String {
    format!("{} ({})", city.name, city.country_code)
}

pub fn render(catalog: &Catalog, palette: &Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", palette.heading("Popular Cities"));
    let _ = writeln!(
        out,
        "{}",
        palette.muted("Choose a city to view the current weather and forecast.")
    );

    if catalog.is_empty() {
        let _ = writeln!(out, "\nNo cities available.");
        return out;
    }

    for city in catalog.cities() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} {}",
            palette.accent(&city.name),
            palette.muted(&city.country_code)
        );
        let _ = writeln!(out, "  latitude {}, longitude {}", city.lat, city.lon);
        let _ = writeln!(out, "  {}", city.timezone);
        let _ = writeln!(out, "  {}", palette.muted(&format!("cityweather show {}", city.id)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Palette {
        colored::control::set_override(false);
        Palette::default()
    }

    #[test]
    fn lists_every_builtin_city_in_order() {
        let catalog = Catalog::builtin();
        let out = render(&catalog, &plain());

        assert!(out.starts_with("Popular Cities\n"));
        let mut last = 0;
        for city in catalog.cities() {
            let at = out.find(&format!("cityweather show {}", city.id)).unwrap();
            assert!(at > last, "{} out of order", city.id);
            last = at;
        }
        assert!(out.contains("London GB\n  latitude 51.5074, longitude -0.1278\n  Europe/London"));
    }

    #[test]
    fn empty_catalog_renders_neutral_message() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        let out = render(&catalog, &plain());
        assert!(out.contains("No cities available."));
    }

    #[test]
    fn label_includes_country_code() {
        let catalog = Catalog::builtin();
        let tokyo = catalog.find("tokyo").unwrap();
        assert_eq!(city_label(tokyo), "Tokyo (JP)");
    }
}
