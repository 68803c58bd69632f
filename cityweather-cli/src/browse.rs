//! Interactive navigation: list -> detail -> back, with settings reachable
//! from both.

use std::fmt;

use anyhow::{Context, Result};
use cityweather_core::{DetailView, PendingFetch, Visibility, WeatherClient};
use tracing::debug;

use crate::{
    app::App,
    prompt,
    views::{self, list::city_label},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ListAction {
    Open { id: String, label: String },
    Settings,
    Quit,
}

impl fmt::Display for ListAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListAction::Open { label, .. } => f.write_str(label),
            ListAction::Settings => f.write_str("Settings"),
            ListAction::Quit => f.write_str("Quit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailAction {
    ToggleUnits,
    Refresh,
    Settings,
    Back,
    Quit,
}

impl fmt::Display for DetailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetailAction::ToggleUnits => "Toggle units",
            DetailAction::Refresh => "Refresh",
            DetailAction::Settings => "Settings",
            DetailAction::Back => "← Back to list",
            DetailAction::Quit => "Quit",
        })
    }
}

enum Screen {
    List,
    Detail(String),
    Done,
}

fn list_actions(app: &App) -> Vec<ListAction> {
    app.catalog
        .cities()
        .iter()
        .map(|city| ListAction::Open { id: city.id.clone(), label: city_label(city) })
        .chain([ListAction::Settings, ListAction::Quit])
        .collect()
}

pub async fn run(app: &mut App) -> Result<()> {
    let mut screen = Screen::List;
    loop {
        screen = match screen {
            Screen::List => list_screen(app).await?,
            Screen::Detail(city_id) => detail_screen(app, &city_id).await?,
            Screen::Done => return Ok(()),
        };
    }
}

/// Coming back to a view: pick up whatever changed while we were away.
fn regain_focus(app: &mut App) {
    if app.settings.on_visibility(Visibility::Visible) {
        debug!("preferences changed while away");
    }
    app.sync_theme();
}

async fn list_screen(app: &mut App) -> Result<Screen> {
    regain_focus(app);
    print!("{}", views::list::render(&app.catalog, &app.palette));
    println!();

    let action = prompt::select("Open a city", list_actions(app), 0).await?;
    Ok(match action {
        Some(ListAction::Open { id, .. }) => Screen::Detail(id),
        Some(ListAction::Settings) => {
            views::settings::edit(app).await?;
            Screen::List
        }
        Some(ListAction::Quit) | None => Screen::Done,
    })
}

fn print_detail<C: WeatherClient + ?Sized>(app: &App, view: &DetailView<C>) {
    let units = app.settings.current().units;
    print!("{}", views::detail::render(view.state(), units, &app.palette));
}

async fn load<C: WeatherClient + ?Sized>(
    app: &App,
    view: &mut DetailView<C>,
    pending: Option<PendingFetch<C>>,
) -> bool {
    let Some(pending) = pending else { return false };
    print_detail(app, view);
    let outcome = pending.run().await;
    view.apply(outcome);
    true
}

/// Enter the detail view with preferences as they are on disk right now.
fn open_detail(
    app: &mut App,
    city_id: &str,
) -> (DetailView<dyn WeatherClient>, Option<PendingFetch<dyn WeatherClient>>) {
    regain_focus(app);
    let mut view: DetailView<dyn WeatherClient> =
        DetailView::new(app.client.clone(), app.catalog.clone());
    let pending = view.open(city_id, app.settings.current().days);
    (view, pending)
}

/// Back from a prompt: apply anything changed meanwhile. Returns whether a
/// new fetch ran because the forecast length changed.
async fn catch_up(app: &mut App, view: &mut DetailView<dyn WeatherClient>) -> bool {
    regain_focus(app);
    let pending = view.set_days(app.settings.current().days);
    load(app, view, pending).await
}

async fn detail_screen(app: &mut App, city_id: &str) -> Result<Screen> {
    let (mut view, pending) = open_detail(app, city_id);
    load(app, &mut view, pending).await;

    let actions = vec![
        DetailAction::ToggleUnits,
        DetailAction::Refresh,
        DetailAction::Settings,
        DetailAction::Back,
        DetailAction::Quit,
    ];

    loop {
        println!();
        print_detail(app, &view);
        println!();

        let action = prompt::select("What next?", actions.clone(), 0).await?;
        let refetched = catch_up(app, &mut view).await;

        match action {
            Some(DetailAction::ToggleUnits) => {
                let units = app.settings.current().units.toggled();
                app.settings.set_units(units).context("Failed to save units")?;
            }
            Some(DetailAction::Refresh) => {
                if !refetched {
                    let pending = view.refresh();
                    load(app, &mut view, pending).await;
                }
            }
            Some(DetailAction::Settings) => {
                views::settings::edit(app).await?;
                catch_up(app, &mut view).await;
            }
            Some(DetailAction::Back) | None => {
                view.teardown();
                return Ok(Screen::List);
            }
            Some(DetailAction::Quit) => {
                view.teardown();
                return Ok(Screen::Done);
            }
        }
    }
}
