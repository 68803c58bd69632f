//! Live detail view. Preference changes made elsewhere (another terminal, the
//! `settings` command) are picked up from the preferences file; pressing
//! Enter re-reads every preference, the way returning to a view does.

use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use cityweather_core::{
    DetailState, DetailView, FetchOutcome, KeyValueStore, PendingFetch, Visibility, WeatherClient,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info};

use crate::{app::App, views};

fn spawn_fetch(
    pending: Option<PendingFetch<dyn WeatherClient>>,
    outcomes: &mpsc::Sender<FetchOutcome>,
) {
    let Some(pending) = pending else { return };
    let outcomes = outcomes.clone();
    tokio::spawn(async move {
        // The receiver is gone once the view has exited.
        let _ = outcomes.send(pending.run().await).await;
    });
}

fn print_view(app: &App, view: &DetailView<dyn WeatherClient>, reason: &str) {
    let stamp = Local::now().format("%H:%M:%S");
    println!("{}", app.palette.muted(&format!("[{stamp}] {reason}")));
    print!("{}", views::detail::render(view.state(), app.settings.current().units, &app.palette));
}

pub async fn run(app: &mut App, city_id: &str, interval: Duration) -> Result<()> {
    let mut view: DetailView<dyn WeatherClient> =
        DetailView::new(app.client.clone(), app.catalog.clone());
    let (outcome_tx, mut outcomes) = mpsc::channel(8);

    spawn_fetch(view.open(city_id, app.settings.current().days), &outcome_tx);
    print_view(app, &view, "opened");
    if matches!(view.state(), DetailState::NotFound { .. }) {
        return Ok(());
    }

    let mut prefs_rx = app.settings.subscribe();
    let watcher = app.store.spawn_watcher(interval);
    let (visibility_tx, visibility_rx) = mpsc::channel(4);
    let sync_task = app.settings.spawn(app.store.subscribe(), visibility_rx);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(city_id, interval_ms = interval.as_millis() as u64, "watching");
    println!("{}", app.palette.muted("Press Enter to re-read settings, Ctrl-C to quit."));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(outcome) = outcomes.recv() => {
                let token = outcome.token();
                if view.apply(outcome) {
                    print_view(app, &view, "updated");
                } else {
                    debug!(token, "superseded result not shown");
                }
            }
            changed = prefs_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let prefs = *prefs_rx.borrow_and_update();
                app.theme.set_theme(prefs.theme);
                match view.set_days(prefs.days) {
                    Some(pending) => {
                        spawn_fetch(Some(pending), &outcome_tx);
                        print_view(app, &view, "forecast length changed");
                    }
                    None => print_view(app, &view, "settings changed"),
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    let _ = visibility_tx.send(Visibility::Visible).await;
                }
                Ok(None) | Err(_) => {
                    debug!("stdin closed, no longer listening for Enter");
                    stdin_open = false;
                }
            },
        }
    }

    view.teardown();
    watcher.abort();
    sync_task.abort();
    Ok(())
}
