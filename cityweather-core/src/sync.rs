//! Keeps in-memory [`Preferences`] consistent with the persisted store.
//!
//! Two triggers re-read from storage: the application regaining visibility,
//! and a storage event for one of the preference keys. Writes made through
//! [`SettingsSync`] update the in-memory value immediately. There is no
//! locking across processes; the last write observed wins.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::StorageError,
    prefs::{ForecastDays, Preference, PreferenceKey, PreferenceStore, Preferences, Theme, Units},
    storage::{KeyValueStore, StorageEvent, StorageEvents},
};

/// Foreground state of the hosting surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Owner of the application's preference state.
#[derive(Debug)]
pub struct SettingsSync<S: ?Sized> {
    store: PreferenceStore<S>,
    state: watch::Sender<Preferences>,
}

impl<S: KeyValueStore + ?Sized> SettingsSync<S> {
    pub fn new(store: PreferenceStore<S>) -> Self {
        let initial = store.load();
        let (state, _) = watch::channel(initial);
        Self { store, state }
    }

    pub fn current(&self) -> Preferences {
        *self.state.borrow()
    }

    /// Observe every change to the preference value object.
    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &PreferenceStore<S> {
        &self.store
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.write(theme, |p| &mut p.theme)
    }

    pub fn set_units(&self, units: Units) -> Result<(), StorageError> {
        self.write(units, |p| &mut p.units)
    }

    pub fn set_days(&self, days: ForecastDays) -> Result<(), StorageError> {
        self.write(days, |p| &mut p.days)
    }

    fn write<P: Preference>(
        &self,
        value: P,
        field: impl FnOnce(&mut Preferences) -> &mut P,
    ) -> Result<(), StorageError> {
        self.store.set(value)?;
        self.state.send_if_modified(|prefs| {
            let slot = field(prefs);
            let changed = *slot != value;
            *slot = value;
            changed
        });
        Ok(())
    }

    /// Re-read everything when the surface comes back to the foreground.
    pub fn on_visibility(&self, visibility: Visibility) -> bool {
        if visibility != Visibility::Visible {
            return false;
        }
        self.reload_all()
    }

    /// Re-read the key named by a storage event. Unrelated keys are ignored;
    /// a keyless event re-reads everything.
    pub fn on_storage_event(&self, event: &StorageEvent) -> bool {
        let Some(key) = &event.key else {
            return self.reload_all();
        };
        let Some(pref_key) = PreferenceKey::from_storage_key(key) else {
            debug!(key = %key, "ignoring unrelated storage key");
            return false;
        };

        let changed = self
            .state
            .send_if_modified(|prefs| self.store.reload_key(pref_key, prefs));
        if changed {
            info!(
                key = %pref_key,
                raw = ?event.new_value,
                "preference changed elsewhere, reloaded"
            );
        }
        changed
    }

    pub fn reload_all(&self) -> bool {
        let fresh = self.store.load();
        let changed = self.state.send_if_modified(|prefs| {
            let changed = *prefs != fresh;
            *prefs = fresh;
            changed
        });
        if changed {
            info!(?fresh, "preferences reloaded");
        }
        changed
    }
}

impl<S: KeyValueStore + ?Sized + 'static> SettingsSync<S> {
    /// Drive the synchronizer from storage events and visibility changes
    /// until either source closes.
    pub fn spawn(
        self: &Arc<Self>,
        mut events: StorageEvents,
        mut visibility: mpsc::Receiver<Visibility>,
    ) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => {
                            sync.on_storage_event(&event);
                        }
                        None => {
                            warn!("storage event stream closed, stopping settings sync");
                            break;
                        }
                    },
                    vis = visibility.recv() => match vis {
                        Some(vis) => {
                            sync.on_visibility(vis);
                        }
                        None => {
                            debug!("visibility channel closed, stopping settings sync");
                            break;
                        }
                    },
                }
            }
        })
    }
}
