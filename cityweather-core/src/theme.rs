//! Theme resolution against the host's ambient color scheme.

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::debug;

use crate::prefs::Theme;

/// A concrete, resolved color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, ColorScheme::Dark)
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Theme {
    /// The scheme to show, given what the environment prefers.
    pub fn resolve(self, ambient: ColorScheme) -> ColorScheme {
        match self {
            Theme::Light => ColorScheme::Light,
            Theme::Dark => ColorScheme::Dark,
            Theme::System => ambient,
        }
    }
}

pub type SchemeCallback = Arc<dyn Fn(ColorScheme) + Send + Sync>;

/// Handle to an ambient-scheme subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// For sources that never change.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}

/// The host environment's color-scheme signal.
pub trait AmbientColorScheme: Send + Sync {
    fn current(&self) -> ColorScheme;

    fn subscribe(&self, callback: SchemeCallback) -> Subscription;
}

/// Receives the effective scheme whenever it changes.
pub trait ThemeSink: Send + Sync {
    fn apply(&self, scheme: ColorScheme);
}

/// The single global "dark" presentation flag.
#[derive(Debug, Default)]
pub struct DarkFlag(AtomicBool);

impl DarkFlag {
    pub fn is_dark(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ThemeSink for DarkFlag {
    fn apply(&self, scheme: ColorScheme) {
        self.0.store(scheme.is_dark(), Ordering::Relaxed);
    }
}

struct ManualInner {
    scheme: Mutex<ColorScheme>,
    observers: Mutex<Vec<(u64, SchemeCallback)>>,
    next_id: AtomicU64,
}

/// An ambient source whose value is set programmatically.
#[derive(Clone)]
pub struct ManualColorScheme {
    inner: Arc<ManualInner>,
}

impl ManualColorScheme {
    pub fn new(initial: ColorScheme) -> Self {
        Self {
            inner: Arc::new(ManualInner {
                scheme: Mutex::new(initial),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Change the ambient scheme, notifying observers if it differs.
    pub fn set(&self, scheme: ColorScheme) {
        {
            let mut current = self.inner.scheme.lock();
            if *current == scheme {
                return;
            }
            *current = scheme;
        }

        // Call outside the lock so callbacks may (un)subscribe.
        let observers: Vec<SchemeCallback> =
            self.inner.observers.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in observers {
            callback(scheme);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl fmt::Debug for ManualColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualColorScheme")
            .field("scheme", &self.current())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl AmbientColorScheme for ManualColorScheme {
    fn current(&self) -> ColorScheme {
        *self.inner.scheme.lock()
    }

    fn subscribe(&self, callback: SchemeCallback) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, callback));

        let weak: Weak<ManualInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.lock().retain(|(other, _)| *other != id);
            }
        })
    }
}

/// Applies the theme preference to a [`ThemeSink`], following the ambient
/// scheme only while the preference is [`Theme::System`].
pub struct ThemeController {
    ambient: Arc<dyn AmbientColorScheme>,
    sink: Arc<dyn ThemeSink>,
    theme: Theme,
    subscription: Option<Subscription>,
}

impl ThemeController {
    pub fn new(
        ambient: Arc<dyn AmbientColorScheme>,
        sink: Arc<dyn ThemeSink>,
        theme: Theme,
    ) -> Self {
        let mut controller = Self { ambient, sink, theme, subscription: None };
        controller.apply(theme);
        controller
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn effective(&self) -> ColorScheme {
        self.theme.resolve(self.ambient.current())
    }

    pub fn is_following_ambient(&self) -> bool {
        self.subscription.is_some()
    }

    /// Switch themes and re-apply right away.
    pub fn set_theme(&mut self, theme: Theme) {
        if theme == self.theme && (theme == Theme::System) == self.subscription.is_some() {
            return;
        }
        self.apply(theme);
    }

    fn apply(&mut self, theme: Theme) {
        self.theme = theme;

        if theme == Theme::System {
            if self.subscription.is_none() {
                let sink = Arc::clone(&self.sink);
                self.subscription = Some(self.ambient.subscribe(Arc::new(move |scheme| {
                    debug!(%scheme, "ambient color scheme changed");
                    sink.apply(scheme);
                })));
            }
        } else if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }

        let effective = self.effective();
        debug!(%theme, %effective, "applying theme");
        self.sink.apply(effective);
    }
}

impl fmt::Debug for ThemeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeController")
            .field("theme", &self.theme)
            .field("following_ambient", &self.subscription.is_some())
            .finish()
    }
}
