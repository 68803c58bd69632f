use std::sync::Arc;

use anyhow::{Context, Result};
use cityweather_core::{
    Catalog, Config, FileStore, PreferenceStore, SettingsSync, ThemeController, WeatherClient,
    client_from_config,
};
use tracing::debug;

use crate::terminal::{EnvColorScheme, Palette};

/// Everything the views share: one catalog, one client, one preference state.
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub client: Arc<dyn WeatherClient>,
    pub store: FileStore,
    pub settings: Arc<SettingsSync<FileStore>>,
    pub palette: Arc<Palette>,
    pub theme: ThemeController,
}

impl App {
    pub fn load() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let client = client_from_config(&config);
        Self::with_client(config, client)
    }

    pub fn with_client(config: Config, client: Arc<dyn WeatherClient>) -> Result<Self> {
        let catalog = Catalog::from_config(&config).context("Invalid city list in config")?;

        let path = config.preferences_file_path()?;
        let store = FileStore::open(path.clone())
            .with_context(|| format!("Failed to open preferences at {}", path.display()))?;
        debug!(path = %path.display(), cities = catalog.len(), "application context ready");

        let settings = Arc::new(SettingsSync::new(PreferenceStore::new(Arc::new(store.clone()))));

        let palette = Arc::new(Palette::default());
        let theme = ThemeController::new(
            Arc::new(EnvColorScheme),
            palette.clone(),
            settings.current().theme,
        );

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            client,
            store,
            settings,
            palette,
            theme,
        })
    }

    /// Bring the theme controller in line with the stored preference.
    pub fn sync_theme(&mut self) {
        self.theme.set_theme(self.settings.current().theme);
    }
}
