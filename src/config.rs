use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info};
use serde::Deserialize;

const SETTINGS_FILE: &str = "scraper.json";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chrome binary; `None` lets the launcher find one.
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub page_settle_secs: u64,
    pub home_settle_secs: u64,
    pub scroll_settle_secs: u64,
    pub select_settle_secs: u64,
    pub suggest_settle_secs: u64,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            chrome_path: None,
            headless: true,
            sandbox: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: USER_AGENT.to_string(),
            page_settle_secs: 5,
            home_settle_secs: 10,
            scroll_settle_secs: 5,
            select_settle_secs: 5,
            suggest_settle_secs: 1,
            wait_timeout_secs: 10,
            poll_interval_ms: 500,
            request_timeout_secs: 60,
            idle_timeout_secs: 1800,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Settings {
    /// Reads `scraper.json` from the working directory, then applies
    /// environment overrides. Problems with the file fall back to defaults.
    pub fn load() -> Self {
        let mut settings = Self::from_file(SETTINGS_FILE);
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No settings file {:?} found. Using defaults.", path);
            return Settings::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to read settings file {:?}: {}", path, e);
                return Settings::default();
            }
        };
        match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => {
                info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {:?}: {}. Using defaults.", path, e);
                Settings::default()
            }
        }
    }

    fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("CHROME_PATH").filter(|v| !v.trim().is_empty()) {
            self.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = var("SCRAPER_HEADLESS") {
            self.headless = enabled(&flag);
        }
        if let Some(flag) = var("SCRAPER_SANDBOX") {
            self.sandbox = enabled(&flag);
        }
        if let Some(dir) = var("SCRAPER_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    pub fn timing(&self) -> Timing {
        Timing {
            page_settle: Duration::from_secs(self.page_settle_secs),
            home_settle: Duration::from_secs(self.home_settle_secs),
            scroll_settle: Duration::from_secs(self.scroll_settle_secs),
            select_settle: Duration::from_secs(self.select_settle_secs),
            suggest_settle: Duration::from_secs(self.suggest_settle_secs),
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

fn enabled(flag: &str) -> bool {
    !matches!(flag.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no")
}

/// Fixed waits used at the suspension points of a scrape.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub page_settle: Duration,
    pub home_settle: Duration,
    pub scroll_settle: Duration,
    pub select_settle: Duration,
    pub suggest_settle: Duration,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Timing {
    /// No waiting anywhere. Used against in-memory browsers.
    pub fn instant() -> Self {
        Timing {
            page_settle: Duration::ZERO,
            home_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            select_settle: Duration::ZERO,
            suggest_settle: Duration::ZERO,
            wait_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Settings::default().timing()
    }
}
