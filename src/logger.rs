use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use chrono::Local;
use env_logger::{Builder, Env};
use log::Level;

pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init();

    log::info!("Logger initialized.");
}

/// Logger scoped to one pipeline run. Lines go through the `log` facade with
/// the site as target and the run id as prefix.
#[derive(Clone, Debug)]
pub struct RunLogger {
    run_id: Arc<str>,
    site: &'static str,
}

impl RunLogger {
    pub fn new(site: &'static str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self::with_id(site, &id[..8])
    }

    pub fn with_id(site: &'static str, run_id: &str) -> Self {
        RunLogger { run_id: Arc::from(run_id), site }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn site(&self) -> &'static str {
        self.site
    }

    pub fn debug(&self, msg: impl Display) {
        self.emit(Level::Debug, msg);
    }

    pub fn info(&self, msg: impl Display) {
        self.emit(Level::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.emit(Level::Warn, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.emit(Level::Error, msg);
    }

    fn emit(&self, level: Level, msg: impl Display) {
        log::log!(target: self.site, level, "[{}] {}", self.run_id, msg);
    }
}
