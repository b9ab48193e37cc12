pub mod browser;
pub mod chrome;
pub mod collector;
pub mod config;
pub mod delay_manager;
pub mod dish_rating;
pub mod error;
pub mod extractor;
pub mod input_loader;
pub mod logger;
pub mod normalizer;
pub mod pipeline;
pub mod record;
pub mod resume_manager;
pub mod swiggy;
pub mod table;
pub mod zomato;

// Exporting types for convenience
pub use browser::{Browser, Locator, Scope};
pub use chrome::Chrome;
pub use config::Settings;
pub use logger::RunLogger;
pub use pipeline::{NullProgress, Pipeline, Progress, Site, SiteScraper};
pub use record::{ItemRef, Record, Value};
