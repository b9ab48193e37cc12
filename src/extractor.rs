//! Tolerant lookups shared by the site scrapers.
//!
//! Every field of a detail record is pulled by its own closure. A closure
//! failing (node absent, session hiccup) costs that one field: the record gets
//! [`Value::Missing`] under the key and a warning is logged.

use crate::browser::{Browser, Element, Locator, Scope};
use crate::error::ScrapeError;
use crate::logger::RunLogger;
use crate::record::{Record, Value};

pub struct Extractor<'a> {
    browser: &'a dyn Browser,
    log: &'a RunLogger,
}

impl<'a> Extractor<'a> {
    pub fn new(browser: &'a dyn Browser, log: &'a RunLogger) -> Self {
        Extractor { browser, log }
    }

    pub fn browser(&self) -> &'a dyn Browser {
        self.browser
    }

    /// The first match, or `ElementNotFound`.
    pub fn element(&self, scope: Scope<'_>, locator: &Locator) -> Result<Element, ScrapeError> {
        self.browser
            .find(scope, locator)?
            .ok_or_else(|| ScrapeError::ElementNotFound { locator: locator.to_string() })
    }

    /// The first match, if any. Session errors are logged and read as absence.
    pub fn optional(&self, scope: Scope<'_>, locator: &Locator) -> Option<Element> {
        match self.browser.find(scope, locator) {
            Ok(found) => found,
            Err(e) => {
                self.log.warn(format!("Lookup of {} failed: {}", locator, e));
                None
            }
        }
    }

    /// Every match. Session errors are logged and read as no matches.
    pub fn all(&self, scope: Scope<'_>, locator: &Locator) -> Vec<Element> {
        match self.browser.find_all(scope, locator) {
            Ok(found) => {
                self.log.debug(format!("Elements found: {} for {}", found.len(), locator));
                found
            }
            Err(e) => {
                self.log.warn(format!("Lookup of {} failed: {}", locator, e));
                Vec::new()
            }
        }
    }

    pub fn text_of(&self, element: &Element) -> Result<String, ScrapeError> {
        Ok(self.browser.text(element)?)
    }

    /// Text of the first match, or `ElementNotFound`.
    pub fn text(&self, scope: Scope<'_>, locator: &Locator) -> Result<String, ScrapeError> {
        let element = self.element(scope, locator)?;
        self.text_of(&element)
    }

    /// Text of the first match, `None` when absent or unreadable.
    pub fn text_opt(&self, scope: Scope<'_>, locator: &Locator) -> Option<String> {
        match self.text(scope, locator) {
            Ok(text) => Some(text),
            Err(e) => {
                self.log.warn(format!("Element not found: {}", e));
                None
            }
        }
    }

    pub fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, ScrapeError> {
        Ok(self.browser.attribute(element, name)?)
    }

    /// Runs one field lookup and stores its result under `name`. Failure
    /// stores [`Value::Missing`] and never escapes.
    pub fn field<F>(&self, record: &mut Record, name: &str, lookup: F)
    where
        F: FnOnce() -> Result<Value, ScrapeError>,
    {
        let value = match lookup() {
            Ok(value) => value,
            Err(e) => {
                self.log.warn(format!("Field `{}` unresolved: {}", name, e));
                Value::Missing
            }
        };
        record.insert(name, value);
    }
}

/// Splits scraped text on `sep`. Empty pieces are kept: callers read some
/// of these lists by position.
pub fn split_text(text: &str, sep: &str) -> Vec<String> {
    text.split(sep).map(str::to_string).collect()
}
