//! [`Browser`] on a Chrome instance driven over the DevTools protocol.
//!
//! Element handles are XPath expressions naming one node of a match set,
//! e.g. `(//img[@alt="Restaurant Card"]/../..)[3]`. Lookups within an element
//! extend its expression, and every action resolves the handle against the
//! live page, so a handle only means something until the page re-renders.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser as Chromium, LaunchOptions, Tab};
use log::{info, warn};
use serde_json::Value;

use crate::browser::{Browser, Element, Locator, Scope};
use crate::config::Settings;
use crate::error::BrowserError;

const RESOURCE_BUFFER_SCRIPT: &str = "performance.setResourceTimingBufferSize(100000)";
const RESOURCE_URLS_SCRIPT: &str =
    "JSON.stringify(performance.getEntriesByType('resource').map(function (e) { return e.name; }))";

pub struct Chrome {
    tab: Arc<Tab>,
    closed: Cell<bool>,
    // Dropping this shuts the Chrome process down.
    _process: Chromium,
}

impl Chrome {
    /// Starts Chrome and opens the tab every command goes to.
    pub fn launch(settings: &Settings) -> Result<Self, BrowserError> {
        let process = Chromium::new(launch_options(settings)?)?;
        let tab = process.new_tab()?;
        tab.set_default_timeout(Duration::from_secs(settings.request_timeout_secs));
        tab.set_user_agent(&settings.user_agent, None, None)?;

        info!(
            "Launched Chrome ({}, {}x{})",
            if settings.headless { "headless" } else { "visible" },
            settings.window_width,
            settings.window_height
        );
        Ok(Chrome { tab, closed: Cell::new(false), _process: process })
    }

    fn tab(&self) -> Result<&Tab, BrowserError> {
        if self.closed.get() {
            return Err(BrowserError::Closed);
        }
        Ok(&self.tab)
    }

    fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let result = self.tab()?.evaluate(script, false)?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn count(&self, xpath: &str) -> Result<usize, BrowserError> {
        let value = self.evaluate(&count_script(xpath))?;
        value
            .as_f64()
            .map(|n| n as usize)
            .ok_or_else(|| BrowserError::Script(format!("expected a node count for {xpath}, got {value}")))
    }

    fn resolve(&self, element: &Element) -> Result<headless_chrome::Element<'_>, BrowserError> {
        Ok(self.tab()?.find_element_by_xpath(element.id())?)
    }
}

impl Browser for Chrome {
    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.tab()?.navigate_to(url)?.wait_until_navigated()?;
        if let Err(e) = self.evaluate(RESOURCE_BUFFER_SCRIPT) {
            warn!("Could not enlarge resource timing buffer: {}", e);
        }
        Ok(())
    }

    fn find(&self, scope: Scope<'_>, locator: &Locator) -> Result<Option<Element>, BrowserError> {
        let path = scoped_xpath(scope, locator);
        Ok((self.count(&path)? > 0).then(|| Element::new(nth(&path, 1))))
    }

    fn find_all(&self, scope: Scope<'_>, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
        let path = scoped_xpath(scope, locator);
        let n = self.count(&path)?;
        Ok((1..=n).map(|i| Element::new(nth(&path, i))).collect())
    }

    fn scroll_into_view(&self, element: &Element) -> Result<(), BrowserError> {
        self.resolve(element)?.scroll_into_view()?;
        Ok(())
    }

    fn hover(&self, element: &Element) -> Result<(), BrowserError> {
        self.resolve(element)?.move_mouse_over()?;
        Ok(())
    }

    fn click(&self, element: &Element) -> Result<(), BrowserError> {
        self.resolve(element)?.click()?;
        Ok(())
    }

    fn type_text(&self, element: &Element, text: &str) -> Result<(), BrowserError> {
        self.resolve(element)?.type_into(text)?;
        Ok(())
    }

    fn text(&self, element: &Element) -> Result<String, BrowserError> {
        Ok(self.resolve(element)?.get_inner_text()?)
    }

    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.resolve(element)?.get_attribute_value(name)?)
    }

    fn outer_html(&self, element: &Element) -> Result<String, BrowserError> {
        Ok(self.resolve(element)?.get_content()?)
    }

    fn observed_urls(&self) -> Result<Vec<String>, BrowserError> {
        match self.evaluate(RESOURCE_URLS_SCRIPT)? {
            Value::String(json) => {
                serde_json::from_str(&json).map_err(|e| BrowserError::Script(format!("resource list: {e}")))
            }
            other => Err(BrowserError::Script(format!("expected resource list, got {other}"))),
        }
    }

    fn close(&self) -> Result<(), BrowserError> {
        if self.closed.replace(true) {
            return Ok(());
        }
        self.tab.close(false)?;
        info!("Closed browser tab");
        Ok(())
    }
}

fn launch_options(settings: &Settings) -> Result<LaunchOptions<'static>, BrowserError> {
    LaunchOptions::default_builder()
        .headless(settings.headless)
        .sandbox(settings.sandbox)
        .window_size(Some((settings.window_width, settings.window_height)))
        .path(settings.chrome_path.clone())
        .idle_browser_timeout(Duration::from_secs(settings.idle_timeout_secs))
        .build()
        .map_err(|e| BrowserError::Launch(e.to_string()))
}

/// Document lookups are absolute. Lookups within an element hang the
/// relative path off the element's own expression.
fn scoped_xpath(scope: Scope<'_>, locator: &Locator) -> String {
    match scope {
        Scope::Document => locator.to_xpath(false),
        Scope::Within(el) => {
            let relative = locator.to_xpath(true);
            let tail = relative.strip_prefix('.').unwrap_or(&relative);
            format!("({}){}", el.id(), tail)
        }
    }
}

/// 1-based, as in XPath.
fn nth(path: &str, i: usize) -> String {
    format!("({path})[{i}]")
}

fn count_script(xpath: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
        Value::from(xpath)
    )
}
