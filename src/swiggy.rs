//! Swiggy: delivery-location selection, listing collection and restaurant
//! page extraction.
//!
//! Listing cards carry no links. Restaurant slugs are instead read off the
//! API requests the page makes while it lazily loads cards.

use regex::Regex;
use url::Url;

use crate::browser::{Browser, Element, Locator, Scope};
use crate::collector::{CardSource, Collector};
use crate::config::Timing;
use crate::delay_manager;
use crate::error::{BrowserError, ScrapeError};
use crate::extractor::{split_text, Extractor};
use crate::logger::RunLogger;
use crate::normalizer::Normalizer;
use crate::pipeline::SiteScraper;
use crate::record::{ItemRef, Record, Value};

pub const SITE: &str = "swiggy";
pub const HOME_URL: &str = "https://www.swiggy.com/";
pub const RESTAURANT_BASE_URL: &str = "https://swiggy.com/restaurants/";

pub const FIELDS: &[&str] = &["name", "ratings", "categories", "offers", "dish_data"];

/// Slug the listing API itself answers on; never a restaurant.
const NON_ITEM_SLUG: &str = "list";

fn other_location_tab() -> Locator {
    Locator::text("span", "Other")
}

fn suggestions() -> Locator {
    Locator::attr_contains("div", "class", "icon-location").up(1)
}

fn info_box() -> Locator {
    Locator::text("div", "for").up(2)
}

fn ratings_line() -> Locator {
    Locator::text("div", "for").up(1)
}

fn offers_block() -> Locator {
    Locator::text("h2", "Deals for you").up(3)
}

fn dish_items() -> Locator {
    Locator::attr_eq("div", "data-testid", "normal-dish-item")
}

fn dish_rating_block() -> Locator {
    Locator::local_name("rect").up(3)
}

/// Card source whose references come from observed network traffic.
pub struct SwiggyCards {
    locator: Locator,
    path_slug: Regex,
    cx_slug: Regex,
}

impl SwiggyCards {
    pub fn new() -> Self {
        SwiggyCards {
            locator: Locator::attr_contains("div", "class", "sw-restaurant-card-subtext-container").up(2),
            path_slug: Regex::new(r"restaurants/([\w-]+)").expect("static regex"),
            cx_slug: Regex::new(r#""link":"https://www\.swiggy\.com/restaurants/([\w-]+)""#)
                .expect("static regex"),
        }
    }

    /// Restaurant slugs mentioned by one request URL: in its path, and in
    /// the JSON carried by its `cx` query parameter.
    pub fn slugs(&self, request_url: &str) -> Vec<String> {
        if !request_url.to_ascii_lowercase().contains("restaurants") {
            return Vec::new();
        }
        let mut slugs = Vec::new();
        if let Some(c) = self.path_slug.captures(request_url) {
            slugs.push(c[1].to_string());
        }
        if let Some(cx) = cx_param(request_url) {
            let decoded = urlencoding::decode(&cx).map(|d| d.into_owned()).unwrap_or(cx);
            if let Some(c) = self.cx_slug.captures(&decoded) {
                slugs.push(c[1].to_string());
            }
        }
        slugs.retain(|s| s != NON_ITEM_SLUG);
        slugs
    }
}

impl Default for SwiggyCards {
    fn default() -> Self {
        Self::new()
    }
}

impl CardSource for SwiggyCards {
    fn card_locator(&self) -> &Locator {
        &self.locator
    }

    fn references(&self, browser: &dyn Browser, _cards: &[Element]) -> Result<Vec<String>, BrowserError> {
        Ok(browser
            .observed_urls()?
            .iter()
            .flat_map(|u| self.slugs(u))
            .map(|slug| format!("{RESTAURANT_BASE_URL}{slug}"))
            .collect())
    }
}

fn cx_param(request_url: &str) -> Option<String> {
    let url = Url::parse(request_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "cx")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

pub struct SwiggyScraper<'a> {
    browser: &'a dyn Browser,
    timing: Timing,
    log: RunLogger,
    normalizer: Normalizer,
}

impl<'a> SwiggyScraper<'a> {
    pub fn new(browser: &'a dyn Browser, timing: Timing, log: RunLogger) -> Self {
        let normalizer = Normalizer::new(log.clone());
        SwiggyScraper { browser, timing, log, normalizer }
    }

    fn open(&self, url: &str) -> Result<(), ScrapeError> {
        self.browser
            .navigate(url)
            .map_err(|source| ScrapeError::Navigation { url: url.to_string(), source })?;
        self.log.info(format!("Opened website: {url}"));
        delay_manager::settle(self.timing.home_settle, "page open");
        Ok(())
    }

    /// Opens the home page, types `query` into the location search and
    /// returns the suggestion nodes with their labels.
    fn suggest(&self, query: &str) -> Result<Vec<(String, Element)>, ScrapeError> {
        let ex = Extractor::new(self.browser, &self.log);
        self.open(HOME_URL)?;
        let tab = ex.element(Scope::Document, &other_location_tab())?;
        self.browser.click(&tab)?;
        let input = ex.element(Scope::Document, &Locator::tag("input"))?;
        self.browser.type_text(&input, query)?;
        delay_manager::settle(self.timing.suggest_settle, "location suggestions");

        let mut found = Vec::new();
        for el in self.browser.find_all(Scope::Document, &suggestions())? {
            found.push((self.browser.text(&el)?, el));
        }
        self.log.info(format!("{} location suggestions for {query:?}", found.len()));
        Ok(found)
    }

    /// Labels of the delivery locations the site suggests for `query`.
    pub fn search_locations(&self, query: &str) -> Result<Vec<String>, ScrapeError> {
        Ok(self.suggest(query)?.into_iter().map(|(label, _)| label).collect())
    }

    /// Sets the delivery location to the suggestion labelled exactly `label`,
    /// or to the first suggestion when none matches. Returns the label
    /// selected, `None` when the site suggested nothing.
    pub fn select_location(&self, label: &str) -> Result<Option<String>, ScrapeError> {
        let mut found = self.suggest(label)?;
        let pick = match found.iter().position(|(text, _)| text == label) {
            Some(i) => i,
            None if !found.is_empty() => {
                self.log.warn(format!("No exact match for {label:?}, taking {:?}", found[0].0));
                0
            }
            None => return Ok(None),
        };
        let (text, el) = found.swap_remove(pick);
        self.browser.click(&el)?;
        self.log.info(format!("Selected location: '{text}'"));
        delay_manager::settle(self.timing.select_settle, "location change");
        Ok(Some(text))
    }

    fn head_info(&self, ex: &Extractor<'_>) -> Record {
        let mut record = Record::new();
        ex.field(&mut record, "name", || Ok(ex.text(Scope::Document, &Locator::tag("h1"))?.into()));
        ex.field(&mut record, "ratings", || Ok(ex.text(Scope::Document, &ratings_line())?.into()));
        ex.field(&mut record, "categories", || {
            let info = ex.element(Scope::Document, &info_box())?;
            let mut categories = Vec::new();
            for a in ex.all(Scope::Within(&info), &Locator::tag("a")) {
                categories.push(ex.text_of(&a)?);
            }
            Ok(Value::List(categories))
        });
        ex.field(&mut record, "offers", || {
            Ok(Value::List(split_text(&ex.text(Scope::Document, &offers_block())?, "\n")))
        });
        record
    }

    fn dish(&self, ex: &Extractor<'_>, item: &Element) -> Record {
        let within = Scope::Within(item);
        Record::new()
            .with("dish_content", Value::from_option(ex.text_opt(within, &Locator::tag("p"))))
            .with("ratings_content", Value::from_option(ex.text_opt(within, &dish_rating_block())))
    }
}

impl SiteScraper for SwiggyScraper<'_> {
    fn name(&self) -> &'static str {
        SITE
    }

    fn expected_fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn logger(&self) -> &RunLogger {
        &self.log
    }

    /// `source` is a delivery location as typed into the site's search.
    fn collect_item_references(&self, source: &str, count: usize) -> Vec<ItemRef> {
        match self.select_location(source) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.log.warn(format!("No location suggestions for {source:?}"));
                return Vec::new();
            }
            Err(e) => {
                self.log.error(format!("Could not select location {source:?}: {e}"));
                return Vec::new();
            }
        }
        Collector::new(self.browser, self.timing, &self.log).collect(&SwiggyCards::new(), count)
    }

    fn extract_detail(&self, item: &ItemRef) -> Record {
        if let Err(e) = self.open(item.as_str()) {
            self.log.error(e);
            return Record::placeholder(FIELDS);
        }
        let h1 = Locator::tag("h1");
        match self.browser.wait_for(&h1, self.timing.wait_timeout, self.timing.poll_interval) {
            Ok(true) => {}
            Ok(false) => self.log.warn(format!("{item}: no heading after waiting")),
            Err(e) => self.log.warn(format!("{item}: waiting for heading failed: {e}")),
        }

        let ex = Extractor::new(self.browser, &self.log);
        let mut record = self.head_info(&ex);
        let dishes: Vec<Record> = ex
            .all(Scope::Document, &dish_items())
            .iter()
            .map(|d| self.dish(&ex, d))
            .collect();
        self.log.info(format!("Extracted {} dish cards.", dishes.len()));
        record.insert("dish_data", Value::Items(dishes));
        record
    }

    fn normalize(&self, record: &mut Record) {
        self.normalizer.swiggy(record);
    }
}
