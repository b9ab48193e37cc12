//! Scroll-driven collection of item references from a listing page.
//!
//! Listings render cards lazily and may virtualize them, so the loop is
//! driven by what the page shows: scroll the last card into view, let the
//! page settle, look again, and stop once enough distinct items were seen or
//! an iteration brought nothing new.

use std::collections::HashSet;

use crate::browser::{Browser, Element, Locator, Scope};
use crate::config::Timing;
use crate::delay_manager;
use crate::error::BrowserError;
use crate::logger::RunLogger;
use crate::record::ItemRef;

/// Site-specific half of the loop: which nodes are cards, and how item
/// references are read off the page.
pub trait CardSource {
    fn card_locator(&self) -> &Locator;

    /// References currently discoverable, in page order. Duplicates are fine.
    fn references(&self, browser: &dyn Browser, cards: &[Element]) -> Result<Vec<String>, BrowserError>;
}

/// Insertion-ordered set of references.
#[derive(Default)]
struct Discovered {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl Discovered {
    fn extend(&mut self, refs: Vec<String>) -> usize {
        let before = self.order.len();
        for r in refs {
            if r.is_empty() || self.seen.contains(&r) {
                continue;
            }
            self.seen.insert(r.clone());
            self.order.push(r);
        }
        self.order.len() - before
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

pub struct Collector<'a> {
    browser: &'a dyn Browser,
    timing: Timing,
    log: &'a RunLogger,
}

impl<'a> Collector<'a> {
    pub fn new(browser: &'a dyn Browser, timing: Timing, log: &'a RunLogger) -> Self {
        Collector { browser, timing, log }
    }

    /// Up to `target` distinct references in first-discovery order. Fewer
    /// come back when the listing runs dry; a session failure midway keeps
    /// whatever was found before it.
    pub fn collect(&self, source: &dyn CardSource, target: usize) -> Vec<ItemRef> {
        let mut found = Discovered::default();
        if target == 0 {
            return Vec::new();
        }
        if let Err(e) = self.grow(source, target, &mut found) {
            self.log.error(format!("Collection stopped early: {}", e));
        }

        let refs: Vec<ItemRef> = found.order.into_iter().take(target).map(ItemRef::new).collect();
        if refs.len() < target {
            self.log.info(format!("Listing exhausted: {} of {} requested", refs.len(), target));
        }
        self.log.info(format!("Successfully fetched {} restaurant URLs", refs.len()));
        refs
    }

    fn grow(&self, source: &dyn CardSource, target: usize, found: &mut Discovered) -> Result<(), BrowserError> {
        let locator = source.card_locator();
        let mut cards = self.browser.find_all(Scope::Document, locator)?;

        if cards.is_empty() {
            if self.browser.wait_for(locator, self.timing.wait_timeout, self.timing.poll_interval)? {
                cards = self.browser.find_all(Scope::Document, locator)?;
            }
            if cards.is_empty() {
                self.log.warn("No restaurant cards found.");
                return Ok(());
            }
        }
        found.extend(source.references(self.browser, &cards)?);

        while found.len() < target {
            let Some(last) = cards.last() else {
                self.log.warn("Restaurant cards disappeared from the page.");
                break;
            };
            self.browser.scroll_into_view(last)?;
            delay_manager::settle(self.timing.scroll_settle, "lazy-loaded cards");

            let cards_before = cards.len();
            cards = self.browser.find_all(Scope::Document, locator)?;
            let added = found.extend(source.references(self.browser, &cards)?);
            self.log.info(format!(
                "{} restaurant cards found, {} unique so far",
                cards.len(),
                found.len()
            ));

            if cards.len() <= cards_before && added == 0 {
                self.log.info("Listing stopped growing.");
                break;
            }
        }
        Ok(())
    }
}
