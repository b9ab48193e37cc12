//! Zomato: listing collection and restaurant page extraction.
//!
//! Restaurant pages carry no stable ids for the header fields, so every
//! lookup hangs off the visible "Ratings" label and walks up/down from it.

use url::Url;

use crate::browser::{Browser, Element, Locator, Scope};
use crate::collector::{CardSource, Collector};
use crate::config::Timing;
use crate::delay_manager;
use crate::dish_rating::{self, RatingIcon};
use crate::error::{BrowserError, ScrapeError};
use crate::extractor::{split_text, Extractor};
use crate::logger::RunLogger;
use crate::normalizer::Normalizer;
use crate::pipeline::SiteScraper;
use crate::record::{ItemRef, Record, Value};

pub const SITE: &str = "zomato";

pub const FIELDS: &[&str] = &[
    "name",
    "rating",
    "category",
    "location",
    "time",
    "coordinates",
    "dish_data",
];

fn ratings_label() -> Locator {
    Locator::text("div", "Ratings")
}

fn head_block() -> Locator {
    ratings_label().up(5)
}

fn rating_block() -> Locator {
    ratings_label().up(3)
}

fn category_line() -> Locator {
    ratings_label().up(6).then_nth("section", 1).then("div")
}

fn location_line() -> Locator {
    ratings_label().up(6).then_nth("section", 1).then("a")
}

fn hours_trigger() -> Locator {
    Locator::attr_eq("div", "role", "tooltip")
}

fn hours_text() -> Locator {
    Locator::attr_eq("span", "role", "tooltip")
}

fn directions_link() -> Locator {
    Locator::text("span", "Direction").up(2)
}

fn menu_sections() -> Locator {
    Locator::text("h2", "Order Online").up(3).then("section")
}

/// Listing cards; the card node itself carries the restaurant link.
pub struct ZomatoCards {
    locator: Locator,
}

impl ZomatoCards {
    pub fn new() -> Self {
        ZomatoCards { locator: Locator::attr_eq("img", "alt", "Restaurant Card").up(2) }
    }
}

impl Default for ZomatoCards {
    fn default() -> Self {
        Self::new()
    }
}

impl CardSource for ZomatoCards {
    fn card_locator(&self) -> &Locator {
        &self.locator
    }

    fn references(&self, browser: &dyn Browser, cards: &[Element]) -> Result<Vec<String>, BrowserError> {
        let mut refs = Vec::with_capacity(cards.len());
        for card in cards {
            if let Some(href) = browser.attribute(card, "href")? {
                refs.push(href);
            }
        }
        Ok(refs)
    }
}

pub struct ZomatoScraper<'a> {
    browser: &'a dyn Browser,
    timing: Timing,
    log: RunLogger,
    normalizer: Normalizer,
}

impl<'a> ZomatoScraper<'a> {
    pub fn new(browser: &'a dyn Browser, timing: Timing, log: RunLogger) -> Self {
        let normalizer = Normalizer::new(log.clone());
        ZomatoScraper { browser, timing, log, normalizer }
    }

    fn head_info(&self, ex: &Extractor<'_>) -> Record {
        let mut record = Record::new();

        ex.field(&mut record, "name", || {
            let head = ex.element(Scope::Document, &head_block())?;
            Ok(ex.text(Scope::Within(&head), &Locator::tag("h1"))?.into())
        });
        ex.field(&mut record, "rating", || {
            Ok(Value::List(split_text(&ex.text(Scope::Document, &rating_block())?, "\n")))
        });
        ex.field(&mut record, "category", || {
            Ok(Value::List(split_text(&ex.text(Scope::Document, &category_line())?, ", ")))
        });
        ex.field(&mut record, "location", || {
            Ok(Value::List(split_text(&ex.text(Scope::Document, &location_line())?, ", ")))
        });
        ex.field(&mut record, "time", || self.hours(ex));
        ex.field(&mut record, "coordinates", || self.coordinates(ex));

        record
    }

    /// Opening hours only render inside a tooltip shown on hover.
    fn hours(&self, ex: &Extractor<'_>) -> Result<Value, ScrapeError> {
        let trigger = ex.element(Scope::Document, &hours_trigger())?;
        self.browser.hover(&trigger)?;
        Ok(ex.text(Scope::Document, &hours_text())?.into())
    }

    fn coordinates(&self, ex: &Extractor<'_>) -> Result<Value, ScrapeError> {
        let link = ex.element(Scope::Document, &directions_link())?;
        let href = ex.attribute(&link, "href")?.unwrap_or_default();
        let (latitude, longitude) = match parse_destination(&href) {
            Some((lat, lng)) => {
                self.log.debug(format!("Latitude: {lat}, Longitude: {lng}"));
                (Value::Text(lat), Value::Text(lng))
            }
            None => {
                self.log.warn("No destination parameter found in the URL");
                (Value::Missing, Value::Missing)
            }
        };
        Ok(Record::new()
            .with("latitude", latitude)
            .with("longitude", longitude)
            .into())
    }

    /// Dish cards: every menu section but the first, their non-empty child
    /// groups, and each group's child cards.
    fn dish_cards(&self, ex: &Extractor<'_>) -> Vec<Element> {
        let sections = ex.all(Scope::Document, &menu_sections());
        let mut groups = Vec::new();
        for section in sections.iter().skip(1) {
            let divs = ex.all(Scope::Within(section), &Locator::child("div"));
            self.log.debug(format!("Found {} div elements in section.", divs.len()));
            for div in divs {
                match self.browser.text(&div) {
                    Ok(text) if !text.trim().is_empty() => groups.push(div),
                    Ok(_) => {}
                    Err(e) => self.log.warn(format!("Unreadable menu group: {e}")),
                }
            }
        }

        let mut cards = Vec::new();
        for group in &groups {
            cards.extend(ex.all(Scope::Within(group), &Locator::child("div")));
        }
        self.log.info(format!("Extracted {} dish cards.", cards.len()));
        cards
    }

    fn dish(&self, ex: &Extractor<'_>, card: &Element) -> Record {
        let within = Scope::Within(card);
        let name = ex.text_opt(within, &Locator::tag("h4"));
        let votes = ex.text_opt(within, &Locator::text("span", "votes"));
        let price = ex.text_opt(within, &Locator::text("span", "₹"));

        if let Some(more) = ex.optional(within, &Locator::text("span", "read more")) {
            match self.browser.click(&more) {
                Ok(()) => self.log.debug("Clicked on 'read more' for dish description."),
                Err(e) => self.log.warn(format!("Could not expand description: {e}")),
            }
        }
        let description = ex.text_opt(within, &Locator::tag("p"));
        let rating = dish_rating::reconstruct(&self.rating_icons(ex, card), &self.log);

        Record::new()
            .with("name", Value::from_option(name))
            .with("votes", Value::from_option(votes))
            .with("price", Value::from_option(price))
            .with("description", Value::from_option(description))
            .with("rating", rating.rating)
            .with("dish_type", rating.kind.label())
    }

    fn rating_icons(&self, ex: &Extractor<'_>, card: &Element) -> Vec<RatingIcon> {
        let icons = ex.all(Scope::Within(card), &Locator::tag("i"));
        let mut out = Vec::with_capacity(icons.len());
        for (i, icon) in icons.iter().enumerate() {
            if i == 0 {
                let color = ex.attribute(icon, "color").unwrap_or_else(|e| {
                    self.log.warn(format!("Unreadable dish marker: {e}"));
                    None
                });
                out.push(RatingIcon { color, ..Default::default() });
                continue;
            }
            let markup = self.browser.outer_html(icon).unwrap_or_else(|e| {
                self.log.warn(format!("Unreadable rating icon: {e}"));
                String::new()
            });
            let star = RatingIcon::from_markup(None, &markup);
            let partial = !star.titled;
            out.push(star);
            if partial {
                break;
            }
        }
        out
    }
}

impl SiteScraper for ZomatoScraper<'_> {
    fn name(&self) -> &'static str {
        SITE
    }

    fn expected_fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn logger(&self) -> &RunLogger {
        &self.log
    }

    /// `source` is a Zomato listing URL for one area.
    fn collect_item_references(&self, source: &str, count: usize) -> Vec<ItemRef> {
        self.log.info(format!("Fetching restaurant URLs from {source}"));
        if let Err(e) = self.browser.navigate(source) {
            self.log.error(ScrapeError::Navigation { url: source.to_string(), source: e });
            return Vec::new();
        }
        delay_manager::settle(self.timing.page_settle, "listing load");
        Collector::new(self.browser, self.timing, &self.log).collect(&ZomatoCards::new(), count)
    }

    fn extract_detail(&self, item: &ItemRef) -> Record {
        self.log.info(format!("Fetching restaurant data from URL {item}"));
        if let Err(e) = self.browser.navigate(item.as_str()) {
            self.log.error(ScrapeError::Navigation { url: item.to_string(), source: e });
            return Record::placeholder(FIELDS);
        }
        delay_manager::settle(self.timing.page_settle, "restaurant page load");

        let ex = Extractor::new(self.browser, &self.log);
        let mut record = self.head_info(&ex);
        let dishes = self
            .dish_cards(&ex)
            .iter()
            .map(|card| self.dish(&ex, card))
            .collect();
        record.insert("dish_data", Value::Items(dishes));

        let unresolved = record.unresolved();
        if !unresolved.is_empty() {
            self.log.warn(format!("{item}: unresolved fields {unresolved:?}"));
        }
        record
    }

    fn normalize(&self, record: &mut Record) {
        self.normalizer.zomato(record);
    }
}

/// `(latitude, longitude)` from the `destination=lat,lng` query parameter of
/// a directions link.
pub fn parse_destination(href: &str) -> Option<(String, String)> {
    let url = Url::parse(href).ok()?;
    let destination = url
        .query_pairs()
        .find(|(k, _)| k == "destination")
        .map(|(_, v)| v.into_owned())?;
    let (lat, lng) = destination.split_once(',')?;
    let (lat, lng) = (lat.trim(), lng.trim());
    if lat.is_empty() || lng.is_empty() {
        return None;
    }
    Some((lat.to_string(), lng.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeNode};
    use crate::dish_rating::{NON_VEG_COLOR, VEG_COLOR};

    const FULL_STAR: &str = r#"<i><svg><title>star-fill</title></svg></i>"#;
    const HALF_STAR: &str = r##"<i><svg><linearGradient>
        <stop offset="0%" stop-color="#F3C117"></stop>
        <stop offset="50%" stop-color="#F3C117"></stop>
        </linearGradient></svg></i>"##;

    fn scraper(browser: &FakeBrowser) -> ZomatoScraper<'_> {
        ZomatoScraper::new(browser, Timing::instant(), RunLogger::with_id(SITE, "t1"))
    }

    fn restaurant_page(browser: &FakeBrowser) {
        let doc = Scope::Document;
        let head = browser.add(doc, &head_block(), FakeNode::text("head"));
        browser.add(Scope::Within(&head), &Locator::tag("h1"), FakeNode::text("Haldiram's"));
        browser.add(doc, &rating_block(), FakeNode::text("4.2\n1.2K\nDining Ratings\n3.8\n900\nDelivery Ratings"));
        browser.add(doc, &category_line(), FakeNode::text("North Indian, Street Food, Mithai"));
        browser.add(doc, &location_line(), FakeNode::text("Connaught Place, New Delhi"));
        browser.add(doc, &hours_trigger(), FakeNode::text("Open now"));
        browser.add(doc, &hours_text(), FakeNode::text("Opening Hours\nMon-Sun:8am – 11pm"));
        browser.add(
            doc,
            &directions_link(),
            FakeNode::text("Direction")
                .attr("href", "https://www.google.com/maps/dir/?api=1&destination=28.6315,77.2167"),
        );

        browser.add(doc, &menu_sections(), FakeNode::text("Order Online"));
        let section = browser.add(doc, &menu_sections(), FakeNode::text("Recommended"));
        let group = browser.add(Scope::Within(&section), &Locator::child("div"), FakeNode::text("Recommended"));
        browser.add(Scope::Within(&section), &Locator::child("div"), FakeNode::text("  "));

        let paneer = browser.add(Scope::Within(&group), &Locator::child("div"), FakeNode::text("card"));
        let c = Scope::Within(&paneer);
        browser.add(c, &Locator::tag("h4"), FakeNode::text("Paneer Tikka"));
        browser.add(c, &Locator::text("span", "votes"), FakeNode::text("124 votes"));
        browser.add(c, &Locator::text("span", "₹"), FakeNode::text("₹320"));
        browser.add(c, &Locator::text("span", "read more"), FakeNode::text("read more"));
        browser.add(c, &Locator::tag("p"), FakeNode::text("Smoky cottage cheese."));
        browser.add(c, &Locator::tag("i"), FakeNode::text("").attr("color", VEG_COLOR));
        browser.add(c, &Locator::tag("i"), FakeNode::text("").html(FULL_STAR));
        browser.add(c, &Locator::tag("i"), FakeNode::text("").html(FULL_STAR));
        browser.add(c, &Locator::tag("i"), FakeNode::text("").html(HALF_STAR));

        let kebab = browser.add(Scope::Within(&group), &Locator::child("div"), FakeNode::text("card"));
        let c = Scope::Within(&kebab);
        browser.add(c, &Locator::tag("h4"), FakeNode::text("Seekh Kebab"));
        browser.add(c, &Locator::tag("i"), FakeNode::text("").attr("color", NON_VEG_COLOR));
    }

    #[test]
    fn extracts_header_fields_and_dishes() {
        let browser = FakeBrowser::new();
        restaurant_page(&browser);
        let item = ItemRef::new("https://www.zomato.com/ncr/haldirams-connaught-place");
        let record = scraper(&browser).extract_detail(&item);

        assert_eq!(browser.navigations.borrow().as_slice(), &[item.to_string()]);
        assert_eq!(record.get("name"), Some(&Value::text("Haldiram's")));
        assert_eq!(
            record.get("rating").and_then(Value::as_list).map(|l| l.len()),
            Some(6)
        );
        assert_eq!(
            record.get("category"),
            Some(&Value::List(vec!["North Indian".into(), "Street Food".into(), "Mithai".into()]))
        );
        assert_eq!(record.get("time"), Some(&Value::text("Opening Hours\nMon-Sun:8am – 11pm")));
        assert_eq!(browser.hovers.borrow().len(), 1);

        let coords = match record.get("coordinates") {
            Some(Value::Record(r)) => r.clone(),
            other => panic!("unexpected coordinates {other:?}"),
        };
        assert_eq!(coords.get("latitude"), Some(&Value::text("28.6315")));
        assert_eq!(coords.get("longitude"), Some(&Value::text("77.2167")));

        let dishes = match record.get("dish_data") {
            Some(Value::Items(items)) => items.clone(),
            other => panic!("unexpected dishes {other:?}"),
        };
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].get("name"), Some(&Value::text("Paneer Tikka")));
        assert_eq!(dishes[0].get("price"), Some(&Value::text("₹320")));
        assert_eq!(dishes[0].get("rating"), Some(&Value::Number(2.5)));
        assert_eq!(dishes[0].get("dish_type"), Some(&Value::text("veg")));
        assert_eq!(browser.clicks.borrow().len(), 1);

        assert_eq!(dishes[1].get("votes"), Some(&Value::Missing));
        assert_eq!(dishes[1].get("rating"), Some(&Value::Number(0.0)));
        assert_eq!(dishes[1].get("dish_type"), Some(&Value::text("non-veg")));
        assert!(record.unresolved().is_empty());
    }

    #[test]
    fn missing_landmarks_only_null_their_fields() {
        let browser = FakeBrowser::new();
        browser.add(Scope::Document, &rating_block(), FakeNode::text("4.0\n10\nDining Ratings\n3.9\n20"));
        let record = scraper(&browser).extract_detail(&ItemRef::new("https://www.zomato.com/x"));

        for key in FIELDS {
            assert!(record.contains(key), "missing key {key}");
        }
        assert_eq!(record.unresolved(), vec!["name", "category", "location", "time", "coordinates"]);
        assert_eq!(record.get("dish_data"), Some(&Value::Items(Vec::new())));
        assert!(browser.hovers.borrow().is_empty());
    }

    #[test]
    fn failed_navigation_yields_placeholder() {
        let browser = FakeBrowser::new();
        browser.fail_navigation.set(true);
        let record = scraper(&browser).extract_detail(&ItemRef::new("https://www.zomato.com/x"));
        assert_eq!(record, Record::placeholder(FIELDS));
    }

    #[test]
    fn collects_card_links_from_listing() {
        let browser = FakeBrowser::new();
        let cards = ZomatoCards::new();
        for href in ["https://z/1", "https://z/2"] {
            browser.add(Scope::Document, cards.card_locator(), FakeNode::text("").attr("href", href));
        }
        let refs = scraper(&browser).collect_item_references("https://www.zomato.com/ncr/delivery", 2);
        assert_eq!(refs, vec![ItemRef::new("https://z/1"), ItemRef::new("https://z/2")]);
        assert_eq!(browser.navigations.borrow().as_slice(), &["https://www.zomato.com/ncr/delivery".to_string()]);
    }

    #[test]
    fn destination_parsing() {
        assert_eq!(
            parse_destination("https://www.google.com/maps/dir/?api=1&destination=28.63%2C77.21"),
            Some(("28.63".to_string(), "77.21".to_string()))
        );
        assert_eq!(parse_destination("https://www.google.com/maps/dir/?api=1"), None);
        assert_eq!(parse_destination("Not a url"), None);
        assert_eq!(parse_destination("https://maps.example/?destination=28.63"), None);
    }
}
