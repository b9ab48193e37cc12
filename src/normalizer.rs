//! Reshapes raw detail records into flat columns.
//!
//! Normalization is a list of steps run in order over one record. A step that
//! cannot apply (column absent, unexpected shape) is logged and skipped; the
//! record keeps whatever earlier steps produced. Steps consume the column they
//! reshape, so running the list again over a normalized record only skips.

use regex::Regex;

use crate::error::NormalizeError;
use crate::logger::RunLogger;
use crate::record::{Record, Value};
use crate::{swiggy, zomato};

const HOURS_LABEL: &str = "Opening Hours\n";

type Step<'a> = (&'static str, Box<dyn Fn(&mut Record) -> Result<(), NormalizeError> + 'a>);

/// The two rating groups of a rating blob. Either every field is present or
/// none is: a short blob means the blob as a whole did not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingBlob {
    pub primary_rating: Option<String>,
    pub primary_votes: Option<String>,
    pub secondary_rating: Option<String>,
    pub secondary_votes: Option<String>,
}

impl RatingBlob {
    /// Positions 0, 1, 3 and 4; position 2 is a label.
    pub fn from_parts(parts: &[String]) -> Self {
        if parts.len() < 5 {
            return RatingBlob::default();
        }
        RatingBlob {
            primary_rating: Some(parts[0].clone()),
            primary_votes: Some(parts[1].clone()),
            secondary_rating: Some(parts[3].clone()),
            secondary_votes: Some(parts[4].clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary_rating.is_none()
    }
}

#[derive(Clone)]
pub struct Normalizer {
    log: RunLogger,
    rating_regex: Regex,
    reviews_regex: Regex,
}

impl Normalizer {
    pub fn new(log: RunLogger) -> Self {
        Normalizer {
            log,
            rating_regex: Regex::new(r"(\d+\.\d+)").expect("static regex"),
            reviews_regex: Regex::new(r"\(([\dKk\+]+) ratings?\)").expect("static regex"),
        }
    }

    pub fn zomato(&self, record: &mut Record) {
        let steps: Vec<Step<'_>> = vec![
            ("expand restaurant_data", Box::new(|r: &mut Record| expand(r, "restaurant_data", zomato::FIELDS))),
            ("expand coordinates", Box::new(|r: &mut Record| expand(r, "coordinates", &["latitude", "longitude"]))),
            ("split rating", Box::new(|r: &mut Record| self.split_rating_blob(r))),
            ("split time", Box::new(split_time)),
            ("clean category", Box::new(|r: &mut Record| clean_list(r, "category"))),
            ("clean location", Box::new(|r: &mut Record| clean_list(r, "location"))),
        ];
        self.run(record, &steps);
    }

    pub fn swiggy(&self, record: &mut Record) {
        let steps: Vec<Step<'_>> = vec![
            ("expand restaurant_data", Box::new(|r: &mut Record| expand(r, "restaurant_data", swiggy::FIELDS))),
            ("parse ratings", Box::new(|r: &mut Record| self.parse_ratings(r))),
            ("clean categories", Box::new(|r: &mut Record| clean_list(r, "categories"))),
            ("map offers", Box::new(|r: &mut Record| self.map_offers(r))),
            ("parse dishes", Box::new(|r: &mut Record| self.parse_dishes(r))),
        ];
        self.run(record, &steps);
    }

    fn run(&self, record: &mut Record, steps: &[Step<'_>]) {
        for (name, step) in steps {
            match step(record) {
                Ok(()) => self.log.debug(format!("Step `{name}` applied")),
                Err(e @ NormalizeError::MissingColumn(_)) => {
                    self.log.warn(format!("Step `{name}` skipped: {e}"))
                }
                Err(e) => self.log.error(format!("Step `{name}` failed: {e}")),
            }
        }
    }

    fn split_rating_blob(&self, record: &mut Record) -> Result<(), NormalizeError> {
        let blob = match column(record, "rating")? {
            Value::List(parts) => RatingBlob::from_parts(parts),
            Value::Missing => RatingBlob::default(),
            _ => return Err(shape("rating", "list of text")),
        };
        if blob.is_empty() {
            self.log.error("Rating blob too short, rating columns left empty");
        }
        record.take("rating");
        record.insert("dining_rating", Value::from_option(blob.primary_rating));
        record.insert("dining_votes", Value::from_option(blob.primary_votes));
        record.insert("delivery_rating", Value::from_option(blob.secondary_rating));
        record.insert("delivery_votes", Value::from_option(blob.secondary_votes));
        Ok(())
    }

    /// `rating` and `reviews` out of free text like `4.3 (1.2K ratings)`.
    pub fn parse_rating_reviews(&self, text: &str) -> (Option<String>, Option<String>) {
        let rating = self.rating_regex.captures(text).map(|c| c[1].to_string());
        let reviews = self.reviews_regex.captures(text).map(|c| c[1].to_string());
        (rating, reviews)
    }

    fn parse_ratings(&self, record: &mut Record) -> Result<(), NormalizeError> {
        let (rating, reviews) = match column(record, "ratings")? {
            Value::Text(text) => self.parse_rating_reviews(text),
            Value::Missing => (None, None),
            _ => return Err(shape("ratings", "text")),
        };
        record.take("ratings");
        record.insert("rating", Value::from_option(rating));
        record.insert("reviews", Value::from_option(reviews));
        Ok(())
    }

    fn map_offers(&self, record: &mut Record) -> Result<(), NormalizeError> {
        let map = match column(record, "offers")? {
            Value::List(items) => offers_to_map(items, &self.log),
            Value::Map(_) | Value::Missing => return Ok(()),
            _ => return Err(shape("offers", "list of text")),
        };
        record.insert("offers", Value::Map(map));
        Ok(())
    }

    fn parse_dishes(&self, record: &mut Record) -> Result<(), NormalizeError> {
        let dishes = match column(record, "dish_data")? {
            Value::Items(dishes) => dishes,
            Value::Missing => return Ok(()),
            _ => return Err(shape("dish_data", "list of dishes")),
        };
        let parsed: Vec<Record> = dishes.iter().map(|dish| self.parse_dish(dish)).collect();
        record.insert("dish_data", Value::Items(parsed));
        Ok(())
    }

    /// One raw dish (`dish_content` + `ratings_content`) into its fields.
    /// Dishes without raw content were parsed already and pass through.
    fn parse_dish(&self, dish: &Record) -> Record {
        let Some(content) = dish.get("dish_content") else {
            return dish.clone();
        };
        let mut parsed = match content {
            Value::Text(text) => dish_info(text),
            _ => Record::new()
                .with("veg_status", Value::Missing)
                .with("dish_name", Value::Missing),
        };
        let (rating, reviews) = match dish.get("ratings_content") {
            Some(Value::Text(text)) => compact_rating_reviews(text),
            _ => (None, None),
        };
        parsed.insert("rating", Value::from_option(rating));
        parsed.insert("reviews", Value::from_option(reviews));
        parsed
    }
}

fn column<'r>(record: &'r Record, name: &str) -> Result<&'r Value, NormalizeError> {
    record
        .get(name)
        .ok_or_else(|| NormalizeError::MissingColumn(name.to_string()))
}

fn shape(column: &str, expected: &'static str) -> NormalizeError {
    NormalizeError::Shape { column: column.to_string(), expected }
}

/// Lifts the fields of a nested record column to the top level. A missing
/// nested record lifts `fill` as missing columns.
fn expand(record: &mut Record, name: &str, fill: &[&str]) -> Result<(), NormalizeError> {
    match column(record, name)? {
        Value::Record(_) | Value::Missing => {}
        _ => return Err(shape(name, "record")),
    }
    match record.take(name) {
        Some(Value::Record(nested)) => {
            for (key, value) in nested {
                record.insert(&key, value);
            }
        }
        _ => {
            for key in fill {
                record.insert(key, Value::Missing);
            }
        }
    }
    Ok(())
}

fn split_time(record: &mut Record) -> Result<(), NormalizeError> {
    let (days, hours) = match column(record, "time")? {
        Value::Text(text) => {
            let (days, hours) = split_hours(text);
            (Value::Text(days), Value::Text(hours))
        }
        Value::Missing => (Value::Missing, Value::Missing),
        _ => return Err(shape("time", "text")),
    };
    record.take("time");
    record.insert("days", days);
    record.insert("opening_hours", hours);
    Ok(())
}

fn clean_list(record: &mut Record, name: &str) -> Result<(), NormalizeError> {
    match record.get_mut(name) {
        None => Err(NormalizeError::MissingColumn(name.to_string())),
        Some(Value::List(items)) => {
            for item in items.iter_mut() {
                *item = clean_category(item);
            }
            Ok(())
        }
        Some(Value::Missing) => Ok(()),
        Some(_) => Err(shape(name, "list of text")),
    }
}

/// Day range and time range of an hours string. The day range runs up to the
/// first colon; everything after it is the time range.
pub fn split_hours(text: &str) -> (String, String) {
    let text = text.replace(HOURS_LABEL, "");
    match text.split_once(':') {
        Some((days, hours)) => (days.to_string(), hours.to_string()),
        None => (text, String::new()),
    }
}

pub fn clean_category(item: &str) -> String {
    item.trim().trim_end_matches(',').to_string()
}

/// Pairs up an offer list after dropping its heading. A trailing element
/// without a partner is dropped.
pub fn offers_to_map(items: &[String], log: &RunLogger) -> Vec<(String, String)> {
    let mut map: Vec<(String, String)> = Vec::new();
    let body = items.get(1..).unwrap_or_default();
    for pair in body.chunks(2) {
        match pair {
            [key, value] => match map.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = value.clone(),
                None => map.push((key.clone(), value.clone())),
            },
            [dangling] => log.warn(format!("Offer without a code dropped: {dangling}")),
            _ => {}
        }
    }
    map
}

/// Fields of a dish's accessible description, e.g.
/// `Veg Item. Paneer Butter Masala. Costs: 250 rupees, Description: ...`.
///
/// `label: value` pairs come from splitting on the first `, `; a piece with no
/// label is kept as a key with a missing value. `veg_status` and `dish_name`
/// are the first two `. ` segments and win over same-named pairs.
pub fn dish_info(paragraph: &str) -> Record {
    let mut info = Record::new();
    for item in paragraph.splitn(2, ", ") {
        match item.split_once(": ") {
            Some((key, value)) => info.insert(key.trim(), value.trim()),
            None => info.insert(item.trim(), Value::Missing),
        }
    }
    let mut segments = paragraph.split(". ");
    info.insert("veg_status", Value::from_option(segments.next().map(str::to_string)));
    info.insert("dish_name", Value::from_option(segments.next().map(str::to_string)));
    info
}

/// `rating` and `reviews` out of a compact fragment like `4.5\n(120)`: exactly
/// two whitespace-separated parts once parentheses are gone, else neither.
pub fn compact_rating_reviews(text: &str) -> (Option<String>, Option<String>) {
    let text = text.replace('\n', " ").replace(['(', ')'], "");
    match text.split_whitespace().collect::<Vec<_>>().as_slice() {
        [rating, reviews] => (Some(rating.to_string()), Some(reviews.to_string())),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(RunLogger::with_id("test", "t1"))
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rating_blob_takes_fixed_positions() {
        let blob = RatingBlob::from_parts(&texts(&["4.2", "1.2K", "★", "3.8", "900"]));
        assert_eq!(blob.primary_rating.as_deref(), Some("4.2"));
        assert_eq!(blob.primary_votes.as_deref(), Some("1.2K"));
        assert_eq!(blob.secondary_rating.as_deref(), Some("3.8"));
        assert_eq!(blob.secondary_votes.as_deref(), Some("900"));
    }

    #[test]
    fn blank_label_line_keeps_vote_positions() {
        let parts = crate::extractor::split_text("4.2\n1.2K\n\n3.8\n900", "\n");
        let blob = RatingBlob::from_parts(&parts);
        assert_eq!(blob.primary_votes.as_deref(), Some("1.2K"));
        assert_eq!(blob.secondary_rating.as_deref(), Some("3.8"));
        assert_eq!(blob.secondary_votes.as_deref(), Some("900"));
    }

    #[test]
    fn short_rating_blob_is_all_none() {
        assert_eq!(RatingBlob::from_parts(&texts(&["4.2", "1.2K", "★", "3.8"])), RatingBlob::default());
        assert!(RatingBlob::from_parts(&[]).is_empty());
    }

    #[test]
    fn free_text_rating_and_reviews() {
        let n = normalizer();
        assert_eq!(
            n.parse_rating_reviews("4.3 (1.2K ratings)"),
            (Some("4.3".to_string()), Some("1.2K".to_string()))
        );
        assert_eq!(n.parse_rating_reviews("no rating here"), (None, None));
        assert_eq!(n.parse_rating_reviews("4.0 (1 rating)").1.as_deref(), Some("1"));
    }

    #[test]
    fn hours_split_on_first_colon() {
        assert_eq!(
            split_hours("Opening Hours\nMon-Fri:10:00-22:00"),
            ("Mon-Fri".to_string(), "10:00-22:00".to_string())
        );
        assert_eq!(split_hours("Closed"), ("Closed".to_string(), String::new()));
    }

    #[test]
    fn offers_pair_up_after_heading() {
        let log = RunLogger::with_id("test", "t1");
        assert_eq!(
            offers_to_map(&texts(&["header", "Flat 50% off", "CODE50"]), &log),
            vec![("Flat 50% off".to_string(), "CODE50".to_string())]
        );
        assert_eq!(
            offers_to_map(&texts(&["header", "A", "1", "B"]), &log),
            vec![("A".to_string(), "1".to_string())]
        );
        assert!(offers_to_map(&[], &log).is_empty());
    }

    #[test]
    fn categories_lose_whitespace_and_trailing_commas() {
        assert_eq!(clean_category("  Biryani, "), "Biryani");
        assert_eq!(clean_category("Chinese,,"), "Chinese");
    }

    #[test]
    fn dish_description_fields() {
        let info = dish_info("Veg Item. Paneer Tikka. Costs: 250 rupees, Description: Smoky, spiced");
        assert_eq!(info.get("veg_status"), Some(&Value::text("Veg Item")));
        assert_eq!(info.get("dish_name"), Some(&Value::text("Paneer Tikka")));
        assert_eq!(info.get("Description"), Some(&Value::text("Smoky, spiced")));
        assert_eq!(
            info.get("Veg Item. Paneer Tikka. Costs"),
            Some(&Value::text("250 rupees"))
        );

        let bare = dish_info("Chef special");
        assert_eq!(bare.get("Chef special"), Some(&Value::Missing));
        assert_eq!(bare.get("dish_name"), Some(&Value::Missing));
    }

    #[test]
    fn compact_fragment_needs_exactly_two_parts() {
        assert_eq!(
            compact_rating_reviews("4.5\n(120)"),
            (Some("4.5".to_string()), Some("120".to_string()))
        );
        assert_eq!(compact_rating_reviews("4.5"), (None, None));
        assert_eq!(compact_rating_reviews("Bestseller 4.5 (120)"), (None, None));
    }

    fn raw_zomato() -> Record {
        let data = Record::new()
            .with("name", "Haldiram's")
            .with("rating", list(&["4.2", "1.2K", "Dining Ratings", "3.8", "900", "Delivery Ratings"]))
            .with("category", list(&["North Indian", " Street Food,"]))
            .with("location", list(&["Connaught Place", "New Delhi"]))
            .with("time", "Opening Hours\nMon-Sun:8am – 11pm")
            .with(
                "coordinates",
                Record::new().with("latitude", "28.63").with("longitude", "77.21"),
            )
            .with("dish_data", Value::Items(Vec::new()));
        Record::new().with("url", "https://www.zomato.com/x").with("restaurant_data", data)
    }

    #[test]
    fn zomato_record_flattens() {
        let mut record = raw_zomato();
        normalizer().zomato(&mut record);

        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            vec![
                "url",
                "name",
                "category",
                "location",
                "dish_data",
                "latitude",
                "longitude",
                "dining_rating",
                "dining_votes",
                "delivery_rating",
                "delivery_votes",
                "days",
                "opening_hours",
            ]
        );
        assert_eq!(record.get("category"), Some(&list(&["North Indian", "Street Food"])));
        assert_eq!(record.get("delivery_votes"), Some(&Value::text("900")));
        assert_eq!(record.get("days"), Some(&Value::text("Mon-Sun")));
        assert_eq!(record.get("opening_hours"), Some(&Value::text("8am – 11pm")));
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let n = normalizer();
        let mut record = raw_zomato();
        n.zomato(&mut record);
        let once = record.clone();
        n.zomato(&mut record);
        assert_eq!(record, once);

        let mut record = raw_swiggy();
        n.swiggy(&mut record);
        let once = record.clone();
        n.swiggy(&mut record);
        assert_eq!(record, once);
    }

    #[test]
    fn failed_extraction_normalizes_to_missing_columns() {
        let mut record = Record::new()
            .with("url", "https://www.zomato.com/x")
            .with("restaurant_data", Record::placeholder(zomato::FIELDS));
        normalizer().zomato(&mut record);

        assert!(!record.contains("rating"));
        assert!(!record.contains("time"));
        assert!(!record.contains("coordinates"));
        for key in ["name", "latitude", "dining_rating", "days", "opening_hours"] {
            assert_eq!(record.get(key), Some(&Value::Missing), "{key}");
        }
    }

    #[test]
    fn bad_shape_leaves_column_and_later_steps_run() {
        let mut record = Record::new()
            .with("rating", "4.2")
            .with("time", "Opening Hours\nMon:9-5")
            .with("category", list(&[" Cafe,"]))
            .with("location", list(&["Bandra"]));
        normalizer().zomato(&mut record);

        assert_eq!(record.get("rating"), Some(&Value::text("4.2")));
        assert_eq!(record.get("days"), Some(&Value::text("Mon")));
        assert_eq!(record.get("category"), Some(&list(&["Cafe"])));
    }

    fn raw_swiggy() -> Record {
        let dish = Record::new()
            .with("dish_content", "Non-veg item. Chicken Biryani. Costs: 320 rupees, Description: Dum cooked")
            .with("ratings_content", "4.4\n(86)");
        let unrated = Record::new()
            .with("dish_content", "Veg item. Raita")
            .with("ratings_content", Value::Missing);
        let data = Record::new()
            .with("name", "Meghana Foods")
            .with("ratings", "4.4 (10K+ ratings) • ₹500 for two")
            .with("categories", list(&["Biryani,", " Andhra"]))
            .with("offers", list(&["Deals for you", "60% OFF", "USE TRYNEW", "Flat ₹100 off"]))
            .with("dish_data", Value::Items(vec![dish, unrated]));
        Record::new().with("url", "https://swiggy.com/restaurants/meghana").with("restaurant_data", data)
    }

    #[test]
    fn swiggy_record_flattens() {
        let mut record = raw_swiggy();
        normalizer().swiggy(&mut record);

        assert_eq!(record.get("rating"), Some(&Value::text("4.4")));
        assert_eq!(record.get("reviews"), Some(&Value::text("10K+")));
        assert!(!record.contains("ratings"));
        assert_eq!(record.get("categories"), Some(&list(&["Biryani", "Andhra"])));
        assert_eq!(
            record.get("offers"),
            Some(&Value::Map(vec![("60% OFF".to_string(), "USE TRYNEW".to_string())]))
        );

        let dishes = match record.get("dish_data") {
            Some(Value::Items(d)) => d.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(dishes[0].get("dish_name"), Some(&Value::text("Chicken Biryani")));
        assert_eq!(dishes[0].get("Description"), Some(&Value::text("Dum cooked")));
        assert_eq!(dishes[0].get("rating"), Some(&Value::text("4.4")));
        assert_eq!(dishes[0].get("reviews"), Some(&Value::text("86")));
        assert!(!dishes[0].contains("dish_content"));
        assert_eq!(dishes[1].get("veg_status"), Some(&Value::text("Veg item")));
        assert_eq!(dishes[1].get("rating"), Some(&Value::Missing));
    }
}
