//! Dish rating reconstruction from the star icons next to a dish.
//!
//! The first icon is the veg / non-veg marker, told apart by its colour. The
//! icons after it are stars: a star with a `<title>` is fully filled, and the
//! first star without one is the partial star, whose fill is the offset of
//! the second gradient stop in the fill colour. Nothing after the partial
//! star is looked at. This leans on the site drawing stars full-to-empty.

use scraper::{Html, Selector};

use crate::logger::RunLogger;

pub const VEG_COLOR: &str = "#3AB757";
pub const NON_VEG_COLOR: &str = "#BF4C43";
pub const FILL_STOP_COLOR: &str = "#F3C117";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DishKind {
    Veg,
    NonVeg,
    Unknown(Option<String>),
}

impl DishKind {
    pub fn from_color(color: Option<&str>) -> Self {
        match color {
            Some(c) if c.eq_ignore_ascii_case(VEG_COLOR) => DishKind::Veg,
            Some(c) if c.eq_ignore_ascii_case(NON_VEG_COLOR) => DishKind::NonVeg,
            other => DishKind::Unknown(other.map(str::to_string)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DishKind::Veg => "veg",
            DishKind::NonVeg => "non-veg",
            DishKind::Unknown(_) => "unknown",
        }
    }
}

/// What the reconstruction needs to know about one icon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingIcon {
    pub color: Option<String>,
    pub titled: bool,
    /// `offset` of every gradient stop in the fill colour, in document order.
    pub fill_offsets: Vec<String>,
}

impl RatingIcon {
    /// Reads the title and gradient stops out of the icon's outer HTML.
    pub fn from_markup(color: Option<String>, html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        let titled = fragment.select(&selector("title")).next().is_some();
        let fill_offsets = fragment
            .select(&selector("stop"))
            .filter(|stop| {
                stop.value()
                    .attr("stop-color")
                    .is_some_and(|c| c.eq_ignore_ascii_case(FILL_STOP_COLOR))
            })
            .filter_map(|stop| stop.value().attr("offset").map(str::to_string))
            .collect();
        RatingIcon { color, titled, fill_offsets }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DishRating {
    pub rating: f64,
    pub kind: DishKind,
}

pub fn reconstruct(icons: &[RatingIcon], log: &RunLogger) -> DishRating {
    let Some((marker, stars)) = icons.split_first() else {
        log.warn("Dish card has no rating icons");
        return DishRating { rating: 0.0, kind: DishKind::Unknown(None) };
    };

    let kind = DishKind::from_color(marker.color.as_deref());
    if let DishKind::Unknown(color) = &kind {
        log.warn(format!("Unknown dish with color code: {:?}", color));
    }

    let mut rating = 0.0;
    for star in stars {
        if star.titled {
            rating += 1.0;
            continue;
        }
        match star.fill_offsets.get(1) {
            Some(offset) => match parse_percent(offset) {
                Some(percent) => rating += percent as f64 / 100.0,
                None => log.warn(format!("Unreadable gradient offset {:?}", offset)),
            },
            None => log.debug(format!(
                "Partial star has {} fill stops, counting nothing",
                star.fill_offsets.len()
            )),
        }
        break;
    }

    DishRating { rating, kind }
}

fn parse_percent(offset: &str) -> Option<u32> {
    offset.trim().trim_end_matches('%').trim().parse().ok()
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}
