//! Selector tables for the Google Maps review panel.
//!
//! Class names here are the obfuscated ones Maps ships; they change without
//! notice, which is why every list carries structural fallbacks.

use std::sync::LazyLock;

use regex::Regex;

use super::matcher::{Candidate, Condition, FieldRule, Read, Scan};

/// Scrollable review panel, checked in order. `body` is the last resort.
pub static SCROLL_CONTAINERS: &[Candidate] = &[
    Candidate::css("div[role='main']"),
    Candidate::css(".m6QErb .DxyBCb"),
    Candidate::css(".section-scrollbox"),
    Candidate::css(".siAUzd"),
    Candidate::css(".m6QErb"),
    Candidate::css("div[data-value='Sort']"),
    Candidate::css(".TFQHme"),
    Candidate::css("div.m6QErb.DxyBCb.kA9KIf.dS8AEf"),
];

pub static PAGE_BODY: Candidate = Candidate::css("body");

/// One element per rendered review.
pub static REVIEWS: &[Candidate] = &[
    Candidate::css("div[data-review-id]"),
    Candidate::css("div[jsaction*='review']"),
    Candidate::css(".jftiEf"),
];

const SHOWN: &[Condition] = &[Condition::Displayed];

/// The panel-level "more reviews" control.
pub static MORE_REVIEWS: &[Candidate] = &[
    Candidate::css_where("button[aria-label*='更多評論']", SHOWN),
    Candidate::css_where("button[aria-label*='More reviews']", SHOWN),
    Candidate::css_where(".m6QErb .j3fM2b button[aria-label*='更多']", SHOWN),
    Candidate::css_where(".m6QErb .j3fM2b button.M77dve", SHOWN),
    Candidate::css_where("button.M77dve[aria-label*='更多評論']", SHOWN),
    Candidate::css_where("button[jsaction*='pane.wfvdle67']", SHOWN),
    Candidate::xpath_where(
        "//span[@class='wNNZR' and contains(text(), '更多評論')]/../..",
        SHOWN,
    ),
    Candidate::xpath_where("//button[contains(@aria-label, '更多評論')]", SHOWN),
    Candidate::xpath_where("//button[contains(text(), '更多評論')]", SHOWN),
    Candidate::css_where(
        "button",
        &[
            Condition::Label {
                all_of: &["更多", "評論"],
            },
            Condition::Displayed,
        ],
    ),
];

/// A review's own "more" control that reveals truncated text.
pub static EXPAND_REVIEW: &[Candidate] = &[
    Candidate::xpath(".//button[contains(@jsaction, 'expandReview')]"),
    Candidate::xpath(".//button[contains(@aria-label, '更多')]"),
    Candidate::xpath(".//button[contains(@aria-label, 'More')]"),
    Candidate::xpath(".//span[contains(text(), '更多')]"),
];

const PHOTO: &[Condition] = &[
    Condition::AttrContains {
        name: "style",
        needle: "background-image",
    },
    Condition::AttrContains {
        name: "style",
        needle: "geougc",
    },
    Condition::AttrContains {
        name: "jsaction",
        needle: "openPhoto",
    },
    Condition::AttrLacks {
        name: "jsaction",
        needle: "showMorePhotos",
    },
];

/// Photo thumbnails inside a review. Avatars and the "+N photos" tile are
/// excluded by the conditions.
pub static PHOTO_BUTTONS: &[Candidate] = &[
    Candidate::xpath_where(".//button[@class='Tya61d']", PHOTO),
    Candidate::xpath_where(".//button[contains(@jsaction, 'openPhoto')]", PHOTO),
    Candidate::xpath_where(".//button[@data-photo-index]", PHOTO),
    Candidate::xpath_where(".//button[contains(@aria-label, '張相片')]", PHOTO),
];

pub static REVIEWER_NAME: FieldRule<String> = FieldRule {
    candidates: &[
        Candidate::css(".d4r55"),
        Candidate::css("[data-value='Name']"),
        Candidate::css(".a-profile-name"),
        Candidate::css(".TSUbDb"),
        Candidate::css("div[style*='16px'] > div"),
        Candidate::css("a[data-value]"),
        Candidate::css("button[data-value]"),
    ],
    read: Read::Text,
    scan: Scan::First,
    parse: parse_name,
};

/// Any short button or link label, tried when no name selector hits.
pub static REVIEWER_NAME_FALLBACK: FieldRule<String> = FieldRule {
    candidates: &[Candidate::xpath(".//button | .//a")],
    read: Read::Text,
    scan: Scan::All,
    parse: parse_short_label,
};

pub static RATING: FieldRule<u8> = FieldRule {
    candidates: &[
        Candidate::css("[role='img'][aria-label*='星']"),
        Candidate::css("[aria-label*='star']"),
        Candidate::css(".kvMYJc"),
        Candidate::css("span[role='img']"),
        Candidate::css("[title*='星']"),
    ],
    read: Read::Attributes(&["aria-label", "title"]),
    scan: Scan::First,
    parse: parse_rating,
};

pub static REVIEW_TEXT: FieldRule<String> = FieldRule {
    candidates: &[
        Candidate::css(".wiI7pd"),
        Candidate::css("[data-expandable-section]"),
        Candidate::css(".MyEned"),
        Candidate::css(".rsqaWe"),
        Candidate::css("span[jsaction*='JIbuQc']"),
        Candidate::css(".review-full-text"),
    ],
    read: Read::Text,
    scan: Scan::First,
    parse: parse_review_text,
};

pub static REVIEW_DATE: FieldRule<String> = FieldRule {
    candidates: &[
        Candidate::css(".rsqaWe"),
        Candidate::css(".DU9Pgb"),
        Candidate::css("span[style*='color']"),
        Candidate::css("[data-value='Date']"),
    ],
    read: Read::Text,
    scan: Scan::All,
    parse: parse_relative_date,
};

/// Words that mark a relative timestamp ("3 週前", "a month ago").
const DATE_MARKERS: &[&str] = &[
    "前", "週", "月", "年", "ago", "week", "month", "year",
];

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number pattern should compile"));

fn parse_name(s: &str) -> Option<String> {
    let name = s.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_short_label(s: &str) -> Option<String> {
    let label = s.trim();
    (!label.is_empty() && label.chars().count() < 50).then(|| label.to_string())
}

/// Star count from an accessibility label such as "4 顆星" or "5 stars".
pub fn parse_rating(label: &str) -> Option<u8> {
    if !label.contains('星') && !label.to_lowercase().contains("star") {
        return None;
    }
    let stars: u8 = FIRST_NUMBER.find(label)?.as_str().parse().ok()?;
    (1..=5).contains(&stars).then_some(stars)
}

fn parse_review_text(s: &str) -> Option<String> {
    let text = s.trim();
    (text.chars().count() > 10).then(|| text.to_string())
}

fn parse_relative_date(s: &str) -> Option<String> {
    let text = s.trim();
    DATE_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
        .then(|| text.to_string())
}
