//! Which extracted reviews make it into the output.

use std::fmt;

/// Content-inclusion predicate applied to review text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentFilter {
    /// Accept every review.
    #[default]
    All,
    /// Accept reviews whose text contains the keyword. CJK keywords match
    /// exactly; anything else matches case-insensitively.
    Keyword(String),
}

impl ContentFilter {
    /// Keyword filter, or `All` when the keyword is blank.
    pub fn keyword(keyword: impl AsRef<str>) -> Self {
        let keyword = keyword.as_ref().trim();
        if keyword.is_empty() {
            Self::All
        } else {
            Self::Keyword(keyword.to_string())
        }
    }

    pub fn accepts(&self, text: &str) -> bool {
        match self {
            Self::All => true,
            Self::Keyword(keyword) => matches_keyword(text, keyword),
        }
    }
}

impl fmt::Display for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all reviews"),
            Self::Keyword(k) => write!(f, "reviews containing '{}'", k),
        }
    }
}

fn matches_keyword(text: &str, keyword: &str) -> bool {
    if text.is_empty() || keyword.is_empty() {
        return false;
    }
    if contains_cjk(keyword) {
        text.contains(keyword)
    } else {
        text.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// True if any character is Han, kana or Hangul.
pub fn contains_cjk(s: &str) -> bool {
    s.chars().any(|c| {
        matches!(c,
            '\u{4E00}'..='\u{9FFF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{3040}'..='\u{30FF}'
            | '\u{AC00}'..='\u{D7AF}')
    })
}
