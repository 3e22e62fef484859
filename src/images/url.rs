//! Photo URL handling: pulling URLs out of inline styles and asking the
//! image host for the full-size rendition.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// `url(...)` inside an inline `background-image` style.
static BACKGROUND_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+)["']?\s*\)"#).expect("background url pattern should compile")
});

/// Trailing size options such as `=w400-h300-k-no` or `=s120-c0x00ffffff-no-rj`.
static SIZE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=[swh]\d+(?:-[^/?#=]*)?$").expect("size suffix pattern should compile")
});

/// Size path segment such as `/w120-h120-c-rj/`.
static SIZE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/w\d+-h\d+[^/]*/").expect("size segment pattern should compile")
});

/// Host suffix serving review photos.
const IMAGE_HOST: &str = "googleusercontent.com";

/// Size option meaning "original resolution".
const FULL_SIZE: &str = "s0";

/// First URL referenced by a `style` attribute.
pub fn extract_background_url(style: &str) -> Option<String> {
    let style = style.replace("&quot;", "\"");
    BACKGROUND_URL
        .captures(&style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Rewrite a thumbnail URL to its full-resolution variant.
///
/// URLs from other hosts, or that fail to parse, come back unchanged.
pub fn to_high_res(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if !parsed
        .host_str()
        .is_some_and(|host| host == IMAGE_HOST || host.ends_with(&format!(".{IMAGE_HOST}")))
    {
        return raw.to_string();
    }

    let split = raw.find(['?', '#']).unwrap_or(raw.len());
    let (base, tail) = raw.split_at(split);

    let base = if SIZE_SUFFIX.is_match(base) {
        SIZE_SUFFIX
            .replace(base, format!("={FULL_SIZE}").as_str())
            .into_owned()
    } else if SIZE_SEGMENT.is_match(base) {
        SIZE_SEGMENT
            .replace(base, format!("/{FULL_SIZE}/").as_str())
            .into_owned()
    } else {
        format!("{base}={FULL_SIZE}")
    };

    format!("{base}{tail}")
}

/// File name for the `index`th photo (1-based) of review `sequence_id`.
pub fn image_file_name(sequence_id: usize, index: usize) -> String {
    format!("review_{:03}_img_{:02}.jpg", sequence_id, index)
}
