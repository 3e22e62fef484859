//! In-memory page and image source for driving the harvester in tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use mapreviews::config::{HarvestSettings, ImageSettings};
use mapreviews::driver::{DriverError, DriverResult, ElementRef, Key, PageDriver, ScriptArg, Selector};
use mapreviews::images::{FetchedImage, ImageError, ImageSource};

/// One review as rendered by the fake listing.
#[derive(Debug, Clone)]
pub struct FakeReview {
    pub id: Option<String>,
    pub name: String,
    pub text: String,
    pub stars: Option<u8>,
    pub date: String,
    pub photos: Vec<String>,
}

impl FakeReview {
    pub fn new(n: usize, text: &str) -> Self {
        Self {
            id: Some(format!("rev{n}")),
            name: format!("Reviewer {n}"),
            text: text.to_string(),
            stars: Some(4),
            date: "3 週前".to_string(),
            photos: Vec::new(),
        }
    }

    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn with_photos(mut self, urls: &[&str]) -> Self {
        self.photos = urls.iter().map(|u| u.to_string()).collect();
        self
    }
}

/// `n` distinct reviews with site ids.
pub fn reviews(n: usize) -> Vec<FakeReview> {
    (1..=n)
        .map(|i| FakeReview::new(i, &format!("Review number {i} about the showroom visit")))
        .collect()
}

/// Photo URL as it appears in a thumbnail style.
pub fn thumb(id: &str) -> String {
    format!("https://lh5.googleusercontent.com/geougc/{id}=w400-h300-k-no")
}

/// The URL the harvester should request for [`thumb`].
pub fn full_size(id: &str) -> String {
    format!("https://lh5.googleusercontent.com/geougc/{id}=s0")
}

#[derive(Debug)]
struct PageState {
    visible: usize,
    panel_offset: i64,
    window_offset: i64,
    scroll_calls: usize,
    key_presses: usize,
    more_clicks: usize,
    expand_clicks: usize,
    navigated: Vec<String>,
    panel_renders: usize,
    lost: bool,
    quit: bool,
}

/// A fake Maps listing: scrolling reveals `per_scroll` more reviews.
#[derive(Debug)]
pub struct FakeListing {
    reviews: Vec<FakeReview>,
    per_scroll: usize,
    /// Whether the review panel overflows (else the page body is used).
    pub panel_overflows: bool,
    pub panel_moves: bool,
    pub window_moves: bool,
    /// Whether a PageDown press loads more reviews.
    pub keys_reveal: bool,
    pub more_button: bool,
    /// Clicking "more reviews" re-renders the panel, staling its handle.
    pub panel_rerenders: bool,
    /// Every review has a truncated-text "more" control.
    pub expandable: bool,
    /// Session dies after this many scroll calls.
    pub lose_after_scrolls: Option<usize>,
    state: Mutex<PageState>,
}

impl FakeListing {
    pub fn new(reviews: Vec<FakeReview>, initial: usize, per_scroll: usize) -> Self {
        Self {
            reviews,
            per_scroll,
            panel_overflows: true,
            panel_moves: true,
            window_moves: true,
            keys_reveal: true,
            more_button: false,
            panel_rerenders: false,
            expandable: false,
            lose_after_scrolls: None,
            state: Mutex::new(PageState {
                visible: initial,
                panel_offset: 0,
                window_offset: 0,
                scroll_calls: 0,
                key_presses: 0,
                more_clicks: 0,
                expand_clicks: 0,
                navigated: Vec::new(),
                panel_renders: 0,
                lost: false,
                quit: false,
            }),
        }
    }

    pub fn key_presses(&self) -> usize {
        self.state.lock().unwrap().key_presses
    }

    pub fn more_clicks(&self) -> usize {
        self.state.lock().unwrap().more_clicks
    }

    pub fn expand_clicks(&self) -> usize {
        self.state.lock().unwrap().expand_clicks
    }

    pub fn navigated(&self) -> Vec<String> {
        self.state.lock().unwrap().navigated.clone()
    }

    pub fn scroll_calls(&self) -> usize {
        self.state.lock().unwrap().scroll_calls
    }

    /// Make every later call fail as if the tab had crashed.
    pub fn lose_session(&self) {
        self.state.lock().unwrap().lost = true;
    }

    fn check_alive(&self) -> DriverResult<()> {
        if self.state.lock().unwrap().lost {
            return Err(DriverError::Disconnected("tab crashed".into()));
        }
        Ok(())
    }

    /// Handle of the live panel: `panel`, then `panel2`, `panel3`, ...
    fn panel_id(state: &PageState) -> String {
        match state.panel_renders {
            0 => "panel".to_string(),
            n => format!("panel{}", n + 1),
        }
    }

    fn check_panel(state: &PageState, el: &ElementRef) -> DriverResult<()> {
        if el.as_str().starts_with("panel") && el.as_str() != Self::panel_id(state) {
            return Err(DriverError::Stale(el.as_str().to_string()));
        }
        Ok(())
    }

    fn reveal(&self, state: &mut PageState) {
        state.visible = (state.visible + self.per_scroll).min(self.reviews.len());
    }

    /// Review index and element part for ids like `r3` or `r3/name`.
    fn review_part<'a>(&self, id: &'a str) -> DriverResult<Option<(usize, &'a str)>> {
        let Some(rest) = id.strip_prefix('r') else {
            return Ok(None);
        };
        let (index, part) = rest.split_once('/').unwrap_or((rest, ""));
        let Ok(index) = index.parse::<usize>() else {
            return Ok(None);
        };
        if index >= self.state.lock().unwrap().visible {
            return Err(DriverError::Stale(id.to_string()));
        }
        Ok(Some((index, part)))
    }

    fn visible_reviews(&self) -> Vec<usize> {
        (0..self.state.lock().unwrap().visible).collect()
    }

    fn find_in_review(&self, index: usize, expr: &str) -> Vec<ElementRef> {
        let review = &self.reviews[index];
        let child = |part: &str| vec![ElementRef::new(format!("r{index}/{part}"))];
        match expr {
            ".d4r55" => child("name"),
            "[role='img'][aria-label*='星']" if review.stars.is_some() => child("rating"),
            ".wiI7pd" if !review.text.is_empty() => child("text"),
            ".rsqaWe" => child("date"),
            ".//button[contains(@jsaction, 'expandReview')]" if self.expandable => child("expand"),
            ".//button[contains(@jsaction, 'openPhoto')]" => (0..review.photos.len())
                .map(|j| ElementRef::new(format!("r{index}/photo{j}")))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl PageDriver for FakeListing {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.check_alive()?;
        self.state.lock().unwrap().navigated.push(url.to_string());
        Ok(())
    }

    async fn execute(&self, _script: &str, _args: &[ScriptArg]) -> DriverResult<Value> {
        Err(DriverError::Unsupported("scripts"))
    }

    async fn find(
        &self,
        scope: Option<&ElementRef>,
        selector: &Selector,
    ) -> DriverResult<Vec<ElementRef>> {
        self.check_alive()?;
        let expr = selector.expr();

        if let Some(scope) = scope {
            return Ok(match self.review_part(scope.as_str())? {
                Some((index, "")) => self.find_in_review(index, expr),
                _ => Vec::new(),
            });
        }

        Ok(match expr {
            "div[role='main']" => {
                vec![ElementRef::new(Self::panel_id(&self.state.lock().unwrap()))]
            }
            "body" => vec![ElementRef::new("body")],
            "div[data-review-id]" => self
                .visible_reviews()
                .into_iter()
                .filter(|&i| self.reviews[i].id.is_some())
                .map(|i| ElementRef::new(format!("r{i}")))
                .collect(),
            ".jftiEf" => self
                .visible_reviews()
                .into_iter()
                .map(|i| ElementRef::new(format!("r{i}")))
                .collect(),
            "button[aria-label*='更多評論']" if self.more_button => vec![ElementRef::new("more")],
            _ => Vec::new(),
        })
    }

    async fn attribute(&self, el: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        self.check_alive()?;
        if el.as_str() == "more" {
            return Ok((name == "aria-label").then(|| "更多評論".to_string()));
        }
        let Some((index, part)) = self.review_part(el.as_str())? else {
            return Ok(None);
        };
        let review = &self.reviews[index];

        Ok(match (part, name) {
            ("", "data-review-id") => review.id.clone(),
            ("rating", "aria-label") => review.stars.map(|s| format!("{s} 顆星")),
            (photo, "style") if photo.starts_with("photo") => {
                let j: usize = photo["photo".len()..].parse().unwrap();
                Some(format!(
                    "background-image: url(&quot;{}&quot;); width: 72px;",
                    review.photos[j]
                ))
            }
            (photo, "jsaction") if photo.starts_with("photo") => {
                Some("pane.review.openPhoto".to_string())
            }
            _ => None,
        })
    }

    async fn text(&self, el: &ElementRef) -> DriverResult<String> {
        self.check_alive()?;
        if el.as_str() == "more" {
            return Ok("更多評論".to_string());
        }
        let Some((index, part)) = self.review_part(el.as_str())? else {
            return Ok(String::new());
        };
        let review = &self.reviews[index];

        Ok(match part {
            "" => format!("{}\n{}\n{}", review.name, review.date, review.text),
            "name" => review.name.clone(),
            "text" => review.text.clone(),
            "date" => review.date.clone(),
            "expand" => "更多".to_string(),
            _ => String::new(),
        })
    }

    async fn is_displayed(&self, _el: &ElementRef) -> DriverResult<bool> {
        self.check_alive()?;
        Ok(true)
    }

    async fn scroll_by(&self, target: Option<&ElementRef>, delta: i64) -> DriverResult<()> {
        self.check_alive()?;
        let mut state = self.state.lock().unwrap();
        state.scroll_calls += 1;
        if self
            .lose_after_scrolls
            .is_some_and(|limit| state.scroll_calls > limit)
        {
            state.lost = true;
            return Err(DriverError::Disconnected("tab crashed".into()));
        }
        if let Some(el) = target {
            Self::check_panel(&state, el)?;
        }

        let moves = match target {
            Some(_) => self.panel_moves,
            None => self.window_moves,
        };
        if moves {
            match target {
                Some(_) => state.panel_offset += delta,
                None => state.window_offset += delta,
            }
            self.reveal(&mut state);
        }
        Ok(())
    }

    async fn scroll_offset(&self, target: Option<&ElementRef>) -> DriverResult<i64> {
        self.check_alive()?;
        let state = self.state.lock().unwrap();
        if let Some(el) = target {
            Self::check_panel(&state, el)?;
        }
        Ok(match target {
            Some(_) => state.panel_offset,
            None => state.window_offset,
        })
    }

    async fn scroll_extent(&self, el: &ElementRef) -> DriverResult<(i64, i64)> {
        self.check_alive()?;
        let state = self.state.lock().unwrap();
        Self::check_panel(&state, el)?;
        if el.as_str().starts_with("panel") && self.panel_overflows {
            Ok((6000, 800))
        } else {
            Ok((800, 800))
        }
    }

    async fn click(&self, el: &ElementRef) -> DriverResult<()> {
        self.check_alive()?;
        let mut state = self.state.lock().unwrap();
        if el.as_str() == "more" {
            state.more_clicks += 1;
            if self.panel_rerenders {
                state.panel_renders += 1;
            }
        } else if el.as_str().ends_with("/expand") {
            state.expand_clicks += 1;
        }
        Ok(())
    }

    async fn send_keys(&self, el: &ElementRef, key: Key) -> DriverResult<()> {
        self.check_alive()?;
        assert_eq!(key, Key::PageDown);
        let mut state = self.state.lock().unwrap();
        Self::check_panel(&state, el)?;
        state.key_presses += 1;
        if self.keys_reveal {
            self.reveal(&mut state);
        }
        Ok(())
    }

    async fn screenshot(&self, _path: &Path) -> DriverResult<()> {
        Err(DriverError::Unsupported("screenshot"))
    }

    async fn quit(&self) -> DriverResult<()> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}

/// Harvest settings with no warm-up and generous bounds.
pub fn settings(target: usize) -> HarvestSettings {
    HarvestSettings {
        target_count: target,
        max_total_scrolls: 50,
        empty_scroll_threshold: 3,
        pre_scroll_cycles: 0,
        scroll_distance: 300,
        default_rating: Some(5),
    }
}

/// Image settings with instant retries.
pub fn image_settings() -> ImageSettings {
    ImageSettings {
        enabled: true,
        backoff_base_ms: 0,
        ..Default::default()
    }
}

/// A tiny valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Scripted responses for [`FakeImages`].
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Png,
    Status(u16),
    Html,
    Corrupt,
}

/// Image source answering from per-URL scripts; unscripted URLs get a PNG.
#[derive(Debug, Default)]
pub struct FakeImages {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeImages {
    pub fn script(&self, url: &str, replies: &[Reply]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.iter().copied().collect());
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl ImageSource for FakeImages {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError> {
        self.fetches.lock().unwrap().push(url.to_string());
        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::Png);

        match reply {
            Reply::Png => Ok(FetchedImage {
                content_type: Some("image/png".to_string()),
                bytes: png_bytes(),
            }),
            Reply::Status(code) => Err(ImageError::Status(code)),
            Reply::Html => Ok(FetchedImage {
                content_type: Some("text/html".to_string()),
                bytes: b"<html>sign in</html>".to_vec(),
            }),
            Reply::Corrupt => Ok(FetchedImage {
                content_type: Some("image/jpeg".to_string()),
                bytes: b"\xFF\xD8\xFFnot a real jpeg".to_vec(),
            }),
        }
    }
}
