//! Prioritized selector fallbacks.
//!
//! The review panel's markup shifts between deployments and locales, so
//! every lookup is a list of [`Candidate`]s tried in order. The first one
//! producing a non-empty match set wins.

use tracing::{debug, trace};

use crate::driver::{DriverError, DriverResult, ElementRef, PageDriver, Selector};

/// Extra predicate an element must satisfy to count as a match.
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// Attribute is present and contains the substring.
    AttrContains {
        name: &'static str,
        needle: &'static str,
    },
    /// Attribute is absent or does not contain the substring.
    AttrLacks {
        name: &'static str,
        needle: &'static str,
    },
    /// Rendered text or `aria-label` contains every word.
    Label { all_of: &'static [&'static str] },
    /// Visible and enabled.
    Displayed,
}

/// One selector strategy.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub selector: Selector,
    pub conditions: &'static [Condition],
}

impl Candidate {
    pub const fn css(expr: &'static str) -> Self {
        Self {
            selector: Selector::Css(expr),
            conditions: &[],
        }
    }

    pub const fn xpath(expr: &'static str) -> Self {
        Self {
            selector: Selector::XPath(expr),
            conditions: &[],
        }
    }

    pub const fn css_where(expr: &'static str, conditions: &'static [Condition]) -> Self {
        Self {
            selector: Selector::Css(expr),
            conditions,
        }
    }

    pub const fn xpath_where(expr: &'static str, conditions: &'static [Condition]) -> Self {
        Self {
            selector: Selector::XPath(expr),
            conditions,
        }
    }
}

/// What to read from a matched element.
#[derive(Debug, Clone, Copy)]
pub enum Read {
    Text,
    /// First attribute in the list that parses.
    Attributes(&'static [&'static str]),
}

/// How many elements of a candidate's match set to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    First,
    All,
}

/// Field extraction: candidates plus how to turn a match into a value.
pub struct FieldRule<T: 'static> {
    pub candidates: &'static [Candidate],
    pub read: Read,
    pub scan: Scan,
    pub parse: fn(&str) -> Option<T>,
}

/// Return the first non-empty match set among `candidates`.
///
/// Transient failures on a candidate move on to the next one. A lost
/// session is returned to the caller.
pub async fn first_match(
    driver: &dyn PageDriver,
    scope: Option<&ElementRef>,
    candidates: &[Candidate],
) -> DriverResult<Vec<ElementRef>> {
    for candidate in candidates {
        match matches(driver, scope, candidate).await {
            Ok(found) if !found.is_empty() => {
                debug!("{} matched {} element(s)", candidate.selector, found.len());
                return Ok(found);
            }
            Ok(_) => trace!("{} matched nothing", candidate.selector),
            Err(e) if e.is_transient() => {
                debug!("Skipping {}: {}", candidate.selector, e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Vec::new())
}

/// Return the first value `rule` can parse out of its candidates.
pub async fn first_value<T: Send>(
    driver: &dyn PageDriver,
    scope: Option<&ElementRef>,
    rule: &FieldRule<T>,
) -> DriverResult<Option<T>> {
    for candidate in rule.candidates {
        let found = match matches(driver, scope, candidate).await {
            Ok(found) => found,
            Err(e) if e.is_transient() => {
                debug!("Skipping {}: {}", candidate.selector, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let limit = match rule.scan {
            Scan::First => 1,
            Scan::All => found.len(),
        };

        for el in found.iter().take(limit) {
            match read_value(driver, el, rule.read, rule.parse).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) if e.is_transient() => trace!("Read failed on {}: {}", el, e),
                Err(e) => return Err(e),
            }
        }
    }
    Ok(None)
}

async fn matches(
    driver: &dyn PageDriver,
    scope: Option<&ElementRef>,
    candidate: &Candidate,
) -> DriverResult<Vec<ElementRef>> {
    let found = driver.find(scope, &candidate.selector).await?;
    if candidate.conditions.is_empty() {
        return Ok(found);
    }

    let mut kept = Vec::with_capacity(found.len());
    for el in found {
        match satisfies_all(driver, &el, candidate.conditions).await {
            Ok(true) => kept.push(el),
            Ok(false) => {}
            Err(e) if e.is_transient() => trace!("Dropping {}: {}", el, e),
            Err(e) => return Err(e),
        }
    }
    Ok(kept)
}

async fn satisfies_all(
    driver: &dyn PageDriver,
    el: &ElementRef,
    conditions: &[Condition],
) -> DriverResult<bool> {
    for condition in conditions {
        if !satisfies(driver, el, condition).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn satisfies(
    driver: &dyn PageDriver,
    el: &ElementRef,
    condition: &Condition,
) -> DriverResult<bool> {
    Ok(match *condition {
        Condition::AttrContains { name, needle } => driver
            .attribute(el, name)
            .await?
            .is_some_and(|v| v.contains(needle)),
        Condition::AttrLacks { name, needle } => !driver
            .attribute(el, name)
            .await?
            .is_some_and(|v| v.contains(needle)),
        Condition::Label { all_of } => {
            let text = driver.text(el).await?;
            let label = driver.attribute(el, "aria-label").await?.unwrap_or_default();
            all_of
                .iter()
                .all(|word| text.contains(word) || label.contains(word))
        }
        Condition::Displayed => driver.is_displayed(el).await?,
    })
}

async fn read_value<T>(
    driver: &dyn PageDriver,
    el: &ElementRef,
    read: Read,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, DriverError> {
    match read {
        Read::Text => {
            let text = driver.text(el).await?;
            Ok(parse(text.trim()))
        }
        Read::Attributes(names) => {
            for name in names {
                if let Some(value) = driver.attribute(el, name).await? {
                    if let Some(parsed) = parse(&value) {
                        return Ok(Some(parsed));
                    }
                }
            }
            Ok(None)
        }
    }
}
