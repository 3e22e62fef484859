//! The `scrape` command.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Local;
use clap::Args;
use console::style;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::browser;
use crate::config::Settings;
use crate::harvest::{ContentFilter, HarvestReport, Harvester};
use crate::images::{HttpImageSource, ImageFetcher};
use crate::output::{default_output_path, image_directory, write_reviews};

use super::{progress, prompt, report};

#[derive(Args, Debug, Default)]
pub struct ScrapeArgs {
    /// Listing URL (defaults to the configured listing)
    pub url: Option<String>,

    /// Number of reviews to collect
    #[arg(short = 'n', long = "count")]
    pub count: Option<usize>,

    /// Maximum number of harvest scrolls
    #[arg(long)]
    pub max_scrolls: Option<usize>,

    /// Run the browser without a window
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headed: bool,

    /// Download review photos
    #[arg(long, conflicts_with = "no_images")]
    pub images: bool,

    /// Skip review photos
    #[arg(long)]
    pub no_images: bool,

    /// Only keep reviews containing this text (skips the mode prompt)
    #[arg(short = 'k', long, conflicts_with = "all")]
    pub keyword: Option<String>,

    /// Keep every review (skips the mode prompt)
    #[arg(long)]
    pub all: bool,

    /// Output JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Business name used for output and photo directory names
    #[arg(long)]
    pub business_name: Option<String>,

    /// Connect to a running Chrome DevTools endpoint instead of launching one
    #[arg(long)]
    pub remote_url: Option<String>,
}

impl ScrapeArgs {
    /// Overlay command line flags on loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(ref url) = self.url {
            settings.url = url.clone();
        }
        if let Some(count) = self.count {
            settings.harvest.target_count = count;
        }
        if let Some(max) = self.max_scrolls {
            settings.harvest.max_total_scrolls = max;
        }
        if self.headless {
            settings.browser.headless = true;
        } else if self.headed {
            settings.browser.headless = false;
        }
        if self.images {
            settings.images.enabled = true;
        } else if self.no_images {
            settings.images.enabled = false;
        }
        if let Some(ref name) = self.business_name {
            settings.business_name = name.clone();
        }
        if let Some(ref remote) = self.remote_url {
            settings.browser.remote_url = Some(remote.clone());
        }
    }

    /// Filter chosen on the command line, if any.
    pub fn preset_filter(&self) -> Option<ContentFilter> {
        if let Some(ref keyword) = self.keyword {
            Some(ContentFilter::keyword(keyword))
        } else if self.all {
            Some(ContentFilter::All)
        } else {
            None
        }
    }
}

pub async fn cmd_scrape(mut settings: Settings, args: ScrapeArgs) -> anyhow::Result<()> {
    args.apply(&mut settings);

    let filter = match args.preset_filter() {
        Some(filter) => filter,
        None => match choose_filter(settings.harvest.target_count).await? {
            Some(filter) => filter,
            None => {
                println!("\nCancelled");
                return Ok(());
            }
        },
    };

    let now = Local::now();
    let output_path = args.output.clone().unwrap_or_else(|| {
        default_output_path(&settings.output_dir, &settings.business_name, now)
    });

    println!(
        "\n{} Harvesting reviews of {}",
        style("→").cyan(),
        style(&settings.business_name).bold()
    );
    println!("  {:<10} {}", "Target:", settings.harvest.target_count);
    println!("  {:<10} {}", "Mode:", filter);
    println!(
        "  {:<10} {}",
        "Photos:",
        if settings.images.enabled { "yes" } else { "no" }
    );

    let fetcher = if settings.images.enabled {
        let source = HttpImageSource::new(&settings.images, settings.browser.proxy.as_deref())
            .context("Failed to build the photo download client")?;
        let dir = image_directory(&settings.output_dir, &settings.business_name, now);
        info!("Photos go to {}", dir.display());
        Some(ImageFetcher::new(
            Arc::new(source),
            settings.images.clone(),
            settings.pacing.image_gap,
            dir,
        ))
    } else {
        None
    };

    let driver = browser::launch(&settings.browser)
        .await
        .context("Failed to start the browser")?;

    let (tx, rx) = mpsc::channel(64);
    let progress = progress::spawn(rx, settings.harvest.target_count);

    let mut harvester = Harvester::new(
        driver.as_ref(),
        settings.harvest.clone(),
        settings.pacing.clone(),
    )
    .with_filter(filter)
    .with_events(tx);
    if let Some(fetcher) = fetcher {
        harvester = harvester.with_images(fetcher);
    }

    let started = Instant::now();
    let result = harvester.run(&settings.url).await;
    drop(harvester);
    let _ = progress.await;

    if result.is_err() {
        if let Some(ref path) = settings.browser.failure_screenshot {
            if let Err(e) = driver.screenshot(path).await {
                warn!("Could not save failure screenshot: {}", e);
            }
        }
    }
    if let Err(e) = driver.quit().await {
        warn!("Browser did not close cleanly: {}", e);
    }

    let elapsed = started.elapsed();
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            report::print_summary(&HarvestReport::failed(&e), None, elapsed);
            return Err(anyhow::Error::new(e).context("Harvest failed"));
        }
    };

    if report.reviews.is_empty() {
        report::print_summary(&report, None, elapsed);
        anyhow::bail!(
            "No reviews collected. Check the network connection or whether the page layout changed."
        );
    }

    write_reviews(&output_path, &report.reviews)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    report::print_summary(&report, Some(&output_path), elapsed);

    Ok(())
}

/// Prompt for the harvest mode when attached to a terminal.
async fn choose_filter(target_count: usize) -> anyhow::Result<Option<ContentFilter>> {
    if !std::io::stdin().is_terminal() {
        return Ok(Some(ContentFilter::All));
    }

    let mode = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        prompt::select_mode(&mut input, &mut output, target_count)
    })
    .await
    .context("Mode prompt panicked")?
    .context("Failed to read mode selection")?;

    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let args = ScrapeArgs {
            url: Some("https://maps.example/place".to_string()),
            count: Some(12),
            max_scrolls: Some(8),
            headless: true,
            images: true,
            business_name: Some("Corner Cafe".to_string()),
            remote_url: Some("ws://localhost:9222".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        args.apply(&mut settings);

        assert_eq!(settings.url, "https://maps.example/place");
        assert_eq!(settings.harvest.target_count, 12);
        assert_eq!(settings.harvest.max_total_scrolls, 8);
        assert!(settings.browser.headless);
        assert!(settings.images.enabled);
        assert_eq!(settings.business_name, "Corner Cafe");
        assert_eq!(
            settings.browser.remote_url.as_deref(),
            Some("ws://localhost:9222")
        );
    }

    #[test]
    fn test_negative_flags_override_file() {
        let mut settings = Settings::default();
        settings.browser.headless = true;
        settings.images.enabled = true;

        let args = ScrapeArgs {
            headed: true,
            no_images: true,
            ..Default::default()
        };
        args.apply(&mut settings);

        assert!(!settings.browser.headless);
        assert!(!settings.images.enabled);
    }

    #[test]
    fn test_preset_filter() {
        let keyword = ScrapeArgs {
            keyword: Some("沙發".to_string()),
            ..Default::default()
        };
        assert_eq!(
            keyword.preset_filter(),
            Some(ContentFilter::Keyword("沙發".to_string()))
        );

        let all = ScrapeArgs {
            all: true,
            ..Default::default()
        };
        assert_eq!(all.preset_filter(), Some(ContentFilter::All));

        assert_eq!(ScrapeArgs::default().preset_filter(), None);
    }
}
