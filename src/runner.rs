//! Live run against Chrome
//!
//! Launches the browser, opens the product page and drives the sequencer.
//! Whatever happens after launch, the run ends with a report, a failure
//! screenshot where there is a page to take one of, and a closed browser.

use std::future::Future;

use tokio::time::Instant;

use crate::browser::Browser;
use crate::config::RunConfig;
use crate::report::{Outcome, RunReport};
use crate::sequencer::Sequencer;

/// Run one checkout in a fresh Chrome.
///
/// `interrupt` cancels the run when it resolves; the report then ends as
/// [`Outcome::Cancelled`].
pub async fn live_run<F>(config: &RunConfig, interrupt: F) -> RunReport
where
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let mut report = RunReport::new(config.product_url.clone());

    let browser = match Browser::launch(&config.browser).await {
        Ok(browser) => browser,
        Err(e) => {
            tracing::error!(kind = e.kind(), "{}", e);
            report.fail(&e, started.elapsed());
            return report;
        }
    };

    tokio::pin!(interrupt);

    let opened = tokio::select! {
        opened = browser.new_page(&config.product_url) => Some(opened),
        _ = &mut interrupt => None,
    };

    let result = match opened {
        Some(Ok(page)) => {
            let result = match Sequencer::new(&page, config) {
                Ok(mut sequencer) => {
                    let result = tokio::select! {
                        result = async {
                            match page.wait_for_load(config.timing.page_load_timeout()).await {
                                Ok(()) => sequencer.run().await,
                                Err(e) => Err(e),
                            }
                        } => Some(result),
                        _ = &mut interrupt => None,
                    };
                    report = sequencer.into_report();
                    result
                }
                Err(e) => Some(Err(e)),
            };
            if let Some(Err(_)) = &result {
                match page.debug_screenshot("failure").await {
                    Ok(path) => report.screenshot = path,
                    Err(e) => tracing::warn!("Failed to capture failure screenshot: {}", e),
                }
            }
            result
        }
        Some(Err(e)) => Some(Err(e)),
        None => None,
    };

    match result {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            tracing::error!(kind = e.kind(), "{}", e);
            // Failures before the sequencer started are not in the report yet
            if report.outcome == Outcome::Incomplete {
                report.fail(&e, started.elapsed());
            }
        }
        None => {
            tracing::warn!("Interrupted, closing browser");
            report.finish(Outcome::Cancelled, started.elapsed());
        }
    }

    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close browser cleanly: {}", e);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let config = RunConfig {
            browser: BrowserConfig {
                chrome_path: Some("/nonexistent/chrome".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let report = live_run(&config, std::future::pending()).await;
        match &report.outcome {
            Outcome::Failed { kind, .. } => assert_eq!(kind, "launch"),
            other => panic!("expected a launch failure, got {:?}", other),
        }
        assert_eq!(report.url, config.product_url);
        assert!(report.steps.is_empty());
    }
}
