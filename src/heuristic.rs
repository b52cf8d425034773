//! Rendering-completion heuristic
//!
//! Page load events are unreliable for dynamically-constructed HTML with
//! inline and background images: the load event can fire while image fetches
//! are still in flight, and network idle never arrives on pages holding
//! long-lived connections. The dependable proxy for "visually complete" is
//! explicit settlement of the document's image reference set — every
//! referenced URL has either loaded or definitively failed.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{Browser, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How an asset-settlement wait concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The document references no images; completion is immediate
    NoAssets,
    /// Every referenced asset reached a terminal state within the budget
    Settled { assets: usize },
    /// The wait budget elapsed first; rendering proceeds best-effort
    TimedOut { settled: usize, total: usize },
}

/// Wait until every image reference in the loaded document has settled, or
/// until `budget` elapses, whichever comes first.
///
/// The reference set is deduplicated; an empty set completes immediately.
/// One lightweight task per URL awaits its settlement, and the join of all
/// of them runs under a single timeout. A timeout is not an error: a single
/// slow asset must never fail the whole request, so it is logged and capture
/// proceeds best-effort.
pub async fn await_asset_settlement(page: &Browser, budget: Duration) -> Result<SettlementOutcome> {
    let references: BTreeSet<String> = page.image_references().await?.into_iter().collect();

    if references.is_empty() {
        debug!("document references no images; completion is immediate");
        return Ok(SettlementOutcome::NoAssets);
    }

    let urls: Vec<String> = references.into_iter().collect();
    page.begin_asset_loads(urls.clone()).await?;

    let waits = urls.iter().map(|url| wait_for_settlement(page, url));

    match tokio::time::timeout(budget, join_all(waits)).await {
        Ok(_) => {
            debug!(assets = urls.len(), "all referenced assets settled");
            Ok(SettlementOutcome::Settled { assets: urls.len() })
        }
        Err(_) => {
            let mut settled = 0;
            for url in &urls {
                if page.asset_settled(url).await.unwrap_or(false) {
                    settled += 1;
                }
            }
            warn!(
                settled,
                total = urls.len(),
                budget_ms = budget.as_millis() as u64,
                "asset wait budget elapsed; proceeding with capture"
            );
            Ok(SettlementOutcome::TimedOut {
                settled,
                total: urls.len(),
            })
        }
    }
}

async fn wait_for_settlement(page: &Browser, url: &str) {
    loop {
        // A probe that cannot be checked counts as settled: backend errors
        // must shorten the wait, never extend it.
        match page.asset_settled(url).await {
            Ok(true) | Err(_) => return,
            Ok(false) => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}
