//! End-to-end `ingest` pipeline: catalog → normalize → fetch → extract → store.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use pricescrape_catalog::{NormalizedCatalog, OverrideTable, load_catalog};
use pricescrape_crawler::{Fetcher, extract_page};
use pricescrape_shared::{
    Condition, FetchConfig, IngestConfig, NormalizedItem, Result, SaleRecord, StoreConfig,
};
use pricescrape_storage::Store;

use crate::summary::{ConditionFailure, ItemFailure, RunSummary};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before the items of one console are scraped.
    fn console_started(&self, console: &str, items: usize);
    /// Called after each item, successful or not.
    fn item_finished(&self, item: &NormalizedItem, ok: bool, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn console_started(&self, _console: &str, _items: usize) {}
    fn item_finished(&self, _item: &NormalizedItem, _ok: bool, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Sales of one console batch, one collection per condition.
#[derive(Debug, Default)]
struct Accumulators {
    /// Items that were scraped successfully.
    games: Vec<u32>,
    loose: Vec<SaleRecord>,
    complete: Vec<SaleRecord>,
    new: Vec<SaleRecord>,
}

impl Accumulators {
    fn for_condition(&mut self, condition: Condition) -> &mut Vec<SaleRecord> {
        match condition {
            Condition::Loose => &mut self.loose,
            Condition::Complete => &mut self.complete,
            Condition::New => &mut self.new,
        }
    }
}

/// Sales of one item, held until all three conditions have been fetched.
struct ItemSales {
    records: Vec<(Condition, Vec<SaleRecord>)>,
    parse_fallbacks: usize,
    condition_failures: Vec<ConditionFailure>,
}

/// Run a full ingestion.
///
/// 1. Load overrides, read and normalize the catalog
/// 2. Reset the schema (or, when resuming, keep it) and load consoles + average prices
/// 3. Scrape items console by console, with a pause between items
/// 4. After each console, write its sales history and commit
///
/// The dimension load and every console are separate transactions; a store
/// error rolls back the current one and aborts the run, leaving earlier
/// consoles committed. Item failures are recorded in the summary and never
/// abort the run.
#[instrument(skip_all, fields(catalog = %ingest_cfg.catalog_path.display(), resume = ingest_cfg.resume))]
pub async fn ingest(
    store_cfg: &StoreConfig,
    fetch_cfg: &FetchConfig,
    ingest_cfg: &IngestConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::new();
    summary.resumed = ingest_cfg.resume;
    ingest_cfg.validate()?;
    fetch_cfg.validate()?;

    info!(run_id = %summary.run_id, "starting ingest");

    // --- Phase 1: Catalog ---
    progress.phase("Reading catalog");
    let overrides = match &ingest_cfg.overrides_path {
        Some(path) => OverrideTable::load(path)?,
        None => OverrideTable::new(),
    };
    let catalog = load_catalog(&ingest_cfg.catalog_path, &ingest_cfg.base_url, &overrides)?;

    summary.rows_read = catalog.rows_read;
    summary.excluded = catalog.excluded.clone();
    summary.items_loaded = catalog.items.len();
    summary.consoles = catalog.consoles.len();

    if catalog.items.is_empty() {
        warn!(rows = catalog.rows_read, "catalog has no ingestible rows");
    }
    if !ingest_cfg.resume && !ingest_cfg.consoles.is_empty() {
        warn!("fresh run with a console filter: history of other consoles is discarded");
    }

    let fetcher = Fetcher::new(fetch_cfg.clone())?;

    // --- Phase 2: Store ---
    progress.phase(if ingest_cfg.resume {
        "Opening store"
    } else {
        "Resetting store"
    });
    let store = Store::open(store_cfg).await?;
    store.begin().await?;
    let loaded = load_dimensions(&store, &catalog, ingest_cfg.resume).await;
    finish_transaction(&store, loaded).await?;

    // --- Phase 3: Scrape, one committed batch per console ---
    progress.phase("Scraping sales history");
    let batches = console_batches(&catalog, &ingest_cfg.consoles, ingest_cfg.limit);
    let total: usize = batches.iter().map(|(_, items)| items.len()).sum();
    let mut current = 0usize;

    for (console, items) in &batches {
        info!(console = %console, items = items.len(), "scraping console");
        progress.console_started(console, items.len());

        let mut acc = Accumulators::default();
        for item in items {
            if current > 0 && !ingest_cfg.item_delay.is_zero() {
                tokio::time::sleep(ingest_cfg.item_delay).await;
            }
            current += 1;
            summary.items_attempted += 1;

            match scrape_item(&fetcher, item).await {
                Ok(sales) => {
                    summary.items_succeeded += 1;
                    summary.parse_fallbacks += sales.parse_fallbacks;
                    summary.condition_failures.extend(sales.condition_failures);
                    acc.games.push(item.game_id);
                    for (condition, records) in sales.records {
                        acc.for_condition(condition).extend(records);
                    }
                    progress.item_finished(item, true, current, total);
                }
                Err(e) => {
                    warn!(game_id = item.game_id, url = %item.url, error = %e, "item failed, skipping");
                    summary.failures.push(ItemFailure {
                        game_id: item.game_id,
                        url: item.url.clone(),
                        error: e.to_string(),
                    });
                    progress.item_finished(item, false, current, total);
                }
            }
        }

        store.begin().await?;
        let written = write_history(&store, acc, ingest_cfg.resume, &mut summary).await;
        finish_transaction(&store, written).await?;
        summary.consoles_completed.push(console.to_string());
    }

    summary.elapsed = start.elapsed();
    info!(
        attempted = summary.items_attempted,
        succeeded = summary.items_succeeded,
        failed = summary.items_failed(),
        records = summary.records.total(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "ingest complete"
    );
    progress.done(&summary);

    Ok(summary)
}

/// Commit on success, roll back and return the error otherwise.
async fn finish_transaction(store: &Store, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => store.commit().await,
        Err(e) => {
            if let Err(rb) = store.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Load consoles and average prices; a fresh run rebuilds every table first.
async fn load_dimensions(store: &Store, catalog: &NormalizedCatalog, resume: bool) -> Result<()> {
    if resume {
        store.ensure_schema().await?;
    } else {
        store.reset_schema().await?;
    }
    store.insert_consoles(&catalog.consoles).await?;
    store.insert_avg_prices(&catalog.items).await?;
    Ok(())
}

/// Write one console's sales history. When resuming, the scraped items'
/// earlier history is replaced rather than appended to.
async fn write_history(
    store: &Store,
    mut acc: Accumulators,
    resume: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    if resume && !acc.games.is_empty() {
        store.delete_sales(&acc.games).await?;
    }
    for condition in Condition::ALL {
        let records = std::mem::take(acc.for_condition(condition));
        let written = store.insert_sales(condition, &records).await?;
        summary.records.add(condition, written);
        debug!(table = condition.table(), rows = written, "sales history written");
    }
    Ok(())
}

/// Items grouped by console in first-occurrence order, catalog order within each.
///
/// An empty `filter` keeps every console; `limit` caps the total item count.
fn console_batches<'a>(
    catalog: &'a NormalizedCatalog,
    filter: &[String],
    limit: Option<usize>,
) -> Vec<(&'a str, Vec<&'a NormalizedItem>)> {
    for name in filter {
        if !catalog
            .consoles
            .iter()
            .any(|c| c.console.eq_ignore_ascii_case(name))
        {
            warn!(console = %name, "console filter matches nothing in the catalog");
        }
    }

    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut batches = Vec::new();

    for console in &catalog.consoles {
        if remaining == 0 {
            break;
        }
        if !filter.is_empty() && !filter.iter().any(|f| f.eq_ignore_ascii_case(&console.console)) {
            continue;
        }
        let items: Vec<&NormalizedItem> = catalog
            .items
            .iter()
            .filter(|i| i.console_id == console.console_id)
            .take(remaining)
            .collect();
        remaining -= items.len();
        if !items.is_empty() {
            batches.push((console.console.as_str(), items));
        }
    }
    batches
}

/// Fetch and extract the three conditions of one item.
///
/// A fetch failure on any condition fails the whole item. Layout problems
/// degrade to the placeholder; unpairable tables drop that condition only.
#[instrument(skip_all, fields(game_id = item.game_id, url = %item.url))]
async fn scrape_item(fetcher: &Fetcher, item: &NormalizedItem) -> Result<ItemSales> {
    let mut sales = ItemSales {
        records: Vec::with_capacity(Condition::ALL.len()),
        parse_fallbacks: 0,
        condition_failures: Vec::new(),
    };

    for condition in Condition::ALL {
        let page = fetcher.fetch(&condition.url_for(&item.url)).await?;

        match extract_page(&page.body, condition, item.game_id) {
            Ok(records) => {
                debug!(%condition, records = records.len(), "extracted sales");
                sales.records.push((condition, records));
            }
            Err(e) if e.is_parse() => {
                warn!(%condition, error = %e, "unexpected page layout, recording no sales");
                sales.parse_fallbacks += 1;
                sales
                    .records
                    .push((condition, vec![SaleRecord::placeholder(item.game_id, condition)]));
            }
            Err(e) => {
                warn!(%condition, error = %e, "dropping condition");
                sales.condition_failures.push(ConditionFailure {
                    game_id: item.game_id,
                    condition,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(sales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricescrape_shared::{ConsolePlatform, PriceScrapeError};
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HEADER: &str = "game,console,loose_val,complete_val,new_val,date(D/M/Y)\n";

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ps_test_{}.{ext}", Uuid::now_v7()))
    }

    struct Setup {
        store: StoreConfig,
        fetch: FetchConfig,
        ingest: IngestConfig,
    }

    fn setup(server: &MockServer, rows: &str) -> Setup {
        let catalog_path = temp_path("csv");
        std::fs::write(&catalog_path, format!("{HEADER}{rows}")).unwrap();

        Setup {
            store: StoreConfig {
                path: temp_path("db"),
            },
            fetch: FetchConfig {
                retries: 1,
                backoff_factor: 0.0,
                ..FetchConfig::default()
            },
            ingest: IngestConfig {
                catalog_path,
                overrides_path: None,
                base_url: format!("{}/game/", server.uri()),
                item_delay: Duration::ZERO,
                consoles: Vec::new(),
                limit: None,
                resume: false,
            },
        }
    }

    async fn serve(server: &MockServer, route: &str, body: String, times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(times)
            .mount(server)
            .await;
    }

    async fn count(cfg: &StoreConfig, table: &str) -> u64 {
        let store = Store::open_readonly(cfg).await.unwrap();
        store.count_rows(table).await.unwrap()
    }

    #[tokio::test]
    async fn single_item_end_to_end() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/super-game", fixture("item_page.html"), 3).await;

        let s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.rows_read, 1);
        assert_eq!(summary.items_attempted, 1);
        assert_eq!(summary.items_succeeded, 1);
        assert_eq!(summary.items_failed(), 0);
        assert_eq!(summary.records.loose, 2);
        assert_eq!(summary.records.complete, 1);
        assert_eq!(summary.records.new, 1);

        assert_eq!(count(&s.store, "consoles").await, 1);
        assert_eq!(count(&s.store, "avg_game_prices").await, 1);
        assert_eq!(count(&s.store, "loose_game_prices").await, 2);
        assert_eq!(count(&s.store, "cib_game_prices").await, 1);
        assert_eq!(count(&s.store, "new_game_prices").await, 1);

        let store = Store::open_readonly(&s.store).await.unwrap();
        assert_eq!(
            store.list_consoles().await.unwrap(),
            vec![ConsolePlatform {
                console_id: 0,
                console: "nes".into()
            }]
        );
        let game = store.get_game(1).await.unwrap().expect("game 1");
        assert_eq!(game.console_id, 0);
        assert!(game.url.unwrap().ends_with("/game/nes/super-game"));

        let loose = store.sales_history(1, Condition::Loose).await.unwrap();
        assert_eq!(loose[0].date_sold.as_deref(), Some("2021-01-01"));
        assert_eq!(loose[0].price_value(), Some(10.0));
        assert_eq!(loose[1].price_value(), Some(12.5));

        let cib = store.sales_history(1, Condition::Complete).await.unwrap();
        assert_eq!(cib[0].price_value(), Some(1024.99));

        let new = store.sales_history(1, Condition::New).await.unwrap();
        assert!(new[0].is_placeholder());
    }

    #[tokio::test]
    async fn failed_item_does_not_abort_run() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/super-game", fixture("item_page.html"), 3).await;
        Mock::given(method("GET"))
            .and(path("/game/nes/broken-game"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let s = setup(
            &server,
            "Broken Game,nes,1,2,3,01/01/2020\nSuper Game,nes,5,10,20,01/01/2020\n",
        );
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.items_attempted, 2);
        assert_eq!(summary.items_succeeded, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].game_id, 1);
        assert!(summary.failures[0].url.ends_with("/nes/broken-game"));

        // Both items keep their average-price row; only game 2 has history.
        assert_eq!(count(&s.store, "avg_game_prices").await, 2);
        let store = Store::open_readonly(&s.store).await.unwrap();
        assert!(store.sales_history(1, Condition::Loose).await.unwrap().is_empty());
        assert_eq!(store.sales_history(2, Condition::Loose).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_frame_degrades_to_placeholders() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/super-game", fixture("item_page_no_frame.html"), 3).await;

        let s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.items_succeeded, 1);
        assert_eq!(summary.parse_fallbacks, 3);
        assert_eq!(summary.records.total(), 3);

        let store = Store::open_readonly(&s.store).await.unwrap();
        for condition in Condition::ALL {
            let history = store.sales_history(1, condition).await.unwrap();
            assert_eq!(history.len(), 1);
            assert!(history[0].is_placeholder());
        }
    }

    #[tokio::test]
    async fn odd_token_table_drops_only_that_condition() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/super-game", fixture("item_page_odd.html"), 3).await;

        let s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.items_succeeded, 1);
        assert_eq!(summary.condition_failures.len(), 1);
        assert_eq!(summary.condition_failures[0].condition, Condition::Loose);
        assert_eq!(summary.records.loose, 0);
        assert_eq!(summary.records.complete, 1);
        assert_eq!(summary.records.new, 1);
    }

    #[tokio::test]
    async fn excluded_rows_are_reported_and_not_fetched() {
        let server = MockServer::start().await;
        serve(&server, "/game/snes/super-game", fixture("item_page.html"), 3).await;

        let s = setup(
            &server,
            "Half Priced,nes,5,,20,01/01/2020\nSuper Game,snes,5,10,20,01/01/2020\n",
        );
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.excluded.len(), 1);
        assert_eq!(summary.excluded[0].game.as_deref(), Some("Half Priced"));
        assert_eq!(summary.items_loaded, 1);
        assert_eq!(count(&s.store, "consoles").await, 1);
    }

    #[tokio::test]
    async fn console_filter_and_limit_restrict_scraping() {
        let server = MockServer::start().await;
        serve(&server, "/game/snes/first", fixture("item_page.html"), 3).await;
        serve(&server, "/game/snes/second", fixture("item_page.html"), 0).await;
        serve(&server, "/game/nes/other", fixture("item_page.html"), 0).await;

        let mut s = setup(
            &server,
            "Other,nes,1,2,3,01/01/2020\nFirst,snes,1,2,3,01/01/2020\nSecond,snes,1,2,3,01/01/2020\n",
        );
        s.ingest.consoles = vec!["SNES".into()];
        s.ingest.limit = Some(1);

        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.items_attempted, 1);
        // Dimensions are always loaded in full.
        assert_eq!(summary.consoles, 2);
        assert_eq!(count(&s.store, "avg_game_prices").await, 3);
    }

    #[tokio::test]
    async fn rerun_replaces_previous_data() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/super-game", fixture("item_page.html"), 6).await;

        let s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();
        ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(count(&s.store, "avg_game_prices").await, 1);
        assert_eq!(count(&s.store, "loose_game_prices").await, 2);
    }

    #[tokio::test]
    async fn invalid_base_url_fails_before_any_work() {
        let server = MockServer::start().await;
        let mut s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        s.ingest.base_url = "ftp://example.com/game".into();

        let err = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PriceScrapeError::Config { .. }));
        assert!(!s.store.path.exists());
    }

    #[tokio::test]
    async fn resumed_console_run_keeps_other_history() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/first", fixture("item_page.html"), 3).await;
        serve(&server, "/game/snes/second", fixture("item_page.html"), 3).await;

        let mut s = setup(
            &server,
            "First,nes,1,2,3,01/01/2020\nSecond,snes,1,2,3,01/01/2020\n",
        );
        s.ingest.consoles = vec!["nes".into()];
        let first = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();
        assert!(!first.resumed);
        assert_eq!(first.consoles_completed, vec!["nes".to_string()]);

        s.ingest.consoles = vec!["snes".into()];
        s.ingest.resume = true;
        let second = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();
        assert!(second.resumed);
        assert_eq!(second.consoles_completed, vec!["snes".to_string()]);

        let store = Store::open_readonly(&s.store).await.unwrap();
        assert_eq!(store.sales_history(1, Condition::Loose).await.unwrap().len(), 2);
        assert_eq!(store.sales_history(2, Condition::Loose).await.unwrap().len(), 2);
        assert_eq!(count(&s.store, "loose_game_prices").await, 4);
        assert_eq!(count(&s.store, "avg_game_prices").await, 2);
        assert_eq!(count(&s.store, "consoles").await, 2);
    }

    #[tokio::test]
    async fn resumed_rescrape_replaces_item_history() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/super-game", fixture("item_page.html"), 6).await;

        let mut s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();
        s.ingest.resume = true;
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.records.loose, 2);
        assert_eq!(count(&s.store, "loose_game_prices").await, 2);
        assert_eq!(count(&s.store, "cib_game_prices").await, 1);
        assert_eq!(count(&s.store, "new_game_prices").await, 1);
    }

    #[tokio::test]
    async fn resumed_failure_keeps_earlier_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game/nes/super-game"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("item_page.html")))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/game/nes/super-game"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();
        s.ingest.resume = true;
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.items_failed(), 1);
        assert_eq!(count(&s.store, "loose_game_prices").await, 2);
    }

    #[tokio::test]
    async fn item_delay_spaces_out_items() {
        let server = MockServer::start().await;
        serve(&server, "/game/nes/one", fixture("item_page.html"), 3).await;
        serve(&server, "/game/nes/two", fixture("item_page.html"), 3).await;
        serve(&server, "/game/nes/three", fixture("item_page.html"), 3).await;

        let mut s = setup(
            &server,
            "One,nes,1,2,3,x\nTwo,nes,1,2,3,x\nThree,nes,1,2,3,x\n",
        );
        s.ingest.item_delay = Duration::from_millis(50);

        let started = Instant::now();
        let summary = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.items_attempted, 3);
        // Two pauses: none before the first item.
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn invalid_fetch_config_fails_before_any_work() {
        let server = MockServer::start().await;
        let mut s = setup(&server, "Super Game,nes,5,10,20,01/01/2020\n");
        s.fetch.backoff_factor = f64::NAN;

        let err = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PriceScrapeError::Config { .. }));
        assert!(!s.store.path.exists());

        s.fetch.backoff_factor = 0.0;
        s.fetch.retries = u32::MAX;
        let err = ingest(&s.store, &s.fetch, &s.ingest, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PriceScrapeError::Config { .. }));
    }

    #[test]
    fn batches_follow_first_occurrence_order() {
        let raw = pricescrape_catalog::read_catalog_from(
            format!(
                "{HEADER}A,snes,1,1,1,x\nB,nes,1,1,1,x\nC,snes,1,1,1,x\nD,n64,1,1,1,x\n"
            )
            .as_bytes(),
        )
        .unwrap();
        let catalog =
            pricescrape_catalog::normalize(raw, "https://example.com/game/", &OverrideTable::new());

        let batches = console_batches(&catalog, &[], None);
        let order: Vec<(&str, Vec<u32>)> = batches
            .iter()
            .map(|(c, items)| (*c, items.iter().map(|i| i.game_id).collect()))
            .collect();
        assert_eq!(
            order,
            vec![("snes", vec![1, 3]), ("nes", vec![2]), ("n64", vec![4])]
        );

        let limited = console_batches(&catalog, &[], Some(3));
        let total: usize = limited.iter().map(|(_, i)| i.len()).sum();
        assert_eq!(total, 3);
        assert_eq!(limited.len(), 2);
    }
}
