//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small statistics site
//! (root → states → zip index → zip pages → category pages) and exercise
//! full harvest runs end-to-end against a temporary SQLite database.

use std::path::Path;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip_harvest::config::{Config, ErrorPolicy};
use zip_harvest::crawler::{
    run_harvest, Coordinator, CrawlTarget, Fetcher, LinkDiscoverer, RetryPolicy,
};
use zip_harvest::record::{Field, StatRecord};
use zip_harvest::state::{RunPhase, TargetStage};
use zip_harvest::storage::{open_store, RunStatus, SqliteStore, Store};
use zip_harvest::{FetchError, HarvestError};

const ROOT_HTML: &str = r#"<html><body>
    <h2>Best Places to Live</h2>
    <h4>Click a State and Browse</h4>
    <div class="states">
        <a href="/state/california">California</a>
        <a href="/state/texas">Texas</a>
        <a href="/state/new_york">New York</a>
    </div>
    <div class="footer"><a href="/about">About</a></div>
</body></html>"#;

const HOUSING_HTML: &str = r#"<html><body>
    <table id="mainContent_dgHousing">
        <tr><td><b><u>Median Home Age</u></b></td><td>54</td></tr>
        <tr><td><b><u>Median Home Cost</u></b></td><td>$3,281,700</td></tr>
        <tr><td><b><u>Home Appr. Last 12 months</u></b></td><td>5.4%</td></tr>
        <tr><td><b><u>Home Appr. Last 5 yrs.</u></b></td><td>28.3%</td></tr>
        <tr><td><b><u>Home Appr. Last 10 yrs.</u></b></td><td>61.7%</td></tr>
        <tr><td><b><u>Property Tax Rate</u></b></td><td>$6.12</td></tr>
        <tr><td><b><u>Average Rent</u></b></td><td>$2,980</td></tr>
        <tr><td><b><u>Studio Apartment</u></b></td><td>$1,850</td></tr>
        <tr><td><b><u>1 Bedroom Home or Apartment</u></b></td><td>$2,200</td></tr>
        <tr><td><b><u>2 Bedroom Home or Apartment</u></b></td><td>$2,790</td></tr>
        <tr><td><b><u>3 Bedroom Home or Apartment</u></b></td><td>$3,880</td></tr>
        <tr><td><b><u>4 Bedroom Home or Apartment</u></b></td><td>$4,650</td></tr>
        <tr><td><b><u>Vacant For Rent</u></b></td><td>4.1%</td></tr>
    </table>
    <p>Renters make up 56.2% of the Beverly Hills population.</p>
</body></html>"#;

/// Housing page without the housing table: 13 statistics missing
const SPARSE_HOUSING_HTML: &str = r#"<html><body>
    <p>Renters make up 31.0% of the local population.</p>
</body></html>"#;

const COST_OF_LIVING_HTML: &str = r#"<html><body>
    <table>
        <tr><td><u>Overall</u></td><td>452.1</td></tr>
        <tr><td><u>Utilities</u></td><td>104.3</td></tr>
    </table>
</body></html>"#;

const CRIME_HTML: &str = r#"<html><body>
    <p>In this zip code, violent crime is 22.1. (The US average is 22.7)</p>
    <p>In this zip code, property crime is 51.3. (The US average is 35.4)</p>
</body></html>"#;

const JOB_MARKET_HTML: &str = r#"<html><body>
    <table>
        <tr><td><b><u>Unemployment Rate</u></b></td><td>4.6%</td></tr>
        <tr><td><b><u>Recent Job Growth</u></b></td><td>-0.8%</td></tr>
    </table>
</body></html>"#;

const ALL_CATEGORIES: [(&str, &str); 4] = [
    ("Housing Stats", "housing"),
    ("Cost of Living", "cost_of_living"),
    ("Crime", "crime"),
    ("Job Market", "job_market"),
];

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html")
}

/// Zip detail page with a menu linking the given (label, path suffix) pairs
fn detail_html(zip: &str, menu: &[(&str, &str)]) -> String {
    let links: String = menu
        .iter()
        .map(|(label, suffix)| format!(r#"<li><a href="/zip/{}/{}">{}</a></li>"#, zip, suffix, label))
        .collect();

    format!(
        r#"<html><body>
        <table>
            <tr><td><b><u>Population</u></b></td><td>21,134</td></tr>
        </table>
        <p>Since 2020 the population has changed -1.2%</p>
        <ul class="list-group">{}</ul>
        </body></html>"#,
        links
    )
}

async fn mount_get(server: &MockServer, route: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Mounts a zip code's detail page and category pages
///
/// `expected_detail_fetches` is verified when the server drops.
async fn mount_zip(
    server: &MockServer,
    zip: &str,
    menu: &[(&str, &str)],
    housing: &str,
    expected_detail_fetches: Option<u64>,
) {
    let detail = Mock::given(method("GET"))
        .and(path(format!("/zip/{}", zip)))
        .respond_with(html(detail_html(zip, menu)));
    let detail = match expected_detail_fetches {
        Some(n) => detail.expect(n),
        None => detail,
    };
    detail.mount(server).await;

    mount_get(server, &format!("/zip/{}/housing", zip), housing).await;
    mount_get(server, &format!("/zip/{}/cost_of_living", zip), COST_OF_LIVING_HTML).await;
    mount_get(server, &format!("/zip/{}/crime", zip), CRIME_HTML).await;
    mount_get(server, &format!("/zip/{}/job_market", zip), JOB_MARKET_HTML).await;
}

/// Mounts the root, state and zip-index pages
///
/// California lists 90210 and 90211, Texas has no zip index link, New York
/// lists 10001.
async fn mount_hierarchy(server: &MockServer) {
    mount_get(server, "/find/", ROOT_HTML).await;

    mount_get(
        server,
        "/state/california",
        r#"<html><body><ul><li><a href="/state/california/cities">Cities</a></li>
           <li><a href="/state/california/zips">Zip Codes</a></li></ul></body></html>"#,
    )
    .await;
    mount_get(
        server,
        "/state/california/zips",
        r#"<html><body>
            <a href="/zip/90210">90210 (Beverly Hills)</a>
            <a href="/zip/90211">90211 (Beverly Hills)</a>
            <a href="/state/california">Back to California</a>
        </body></html>"#,
    )
    .await;

    mount_get(
        server,
        "/state/texas",
        r#"<html><body><a href="/state/texas/cities">Cities</a></body></html>"#,
    )
    .await;

    mount_get(
        server,
        "/state/new_york",
        r#"<html><body><a href="zips">Zip Codes</a></body></html>"#,
    )
    .await;
    mount_get(
        server,
        "/state/zips",
        r#"<html><body><a href="/zip/10001">10001 (New York)</a></body></html>"#,
    )
    .await;
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    let mut config = Config::default();
    config.site.root_url = format!("{}/find/", base_url);
    config.fetcher.max_retries = 2;
    config.fetcher.base_delay_ms = 1;
    config.fetcher.max_delay_ms = 5;
    config.fetcher.jitter = false;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.database_path = db_path.to_string();
    config
}

fn target(base_url: &str, zip: &str, state: &str) -> CrawlTarget {
    CrawlTarget {
        zip_code: zip.to_string(),
        city: String::new(),
        state: state.to_string(),
        detail_url: Url::parse(&format!("{}/zip/{}", base_url, zip)).unwrap(),
    }
}

fn temp_db(dir: &TempDir) -> String {
    dir.path().join("stats.db").display().to_string()
}

fn all_records(store: &SqliteStore) -> Vec<StatRecord> {
    [90210, 90211, 10001]
        .iter()
        .filter_map(|zip| store.get(*zip).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_harvest_is_idempotent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_hierarchy(&mock_server).await;
    // Each zip page must be fetched by the first run only
    mount_zip(&mock_server, "90210", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;
    mount_zip(&mock_server, "90211", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;
    mount_zip(&mock_server, "10001", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;

    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);

    let first = {
        let config = create_test_config(&base_url, &db_path);
        let mut coordinator = Coordinator::new(config).expect("Failed to create coordinator");
        let summary = coordinator.run().await.expect("Harvest failed");
        assert_eq!(coordinator.phase(), RunPhase::Done);

        assert_eq!(summary.targets_seen, 3);
        assert_eq!(summary.persisted, 3);
        assert_eq!(summary.skipped_existing, 0);
        all_records(coordinator.store())
    };
    assert_eq!(first.len(), 3);

    let config = create_test_config(&base_url, &db_path);
    let mut coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Second harvest failed");

    assert_eq!(summary.targets_seen, 3);
    assert_eq!(summary.persisted, 0);
    assert_eq!(summary.skipped_existing, 3);

    let store = coordinator.store();
    assert_eq!(store.count_records().unwrap(), 3);
    assert_eq!(all_records(store), first);

    let run = store.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.targets_seen, 3);
    assert_eq!(run.records_written, 0);
}

#[tokio::test]
async fn test_run_harvest_writes_database_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_hierarchy(&mock_server).await;
    mount_zip(&mock_server, "90210", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;
    mount_zip(&mock_server, "90211", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;
    mount_zip(&mock_server, "10001", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;

    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);

    let summary = run_harvest(create_test_config(&base_url, &db_path))
        .await
        .expect("Harvest failed");
    assert_eq!(summary.persisted, 3);

    // The coordinator is gone; the file must hold everything on its own
    let store = open_store(Path::new(&db_path)).unwrap();
    assert_eq!(store.count_records().unwrap(), 3);
    assert_eq!(
        store.records_by_state().unwrap().len(),
        2,
        "California and New York"
    );
    assert_eq!(store.latest_run().unwrap().unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_extracted_values_are_normalized() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_zip(&mock_server, "90210", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;

    let config = create_test_config(&base_url, ":unused:");
    let mut coordinator =
        Coordinator::with_store(config, SqliteStore::open_in_memory().unwrap()).unwrap();
    let mut target = target(&base_url, "90210", "California");
    target.city = "Beverly Hills".to_string();

    let summary = coordinator.run_targets(vec![target]).await.unwrap();
    assert_eq!(summary.persisted, 1);

    let record = coordinator.store().get(90210).unwrap().unwrap();
    assert_eq!(record.null_count(), 0);
    assert_eq!(record.city, "Beverly Hills");
    assert_eq!(record.state, "California");
    assert_eq!(record.population, Some(21_134));
    assert_eq!(record.population_growth, Some(-1.2));
    assert_eq!(record.median_home_age, Some(54.0));
    assert_eq!(record.median_home_cost, Some(3_281_700));
    assert_eq!(record.appreciation_12mo, Some(5.4));
    assert_eq!(record.appreciation_5yr, Some(28.3));
    assert_eq!(record.appreciation_10yr, Some(61.7));
    assert_eq!(record.property_tax, Some(6.12));
    assert_eq!(record.average_rent, Some(2_980));
    assert_eq!(record.rent_studio, Some(1_850));
    assert_eq!(record.rent_1br, Some(2_200));
    assert_eq!(record.rent_2br, Some(2_790));
    assert_eq!(record.rent_3br, Some(3_880));
    assert_eq!(record.rent_4br, Some(4_650));
    assert_eq!(record.vacancy, Some(4.1));
    assert_eq!(record.rental_market_percent, Some(56.2));
    assert_eq!(record.cost_of_living, Some(452.1));
    assert_eq!(record.utilities_cost_of_living, Some(104.3));
    assert_eq!(record.violent_crime, Some(22.1));
    assert_eq!(record.property_crime, Some(51.3));
    assert_eq!(record.job_growth, Some(-0.8));
    assert_eq!(record.unemployment, Some(4.6));
}

#[tokio::test]
async fn test_missing_fields_are_stored_as_null() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_zip(&mock_server, "90211", &ALL_CATEGORIES, SPARSE_HOUSING_HTML, Some(1)).await;

    let config = create_test_config(&base_url, ":unused:");
    let mut coordinator =
        Coordinator::with_store(config, SqliteStore::open_in_memory().unwrap()).unwrap();

    let summary = coordinator
        .run_targets(vec![target(&base_url, "90211", "California")])
        .await
        .unwrap();
    assert_eq!(summary.persisted, 1);

    let record = coordinator.store().get(90211).unwrap().unwrap();
    assert_eq!(record.null_count(), 13);
    assert_eq!(record.median_home_cost, None);
    assert_eq!(record.vacancy, None);
    assert_eq!(record.rental_market_percent, Some(31.0));
    assert_eq!(record.population, Some(21_134));
    assert_eq!(record.violent_crime, Some(22.1));
}

#[tokio::test]
async fn test_resume_skips_stored_zip_codes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_zip(&mock_server, "90210", &ALL_CATEGORIES, HOUSING_HTML, Some(0)).await;
    mount_zip(&mock_server, "10001", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;

    let dir = TempDir::new().unwrap();
    let db_path = temp_db(&dir);

    {
        let mut store = SqliteStore::new(std::path::Path::new(&db_path)).unwrap();
        store
            .insert(&StatRecord::new(90210, "Beverly Hills", "California"))
            .unwrap();
    }

    let config = create_test_config(&base_url, &db_path);
    let mut coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator
        .run_targets(vec![
            target(&base_url, "90210", "California"),
            target(&base_url, "10001", "New York"),
        ])
        .await
        .unwrap();

    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.persisted, 1);

    let store = coordinator.store();
    assert_eq!(store.count_records().unwrap(), 2);
    // The pre-seeded row is untouched
    assert_eq!(store.get(90210).unwrap().unwrap().null_count(), Field::ALL.len());
    assert_eq!(store.get(10001).unwrap().unwrap().population, Some(21_134));
}

#[tokio::test]
async fn test_discovery_is_deterministic() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_hierarchy(&mock_server).await;

    let config = create_test_config(&base_url, ":unused:");
    let fetcher = Fetcher::new(&config.fetcher, &config.user_agent).unwrap();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut discoverer = LinkDiscoverer::new(&config.site).unwrap();
        let mut targets = Vec::new();
        while let Some(target) = discoverer.next_target(&fetcher).await.unwrap() {
            targets.push(target);
        }
        assert_eq!(discoverer.state_count(), Some(3));
        runs.push(targets);
    }

    assert_eq!(runs[0], runs[1]);

    let summary: Vec<(&str, &str, &str)> = runs[0]
        .iter()
        .map(|t| (t.zip_code.as_str(), t.city.as_str(), t.state.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("90210", "Beverly Hills", "California"),
            ("90211", "Beverly Hills", "California"),
            ("10001", "New York", "New York"),
        ]
    );
    assert_eq!(
        runs[0][2].detail_url.as_str(),
        format!("{}/zip/10001", base_url)
    );
}

#[tokio::test]
async fn test_missing_state_heading_aborts_discovery() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_get(&mock_server, "/find/", "<html><body><h4>Maintenance</h4></body></html>").await;

    let config = create_test_config(&base_url, ":unused:");
    let mut coordinator =
        Coordinator::with_store(config, SqliteStore::open_in_memory().unwrap()).unwrap();

    let result = coordinator.run().await;
    assert!(matches!(result, Err(HarvestError::MissingLink { .. })));
    assert_eq!(
        coordinator.store().latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test]
async fn test_retries_exhausted_on_persistent_503() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/zip/00501"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, ":unused:");
    let fetcher = Fetcher::new(&config.fetcher, &config.user_agent).unwrap();
    assert_eq!(fetcher.policy().max_retries, 2);

    let result = fetcher.fetch(&format!("{}/zip/00501", base_url)).await;
    match result {
        Err(FetchError::RetriesExhausted {
            attempts,
            last_error,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("<html><body>ok</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, ":unused:");
    let fetcher = Fetcher::new(&config.fetcher, &config.user_agent).unwrap();

    let body = fetcher.fetch(&format!("{}/flaky", base_url)).await.unwrap();
    assert!(body.contains("ok"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, ":unused:");
    let fetcher = Fetcher::new(&config.fetcher, &config.user_agent)
        .unwrap()
        .with_policy(RetryPolicy {
            max_retries: 50,
            ..RetryPolicy::default()
        });

    let result = fetcher.fetch(&format!("{}/gone", base_url)).await;
    assert!(matches!(
        result,
        Err(FetchError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_skip_policy_records_failure_and_continues() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // 90212's menu has no Crime link
    let partial_menu = [ALL_CATEGORIES[0], ALL_CATEGORIES[1], ALL_CATEGORIES[3]];
    mount_zip(&mock_server, "90212", &partial_menu, HOUSING_HTML, Some(1)).await;
    mount_zip(&mock_server, "10001", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;

    let mut config = create_test_config(&base_url, ":unused:");
    config.crawler.on_target_error = ErrorPolicy::Skip;
    let mut coordinator =
        Coordinator::with_store(config, SqliteStore::open_in_memory().unwrap()).unwrap();

    let summary = coordinator
        .run_targets(vec![
            target(&base_url, "90212", "California"),
            target(&base_url, "10001", "New York"),
        ])
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.persisted, 1);

    let store = coordinator.store();
    assert!(!store.exists(90212).unwrap());
    assert!(store.exists(10001).unwrap());

    let failures = store.failures().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].zip_code, "90212");
    assert_eq!(failures[0].state, "California");
    assert_eq!(failures[0].detail_url, format!("{}/zip/90212", base_url));
    assert_eq!(failures[0].stage, TargetStage::ResolveMenuLinks);
    assert!(failures[0].error.contains("Crime"));
}

#[tokio::test]
async fn test_abort_policy_stops_the_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let partial_menu = [ALL_CATEGORIES[0], ALL_CATEGORIES[1], ALL_CATEGORIES[3]];
    mount_zip(&mock_server, "90212", &partial_menu, HOUSING_HTML, Some(1)).await;
    mount_zip(&mock_server, "10001", &ALL_CATEGORIES, HOUSING_HTML, Some(0)).await;

    let config = create_test_config(&base_url, ":unused:");
    let mut coordinator =
        Coordinator::with_store(config, SqliteStore::open_in_memory().unwrap()).unwrap();

    let result = coordinator
        .run_targets(vec![
            target(&base_url, "90212", "California"),
            target(&base_url, "10001", "New York"),
        ])
        .await;

    assert!(matches!(
        result,
        Err(HarvestError::MissingLink { ref label, .. }) if label == "Crime"
    ));

    let store = coordinator.store();
    assert_eq!(store.count_records().unwrap(), 0);
    assert_eq!(store.count_failures().unwrap(), 0);
    assert_eq!(store.latest_run().unwrap().unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn test_persisted_fields_subset() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_zip(&mock_server, "10001", &ALL_CATEGORIES, HOUSING_HTML, Some(1)).await;

    let mut config = create_test_config(&base_url, ":unused:");
    config.crawler.persisted_fields = Some(vec![Field::Population, Field::ViolentCrime]);
    let mut coordinator =
        Coordinator::with_store(config, SqliteStore::open_in_memory().unwrap()).unwrap();

    coordinator
        .run_targets(vec![target(&base_url, "10001", "New York")])
        .await
        .unwrap();

    let record = coordinator.store().get(10001).unwrap().unwrap();
    assert_eq!(record.population, Some(21_134));
    assert_eq!(record.violent_crime, Some(22.1));
    assert_eq!(record.null_count(), Field::ALL.len() - 2);
}
