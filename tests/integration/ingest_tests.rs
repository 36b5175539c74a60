//! Integration tests for the ingestion pipeline
//!
//! These tests use wiremock to stand in for the archive service and a
//! temporary directory for the database and download root, and run whole
//! ingestions end-to-end.

use fotoladu_ingest::archive::QuerySpec;
use fotoladu_ingest::storage::{MetadataStore, RunMode, RunStatus};
use fotoladu_ingest::{
    BBoxQuery, CancelFlag, Config, ConfigError, IngestError, Ingestor, NearestQuery,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SEARCH: &str = "/otsing_arhiiv.php";
const IMAGES: &str = r"^/data/archive/arhiiv/";

/// Creates a test configuration pointing at the mock server and a temp dir
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.service.base_url = base_url.to_string();
    config.service.metadata_timeout_secs = 5;
    config.service.download_timeout_secs = 5;
    config.storage.database_path = dir.join("db").join("fotoladu.sqlite").display().to_string();
    config.storage.download_root = dir.join("raw").display().to_string();
    config.storage.corrected_root = dir.join("corrected").display().to_string();
    config
}

/// One frame as the search page renders it
fn frame(id: i64) -> String {
    format!(
        "<img onclick=\"kuvapiltfuncarhiiv({id}, '1985', 58.{id}, 27.1, 2, 7680, 7680, 'ka', \
         'k150', '{id}.jpg', 'K150', {id}, 'O35', '1', '2')\">"
    )
}

/// A search page with the given counters and frames
fn search_page(total: u64, rows: u64, limit: u64, ids: &[i64]) -> String {
    let frames: String = ids.iter().map(|id| frame(*id)).collect();
    format!(
        "<p>Leitud fotosid: {total}</p>\n<script>var lk_nr = 1; var ridu = {rows}; \
         var limit = {limit};</script>\n{frames}"
    )
}

fn raw_file(dir: &Path, variant: &str, id: i64) -> PathBuf {
    dir.join("raw")
        .join("ka")
        .join("k150")
        .join(variant)
        .join(format!("{}.jpg", id))
}

async fn mount_search(server: &MockServer, start: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("start", start))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_images(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(IMAGES))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xFF\xD8jpeg".to_vec()))
        .mount(server)
        .await;
}

async fn image_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/data/"))
        .count()
}

fn ingestor(config: &Config) -> Ingestor {
    Ingestor::from_config(config, "test-hash", CancelFlag::new())
        .expect("Failed to create ingestor")
}

#[tokio::test]
async fn test_search_ingests_rows_and_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_search(&server, "0", search_page(2, 1, 30, &[101, 102])).await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor
        .ingest_search(&QuerySpec::new().with_year("1985"), None)
        .await
        .expect("Search ingestion failed");

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.entries_seen, 2);
    assert_eq!(report.files_downloaded, 4);
    assert_eq!(report.images_inserted, 2);
    assert_eq!(report.locations_inserted, 2);

    for id in [101, 102] {
        assert!(raw_file(dir.path(), "reduced", id).exists());
        assert!(raw_file(dir.path(), "thumbs", id).exists());
    }

    let store = ingestor.store();
    let image = store.get_image_by_external_id(101).unwrap().unwrap();
    assert_eq!(
        PathBuf::from(&image.path),
        raw_file(dir.path(), "reduced", 101)
    );
    assert_eq!(image.flight.as_deref(), Some("K150"));
    assert_eq!(image.latitude, Some(58.101));

    let run = store.latest_run().unwrap().unwrap();
    assert_eq!(run.mode, RunMode::Search);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.entries, 2);
}

#[tokio::test]
async fn test_rerun_is_idempotent_and_skips_downloads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_search(&server, "0", search_page(3, 1, 30, &[1, 2, 3])).await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();
    assert_eq!(image_requests(&server).await, 6);

    let report = ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();
    assert_eq!(report.entries_seen, 3);
    assert_eq!(report.files_downloaded, 0);
    assert_eq!(report.images_inserted, 0);
    assert_eq!(report.locations_inserted, 0);

    // No image traffic on the second run
    assert_eq!(image_requests(&server).await, 6);
    assert_eq!(ingestor.store().count_images().unwrap(), 3);
    assert_eq!(ingestor.store().count_locations().unwrap(), 3);
}

#[tokio::test]
async fn test_existing_files_are_never_fetched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    for variant in ["reduced", "thumbs"] {
        let file = raw_file(dir.path(), variant, 7);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"already here").unwrap();
    }

    mount_search(&server, "0", search_page(1, 1, 30, &[7])).await;
    Mock::given(method("GET"))
        .and(path_regex(IMAGES))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut ingestor = ingestor(&config);
    let report = ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();

    assert_eq!(report.files_downloaded, 0);
    assert_eq!(report.images_inserted, 1);
    assert_eq!(
        std::fs::read(raw_file(dir.path(), "reduced", 7)).unwrap(),
        b"already here"
    );
}

#[tokio::test]
async fn test_walks_inferred_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    // rows * limit = 2 per page; total 5 raises the reported single page to 3
    mount_search(&server, "0", search_page(5, 1, 2, &[1, 2])).await;
    mount_search(&server, "2", search_page(5, 1, 2, &[3, 4])).await;
    mount_search(&server, "4", search_page(5, 1, 2, &[5])).await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();

    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.images_inserted, 5);
    assert_eq!(ingestor.store().count_images().unwrap(), 5);
}

#[tokio::test]
async fn test_page_budget_limits_walk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_search(&server, "0", search_page(6, 1, 2, &[1, 2])).await;
    mount_search(&server, "2", search_page(6, 1, 2, &[3, 4])).await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("start", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(6, 1, 2, &[5, 6])))
        .expect(0)
        .mount(&server)
        .await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor
        .ingest_search(&QuerySpec::new(), Some(2))
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(ingestor.store().count_images().unwrap(), 4);
}

#[tokio::test]
async fn test_directory_uses_max_page_size() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("sailiku_nr", "1985_K150_O35_38"))
        .and(query_param("lkcount", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(1, 1, 60, &[9])))
        .expect(1)
        .mount(&server)
        .await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor
        .ingest_directory("1985_K150_O35_38", None)
        .await
        .unwrap();

    assert_eq!(report.images_inserted, 1);
    let run = ingestor.store().latest_run().unwrap().unwrap();
    assert_eq!(run.mode, RunMode::Directory);
}

#[tokio::test]
async fn test_bbox_ingests_feature_collection() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let geojson = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {
                "id": 501, "aasta": "1963", "B": 58.3, "L": 26.7, "tapsus": 1,
                "peakaust": "ka", "kaust": "k150", "fail": "501.jpg"}},
            {"type": "Feature", "properties": {
                "id": 502, "aasta": "1963", "B": 58.4, "L": 26.8, "tapsus": 3,
                "peakaust": "ka", "kaust": "k150", "fail": "502.jpg"}}
        ]
    });

    Mock::given(method("GET"))
        .and(path("/paring_db_arhiiv.php"))
        .and(query_param("m", "9"))
        .and(query_param("arhiiv", "arhiiv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geojson))
        .expect(1)
        .mount(&server)
        .await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor
        .ingest_bbox(&BBoxQuery::new(58.0, 26.0, 59.0, 27.0))
        .await
        .unwrap();

    assert_eq!(report.images_inserted, 2);
    assert_eq!(report.locations_inserted, 2);

    let image = ingestor.store().get_image_by_external_id(502).unwrap().unwrap();
    assert_eq!(image.longitude, Some(26.8));
    assert_eq!(image.confidence, Some(3.0));
    assert!(raw_file(dir.path(), "thumbs", 502).exists());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_opening_database() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("ftp://archive.example", dir.path());

    let result = Ingestor::from_config(&config, "test-hash", CancelFlag::new());

    assert!(matches!(
        result,
        Err(IngestError::Config(ConfigError::InvalidUrl(_)))
    ));
    assert!(!dir.path().join("db").exists());
}

#[tokio::test]
async fn test_nearest_is_passed_through() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    // Keys are not in alphabetical order
    let payload = r#"{"ok":true,"frames":[{"id":1,"dist":12.5}]}"#;
    Mock::given(method("GET"))
        .and(path("/paring_closest_arhiiv.php"))
        .and(query_param("B", "58.5"))
        .and(query_param("L", "26.25"))
        .and(query_param("leier", "1963"))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload))
        .mount(&server)
        .await;

    let ingestor = ingestor(&config);
    let value = ingestor
        .nearest(&NearestQuery::new(58.5, 26.25))
        .await
        .unwrap();

    assert_eq!(serde_json::to_string(&value).unwrap(), payload);
    assert_eq!(ingestor.store().count_images().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_download_writes_nothing_and_rerun_recovers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_search(&server, "0", search_page(3, 1, 30, &[1, 2, 3])).await;
    Mock::given(method("GET"))
        .and(path("/data/archive/arhiiv/ka/k150/reduced/2.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let result = ingestor.ingest_search(&QuerySpec::new(), None).await;

    assert!(matches!(
        result,
        Err(IngestError::Status { status: 500, .. })
    ));
    assert_eq!(ingestor.store().count_images().unwrap(), 0);
    assert_eq!(
        ingestor.store().latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
    // Files of the entry before the failure stay on disk
    assert!(raw_file(dir.path(), "reduced", 1).exists());
    assert!(!raw_file(dir.path(), "reduced", 2).exists());

    let report = ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();
    assert_eq!(report.images_inserted, 3);
    // Only entry 2 (both variants) and entry 3 (both variants) are fetched
    assert_eq!(report.files_downloaded, 4);
    assert_eq!(ingestor.store().count_orphan_locations().unwrap(), 0);
}

/// Serves an image and requests cancellation while doing so
struct CancelOnServe {
    cancel: CancelFlag,
}

impl Respond for CancelOnServe {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.cancel.cancel();
        ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec())
    }
}

#[tokio::test]
async fn test_interrupt_commits_materialized_entries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let cancel = CancelFlag::new();
    mount_search(&server, "0", search_page(3, 1, 30, &[1, 2, 3])).await;
    Mock::given(method("GET"))
        .and(path("/data/archive/arhiiv/ka/k150/reduced/2.jpg"))
        .respond_with(CancelOnServe {
            cancel: cancel.clone(),
        })
        .mount(&server)
        .await;
    mount_images(&server).await;

    let mut interrupted = Ingestor::from_config(&config, "test-hash", cancel).unwrap();
    let result = interrupted.ingest_search(&QuerySpec::new(), None).await;

    // Entry 2 finishes, entry 3 is never started
    assert!(matches!(result, Err(IngestError::Interrupted)));
    assert_eq!(interrupted.store().count_images().unwrap(), 2);
    assert!(raw_file(dir.path(), "thumbs", 2).exists());
    assert!(!raw_file(dir.path(), "reduced", 3).exists());

    let run = interrupted.store().latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    assert_eq!(run.entries, 2);

    let mut resumed = ingestor(&config);
    let report = resumed.ingest_search(&QuerySpec::new(), None).await.unwrap();
    assert_eq!(report.images_inserted, 1);
    assert_eq!(report.files_downloaded, 2);
    assert_eq!(resumed.store().count_images().unwrap(), 3);
}

#[tokio::test]
async fn test_cancelled_before_start_fetches_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut ingestor = Ingestor::from_config(&config, "test-hash", cancel).unwrap();

    let result = ingestor.ingest_search(&QuerySpec::new(), None).await;
    assert!(matches!(result, Err(IngestError::Interrupted)));
    assert_eq!(
        ingestor.store().latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
}

#[tokio::test]
async fn test_unusable_entries_are_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let body = format!(
        "{}{}{}",
        frame(1),
        "kuvapiltfuncarhiiv(2, '1985', 58.2, 27.1, 2, 1, 1, 'ka', '..', 'x.jpg')",
        "kuvapiltfuncarhiiv(null, '1985', 58.3, 27.1, 2, 1, 1, 'ka', 'k150', 'y.jpg')"
    );
    mount_search(&server, "0", body).await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();

    assert_eq!(report.entries_seen, 3);
    assert_eq!(report.entries_skipped, 2);
    assert_eq!(report.images_inserted, 1);
    assert_eq!(image_requests(&server).await, 2);
}

#[tokio::test]
async fn test_sweep_revisits_existing_folders() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    std::fs::create_dir_all(dir.path().join("raw").join("ka")).unwrap();
    std::fs::create_dir_all(dir.path().join("raw").join("kb")).unwrap();

    for (folder, id) in [("ka", 11), ("kb", 12)] {
        Mock::given(method("GET"))
            .and(path(SEARCH))
            .and(query_param("sailiku_nr", folder))
            .respond_with(ResponseTemplate::new(200).set_body_string(search_page(1, 1, 60, &[id])))
            .expect(1)
            .mount(&server)
            .await;
    }
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    let report = ingestor.sweep_existing_directories(Some(5)).await.unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.images_inserted, 2);
    assert_eq!(ingestor.store().count_images().unwrap(), 2);
}

#[tokio::test]
async fn test_locations_stay_consistent_across_modes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_search(&server, "0", search_page(2, 1, 30, &[1, 2])).await;
    Mock::given(method("GET"))
        .and(path("/paring_db_arhiiv.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "features": [{"properties": {
                "id": 2, "B": 1.0, "L": 1.0, "peakaust": "ka", "kaust": "k150", "fail": "2.jpg"}}]
        })))
        .mount(&server)
        .await;
    mount_images(&server).await;

    let mut ingestor = ingestor(&config);
    ingestor.ingest_search(&QuerySpec::new(), None).await.unwrap();
    let report = ingestor
        .ingest_bbox(&BBoxQuery::new(0.0, 0.0, 2.0, 2.0))
        .await
        .unwrap();

    // The overlapping frame keeps its first location
    assert_eq!(report.images_inserted, 0);
    assert_eq!(report.locations_inserted, 0);

    let store = ingestor.store();
    assert_eq!(store.count_images().unwrap(), store.count_locations().unwrap());
    assert_eq!(store.count_images_without_location().unwrap(), 0);
    assert_eq!(store.count_orphan_locations().unwrap(), 0);
    assert_eq!(
        store.get_image_by_external_id(2).unwrap().unwrap().latitude,
        Some(58.2)
    );
}
