//! Integration tests for the image reconcile pass.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use likes_archiver::db::{
    get_media_for_post, Author, Database, Media, NewAuthor, NewPost, Post, RecordStore,
};
use likes_archiver::media::{FetchedMedia, HttpMediaFetcher, MediaFetcher};
use likes_archiver::reconciler::ImageReconciler;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn store_post(db: &Database, id: i64, media_urls: Vec<String>) {
    let author = NewAuthor {
        id: 1,
        name: "Alice".to_string(),
        username: "alice".to_string(),
        protected: false,
    };
    let post = NewPost {
        id,
        text: format!("post {id}"),
        author_id: 1,
        media_urls,
        created_at: Utc::now(),
        crawled_at: Utc::now(),
    };
    db.store_post(&post, &author).await.expect("Failed to store post");
}

async fn mount_image(server: &MockServer, image_path: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

fn reconciler<R: RecordStore>(store: R, media_dir: &std::path::Path) -> ImageReconciler<HttpMediaFetcher, R> {
    let fetcher = HttpMediaFetcher::new(Duration::from_secs(10)).unwrap();
    ImageReconciler::new(fetcher, store, media_dir.to_path_buf(), Duration::ZERO)
}

fn assert_path_iff_downloaded(media: &[Media]) {
    for m in media {
        assert_eq!(m.downloaded, m.path.is_some(), "media {} breaks path invariant", m.id);
    }
}

#[tokio::test]
async fn test_downloads_pending_media() {
    let (db, temp_dir) = setup_db().await;
    let media_dir = temp_dir.path().join("imgs");
    let server = MockServer::start().await;
    mount_image(&server, "/media/a.jpg", 200, b"jpeg bytes").await;
    mount_image(&server, "/media/b", 200, b"mystery bytes").await;

    store_post(
        &db,
        42,
        vec![
            format!("{}/media/a.jpg?format=jpg&name=orig", server.uri()),
            format!("{}/media/b", server.uri()),
        ],
    )
    .await;

    let summary = reconciler(db.clone(), &media_dir).run().await.unwrap();
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.downloaded, 2);

    assert_eq!(std::fs::read(media_dir.join("42_1.jpg")).unwrap(), b"jpeg bytes");
    assert_eq!(std::fs::read(media_dir.join("42_2.unk")).unwrap(), b"mystery bytes");

    let media = get_media_for_post(db.pool(), 42).await.unwrap();
    assert!(media.iter().all(|m| m.downloaded));
    let expected = media_dir.join("42_1.jpg").to_string_lossy().into_owned();
    assert_eq!(media[0].path.as_deref(), Some(expected.as_str()));
    assert_path_iff_downloaded(&media);
}

#[tokio::test]
async fn test_existing_file_not_overwritten() {
    let (db, temp_dir) = setup_db().await;
    let media_dir = temp_dir.path().join("imgs");
    std::fs::create_dir_all(&media_dir).unwrap();
    std::fs::write(media_dir.join("42_1.jpg"), b"orphan from a crashed run").unwrap();

    let server = MockServer::start().await;
    mount_image(&server, "/media/a.jpg", 200, b"first").await;
    mount_image(&server, "/media/b.jpg", 200, b"second").await;
    store_post(
        &db,
        42,
        vec![
            format!("{}/media/a.jpg?format=jpg&name=orig", server.uri()),
            format!("{}/media/b.jpg?format=jpg&name=orig", server.uri()),
        ],
    )
    .await;

    reconciler(db.clone(), &media_dir).run().await.unwrap();

    assert_eq!(
        std::fs::read(media_dir.join("42_1.jpg")).unwrap(),
        b"orphan from a crashed run"
    );
    assert_eq!(std::fs::read(media_dir.join("42_2.jpg")).unwrap(), b"first");
    assert_eq!(std::fs::read(media_dir.join("42_3.jpg")).unwrap(), b"second");
}

#[tokio::test]
async fn test_failed_fetch_left_pending() {
    let (db, temp_dir) = setup_db().await;
    let media_dir = temp_dir.path().join("imgs");
    let server = MockServer::start().await;
    mount_image(&server, "/media/one.jpg", 200, b"one").await;
    mount_image(&server, "/media/two.jpg", 404, b"gone").await;
    mount_image(&server, "/media/three.jpg", 200, b"three").await;

    store_post(&db, 1, vec![format!("{}/media/one.jpg", server.uri())]).await;
    store_post(&db, 2, vec![format!("{}/media/two.jpg", server.uri())]).await;
    store_post(&db, 3, vec![format!("{}/media/three.jpg", server.uri())]).await;

    let summary = reconciler(db.clone(), &media_dir)
        .run()
        .await
        .expect("a 404 must not fail the pass");
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped_status, 1);

    let pending = db.find_pending_media().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].url.ends_with("/media/two.jpg"));
    assert!(pending[0].path.is_none());

    assert!(media_dir.join("1_1.jpg").exists());
    assert!(!media_dir.join("2_1.jpg").exists());
    assert!(media_dir.join("3_1.jpg").exists());

    for post_id in [1, 2, 3] {
        assert_path_iff_downloaded(&get_media_for_post(db.pool(), post_id).await.unwrap());
    }
}

#[tokio::test]
async fn test_rerun_fetches_nothing() {
    let (db, temp_dir) = setup_db().await;
    let media_dir = temp_dir.path().join("imgs");
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    store_post(&db, 5, vec![format!("{}/media/a.jpg", server.uri())]).await;

    let reconciler = reconciler(db.clone(), &media_dir);
    assert_eq!(reconciler.run().await.unwrap().downloaded, 1);

    let second = reconciler.run().await.unwrap();
    assert_eq!(second.pending, 0);
    assert_eq!(second.downloaded, 0);
    assert!(!media_dir.join("5_2.jpg").exists());
}

/// Store holding media rows whose posts are missing.
#[derive(Default)]
struct FakeStore {
    posts: HashMap<i64, Post>,
    media: Vec<Media>,
    marked: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn find_post(&self, id: i64) -> Result<Option<Post>> {
        Ok(self.posts.get(&id).cloned())
    }

    async fn find_author(&self, _id: i64) -> Result<Option<Author>> {
        Ok(None)
    }

    async fn store_post(&self, _post: &NewPost, _author: &NewAuthor) -> Result<()> {
        Ok(())
    }

    async fn find_pending_media(&self) -> Result<Vec<Media>> {
        Ok(self.media.clone())
    }

    async fn mark_media_downloaded(&self, media_id: i64, path: &str) -> Result<bool> {
        self.marked.lock().unwrap().push((media_id, path.to_string()));
        Ok(true)
    }
}

/// Fetcher that fails for URLs containing "broken".
struct FakeFetcher;

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchedMedia> {
        if url.contains("broken") {
            anyhow::bail!("connection reset");
        }
        Ok(FetchedMedia {
            status: 200,
            body: Bytes::copy_from_slice(url.as_bytes()),
        })
    }
}

fn pending(id: i64, url: &str, post_id: i64) -> Media {
    Media {
        id,
        url: url.to_string(),
        post_id,
        path: None,
        downloaded: false,
        ext: Some("png".to_string()),
    }
}

#[tokio::test]
async fn test_missing_post_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = FakeStore::default();
    store.posts.insert(
        8,
        Post {
            id: 8,
            text: "present".to_string(),
            author_id: 1,
            created_at: "2023-01-01 00:00:00".to_string(),
            crawled_at: "2023-01-01 00:00:00".to_string(),
        },
    );
    store.media = vec![
        pending(1, "https://img.example.com/orphan.png", 404),
        pending(2, "https://img.example.com/kept.png", 8),
    ];

    let reconciler = ImageReconciler::new(FakeFetcher, store, temp_dir.path().to_path_buf(), Duration::ZERO);
    let summary = reconciler.run().await.unwrap();

    assert_eq!(summary.skipped_orphan, 1);
    assert_eq!(summary.downloaded, 1);
    assert!(!temp_dir.path().join("404_1.png").exists());
    assert!(temp_dir.path().join("8_1.png").exists());
}

#[tokio::test]
async fn test_transport_error_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = FakeStore::default();
    for id in [1, 2] {
        store.posts.insert(
            id,
            Post {
                id,
                text: String::new(),
                author_id: 1,
                created_at: "2023-01-01 00:00:00".to_string(),
                crawled_at: "2023-01-01 00:00:00".to_string(),
            },
        );
    }
    store.media = vec![
        pending(10, "https://img.example.com/broken.png", 1),
        pending(11, "https://img.example.com/fine.png", 2),
    ];

    let reconciler = ImageReconciler::new(FakeFetcher, store, temp_dir.path().to_path_buf(), Duration::ZERO);
    let summary = reconciler.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.downloaded, 1);
    assert!(temp_dir.path().join("2_1.png").exists());
}

#[tokio::test]
async fn test_http_fetcher_returns_status_and_body() {
    let server = MockServer::start().await;
    mount_image(&server, "/media/raw.jpg", 200, b"raw image").await;
    mount_image(&server, "/media/gone.jpg", 410, b"").await;

    let fetcher = HttpMediaFetcher::new(Duration::from_secs(10)).unwrap();
    let ok = fetcher.get(&format!("{}/media/raw.jpg", server.uri())).await.unwrap();
    assert!(ok.is_success());
    assert_eq!(ok.body, Bytes::from_static(b"raw image"));

    let gone = fetcher.get(&format!("{}/media/gone.jpg", server.uri())).await.unwrap();
    assert_eq!(gone.status, 410);
    assert!(!gone.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_delay_before_each_media_fetch() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = FakeStore::default();
    for id in [1, 2] {
        store.posts.insert(
            id,
            Post {
                id,
                text: String::new(),
                author_id: 1,
                created_at: "2023-01-01 00:00:00".to_string(),
                crawled_at: "2023-01-01 00:00:00".to_string(),
            },
        );
    }
    store.media = vec![
        pending(20, "https://img.example.com/first.png", 1),
        pending(21, "https://img.example.com/second.png", 2),
    ];

    let reconciler = ImageReconciler::new(
        FakeFetcher,
        store,
        temp_dir.path().to_path_buf(),
        Duration::from_secs(1),
    );
    let start = tokio::time::Instant::now();
    let summary = reconciler.run().await.unwrap();

    assert_eq!(summary.downloaded, 2);
    assert!(start.elapsed() >= Duration::from_secs(2));
}
