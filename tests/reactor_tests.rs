//! Cleanup worker behavior: deferred cascades, idempotent replays,
//! scheduling and backoff. Everything drives the worker by hand through
//! `run_once`/`drain`, never the background loop, so each pass is
//! deterministic.

mod common;

use art_gallery::models::album::Visibility;
use art_gallery::models::art::ArtKey;
use art_gallery::services::presign::{album_cover_key, art_image_key};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use common::{TestApp, create_test_app, seed_album, seed_arts, seed_user};
use futures::stream;
use std::io;
use uuid::Uuid;

const ALICE: &str = "auth0|alice";

async fn put_media(test: &TestApp, key: &str, bytes: &'static [u8]) {
    let chunks = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(bytes))]);
    test.state
        .media
        .store_object_stream(key, Some("image/png".into()), chunks)
        .await
        .expect("store media object");
}

async fn scalar_i64(test: &TestApp, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(&*test.state.db)
        .await
        .expect("scalar query")
}

async fn enqueue_event(test: &TestApp, album_id: Uuid, art_id: Option<Uuid>, due: DateTime<Utc>) {
    sqlx::query(
        "INSERT INTO record_removals (album_id, art_id, created_at, next_attempt_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(album_id)
    .bind(art_id)
    .bind(Utc::now())
    .bind(due)
    .execute(&*test.state.db)
    .await
    .expect("insert removal event");
}

#[tokio::test]
async fn album_delete_cascades_arts_and_media() {
    let test = create_test_app().await;
    seed_user(&test.state, ALICE, "Alice").await;
    let album = seed_album(&test.state, ALICE, Visibility::Public, "Doomed").await;
    let arts = seed_arts(&test.state, ALICE, album.album_id, 3).await;

    put_media(&test, &album_cover_key(album.album_id), b"cover").await;
    for art in &arts {
        put_media(&test, &art_image_key(album.album_id, art.art_id), b"image").await;
    }

    test.state
        .gallery
        .delete_album(ALICE, album.album_id)
        .await
        .expect("delete album");

    // The request only removed the album row; art rows and media wait for
    // the worker.
    assert_eq!(scalar_i64(&test, "SELECT COUNT(*) FROM albums").await, 0);
    assert_eq!(scalar_i64(&test, "SELECT COUNT(*) FROM arts").await, 3);
    assert_eq!(
        scalar_i64(&test, "SELECT COUNT(*) FROM media_objects").await,
        4
    );

    // One album event, which fans out into three art events.
    let handled = test.worker.drain().await.expect("drain feed");
    assert_eq!(handled, 4);

    assert_eq!(scalar_i64(&test, "SELECT COUNT(*) FROM arts").await, 0);
    assert_eq!(
        scalar_i64(&test, "SELECT COUNT(*) FROM media_objects").await,
        0
    );
    assert!(!test.media_root.path().join(album.album_id.to_string()).exists());
    assert_eq!(
        scalar_i64(
            &test,
            "SELECT COUNT(*) FROM record_removals WHERE processed_at IS NULL"
        )
        .await,
        0
    );
    assert_eq!(
        scalar_i64(&test, "SELECT COUNT(*) FROM record_removals").await,
        4
    );
}

#[tokio::test]
async fn art_delete_removes_only_that_image() {
    let test = create_test_app().await;
    seed_user(&test.state, ALICE, "Alice").await;
    let album = seed_album(&test.state, ALICE, Visibility::Public, "Gallery").await;
    let arts = seed_arts(&test.state, ALICE, album.album_id, 2).await;

    let first_key = art_image_key(album.album_id, arts[0].art_id);
    let second_key = art_image_key(album.album_id, arts[1].art_id);
    put_media(&test, &first_key, b"first").await;
    put_media(&test, &second_key, b"second").await;

    test.state
        .gallery
        .delete_arts(
            ALICE,
            vec![ArtKey {
                album_id: album.album_id,
                art_id: arts[0].art_id,
            }],
        )
        .await
        .expect("delete art");

    let handled = test.worker.drain().await.expect("drain feed");
    assert_eq!(handled, 1);

    let media_dir = test.media_root.path();
    let mut first_path = media_dir.to_path_buf();
    first_path.extend(first_key.split('/'));
    let mut second_path = media_dir.to_path_buf();
    second_path.extend(second_key.split('/'));

    assert!(!first_path.exists());
    assert!(second_path.exists());
    assert_eq!(scalar_i64(&test, "SELECT COUNT(*) FROM arts").await, 1);
    assert_eq!(
        scalar_i64(&test, "SELECT COUNT(*) FROM media_objects").await,
        1
    );
}

#[tokio::test]
async fn replayed_events_are_harmless() {
    let test = create_test_app().await;
    seed_user(&test.state, ALICE, "Alice").await;
    let album = seed_album(&test.state, ALICE, Visibility::Public, "Replayed").await;
    let arts = seed_arts(&test.state, ALICE, album.album_id, 1).await;

    test.state
        .gallery
        .delete_album(ALICE, album.album_id)
        .await
        .expect("delete album");
    test.worker.drain().await.expect("first drain");

    // Duplicate events for records that are long gone, as after a crash
    // between processing and marking done.
    enqueue_event(&test, album.album_id, None, Utc::now()).await;
    enqueue_event(&test, album.album_id, Some(arts[0].art_id), Utc::now()).await;

    let handled = test.worker.drain().await.expect("replay drain");
    assert_eq!(handled, 2);
    assert_eq!(
        scalar_i64(
            &test,
            "SELECT COUNT(*) FROM record_removals WHERE processed_at IS NULL"
        )
        .await,
        0
    );
}

#[tokio::test]
async fn future_events_are_left_alone() {
    let test = create_test_app().await;
    let album_id = Uuid::new_v4();
    enqueue_event(&test, album_id, None, Utc::now() + Duration::hours(1)).await;

    let handled = test.worker.run_once().await.expect("run once");
    assert_eq!(handled, 0);
    assert_eq!(
        scalar_i64(
            &test,
            "SELECT COUNT(*) FROM record_removals WHERE processed_at IS NULL"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn idle_feed_drains_to_zero() {
    let test = create_test_app().await;
    assert_eq!(test.worker.drain().await.expect("drain"), 0);
}

#[tokio::test]
async fn sweep_drops_only_stale_processed_events() {
    let test = create_test_app().await;
    let stale_album = Uuid::new_v4();
    let fresh_album = Uuid::new_v4();

    enqueue_event(&test, stale_album, None, Utc::now()).await;
    enqueue_event(&test, fresh_album, None, Utc::now()).await;
    enqueue_event(
        &test,
        fresh_album,
        Some(Uuid::new_v4()),
        Utc::now() + Duration::hours(1),
    )
    .await;

    // One processed row well past the retention window, one processed
    // moments ago, one still pending.
    sqlx::query("UPDATE record_removals SET processed_at = ? WHERE album_id = ?")
        .bind(Utc::now() - Duration::days(10))
        .bind(stale_album)
        .execute(&*test.state.db)
        .await
        .expect("age stale event");
    sqlx::query("UPDATE record_removals SET processed_at = ? WHERE album_id = ? AND art_id IS NULL")
        .bind(Utc::now())
        .bind(fresh_album)
        .execute(&*test.state.db)
        .await
        .expect("finish fresh event");

    let swept = test.worker.sweep_processed().await.expect("sweep");
    assert_eq!(swept, 1);

    // The fresh row and the pending event both survive.
    assert_eq!(
        scalar_i64(&test, "SELECT COUNT(*) FROM record_removals").await,
        2
    );
    assert_eq!(
        scalar_i64(
            &test,
            "SELECT COUNT(*) FROM record_removals WHERE processed_at IS NULL"
        )
        .await,
        1
    );
}

#[tokio::test]
async fn failing_event_backs_off_then_abandons() {
    let test = create_test_app().await;
    seed_user(&test.state, ALICE, "Alice").await;
    let album = seed_album(&test.state, ALICE, Visibility::Public, "Stuck").await;
    let arts = seed_arts(&test.state, ALICE, album.album_id, 1).await;
    let key = art_image_key(album.album_id, arts[0].art_id);
    put_media(&test, &key, b"pinned").await;

    test.state
        .gallery
        .delete_arts(
            ALICE,
            vec![ArtKey {
                album_id: album.album_id,
                art_id: arts[0].art_id,
            }],
        )
        .await
        .expect("delete art");

    // A non-empty directory planted at the payload path makes the unlink
    // fail even for a privileged caller that permission bits cannot stop.
    let mut image_path = test.media_root.path().to_path_buf();
    image_path.extend(key.split('/'));
    std::fs::remove_file(&image_path).expect("drop payload");
    std::fs::create_dir(&image_path).expect("plant directory");
    std::fs::write(image_path.join("pin"), b"x").expect("fill directory");

    let handled = test.worker.run_once().await.expect("failing pass");
    assert_eq!(handled, 1);

    let (attempts, next_attempt_at): (i64, DateTime<Utc>) = sqlx::query_as(
        "SELECT attempts, next_attempt_at FROM record_removals WHERE processed_at IS NULL",
    )
    .fetch_one(&*test.state.db)
    .await
    .expect("pending event");
    assert_eq!(attempts, 1);
    assert!(next_attempt_at > Utc::now());

    // Nothing is due until the backoff elapses.
    assert_eq!(test.worker.run_once().await.expect("idle pass"), 0);

    // Fast-forward to the final allowed attempt; still failing, so the
    // event is abandoned rather than retried forever.
    sqlx::query("UPDATE record_removals SET attempts = 4, next_attempt_at = ?")
        .bind(Utc::now() - Duration::seconds(1))
        .execute(&*test.state.db)
        .await
        .expect("fast-forward event");

    let handled = test.worker.run_once().await.expect("abandoning pass");
    assert_eq!(handled, 1);
    assert_eq!(
        scalar_i64(
            &test,
            "SELECT COUNT(*) FROM record_removals WHERE processed_at IS NULL"
        )
        .await,
        0
    );
    assert_eq!(
        scalar_i64(
            &test,
            "SELECT COUNT(*) FROM record_removals WHERE attempts = 5"
        )
        .await,
        1
    );

    // The stuck entry is still on disk; abandonment never force-removes.
    assert!(image_path.is_dir());
}
