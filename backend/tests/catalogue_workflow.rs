//! End-to-end catalogue flows through the wired [`Bookshelf`] backend.

use std::sync::Arc;

use bookshelf::Bookshelf;
use bookshelf::config::AppSettings;
use bookshelf::domain::catalogue::{
    ChangeBookStatus, CreateAuthor, CreateBook, DeleteBook, NOTIFY_SUBSCRIBER_JOB,
    SubscribeToAuthor, UpdateBookTitle,
};
use bookshelf::domain::ports::{CatalogueRepository, JobQueue};
use bookshelf::domain::{AuthorId, BookStatus, ErrorCode, IdempotencyKey};
use bookshelf::test_support::clock::MutableClock;
use rstest::{fixture, rstest};
use serde_json::json;

fn settings() -> AppSettings {
    AppSettings {
        idempotency_retention_hours: 48,
        sweep_interval_secs: 3600,
        health_report_interval_secs: 60,
        queue_depth_threshold: 100,
    }
}

#[fixture]
fn app() -> Bookshelf {
    Bookshelf::in_memory(&settings(), Arc::new(MutableClock::fixed())).expect("wiring")
}

async fn author(app: &Bookshelf, name: &str) -> AuthorId {
    app.dispatch(CreateAuthor {
        full_name: name.to_owned(),
    })
    .await
    .expect("author created")
    .id
}

async fn subscribe(app: &Bookshelf, author_id: AuthorId, phone: &str) {
    app.dispatch(SubscribeToAuthor {
        author_id,
        phone: phone.to_owned(),
    })
    .await
    .expect("subscribed");
}

#[rstest]
#[tokio::test]
async fn publishing_a_book_notifies_subscribers(app: Bookshelf) {
    let butler = author(&app, "Octavia E. Butler").await;
    let due = author(&app, "Tananarive Due").await;
    subscribe(&app, butler, "+44 7700 900001").await;
    subscribe(&app, due, "+44 7700 900002").await;
    let unknown = app
        .dispatch(SubscribeToAuthor {
            author_id: AuthorId::random(),
            phone: "+44 7700 900009".to_owned(),
        })
        .await
        .expect_err("unknown author");
    assert_eq!(unknown.code(), ErrorCode::NotFound);

    let book = app
        .dispatch(CreateBook {
            title: "Bloodchild".to_owned(),
            isbn: None,
            year: Some(1995),
            author_ids: vec![butler, due],
        })
        .await
        .expect("book created");
    assert_eq!(app.queue().depth().await.expect("depth"), 0);

    let published = app
        .dispatch(ChangeBookStatus {
            book_id: book.id,
            status: BookStatus::Published,
        })
        .await
        .expect("published");

    assert_eq!(published.status, BookStatus::Published);
    let jobs = app.queue().pending().expect("jobs");
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.kind == NOTIFY_SUBSCRIBER_JOB));
    let phones: Vec<_> = jobs
        .iter()
        .filter_map(|job| job.payload.get("phone").and_then(|p| p.as_str()))
        .collect();
    assert!(phones.contains(&"+44 7700 900001"));
    assert!(phones.contains(&"+44 7700 900002"));
    assert!(
        jobs.iter()
            .all(|job| job.payload.get("title") == Some(&json!("Bloodchild")))
    );
}

#[rstest]
#[tokio::test]
async fn retried_command_replays_without_duplicating(app: Bookshelf) {
    let key = IdempotencyKey::new("create-le-guin").expect("key");
    let command = CreateAuthor {
        full_name: "Ursula K. Le Guin".to_owned(),
    };

    let first = app
        .dispatch_with_key(command.clone(), key.clone())
        .await
        .expect("first");
    let retry = app.dispatch_with_key(command, key).await.expect("retry");

    assert_eq!(first, retry);
    assert_eq!(app.transactions().committed(), 1);
    assert_eq!(app.metrics().totals().hits, 1);
    assert_eq!(app.metrics().totals().misses, 1);
}

#[rstest]
#[tokio::test]
async fn repeated_payloads_without_a_key_each_take_effect(app: Bookshelf) {
    let first = author(&app, "Octavia E. Butler").await;
    let namesake = author(&app, "Octavia E. Butler").await;
    assert_ne!(first, namesake);

    let book = app
        .dispatch(CreateBook {
            title: "Kindred".to_owned(),
            isbn: None,
            year: Some(1979),
            author_ids: vec![first],
        })
        .await
        .expect("book created");
    for title in ["Fledgling", "Kindred", "Fledgling"] {
        let renamed = app
            .dispatch(UpdateBookTitle {
                book_id: book.id,
                title: title.to_owned(),
            })
            .await
            .expect("renamed");
        assert_eq!(renamed.title, title);
    }

    let stored = app
        .repository()
        .find_book(&book.id)
        .await
        .expect("read")
        .expect("book kept");
    assert_eq!(stored.title, "Fledgling");
    assert_eq!(app.transactions().committed(), 6);
}

#[rstest]
#[tokio::test]
async fn rejected_transition_changes_nothing(app: Bookshelf) {
    let butler = author(&app, "Octavia E. Butler").await;
    subscribe(&app, butler, "+44 7700 900001").await;
    let book = app
        .dispatch(CreateBook {
            title: "Kindred".to_owned(),
            isbn: None,
            year: Some(1979),
            author_ids: vec![butler],
        })
        .await
        .expect("book created");

    let err = app
        .dispatch(ChangeBookStatus {
            book_id: book.id,
            status: BookStatus::Archived,
        })
        .await
        .expect_err("draft cannot be archived");

    assert_eq!(err.code(), ErrorCode::Conflict);
    let stored = app
        .repository()
        .find_book(&book.id)
        .await
        .expect("read")
        .expect("book kept");
    assert_eq!(stored.status, BookStatus::Draft);
    assert_eq!(app.queue().depth().await.expect("depth"), 0);
    assert_eq!(app.transactions().rolled_back(), 1);
}

#[rstest]
#[tokio::test]
async fn renaming_and_deleting_a_book(app: Bookshelf) {
    let butler = author(&app, "Octavia E. Butler").await;
    let book = app
        .dispatch(CreateBook {
            title: "Psychogenesis".to_owned(),
            isbn: None,
            year: None,
            author_ids: vec![butler],
        })
        .await
        .expect("book created");

    let renamed = app
        .dispatch(UpdateBookTitle {
            book_id: book.id,
            title: "Mind of My Mind".to_owned(),
        })
        .await
        .expect("renamed");
    assert_eq!(renamed.title, "Mind of My Mind");

    app.dispatch(DeleteBook { book_id: book.id })
        .await
        .expect("deleted");
    let again = app
        .dispatch(DeleteBook { book_id: book.id })
        .await
        .expect_err("already gone");

    assert_eq!(again.code(), ErrorCode::NotFound);
    assert_eq!(app.repository().book_count(), 0);
}

#[rstest]
#[tokio::test]
async fn wired_health_reflects_readiness(app: Bookshelf) {
    assert!(!app.health().run().await.healthy);

    app.health_state().mark_ready();
    let report = app.health().run().await;

    assert!(report.healthy, "report: {report:?}");
    assert_eq!(
        app.health().check_names(),
        ["process", "idempotency_store", "job_queue"]
    );
}
