//! Integration tests for the scheduler and dispatcher

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{setup, setup_with, RecordingMailer};
use post_office::mail::{EmailRequest, EmailStatus, EnqueueRequest};
use post_office::queue::DispatchOutcome;
use post_office::store::Store;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn request(to: &str, priority: &str) -> EnqueueRequest {
    EnqueueRequest {
        subject: to.to_string(),
        message: "Hello".to_string(),
        recipients: vec![to.to_string()],
        priority: Some(priority.to_string()),
        ..EnqueueRequest::default()
    }
}

#[tokio::test]
async fn test_priority_then_fifo_order() {
    let test = setup().await;
    let outbox = &test.post_office.outbox;

    for (to, priority) in [
        ("low1@example.com", "low"),
        ("high1@example.com", "high"),
        ("medium1@example.com", "medium"),
        ("high2@example.com", "high"),
        ("low2@example.com", "low"),
    ] {
        outbox.enqueue(request(to, priority)).await.unwrap();
    }

    let summary = test.post_office.scheduler.run_once().await.unwrap();
    assert_eq!(summary.sent, 5);

    let order: Vec<String> = test.mailer.sent().into_iter().map(|m| m.subject).collect();
    assert_eq!(
        order,
        vec![
            "high1@example.com",
            "high2@example.com",
            "medium1@example.com",
            "low1@example.com",
            "low2@example.com",
        ]
    );
}

#[tokio::test]
async fn test_scheduled_emails_wait() {
    let test = setup().await;
    let outbox = &test.post_office.outbox;

    let mut later = request("later@example.com", "high");
    later.scheduled_time = Some(Utc::now() + ChronoDuration::hours(1));
    let later = outbox.enqueue(later).await.unwrap().remove(0);

    let mut past = request("past@example.com", "low");
    past.scheduled_time = Some(Utc::now() - ChronoDuration::minutes(5));
    outbox.enqueue(past).await.unwrap();

    let summary = test.post_office.scheduler.run_once().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(test.mailer.sent()[0].subject, "past@example.com");

    let later = test.post_office.store.get_email(later.id).await.unwrap().unwrap();
    assert_eq!(later.status, Some(EmailStatus::Queued));
}

#[tokio::test]
async fn test_batch_size_limits_a_pass() {
    let test = setup_with(RecordingMailer::new(), |config| {
        config.queue.batch_size = Some(2);
    })
    .await;

    for i in 0..5 {
        test.post_office
            .outbox
            .enqueue(request(&format!("user{}@example.com", i), "medium"))
            .await
            .unwrap();
    }

    assert_eq!(test.post_office.scheduler.run_once().await.unwrap().sent, 2);
    assert_eq!(test.post_office.scheduler.run_once().await.unwrap().sent, 2);
    assert_eq!(test.post_office.scheduler.run_once().await.unwrap().sent, 1);
    assert_eq!(test.post_office.scheduler.run_once().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_workers_send_each_email_once() {
    let test = setup_with(RecordingMailer::slow(Duration::from_millis(5)), |config| {
        config.queue.workers = 4;
        config.database.max_connections = 4;
    })
    .await;

    let recipients: Vec<String> = (0..20).map(|i| format!("user{}@example.com", i)).collect();
    test.post_office
        .outbox
        .enqueue(EnqueueRequest {
            subject: "Hello".to_string(),
            recipients: recipients.clone(),
            ..EnqueueRequest::default()
        })
        .await
        .unwrap();

    let summary = test.post_office.scheduler.run_once().await.unwrap();
    assert_eq!(summary.sent, 20);

    let mut sent: Vec<String> = test
        .mailer
        .sent()
        .into_iter()
        .flat_map(|message| message.to)
        .collect();
    sent.sort();
    let mut expected = recipients;
    expected.sort();
    assert_eq!(sent, expected);
    assert_eq!(test.log_count().await, 20);
}

#[tokio::test]
async fn test_concurrent_dispatch_of_one_email() {
    let test = setup_with(RecordingMailer::slow(Duration::from_millis(20)), |config| {
        config.database.max_connections = 8;
    })
    .await;

    let email = test
        .post_office
        .outbox
        .send(EmailRequest {
            to: vec!["ada@example.com".to_string()],
            subject: "Once".to_string(),
            ..EmailRequest::default()
        })
        .await
        .unwrap();

    let id = email.id;
    let dispatcher = test.post_office.outbox.dispatcher();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move { dispatcher.dispatch(id).await }));
    }

    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap().unwrap());
    }

    let sent = outcomes.iter().filter(|o| **o == DispatchOutcome::Sent).count();
    let skipped = outcomes.iter().filter(|o| **o == DispatchOutcome::Skipped).count();
    assert_eq!(sent, 1);
    assert_eq!(skipped, 7);
    assert_eq!(test.mailer.sent_count(), 1);
    assert_eq!(test.post_office.store.email_logs(email.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recover_releases_stale_claims() {
    let test = setup_with(RecordingMailer::new(), |config| {
        config.queue.claim_timeout_secs = -1;
    })
    .await;

    let email = test
        .post_office
        .outbox
        .enqueue(request("ada@example.com", "medium"))
        .await
        .unwrap()
        .remove(0);

    // A worker died holding the claim
    assert!(test.post_office.store.claim_email(email.id, "dead").await.unwrap());
    assert_eq!(test.post_office.scheduler.run_once().await.unwrap().total(), 0);

    assert_eq!(test.post_office.scheduler.recover().await.unwrap(), 1);
    assert_eq!(test.post_office.scheduler.run_once().await.unwrap().sent, 1);
}

#[tokio::test]
async fn test_outcome_dropped_after_claim_is_released() {
    let test = setup_with(RecordingMailer::slow(Duration::from_millis(300)), |config| {
        config.queue.claim_timeout_secs = -1;
    })
    .await;

    let email = test
        .post_office
        .outbox
        .enqueue(request("ada@example.com", "medium"))
        .await
        .unwrap()
        .remove(0);

    let id = email.id;
    let dispatcher = test.post_office.outbox.dispatcher();
    let stuck = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.dispatch(id).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Another process starts up and takes over the claim
    assert_eq!(test.post_office.scheduler.recover().await.unwrap(), 1);
    let retried = dispatcher.dispatch(id).await.unwrap();

    assert_eq!(stuck.await.unwrap().unwrap(), DispatchOutcome::Skipped);
    assert_eq!(retried, DispatchOutcome::Sent);

    let logs = test.post_office.store.email_logs(id).await.unwrap();
    assert_eq!(logs.len(), 1);
    let email = test.post_office.store.get_email(id).await.unwrap().unwrap();
    assert_eq!(email.status, Some(EmailStatus::Sent));
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let test = setup_with(RecordingMailer::new(), |config| {
        config.queue.idle_interval_secs = 3600;
        config.queue.poll_interval_secs = 3600;
    })
    .await;

    test.post_office
        .outbox
        .enqueue(request("ada@example.com", "medium"))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    let mailer = test.mailer.clone();
    tokio::spawn(async move {
        while mailer.sent_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        stopper.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), test.post_office.scheduler.run(shutdown))
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(test.mailer.sent_count(), 1);
}
