use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use catalog_core::ProductId;
use catalog_events::{EventKind, InMemoryQueue, QueueTransport};
use catalog_infra::{ConsumerConfig, EventPublisher, QueueConsumer, QueuePublisher, Shutdown};
use catalog_notifications::{NotificationService, app, registry};

fn fast_config() -> ConsumerConfig {
    ConsumerConfig::default()
        .with_wait_time(Duration::from_millis(20))
        .with_retry_delay(Duration::from_millis(10))
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn published_events_are_reported_and_acknowledged() {
    let queue = Arc::new(InMemoryQueue::new());
    let publisher = QueuePublisher::new(queue.clone());
    let service = Arc::new(NotificationService::new());
    let consumer = QueueConsumer::new(
        queue.clone(),
        Arc::new(registry(service.clone())),
        fast_config(),
    );
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let run = tokio::spawn(async move { consumer.run(rx).await });

    let id = ProductId::new();
    publisher.publish(EventKind::Created, id).await.unwrap();
    publisher.publish(EventKind::Deleted, id).await.unwrap();
    // Delivered out of band by some other producer; must not wedge the consumer.
    queue.send(b"{\"event_type\":42}".to_vec()).await.unwrap();

    eventually(|| queue.is_empty()).await;
    shutdown.trigger();
    let report = run.await.unwrap();

    assert_eq!(service.created_count(), 1);
    assert_eq!(service.deleted_count(), 1);
    assert_eq!(report.completed, 2);
    assert_eq!(report.discarded, 1);
}

#[tokio::test]
async fn health_reports_service_name() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app::build_app()).await.unwrap();
    });

    let res = reqwest::get(format!("http://{addr}{}/health", app::API_PREFIX))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "notifications-service");

    handle.abort();
}
