// tests/webhook_dispatch.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use rhys_monitor::config::ChatSettings;
use rhys_monitor::notify::{Dispatcher, Notifier, SlackNotifier};
use rhys_monitor::storage::MemoryKvStore;
use rhys_monitor::{Channel, Monitor};

#[tokio::test]
async fn chat_only_config_has_no_email_outcome() {
    let (url, received) = spawn_webhook(StatusCode::OK).await;
    let mut cfg = test_config();
    cfg.chat.webhook_url = Some(url);

    let monitor = Monitor::new(cfg, Arc::new(feed_fetcher()), Arc::new(MemoryKvStore::new()));
    let report = monitor.run_once().await;

    assert!(report.succeeded);
    assert!(report.outcome(Channel::Email).is_none());
    assert_eq!(report.email_sent, None);
    assert_eq!(report.notification_outcomes.len(), 1);
    assert!(report.outcome(Channel::Chat).unwrap().succeeded);

    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    let text = bodies[0]["text"].as_str().unwrap();
    assert!(text.starts_with("🏇 *New Rhys Williams Tips* (2 posts):"));
    assert!(text.contains(&format!("<{L1}|Read More>")));
    assert_eq!(bodies[0]["icon_emoji"], ":horse_racing:");
}

#[tokio::test]
async fn webhook_500_fails_chat_while_sibling_succeeds() {
    let (url, _received) = spawn_webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
    let slack = Arc::new(SlackNotifier::new(
        ChatSettings {
            webhook_url: url,
            username: "Rhys Williams Monitor".into(),
            icon_emoji: ":horse_racing:".into(),
        },
        "Rhys Williams",
        Duration::from_secs(5),
    ));
    let email = Recording::ok(Channel::Email);
    let dispatcher = Dispatcher::new(vec![email.clone(), slack]);

    let monitor = Monitor::new(test_config(), Arc::new(feed_fetcher()), Arc::new(MemoryKvStore::new()))
        .with_dispatcher(dispatcher);
    let report = monitor.run_once().await;

    assert!(report.succeeded, "partial channel failure is still a successful run");
    let chat = report.outcome(Channel::Chat).unwrap();
    assert!(!chat.succeeded);
    let detail = chat.error_detail.as_deref().unwrap();
    assert!(detail.contains("HTTP 500"), "detail: {detail}");
    assert!(detail.contains("internal_error"), "detail: {detail}");
    assert!(report.outcome(Channel::Email).unwrap().succeeded);
    assert_eq!(report.slack_sent, Some(false));
    assert_eq!(report.email_sent, Some(true));
    assert!(report.seen_set_updated);
}

#[tokio::test]
async fn unreachable_webhook_is_a_failed_outcome() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let slack = SlackNotifier::new(
        ChatSettings {
            webhook_url: format!("http://{addr}/hook"),
            username: "Monitor".into(),
            icon_emoji: ":horse:".into(),
        },
        "Rhys Williams",
        Duration::from_secs(2),
    );
    assert_eq!(slack.channel(), Channel::Chat);
    let err = slack.send(&[]).await.unwrap_err();
    assert!(format!("{err:#}").contains("slack post"));
}
