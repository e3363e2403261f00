//! DSF broker fed through an in-process push channel.

mod common;

use common::{completed_task, next_update, wait_until, RecordingListener};
use feasibility_core::broker::dsf::ChannelNotificationSource;
use feasibility_core::broker::{BrokerClient, DsfBrokerClient};
use feasibility_core::config::DsfBrokerConfig;
use feasibility_core::constants::media_types;
use feasibility_core::{BrokerType, QueryStatus};
use std::sync::Arc;
use tokio::sync::mpsc;

async fn published_client() -> (DsfBrokerClient, mpsc::Sender<String>, String) {
    let (source, frames) = ChannelNotificationSource::new(16);
    let mut config = DsfBrokerConfig::default();
    config
        .site_names
        .insert("org-a".to_string(), "Site A".to_string());
    let client = DsfBrokerClient::new(config, Arc::new(source));

    let id = client.create_query(1).await.unwrap();
    client
        .add_query_definition(&id, media_types::STRUCTURED_QUERY, "{}")
        .await
        .unwrap();
    (client, frames, id)
}

#[tokio::test]
async fn test_channel_established_on_first_listener() {
    let (client, _frames, _id) = published_client().await;
    assert!(!client.is_listening());

    let (listener, _updates) = RecordingListener::new();
    client.add_query_status_listener(listener).await.unwrap();
    assert!(client.is_listening());

    // a second listener reuses the channel
    let (second, _updates) = RecordingListener::new();
    client.add_query_status_listener(second).await.unwrap();
    assert!(client.is_listening());
}

#[tokio::test]
async fn test_each_site_gets_its_own_result() {
    let (client, frames, id) = published_client().await;
    let (listener, mut updates) = RecordingListener::new();
    client.add_query_status_listener(listener).await.unwrap();
    client.publish_query(&id).await.unwrap();

    frames.send(completed_task(&id, "org-b", 7)).await.unwrap();
    frames.send(completed_task(&id, "org-a", 12)).await.unwrap();

    let (broker_type, first) = next_update(&mut updates).await;
    let (_, second) = next_update(&mut updates).await;
    assert_eq!(broker_type, BrokerType::Dsf);
    assert_eq!((first.site_id.as_str(), first.status), ("org-b", QueryStatus::Completed));
    assert_eq!((second.site_id.as_str(), second.status), ("org-a", QueryStatus::Completed));

    assert_eq!(client.get_result_feasibility(&id, "org-a").await.unwrap(), 12);
    assert_eq!(client.get_result_feasibility(&id, "org-b").await.unwrap(), 7);
    assert_eq!(
        client.get_result_site_ids(&id).await.unwrap(),
        vec!["org-b", "org-a"]
    );
    assert_eq!(client.get_site_name("org-a").await.unwrap(), "Site A");
    assert_eq!(client.get_site_name("org-b").await.unwrap(), "org-b");
}

#[tokio::test]
async fn test_malformed_frames_are_dropped_silently() {
    let (client, frames, id) = published_client().await;
    let (listener, mut updates) = RecordingListener::new();
    client.add_query_status_listener(listener).await.unwrap();
    client.publish_query(&id).await.unwrap();

    frames.send("{not json".to_string()).await.unwrap();
    frames
        .send(r#"{"resourceType":"Task","status":"in-progress"}"#.to_string())
        .await
        .unwrap();
    frames.send(completed_task("unknown-query", "org-a", 3)).await.unwrap();
    frames.send(completed_task(&id, "org-a", 4)).await.unwrap();

    // both completed tasks are forwarded, the listener decides what is known
    let (_, first) = next_update(&mut updates).await;
    let (_, second) = next_update(&mut updates).await;
    assert_eq!(first.broker_query_id, "unknown-query");
    assert_eq!((second.broker_query_id.as_str(), second.site_id.as_str()), (id.as_str(), "org-a"));
    assert_eq!(second.status, QueryStatus::Completed);

    let stats = client.stats();
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.frames_dropped, 2);
    assert_eq!(stats.results_recorded, 2);
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn test_repeated_site_result_overwrites_count() {
    let (client, frames, id) = published_client().await;
    let (listener, mut updates) = RecordingListener::new();
    client.add_query_status_listener(listener).await.unwrap();
    client.publish_query(&id).await.unwrap();

    frames.send(completed_task(&id, "org-a", 1)).await.unwrap();
    frames.send(completed_task(&id, "org-a", 2)).await.unwrap();
    next_update(&mut updates).await;
    next_update(&mut updates).await;

    wait_until(|| client.stats().results_recorded == 2).await;
    assert_eq!(client.get_result_feasibility(&id, "org-a").await.unwrap(), 2);
    assert_eq!(client.get_result_site_ids(&id).await.unwrap(), vec!["org-a"]);
}
