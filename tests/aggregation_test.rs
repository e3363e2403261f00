//! End to end: dispatch through both broker variants, collect into the
//! in-memory repository.

mod common;

use common::{completed_task, wait_until, MockSite, RecordingListener};
use feasibility_core::broker::dsf::ChannelNotificationSource;
use feasibility_core::broker::{
    BrokerClient, DirectBrokerClient, DsfBrokerClient, QueryStatusListener, QueryStatusUpdate,
};
use feasibility_core::collect::{QueryResultReader, QueryStatusCollector};
use feasibility_core::config::DsfBrokerConfig;
use feasibility_core::database::{FeasibilityRepository, InMemoryFeasibilityRepository};
use feasibility_core::dispatch::QueryDispatcher;
use feasibility_core::models::{NewQuery, NewQueryDispatch};
use feasibility_core::{BrokerType, QueryStatus, ResultType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Harness {
    repository: Arc<InMemoryFeasibilityRepository>,
    collector: Arc<QueryStatusCollector>,
    dispatcher: QueryDispatcher,
    frames: mpsc::Sender<String>,
    site: MockSite,
}

async fn harness(direct_body: &str) -> Harness {
    let site = MockSite::start(200, direct_body).await;
    let repository = Arc::new(InMemoryFeasibilityRepository::new());
    let collector = Arc::new(QueryStatusCollector::new(repository.clone()));

    let (source, frames) = ChannelNotificationSource::new(16);
    let mut dsf_config = DsfBrokerConfig::default();
    dsf_config
        .site_names
        .insert("org-a".to_string(), "Site A".to_string());

    let brokers: Vec<Arc<dyn BrokerClient>> = vec![
        Arc::new(DirectBrokerClient::new(site.broker_config()).unwrap()),
        Arc::new(DsfBrokerClient::new(dsf_config, Arc::new(source))),
    ];
    let dispatcher = QueryDispatcher::new(repository.clone(), brokers, collector.clone())
        .await
        .unwrap();

    Harness {
        repository,
        collector,
        dispatcher,
        frames,
        site,
    }
}

fn dsf_query_id(report: &feasibility_core::DispatchReport) -> String {
    report
        .brokers
        .iter()
        .find(|b| b.broker_type == BrokerType::Dsf)
        .and_then(|b| b.broker_query_id.clone())
        .expect("dsf dispatch")
}

#[tokio::test]
async fn test_results_from_both_brokers_are_persisted() {
    let h = harness("100").await;

    let report = h.dispatcher.dispatch(r#"{"version":"1"}"#).await.unwrap();
    assert_eq!(report.published_count(), 2);
    assert_eq!(report.failures().count(), 0);

    // direct outcome is persisted before dispatch returns
    assert_eq!(h.repository.all_results().len(), 1);

    let dsf_id = dsf_query_id(&report);
    h.frames.send(completed_task(&dsf_id, "org-a", 20)).await.unwrap();
    h.frames.send(completed_task(&dsf_id, "org-b", 3)).await.unwrap();
    wait_until(|| h.collector.stats().results_persisted == 3).await;

    let summary = QueryResultReader::new(h.repository.clone())
        .results_for_query(report.query_id)
        .await
        .unwrap();
    assert_eq!(summary.total_matches_in_population, 123);
    assert_eq!(summary.successful_sites, 3);

    let mut names: Vec<_> = summary.sites.iter().map(|s| s.site_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["FHIR Server", "Site A", "org-b"]);

    h.site.stop().await;
}

#[tokio::test]
async fn test_duplicate_site_results_yield_one_row() {
    let h = harness("1").await;
    let report = h.dispatcher.dispatch("{}").await.unwrap();
    let dsf_id = dsf_query_id(&report);

    h.frames.send(completed_task(&dsf_id, "org-a", 5)).await.unwrap();
    h.frames.send(completed_task(&dsf_id, "org-a", 6)).await.unwrap();
    wait_until(|| h.collector.stats().duplicates_dropped == 1).await;

    let rows: Vec<_> = h
        .repository
        .all_results()
        .into_iter()
        .filter(|r| r.result_type == ResultType::Success && r.result != Some(1))
        .collect();
    assert_eq!(rows.len(), 1);
    // first result wins
    assert_eq!(rows[0].result, Some(5));

    h.site.stop().await;
}

#[tokio::test]
async fn test_failed_direct_site_is_persisted_as_error() {
    let h = harness("garbage").await;
    let report = h.dispatcher.dispatch("{}").await.unwrap();

    let results = h.repository.all_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].query_id, report.query_id);
    assert_eq!(results[0].result_type, ResultType::Error);
    assert_eq!(results[0].result, None);

    h.site.stop().await;
}

#[tokio::test]
async fn test_site_shared_across_queries_is_created_once() {
    let h = harness("4").await;
    h.dispatcher.dispatch("{}").await.unwrap();
    h.dispatcher.dispatch("{}").await.unwrap();

    let sites = h.repository.all_sites();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].site_name, "FHIR Server");
    assert_eq!(h.repository.all_results().len(), 2);

    h.site.stop().await;
}

/// Repository holding one query already dispatched to DSF as `broker_query_id`
async fn repository_with_dsf_dispatch(
    broker_query_id: &str,
) -> (Arc<InMemoryFeasibilityRepository>, i64) {
    let repository = Arc::new(InMemoryFeasibilityRepository::new());
    let query = repository.save_query(NewQuery::new("{}")).await.unwrap();
    repository
        .save_dispatch(NewQueryDispatch::new(query.id, broker_query_id, BrokerType::Dsf))
        .await
        .unwrap();
    (repository, query.id)
}

#[tokio::test]
async fn test_result_for_earlier_dispatch_is_persisted_by_fresh_collector() {
    let (repository, query_id) = repository_with_dsf_dispatch("ext-1").await;

    // a collector process that never created the broker query itself
    let (source, frames) = ChannelNotificationSource::new(4);
    let dsf = DsfBrokerClient::new(DsfBrokerConfig::default(), Arc::new(source));
    let collector = Arc::new(QueryStatusCollector::new(repository.clone()));
    dsf.add_query_status_listener(collector.clone()).await.unwrap();

    frames.send(completed_task("ext-1", "org-a", 42)).await.unwrap();
    wait_until(|| collector.stats().results_persisted == 1).await;

    let results = repository.all_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].query_id, query_id);
    assert_eq!(results[0].result_type, ResultType::Success);
    assert_eq!(results[0].result, Some(42));
}

#[tokio::test]
async fn test_result_for_undispatched_query_is_dropped_by_collector() {
    let (repository, _) = repository_with_dsf_dispatch("ext-1").await;

    let (source, frames) = ChannelNotificationSource::new(4);
    let dsf = DsfBrokerClient::new(DsfBrokerConfig::default(), Arc::new(source));
    let collector = Arc::new(QueryStatusCollector::new(repository.clone()));
    dsf.add_query_status_listener(collector.clone()).await.unwrap();

    frames.send(completed_task("never-dispatched", "org-a", 1)).await.unwrap();
    wait_until(|| collector.stats().errors_dropped == 1).await;

    assert_eq!(dsf.stats().frames_dropped, 0);
    assert_eq!(collector.stats().results_persisted, 0);
    assert!(repository.all_results().is_empty());
    assert!(repository.all_sites().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_results_from_two_sites_are_attributed() {
    let (repository, query_id) = repository_with_dsf_dispatch("ext-2").await;

    let (source, frames) = ChannelNotificationSource::new(4);
    let dsf = DsfBrokerClient::new(DsfBrokerConfig::default(), Arc::new(source));
    let (recorder, _updates) = RecordingListener::new();
    dsf.add_query_status_listener(recorder).await.unwrap();
    frames.send(completed_task("ext-2", "a", 10)).await.unwrap();
    frames.send(completed_task("ext-2", "b", 20)).await.unwrap();
    wait_until(|| dsf.stats().results_recorded == 2).await;

    let collector = QueryStatusCollector::new(repository.clone());
    let update_a = QueryStatusUpdate::new("ext-2", "a", QueryStatus::Completed);
    let update_b = QueryStatusUpdate::new("ext-2", "b", QueryStatus::Completed);
    tokio::join!(
        collector.on_client_update(&dsf, &update_a),
        collector.on_client_update(&dsf, &update_b),
    );

    assert_eq!(collector.stats().results_persisted, 2);
    let sites: HashMap<i64, String> = repository
        .all_sites()
        .into_iter()
        .map(|s| (s.id, s.site_name))
        .collect();
    assert_eq!(sites.len(), 2);

    let mut rows: Vec<(String, Option<i32>)> = repository
        .all_results()
        .into_iter()
        .inspect(|r| assert_eq!(r.query_id, query_id))
        .map(|r| (sites[&r.site_id].clone(), r.result))
        .collect();
    rows.sort();
    assert_eq!(
        rows,
        vec![("a".to_string(), Some(10)), ("b".to_string(), Some(20))]
    );
}
