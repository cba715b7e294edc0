//! Daily batch selection, queueing and stabilization progress

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use leadflow_config::{BatchConfig, ScoringConfig};
use leadflow_core::{Error, LeadRecord, LeadStatus, LeadStore, ManualClock};
use leadflow_engine::{BatchSelector, LeadScorer, SelectionOptions};
use leadflow_persistence::InMemoryLeadStore;

fn rich(id: &str) -> LeadRecord {
    LeadRecord::new(id, "team-a")
        .with_name("Jane", "Doe")
        .with_title("Owner")
        .with_company("Doe Realty")
        .with_phone("5551234567")
        .with_email("jane@doerealty.com")
        .with_address("1 Main St", "Austin", "TX")
}

fn phone_only(id: &str) -> LeadRecord {
    LeadRecord::new(id, "team-a").with_phone("5550000000")
}

fn bare(id: &str) -> LeadRecord {
    LeadRecord::new(id, "team-a").with_company("Somewhere Inc")
}

fn selector(store: Arc<InMemoryLeadStore>, batch_size: usize) -> BatchSelector {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
    BatchSelector::new(
        store,
        LeadScorer::new(ScoringConfig::default()),
        clock,
        BatchConfig {
            batch_size,
            stabilization_target: 100,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_selects_highest_scores_first() {
    let store = Arc::new(InMemoryLeadStore::with_leads([
        bare("c"),
        phone_only("b"),
        rich("a"),
    ]));
    let selector = selector(store, 2);

    let batch = selector
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();

    assert_eq!(batch.lead_ids(), vec!["a", "b"]);
    assert!(batch.leads[0].score > batch.leads[1].score);
    assert_eq!(batch.leads[0].score, batch.leads[0].composite_score.total);
    assert_eq!(batch.tier_breakdown.total(), 2);
    assert_eq!(batch.day, 1);
    assert_eq!(batch.total_processed, 0);
    assert_eq!(batch.remaining_to_target, 100);

    let expected = (f64::from(batch.leads[0].score + batch.leads[1].score) / 2.0).round() as u32;
    assert_eq!(batch.average_score, expected);
}

#[tokio::test]
async fn test_equal_scores_keep_store_order() {
    let store = Arc::new(InMemoryLeadStore::with_leads([
        phone_only("p3"),
        phone_only("p1"),
        phone_only("p2"),
    ]));
    let batch = selector(store, 10)
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();
    assert_eq!(batch.lead_ids(), vec!["p3", "p1", "p2"]);
}

#[tokio::test]
async fn test_processed_leads_are_excluded_and_counted() {
    let store = Arc::new(InMemoryLeadStore::with_leads([
        rich("done-1").with_status(LeadStatus::Contacted),
        rich("done-2").with_status(LeadStatus::Responded),
        rich("done-3").with_status(LeadStatus::Invalid),
        phone_only("fresh"),
        rich("done-4").with_status(LeadStatus::Converted),
    ]));
    let mut other = phone_only("elsewhere");
    other.scope = "team-b".into();
    store.insert(other).await.unwrap();

    let batch = selector(store, 2)
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();

    assert_eq!(batch.lead_ids(), vec!["fresh"]);
    assert_eq!(batch.total_processed, 4);
    assert_eq!(batch.day, 3);
    assert_eq!(batch.remaining_to_target, 96);
}

#[tokio::test]
async fn test_empty_scope_yields_empty_batch() {
    let store = Arc::new(InMemoryLeadStore::new());
    let batch = selector(store, 5)
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();
    assert!(batch.leads.is_empty());
    assert_eq!(batch.average_score, 0);
    assert_eq!(batch.tier_breakdown.total(), 0);
}

#[tokio::test]
async fn test_option_overrides() {
    let plumber = LeadRecord::new("plumber", "team-a")
        .with_company("Acme Plumbing")
        .with_phone("5551112222");
    let store = Arc::new(InMemoryLeadStore::with_leads([phone_only("p1"), plumber]));
    let selector = selector(store, 10);

    let default = selector
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();
    let plumbing = selector
        .select_next_batch(
            "team-a",
            &SelectionOptions {
                batch_size: Some(1),
                target_industries: Some(vec!["plumbing".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(plumbing.lead_ids(), vec!["plumber"]);
    let before = default.leads.iter().find(|l| l.lead.id == "plumber").unwrap().score;
    assert_eq!(plumbing.leads[0].score, before + 15);
    assert!(plumbing.leads[0].composite_score.dimensions.situational.industry_match);
}

#[tokio::test]
async fn test_selection_validates_input() {
    let selector = selector(Arc::new(InMemoryLeadStore::new()), 5);

    let err = selector
        .select_next_batch(" ", &SelectionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = selector
        .select_next_batch(
            "team-a",
            &SelectionOptions {
                batch_size: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_store_outage_fails_whole_selection() {
    let store = Arc::new(InMemoryLeadStore::with_leads([rich("a")]));
    store.set_offline(true);
    let err = selector(store, 5)
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
}

#[tokio::test]
async fn test_mark_leads_as_queued() {
    let store = Arc::new(InMemoryLeadStore::with_leads([
        rich("a"),
        phone_only("b"),
        rich("c").with_status(LeadStatus::Contacted),
    ]));
    let selector = selector(store.clone(), 5);
    let ids: Vec<String> = ["a", "b", "a", "c", "missing"].iter().map(|s| s.to_string()).collect();

    let queued = selector.mark_leads_as_queued(&ids, None).await.unwrap();
    assert_eq!(queued, 2);

    let a = store.snapshot("a").unwrap();
    assert_eq!(a.status, LeadStatus::Queued);
    assert_eq!(a.tags, vec!["sms_queue"]);
    assert_eq!(store.snapshot("c").unwrap().status, LeadStatus::Contacted);
    assert!(store.snapshot("c").unwrap().tags.is_empty());

    // second pass changes nothing
    let writes = store.swap_count();
    let again = selector.mark_leads_as_queued(&ids, None).await.unwrap();
    assert_eq!(again, 2);
    assert_eq!(store.swap_count(), writes);

    // a new tag is added on top
    selector
        .mark_leads_as_queued(&["a".to_string()], Some("priority"))
        .await
        .unwrap();
    assert_eq!(store.snapshot("a").unwrap().tags, vec!["sms_queue", "priority"]);
}

#[tokio::test]
async fn test_mark_leads_as_queued_validates_input() {
    let selector = selector(Arc::new(InMemoryLeadStore::with_leads([rich("a")])), 5);

    let err = selector
        .mark_leads_as_queued(&["a".to_string()], Some("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = selector
        .mark_leads_as_queued(&["".to_string()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(selector.mark_leads_as_queued(&[], None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_queued_leads_leave_the_candidate_pool() {
    let store = Arc::new(InMemoryLeadStore::with_leads([rich("a"), phone_only("b")]));
    let selector = selector(store, 1);

    let first = selector
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();
    selector.mark_leads_as_queued(&first.lead_ids(), None).await.unwrap();

    let second = selector
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();
    assert_eq!(first.lead_ids(), vec!["a"]);
    assert_eq!(second.lead_ids(), vec!["b"]);
}

#[tokio::test]
async fn test_stabilization_progress() {
    let mut leads: Vec<LeadRecord> = (0..30)
        .map(|i| phone_only(&format!("q{}", i)).with_status(LeadStatus::Queued))
        .collect();
    leads.push(phone_only("new"));
    leads.push(phone_only("bad").with_status(LeadStatus::Invalid));
    let store = Arc::new(InMemoryLeadStore::with_leads(leads));

    let report = selector(store, 10).stabilization_progress("team-a").await.unwrap();
    assert_eq!(report.total_processed, 30);
    assert_eq!(report.day, 4);
    assert_eq!(report.target_total, 100);
    assert_eq!(report.percent_complete, 30);
    assert_eq!(report.days_remaining, 7);
    assert!(report.on_track);
}

#[tokio::test]
async fn test_selection_is_a_repeatable_read() {
    let store = Arc::new(InMemoryLeadStore::with_leads([
        phone_only("p1"),
        rich("r1"),
        bare("b1"),
        rich("r2"),
    ]));
    let selector = selector(store.clone(), 3);

    let first = selector
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();
    let second = selector
        .select_next_batch("team-a", &SelectionOptions::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.lead_ids(), vec!["r1", "r2", "p1"]);
    assert_eq!(store.swap_count(), 0);
}
