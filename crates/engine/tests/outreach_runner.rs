//! Outreach ticks: pacing, skipping, error isolation and shutdown

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use leadflow_config::{BatchConfig, ScoringConfig, SequenceConfig, WorkerConfig};
use leadflow_core::{ContactAttempt, ContactChannel, LeadRecord, LeadState, LeadStatus, ManualClock};
use leadflow_engine::{BatchSelector, ContactSequenceEngine, LeadScorer, OutreachRunner};
use leadflow_persistence::{InMemoryLeadStore, SimulatedSmsTransport};
use tokio::sync::watch;

const TEMPLATE: &str = "Hi {firstName}";

struct Setup {
    store: Arc<InMemoryLeadStore>,
    sms: Arc<SimulatedSmsTransport>,
    clock: Arc<ManualClock>,
    runner: OutreachRunner,
    shutdown: watch::Sender<bool>,
}

fn setup(leads: Vec<LeadRecord>, sequence: SequenceConfig) -> Setup {
    setup_with_budget(leads, sequence, WorkerConfig::default().max_leads_per_tick)
}

fn setup_with_budget(leads: Vec<LeadRecord>, sequence: SequenceConfig, max_leads_per_tick: usize) -> Setup {
    let store = Arc::new(InMemoryLeadStore::with_leads(leads));
    let sms = Arc::new(SimulatedSmsTransport::new());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
    let engine = Arc::new(ContactSequenceEngine::new(
        store.clone(),
        sms.clone(),
        clock.clone(),
        sequence,
    ));
    let selector = Arc::new(BatchSelector::new(
        store.clone(),
        LeadScorer::new(ScoringConfig::default()),
        clock.clone(),
        BatchConfig::default(),
    ));
    let (shutdown, rx) = watch::channel(false);
    let worker = WorkerConfig {
        scopes: vec!["team-a".into()],
        message_template: TEMPLATE.into(),
        max_leads_per_tick,
        ..Default::default()
    };
    let runner = OutreachRunner::new(store.clone(), engine, clock.clone(), worker, rx).with_selector(selector);

    Setup {
        store,
        sms,
        clock,
        runner,
        shutdown,
    }
}

fn queued(id: &str, phone: &str) -> LeadRecord {
    LeadRecord::new(id, "team-a")
        .with_first_name("Sam")
        .with_phone(phone)
        .with_status(LeadStatus::Queued)
}

fn one_attempt() -> SequenceConfig {
    SequenceConfig {
        max_sms_attempts: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_tick_paces_and_skips() {
    let two_phones = queued("q1", "5551234567").with_mobile("5559876543");
    let s = setup(
        vec![
            two_phones,
            queued("q2", "5552223333"),
            LeadRecord::new("n1", "team-a").with_phone("5554445555"),
        ],
        one_attempt(),
    );

    let first = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(first.sent, 2);
    assert!(s.sms.sent_to("5554445555").is_empty());

    // q1 must wait before its second phone; q2 has nothing left but the call queue
    let second = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(second.deferred, 1);
    assert_eq!(second.call_queued, 1);
    assert_eq!(second.sent, 0);
    assert_eq!(s.store.snapshot("q2").unwrap().lead_state, LeadState::InCallQueue);

    s.clock.advance(chrono::Duration::hours(24));
    let third = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(third.sent, 1);
    assert_eq!(third.skipped, 1);
    assert_eq!(s.sms.sent_to("5559876543").len(), 1);
    assert_eq!(s.sms.sent_to("5559876543")[0].message_text, "Hi Sam");
}

fn call_queued(id: &str, phone: &str) -> LeadRecord {
    let mut lead = queued(id, phone).with_status(LeadStatus::Contacted);
    lead.lead_state = LeadState::InCallQueue;
    lead.ledger.in_call_queue = true;
    lead
}

#[tokio::test]
async fn test_waiting_leads_do_not_use_up_the_tick_budget() {
    let s = setup_with_budget(
        vec![
            call_queued("cq0", "5551110000"),
            call_queued("cq1", "5551110001"),
            queued("fresh", "5552223333"),
        ],
        SequenceConfig::default(),
        2,
    );

    let report = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(s.sms.sent_to("5552223333").len(), 1);
    assert_eq!(s.store.snapshot("fresh").unwrap().ledger.total_attempts(), 1);
    assert!(s.sms.sent_to("5551110000").is_empty());
}

#[tokio::test]
async fn test_tick_budget_caps_steps_and_email_leads_wait() {
    let mut emailed = queued("e1", "5551110000")
        .with_status(LeadStatus::Contacted)
        .with_email("e1@example.com");
    emailed.ledger.record_attempt(
        "e1",
        ContactAttempt::sent(
            ContactChannel::Sms,
            "5551110000",
            Some("primary".into()),
            Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
            None,
        ),
    );
    let s = setup_with_budget(
        vec![
            emailed,
            queued("q1", "5552220001"),
            queued("q2", "5552220002"),
            queued("q3", "5552220003"),
        ],
        one_attempt(),
        2,
    );

    let first = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(first.email_pending, 1);
    assert_eq!(first.processed, 2);
    assert!(s.sms.sent_to("5552220003").is_empty());

    // q1 and q2 move on to the call queue, q3 gets its turn
    let second = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(second.call_queued, 2);
    let third = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(third.sent, 1);
    assert_eq!(s.sms.sent_to("5552220003").len(), 1);
    assert!(s.sms.sent_to("5551110000").is_empty());
}

#[tokio::test]
async fn test_tick_counts_failures_and_responses() {
    let s = setup(
        vec![queued("q1", "5551234567"), queued("q2", "5552223333")],
        SequenceConfig::default(),
    );
    s.sms.fail_number("5551234567");

    let report = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 1);

    // a failed send does not count as contact
    assert_eq!(s.store.snapshot("q1").unwrap().status, LeadStatus::Queued);
}

#[tokio::test]
async fn test_per_lead_errors_do_not_fail_the_tick() {
    let s = setup(
        vec![queued("q1", "5551234567"), queued("q2", "5552223333")],
        SequenceConfig::default(),
    );
    s.store.force_conflicts(100);

    let report = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 2);
}

#[tokio::test]
async fn test_listing_failure_fails_the_tick() {
    let s = setup(vec![queued("q1", "5551234567")], SequenceConfig::default());
    s.store.set_offline(true);
    assert!(s.runner.run_tick("team-a", TEMPLATE).await.is_err());
}

#[tokio::test]
async fn test_shutdown_interrupts_tick_between_leads() {
    let s = setup(
        vec![queued("q1", "5551234567"), queued("q2", "5552223333")],
        SequenceConfig::default(),
    );
    s.shutdown.send(true).unwrap();

    let report = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.processed, 0);
    assert!(s.sms.messages().is_empty());
}

#[tokio::test]
async fn test_daily_batch_queues_new_leads() {
    let s = setup(
        vec![
            LeadRecord::new("n1", "team-a").with_phone("5551234567"),
            LeadRecord::new("n2", "team-a").with_phone("5552223333"),
        ],
        SequenceConfig::default(),
    );

    assert_eq!(s.runner.select_daily_batch("team-a").await.unwrap(), 2);
    assert_eq!(s.store.snapshot("n1").unwrap().status, LeadStatus::Queued);

    let report = s.runner.run_tick("team-a", TEMPLATE).await.unwrap();
    assert_eq!(report.sent, 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_on_shutdown() {
    let s = setup(
        vec![LeadRecord::new("n1", "team-a").with_phone("5551234567")],
        SequenceConfig::default(),
    );
    let Setup {
        store,
        sms,
        runner,
        shutdown,
        ..
    } = s;

    let handle = tokio::spawn(runner.run());
    tokio::time::sleep(Duration::from_secs(61)).await;
    shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("runner did not stop")
        .unwrap();

    assert!(!sms.sent_to("5551234567").is_empty());
    assert_eq!(store.snapshot("n1").unwrap().status, LeadStatus::Contacted);
}
