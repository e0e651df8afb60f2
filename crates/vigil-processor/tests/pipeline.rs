//! End-to-end pipeline scenarios against in-memory collaborators.

use std::sync::Arc;

use vigil_core::audit::{ReportedAction, ReportedState, TRANSITION_APPLIED, TRANSITION_IGNORED};
use vigil_core::effects::{AccountStore, StoreError};
use vigil_core::record::{RecordPatch, WriteCondition};
use vigil_core::{AccountState, QueueMessage, TransitionGraph};
use vigil_processor::{fetch_decoded_history, BatchProcessor, ProcessorConfig};
use vigil_testkit::{
    fraud_event, init_test_logging, queue_message, stored_record, user_action_event, ManualClock,
    MemoryAccountStore, RecordingAuditSink, RecordingMetrics,
};

const NOW_MS: i64 = 1_700_000_100_000;
const EVENT_MS: i64 = 1_700_000_000_123;
const USER: &str = "urn:acct:1";

struct Harness {
    processor: BatchProcessor,
    store: Arc<MemoryAccountStore>,
    sink: Arc<RecordingAuditSink>,
    metrics: Arc<RecordingMetrics>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    init_test_logging();
    let graph = Arc::new(TransitionGraph::builtin().unwrap());
    let store = Arc::new(MemoryAccountStore::new());
    let sink = Arc::new(RecordingAuditSink::new());
    let metrics = Arc::new(RecordingMetrics::new());
    let clock = Arc::new(ManualClock::at(NOW_MS));
    let processor = BatchProcessor::new(
        graph,
        store.clone(),
        sink.clone(),
        clock.clone(),
        metrics.clone(),
        ProcessorConfig::default(),
    );
    Harness { processor, store, sink, metrics, clock }
}

fn suspended() -> AccountState {
    AccountState { suspended: true, ..AccountState::OKAY }
}

fn blocked() -> AccountState {
    AccountState { blocked: true, ..AccountState::OKAY }
}

fn password_reset_required() -> AccountState {
    AccountState { suspended: true, reset_password: true, ..AccountState::OKAY }
}

#[tokio::test]
async fn applies_block_intervention_from_okay() {
    let h = harness();
    let message = queue_message(&fraud_event(USER, "03", EVENT_MS));

    let outcome = h.processor.process(&[message.clone()]).await;
    assert!(outcome.failed_message_ids.is_empty());

    let record = h.store.record(USER).unwrap();
    assert_eq!(record.state, blocked());
    assert_eq!(record.sent_at, Some(EVENT_MS));
    assert_eq!(record.applied_at, Some(NOW_MS));
    assert_eq!(record.updated_at, NOW_MS);
    assert_eq!(record.intervention_name.as_deref(), Some("ACCOUNT_BLOCKED"));
    assert_eq!(record.history.len(), 1);

    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_APPLIED);
    assert_eq!(audit.extensions.description, "ACCOUNT_BLOCKED");
    assert_eq!(audit.extensions.trigger.message_id, message.message_id);
    assert_eq!(audit.extensions.trigger.event_name, "TICF_ACCOUNT_INTERVENTION");
    assert_eq!(audit.extensions.account.state, ReportedState::PermanentlySuspended);
    assert_eq!(audit.extensions.account.action, None);
    let allowable: Vec<&str> = audit
        .extensions
        .allowable_interventions
        .iter()
        .map(|code| code.as_str())
        .collect();
    assert_eq!(allowable, vec!["07"]);

    assert_eq!(h.metrics.total("accounts_blocked"), 1);
    assert_eq!(h.metrics.total("published_to_egress"), 1);
}

#[tokio::test]
async fn stale_event_is_dropped_without_write() {
    let h = harness();
    h.store.insert_record(USER, stored_record(suspended(), 1_000, 1_000));
    let message = queue_message(&fraud_event(USER, "03", 900));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    let record = h.store.record(USER).unwrap();
    assert_eq!(record.state, suspended());
    assert_eq!(record.history.len(), 0);

    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_IGNORED);
    assert_eq!(audit.extensions.account.state, ReportedState::Suspended);

    let dropped = h.metrics.samples("message_dropped");
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].dimensions, vec![("reason".to_string(), "stale_event".to_string())]);
}

#[tokio::test]
async fn equal_timestamp_is_stale() {
    let h = harness();
    h.store.insert_record(USER, stored_record(suspended(), EVENT_MS, EVENT_MS));
    let message = queue_message(&fraud_event(USER, "03", EVENT_MS));

    h.processor.process(&[message]).await;
    assert_eq!(h.store.record(USER).unwrap().state, suspended());
    assert_eq!(h.sink.only().event_name, TRANSITION_IGNORED);
}

#[tokio::test]
async fn redelivery_is_idempotent() {
    let h = harness();
    let message = queue_message(&fraud_event(USER, "01", EVENT_MS));

    let first = h.processor.process(&[message.clone()]).await;
    assert!(first.failed_message_ids.is_empty());
    let after_first = h.store.record(USER).unwrap();

    let second = h.processor.process(&[message]).await;
    assert!(second.failed_message_ids.is_empty());
    let after_second = h.store.record(USER).unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(h.metrics.total("accounts_suspended"), 1);
}

#[tokio::test]
async fn future_event_is_retried_and_audited() {
    let h = harness();
    let message = queue_message(&fraud_event(USER, "01", NOW_MS + 60_000));

    let outcome = h.processor.process(&[message.clone()]).await;
    assert_eq!(outcome.failed_message_ids, vec![message.message_id]);

    assert_eq!(h.store.record(USER), None);
    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_IGNORED);
    assert_eq!(audit.extensions.description, "ACCOUNT_SUSPENDED");
    assert_eq!(h.metrics.total("message_retried"), 1);

    // Once time catches up, redelivery applies cleanly.
    h.clock.advance(120_000);
    let redelivery = h.processor.process(&[queue_message(&fraud_event(USER, "01", NOW_MS + 60_000))]).await;
    assert!(redelivery.failed_message_ids.is_empty());
    assert_eq!(h.store.record(USER).unwrap().state, suspended());
}

#[tokio::test]
async fn deleted_account_drops_event() {
    let h = harness();
    let mut record = stored_record(blocked(), 1_000, 1_000);
    record.is_account_deleted = true;
    h.store.insert_record(USER, record);
    let message = queue_message(&fraud_event(USER, "07", EVENT_MS));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    assert_eq!(h.store.record(USER).unwrap().state, blocked());
    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_IGNORED);
    assert_eq!(audit.extensions.account.state, ReportedState::Deleted);
}

#[tokio::test]
async fn suspend_while_blocked_is_rejected_and_audited() {
    let h = harness();
    h.store.insert_record(USER, stored_record(blocked(), 1_000, 1_000));
    let message = queue_message(&fraud_event(USER, "01", EVENT_MS));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    let record = h.store.record(USER).unwrap();
    assert_eq!(record.state, blocked());
    assert_eq!(record.history.len(), 0);

    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_IGNORED);
    assert_eq!(audit.extensions.account.state, ReportedState::PermanentlySuspended);
    assert!(audit.extensions.allowable_interventions.is_empty());

    let dropped = h.metrics.samples("message_dropped");
    assert_eq!(
        dropped[0].dimensions,
        vec![("reason".to_string(), "transition_rejected".to_string())]
    );
}

#[tokio::test]
async fn partial_batch_failure_retries_only_the_failed_message() {
    let h = harness();
    let first = queue_message(&fraud_event("urn:acct:a", "01", EVENT_MS));
    let second = queue_message(&fraud_event("urn:acct:b", "01", EVENT_MS));
    let third = queue_message(&fraud_event("urn:acct:c", "01", EVENT_MS));
    h.store.fail_writes_for("urn:acct:b");

    let outcome = h.processor.process(&[first, second.clone(), third]).await;
    assert_eq!(outcome.failed_message_ids, vec![second.message_id.clone()]);

    assert_eq!(h.store.record("urn:acct:a").unwrap().state, suspended());
    assert_eq!(h.store.record("urn:acct:b"), None);
    assert_eq!(h.store.record("urn:acct:c").unwrap().state, suspended());
    assert_eq!(h.metrics.total("published_to_egress"), 2);

    // The queue redelivers just the failed message; once the store heals it
    // applies.
    h.store.heal_writes_for("urn:acct:b");
    let redelivery = h.processor.process(&[second]).await;
    assert!(redelivery.failed_message_ids.is_empty());
    assert_eq!(h.store.record("urn:acct:b").unwrap().state, suspended());
}

#[tokio::test]
async fn low_confidence_identity_event_is_dropped() {
    let h = harness();
    h.store.insert_record(USER, stored_record(
        AccountState { suspended: true, reprove_identity: true, ..AccountState::OKAY },
        1_000,
        1_000,
    ));
    let mut event = user_action_event(USER, "IPV_IDENTITY_ISSUED", EVENT_MS);
    event.extensions.level_of_confidence = Some("P1".to_string());
    let message = queue_message(&event);

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    // No state change, audited as ignored.
    let record = h.store.record(USER).unwrap();
    assert!(record.state.reprove_identity);
    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_IGNORED);
    assert_eq!(audit.extensions.description, "USER_LED_ACTION");

    let dropped = h.metrics.samples("message_dropped");
    assert_eq!(dropped[0].dimensions, vec![("reason".to_string(), "low_confidence".to_string())]);
}

#[tokio::test]
async fn noop_user_action_on_clean_account_is_suppressed() {
    let h = harness();
    let message = queue_message(&user_action_event(USER, "AUTH_PASSWORD_RESET_SUCCESSFUL", EVENT_MS));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    // Rejected transition on an unrestricted account: dropped, but no audit
    // event leaves the service.
    assert!(h.sink.sent().is_empty());
    assert_eq!(h.metrics.total("audit_event_suppressed"), 1);
    let dropped = h.metrics.samples("message_dropped");
    assert_eq!(
        dropped[0].dimensions,
        vec![("reason".to_string(), "transition_rejected".to_string())]
    );
}

#[tokio::test]
async fn password_reset_success_clears_suspension() {
    let h = harness();
    h.store.insert_record(USER, stored_record(password_reset_required(), 1_000, 1_000));
    let message = queue_message(&user_action_event(USER, "AUTH_PASSWORD_RESET_SUCCESSFUL", EVENT_MS));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    let record = h.store.record(USER).unwrap();
    assert_eq!(record.state, AccountState::OKAY);
    assert_eq!(record.reset_password_at, Some(NOW_MS));
    // User-led writes leave the intervention bookkeeping untouched.
    assert_eq!(record.sent_at, Some(1_000));
    assert_eq!(record.applied_at, Some(1_000));
    assert_eq!(record.history.len(), 0);

    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_APPLIED);
    assert_eq!(audit.extensions.description, "USER_LED_ACTION");
    assert_eq!(audit.extensions.account.state, ReportedState::Active);

    assert_eq!(h.metrics.total("accounts_suspended"), -1);
    let resolve = h.metrics.samples("intervention_time_to_resolve_ms");
    assert_eq!(resolve.len(), 1);
    assert_eq!(resolve[0].value, NOW_MS - 1_000);
}

#[tokio::test]
async fn forced_reset_still_reports_active_with_action() {
    let h = harness();
    let message = queue_message(&fraud_event(USER, "04", EVENT_MS));

    h.processor.process(&[message]).await;

    let audit = h.sink.only();
    assert_eq!(audit.extensions.account.state, ReportedState::Active);
    assert_eq!(audit.extensions.account.action, Some(ReportedAction::ResetPassword));
}

#[tokio::test]
async fn empty_batch_is_counted_not_failed() {
    let h = harness();
    let outcome = h.processor.process(&[]).await;
    assert!(outcome.failed_message_ids.is_empty());
    assert_eq!(h.metrics.total("invalid_batch_received"), 1);
}

#[tokio::test]
async fn malformed_body_is_retried() {
    let h = harness();
    let message = QueueMessage {
        message_id: "m-1".to_string(),
        body: "{not json".to_string(),
    };

    let outcome = h.processor.process(&[message]).await;
    assert_eq!(outcome.failed_message_ids, vec!["m-1".to_string()]);
    assert!(h.sink.sent().is_empty());
}

#[tokio::test]
async fn invalid_event_shape_is_dropped_not_retried() {
    let h = harness();
    let mut event = fraud_event(USER, "01", EVENT_MS);
    event.extensions.ci_fail = Some(true);
    let message = queue_message(&event);

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());
    assert_eq!(h.store.record(USER), None);

    let dropped = h.metrics.samples("message_dropped");
    assert_eq!(
        dropped[0].dimensions,
        vec![("reason".to_string(), "validation_failed".to_string())]
    );
}

#[tokio::test]
async fn non_numeric_intervention_code_is_dropped() {
    let h = harness();
    let mut event = fraud_event(USER, "03", EVENT_MS);
    if let Some(i) = event.extensions.intervention.as_mut() {
        i.intervention_code = "3x".to_string();
    }
    let message = queue_message(&event);

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());
    assert_eq!(h.store.record(USER), None);
}

#[tokio::test]
async fn egress_failure_never_fails_the_message() {
    let h = harness();
    h.sink.set_failing(true);
    let message = queue_message(&fraud_event(USER, "03", EVENT_MS));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());
    assert_eq!(h.store.record(USER).unwrap().state, blocked());
    assert_eq!(h.metrics.total("egress_publish_failed"), 1);
    assert_eq!(h.metrics.total("published_to_egress"), 0);
}

#[tokio::test]
async fn duplicate_records_drop_as_data_anomaly() {
    let h = harness();
    h.store.mark_duplicate(USER);
    let message = queue_message(&fraud_event(USER, "01", EVENT_MS));

    let outcome = h.processor.process(&[message]).await;
    assert!(outcome.failed_message_ids.is_empty());

    let audit = h.sink.only();
    assert_eq!(audit.event_name, TRANSITION_IGNORED);
    let dropped = h.metrics.samples("message_dropped");
    assert_eq!(
        dropped[0].dimensions,
        vec![("reason".to_string(), "too_many_records".to_string())]
    );
}

#[tokio::test]
async fn block_then_unblock_returns_gauges_to_zero() {
    let h = harness();
    h.processor
        .process(&[queue_message(&fraud_event(USER, "03", EVENT_MS))])
        .await;
    // The block was applied "now"; the unblock must postdate it.
    h.clock.advance(120_000);
    h.processor
        .process(&[queue_message(&fraud_event(USER, "07", NOW_MS + 60_000))])
        .await;

    assert_eq!(h.store.record(USER).unwrap().state, AccountState::OKAY);
    assert_eq!(h.metrics.total("accounts_blocked"), 0);
    assert_eq!(h.store.record(USER).unwrap().history.len(), 2);
}

#[tokio::test]
async fn applied_history_round_trips_for_display() {
    let h = harness();
    let graph = TransitionGraph::builtin().unwrap();
    h.processor
        .process(&[queue_message(&fraud_event(USER, "03", EVENT_MS))])
        .await;

    let entries = fetch_decoded_history(h.store.as_ref(), &graph, USER).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].applied_at_ms, NOW_MS);
    assert_eq!(entries[0].intervention_code, "03");
    assert_eq!(entries[0].intervention_name.as_deref(), Some("ACCOUNT_BLOCKED"));
    assert_eq!(entries[0].originating_component_id.as_deref(), Some("CMS"));
}

#[tokio::test]
async fn staleness_is_monotone_across_all_states() {
    let graph = TransitionGraph::builtin().unwrap();
    let nodes = [
        "okay",
        "suspended",
        "blocked",
        "password-reset",
        "identity-reprove",
        "password-and-identity",
    ];
    for node in nodes {
        let state = *graph.node(node).unwrap();

        // At or before the applied timestamp: always dropped, never written.
        let h = harness();
        h.store.insert_record(USER, stored_record(state, 1_000, 1_000));
        h.processor
            .process(&[queue_message(&fraud_event(USER, "03", 1_000))])
            .await;
        assert_eq!(h.store.record(USER).unwrap().state, state, "stale event must not move {node}");
        let dropped = h.metrics.samples("message_dropped");
        assert_eq!(
            dropped[0].dimensions,
            vec![("reason".to_string(), "stale_event".to_string())],
            "stale event from {node}"
        );

        // Strictly after: always attempted (applied or rejected, never
        // dropped as stale).
        let h = harness();
        h.store.insert_record(USER, stored_record(state, 1_000, 1_000));
        h.processor
            .process(&[queue_message(&fraud_event(USER, "03", 2_000))])
            .await;
        let dropped = h.metrics.samples("message_dropped");
        assert!(
            dropped
                .iter()
                .all(|s| s.dimensions != vec![("reason".to_string(), "stale_event".to_string())]),
            "later event from {node} must be attempted"
        );
    }
}

#[tokio::test]
async fn stale_snapshot_write_hits_the_condition() {
    // Exercises the optimistic condition at the store seam directly: a
    // writer holding a snapshot from before a concurrent update must fail.
    let h = harness();
    h.store.insert_record(USER, stored_record(suspended(), 1_000, 1_000));

    let patch = RecordPatch::PasswordReset {
        state: AccountState::OKAY,
        updated_at: 2_000,
        reset_password_at: 2_000,
    };
    let stale = h
        .store
        .apply_patch(USER, &patch, &WriteCondition::AppliedAtUnchanged(Some(900)))
        .await;
    assert_eq!(stale, Err(StoreError::ConditionFailed));

    let fresh = h
        .store
        .apply_patch(USER, &patch, &WriteCondition::AppliedAtUnchanged(Some(1_000)))
        .await;
    assert_eq!(fresh, Ok(()));
}
