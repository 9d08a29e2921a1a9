//! End-to-end scenarios against the service layer.

use std::sync::Arc;

use pollgate::domain::{actions, Caller, PrincipalId};
use pollgate::error::{CoreError, ErrorKind};
use pollgate::security::{sanitize, ValidationError};
use pollgate::store::Storage;

mod common;
use common::{caller, opts, ADMIN};

#[tokio::test]
async fn test_non_owner_cannot_delete() {
    let (store, service) = common::service().await;

    let id = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;

    let err = service.delete_poll(&caller("bob"), id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(err.user_message(), "not permitted");
    assert!(store.get_poll(id).await.is_ok());

    // the real reason is only in the audit trail
    let records = store.list_audit_records(10).await.unwrap();
    let denial = records
        .iter()
        .find(|r| r.action == actions::AUTHORIZATION_DENIED)
        .unwrap();
    assert_eq!(denial.actor, Some(PrincipalId::new("bob")));
    assert_eq!(denial.resource_id, Some(id.to_string()));
}

#[tokio::test]
async fn test_second_vote_is_conflict() {
    let (store, service) = common::service().await;
    let alice = caller("alice");
    let id = service
        .create_poll(&alice, "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;

    service.submit_vote(&alice, id, 0).await.unwrap();
    let err = service.submit_vote(&alice, id, 1).await.unwrap_err();

    assert!(matches!(err, CoreError::AlreadyVoted));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.user_message(), "already voted");
    assert_eq!(store.vote_rows(id, &PrincipalId::new("alice")).await, 1);
}

#[tokio::test]
async fn test_script_question_rejected_before_sanitizing() {
    let (store, service) = common::service().await;

    let err = service
        .create_poll(&caller("alice"), "<script>alert(1)</script>Best?", &opts(&["a", "b"]))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation(ValidationError::ForbiddenContent { .. })));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(store.list_polls().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_deletes_foreign_poll_and_is_audited() {
    let (store, service) = common::service().await;
    let id = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;

    service.delete_poll(&caller(ADMIN), id).await.unwrap();

    assert!(store.get_poll(id).await.is_err());
    let records = store.list_audit_records(10).await.unwrap();
    let deleted = records.iter().find(|r| r.action == actions::POLL_DELETED).unwrap();
    assert_eq!(deleted.actor, Some(PrincipalId::new(ADMIN)));
    assert_eq!(deleted.resource_id, Some(id.to_string()));
}

#[tokio::test]
async fn test_out_of_range_option_creates_no_row() {
    let (store, service) = common::service().await;
    let alice = caller("alice");
    let id = service
        .create_poll(&alice, "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;

    for index in [-1i64, 2, 99] {
        let err = service.submit_vote(&alice, id, index).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidOption));
    }
    assert_eq!(store.vote_rows(id, &PrincipalId::new("alice")).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_one_winner() {
    let (store, service) = common::service().await;
    let service = Arc::new(service);
    let id = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.submit_vote(&caller("bob"), id, i % 2).await })
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(CoreError::AlreadyVoted) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(store.vote_rows(id, &PrincipalId::new("bob")).await, 1);
}

#[tokio::test]
async fn test_admin_listing_sees_results() {
    let (_, service) = common::service().await;
    let id = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;
    service.submit_vote(&caller("bob"), id, 1).await.unwrap();

    let views = service.list_all_polls_for_admin(&caller(ADMIN)).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].results, vec![0, 1]);

    let err = service.list_all_polls_for_admin(&caller("alice")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = service.list_all_polls_for_admin(&Caller::anonymous()).await.unwrap_err();
    assert!(matches!(err, CoreError::Unauthenticated));
}

#[tokio::test]
async fn test_role_store_outage_fails_closed() {
    let (store, service) = common::service().await;
    let id = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;

    store.set_roles_unavailable(true);
    let err = service.delete_poll(&caller(ADMIN), id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(store.get_poll(id).await.is_ok());

    // owners do not need the role store
    service.delete_poll(&caller("alice"), id).await.unwrap();
}

#[tokio::test]
async fn test_audit_outage_does_not_fail_operation() {
    let (store, service) = common::service().await;
    store.set_audit_unavailable(true);

    let id = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["Red", "Blue"]))
        .await
        .unwrap()
        .id;
    service.submit_vote(&caller("bob"), id, 0).await.unwrap();

    store.set_audit_unavailable(false);
    assert!(store.list_audit_records(10).await.unwrap().is_empty());
}

#[test]
fn test_sanitize_idempotent_over_samples() {
    let samples = [
        "",
        "plain text",
        "Tom & Jerry",
        "&amp;&lt;&gt;&quot;&apos;",
        "<b>bold</b> & \"quoted\" 'single'",
        "a < b > c",
        "&&amp;amp;",
        "<img src=x onerror=alert(1)>",
        "unterminated <tag",
    ];
    for sample in samples {
        let once = sanitize(sample);
        assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_vote_ceiling_holds_across_concurrent_polls() {
    let (store, service) = common::service().await;
    let service = Arc::new(service);

    let mut polls = Vec::new();
    for i in 0..12 {
        let id = service
            .create_poll(&caller("alice"), &format!("Question {}?", i), &opts(&["Red", "Blue"]))
            .await
            .unwrap()
            .id;
        polls.push(id);
    }

    let handles: Vec<_> = polls
        .iter()
        .map(|&id| {
            let service = service.clone();
            tokio::spawn(async move { service.submit_vote(&caller("mallory"), id, 0).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(CoreError::RateLimited { retry_after }) => assert!(retry_after.as_secs() <= 60),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(accepted, 5);

    let mut rows = 0;
    for id in polls {
        rows += store.vote_rows(id, &PrincipalId::new("mallory")).await;
    }
    assert_eq!(rows, 5);
}

#[tokio::test]
async fn test_stored_poll_keeps_invariants_after_sanitizing() {
    let (store, service) = common::service().await;

    let err = service
        .create_poll(&caller("alice"), "<b></b>", &opts(&["<b>Red</b>", "Red", "<i></i>"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(store.list_polls().await.unwrap().is_empty());

    let err = service
        .create_poll(&caller("alice"), "Best color?", &opts(&["<b>Red</b>", "red"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(ValidationError::DuplicateOption { position: 2 })));
    assert!(store.list_polls().await.unwrap().is_empty());

    let id = service
        .create_poll(&caller("alice"), "Best <em>color</em>?", &opts(&["<b>Red</b>", "Blue"]))
        .await
        .unwrap()
        .id;
    let poll = store.get_poll(id).await.unwrap();
    assert_eq!(poll.question, "Best color?");
    assert_eq!(poll.options, opts(&["Red", "Blue"]));
}
