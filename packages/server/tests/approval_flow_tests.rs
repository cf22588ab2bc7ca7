//! Lifecycle flows through the activities layer: lease-gated submission,
//! officer/manager signing order, the threshold branch at approval, the
//! return loop, and change control.

mod common;

use chrono::Duration;
use rust_decimal::Decimal;
use test_context::test_context;

use procurement_core::common::{Caller, RequisitionId, WorkflowError};
use procurement_core::config::Config;
use procurement_core::domains::approval::activities::{lines, signing, transitions};
use procurement_core::domains::approval::machines::{Action, Status};
use procurement_core::domains::approval::models::ApprovalSubject;
use procurement_core::domains::locking::coordinator::{
    self, PACKAGE_SCOPE, REQUISITION_TYPE,
};
use procurement_core::domains::signatures::SignerRole;
use sqlx::PgPool;

use common::{line, manager, officer, seed_requisition, test_config, TestHarness};

async fn acquire_lease(pool: &PgPool, caller: &Caller, resource: RequisitionId) {
    let acquisition = coordinator::acquire(
        pool,
        REQUISITION_TYPE,
        resource.into_uuid(),
        PACKAGE_SCOPE,
        caller,
        Duration::seconds(90),
    )
    .await
    .unwrap();
    assert!(acquisition.is_owned());
}

async fn release_lease(pool: &PgPool, caller: &Caller, resource: RequisitionId) {
    coordinator::release(
        pool,
        REQUISITION_TYPE,
        resource.into_uuid(),
        PACKAGE_SCOPE,
        caller.user_id,
    )
    .await
    .unwrap();
}

/// Drive a freshly seeded requisition to APPROVAL_PENDING as `submitter`.
async fn to_approval_pending(
    pool: &PgPool,
    config: &Config,
    submitter: &Caller,
    resource: RequisitionId,
) {
    acquire_lease(pool, submitter, resource).await;
    transitions::perform(pool, config, submitter, resource, Action::Submit, None)
        .await
        .unwrap();
    release_lease(pool, submitter, resource).await;

    transitions::perform(
        pool,
        config,
        submitter,
        resource,
        Action::RecordInvitations,
        None,
    )
    .await
    .unwrap();
    transitions::perform(
        pool,
        config,
        submitter,
        resource,
        Action::RequestApproval,
        None,
    )
    .await
    .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn submit_requires_the_edit_lease(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    let err = transitions::perform(
        &ctx.db_pool,
        &config,
        &alice,
        resource,
        Action::Submit,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // Someone else mid-edit turns the same refusal into a lock conflict.
    let bob = officer("Bob");
    acquire_lease(&ctx.db_pool, &bob, resource).await;
    let err = transitions::perform(
        &ctx.db_pool,
        &config,
        &alice,
        resource,
        Action::Submit,
        None,
    )
    .await
    .unwrap_err();
    match err {
        WorkflowError::LockConflict { owner_id, .. } => assert_eq!(owner_id, bob.user_id),
        other => panic!("expected lock conflict, got {other:?}"),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn below_threshold_package_lands_on_the_purchase_path(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let bob = officer("Bob");
    let meg = manager("Meg");

    let item = procurement_core::common::ItemId::new();
    let resource = seed_requisition(
        &ctx.db_pool,
        &[alice.user_id, bob.user_id],
        vec![line(item, 10, 100)], // grand total 1000
    )
    .await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;

    // First officer signs; the set is incomplete so the status holds.
    signing::sign_package(&ctx.db_pool, &alice, resource, SignerRole::Officer, "sig")
        .await
        .unwrap();
    let subject = ApprovalSubject::find(resource, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject.status, Status::ApprovalPending);

    // Manager cannot jump the queue.
    let err = signing::sign_package(&ctx.db_pool, &meg, resource, SignerRole::Manager, "sig")
        .await
        .unwrap_err();
    match err {
        WorkflowError::OrderingViolation { missing } => assert_eq!(missing, vec![bob.user_id]),
        other => panic!("expected ordering violation, got {other:?}"),
    }

    // Last officer signature flips the package to signature-ready.
    signing::sign_package(&ctx.db_pool, &bob, resource, SignerRole::Officer, "sig")
        .await
        .unwrap();
    let subject = ApprovalSubject::find(resource, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject.status, Status::SignatureReady);

    signing::sign_package(&ctx.db_pool, &meg, resource, SignerRole::Manager, "sig")
        .await
        .unwrap();
    let approved = transitions::perform(
        &ctx.db_pool,
        &config,
        &meg,
        resource,
        Action::ManagerApprove,
        None,
    )
    .await
    .unwrap();
    assert_eq!(approved.status, Status::PurchaseReady);

    let closed = transitions::perform(&ctx.db_pool, &config, &meg, resource, Action::Close, None)
        .await
        .unwrap();
    assert_eq!(closed.status, Status::Closed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn at_threshold_package_goes_to_tender_with_change_control(ctx: &TestHarness) {
    let config = test_config(Decimal::from(1_000));
    let alice = officer("Alice");
    let meg = manager("Meg");

    let item = procurement_core::common::ItemId::new();
    let resource = seed_requisition(
        &ctx.db_pool,
        &[alice.user_id],
        vec![line(item, 10, 100)], // grand total exactly at the threshold
    )
    .await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;
    signing::sign_package(&ctx.db_pool, &alice, resource, SignerRole::Officer, "sig")
        .await
        .unwrap();
    signing::sign_package(&ctx.db_pool, &meg, resource, SignerRole::Manager, "sig")
        .await
        .unwrap();

    let approved = transitions::perform(
        &ctx.db_pool,
        &config,
        &meg,
        resource,
        Action::ManagerApprove,
        None,
    )
    .await
    .unwrap();
    assert_eq!(approved.status, Status::TenderReady);

    // Post-approval change control loop.
    let submitted = transitions::perform(
        &ctx.db_pool,
        &config,
        &alice,
        resource,
        Action::SubmitChanges,
        None,
    )
    .await
    .unwrap();
    assert_eq!(submitted.status, Status::ChangesSubmitted);

    let decided = transitions::perform(
        &ctx.db_pool,
        &config,
        &meg,
        resource,
        Action::ApproveChanges,
        None,
    )
    .await
    .unwrap();
    assert_eq!(decided.status, Status::ChangesApproved);

    let closed = transitions::perform(&ctx.db_pool, &config, &meg, resource, Action::Close, None)
        .await
        .unwrap();
    assert_eq!(closed.status, Status::Closed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn returned_requisition_carries_the_note_and_loops_back(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let meg = manager("Meg");
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;

    let returned = transitions::perform(
        &ctx.db_pool,
        &config,
        &meg,
        resource,
        Action::ManagerReturn,
        Some("fix the quantities"),
    )
    .await
    .unwrap();
    assert_eq!(returned.status, Status::RequisitionReturned);
    assert_eq!(returned.return_note.as_deref(), Some("fix the quantities"));

    // The officer reworks and submits again.
    acquire_lease(&ctx.db_pool, &alice, resource).await;
    let resubmitted = transitions::perform(
        &ctx.db_pool,
        &config,
        &alice,
        resource,
        Action::Submit,
        None,
    )
    .await
    .unwrap();
    assert_eq!(resubmitted.status, Status::Submitted);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn officer_revocation_regresses_signature_ready(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;
    signing::sign_package(&ctx.db_pool, &alice, resource, SignerRole::Officer, "sig")
        .await
        .unwrap();
    let subject = ApprovalSubject::find(resource, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject.status, Status::SignatureReady);

    signing::revoke_signature(&ctx.db_pool, &alice, resource, SignerRole::Officer)
        .await
        .unwrap();
    let subject = ApprovalSubject::find(resource, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject.status, Status::ApprovalPending);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn signature_ready_waits_out_a_conflicting_editor(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let bob = officer("Bob");
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;

    // Bob is mid-edit when the last officer signs: the package stays pending.
    acquire_lease(&ctx.db_pool, &bob, resource).await;
    signing::sign_package(&ctx.db_pool, &alice, resource, SignerRole::Officer, "sig")
        .await
        .unwrap();
    let subject = ApprovalSubject::find(resource, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject.status, Status::ApprovalPending);

    // Once the edit session ends, re-running the gate advances it.
    release_lease(&ctx.db_pool, &bob, resource).await;
    let status = transitions::try_mark_signature_ready(&ctx.db_pool, &alice, resource)
        .await
        .unwrap();
    assert_eq!(status, Status::SignatureReady);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn outsider_cannot_sign_as_officer(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let eve = officer("Eve");
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;

    let err = signing::sign_package(&ctx.db_pool, &eve, resource, SignerRole::Officer, "sig")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn line_edits_are_gated_by_the_lease(ctx: &TestHarness) {
    let alice = officer("Alice");
    let bob = officer("Bob");
    let item = procurement_core::common::ItemId::new();
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    // No lease held at all.
    let err = lines::save_lines(&ctx.db_pool, &alice, resource, &[line(item, 1, 10)])
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // Someone else holds it.
    acquire_lease(&ctx.db_pool, &bob, resource).await;
    let err = lines::save_lines(&ctx.db_pool, &alice, resource, &[line(item, 1, 10)])
        .await
        .unwrap_err();
    match err {
        WorkflowError::LockConflict { owner_id, .. } => assert_eq!(owner_id, bob.user_id),
        other => panic!("expected lock conflict, got {other:?}"),
    }
    release_lease(&ctx.db_pool, &bob, resource).await;

    // The holder edits freely.
    acquire_lease(&ctx.db_pool, &alice, resource).await;
    let saved = lines::save_lines(&ctx.db_pool, &alice, resource, &[line(item, 4, 25)])
        .await
        .unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].quantity, Some(Decimal::from(4)));
    assert_eq!(saved[0].final_unit_price, Some(Decimal::from(25)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn rejection_response_carries_the_managers_note(ctx: &TestHarness) {
    let config = test_config(Decimal::from(50_000));
    let alice = officer("Alice");
    let meg = manager("Meg");
    let resource = seed_requisition(&ctx.db_pool, &[alice.user_id], vec![]).await;

    to_approval_pending(&ctx.db_pool, &config, &alice, resource).await;

    let rejected = transitions::perform(
        &ctx.db_pool,
        &config,
        &meg,
        resource,
        Action::ManagerReject,
        Some("budget withdrawn"),
    )
    .await
    .unwrap();
    assert_eq!(rejected.status, Status::RequisitionRejected);
    assert_eq!(rejected.return_note.as_deref(), Some("budget withdrawn"));
}
