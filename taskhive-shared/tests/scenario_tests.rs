//! End-to-end flows across all services

mod common;

use std::sync::Arc;

use common::{harness, harness_with_codes, ScriptedCodes};
use taskhive_shared::error::CoreError;
use taskhive_shared::models::task::TaskStatus;
use taskhive_shared::services::organizations::{NewOrganization, OrganizationPatch};
use taskhive_shared::services::tasks::{parse_status, TaskQuery};

#[tokio::test]
async fn test_join_assign_and_complete() {
    let h = harness_with_codes(Arc::new(ScriptedCodes::new(&["ABC12345"])), 10);
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let carol = h.user("Carol").await;

    let org = h
        .services
        .organizations
        .create(
            alice,
            NewOrganization {
                name: "Eng".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(org.invite_code, "ABC12345");

    h.services.organizations.join("ABC12345", bob).await.unwrap();
    assert!(h.services.memberships.is_participant(bob, org.id).await.unwrap());

    let task = h.task(org.id, alice, Some(bob)).await;
    assert_eq!(task.status, TaskStatus::Pending);

    let completed = parse_status("completed").unwrap();
    let done = h
        .services
        .tasks
        .set_status(task.id, completed, bob)
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);

    let err = h
        .services
        .tasks
        .set_status(task.id, completed, carol)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[tokio::test]
async fn test_removal_clears_assignment() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let org = h.org_with(alice, &[bob]).await;
    let task = h.task(org.id, alice, Some(bob)).await;

    h.services.memberships.remove(org.id, bob, alice).await.unwrap();

    let task = h.services.tasks.get(task.id, alice).await.unwrap();
    assert_eq!(task.assigned_to, None);
}

#[tokio::test]
async fn test_join_unknown_code() {
    let h = harness();
    let dave = h.user("Dave").await;

    let err = h.services.organizations.join("ZZZZZZZZ", dave).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_double_refresh_yields_fresh_codes() {
    let h = harness();
    let alice = h.user("Alice").await;
    let org = h.org(alice, "Eng").await;
    let other = h.org(alice, "Ops").await;

    let refresh = OrganizationPatch {
        refresh_invite_code: true,
        ..Default::default()
    };
    let first = h
        .services
        .organizations
        .update(org.id, refresh.clone(), alice)
        .await
        .unwrap();
    let second = h
        .services
        .organizations
        .update(org.id, refresh, alice)
        .await
        .unwrap();

    let previous = [org.invite_code, other.invite_code];
    assert_ne!(first.invite_code, second.invite_code);
    assert!(!previous.contains(&first.invite_code));
    assert!(!previous.contains(&second.invite_code));

    let issued = h.store.issued_invite_codes().await;
    assert_eq!(issued.len(), 4);
}

#[tokio::test]
async fn test_member_cannot_delete_others_task() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let org = h.org_with(alice, &[bob]).await;
    let task = h.task(org.id, alice, None).await;

    let err = h.services.tasks.delete(task.id, bob).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert!(h.services.tasks.get(task.id, bob).await.is_ok());
}

#[tokio::test]
async fn test_delete_organization_cascades() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let org = h.org_with(alice, &[bob]).await;
    let keep = h.org_with(alice, &[bob]).await;
    h.task(org.id, alice, Some(bob)).await;
    h.task(org.id, bob, None).await;
    let kept_task = h.task(keep.id, alice, None).await;

    assert!(matches!(
        h.services.organizations.delete(org.id, bob).await,
        Err(CoreError::Forbidden(_))
    ));

    h.services.organizations.delete(org.id, alice).await.unwrap();

    assert!(h.store.tasks().await.iter().all(|t| t.org_id != org.id));
    assert!(h.store.memberships().await.iter().all(|m| m.org_id != org.id));
    assert!(matches!(
        h.services.organizations.get(org.id, alice).await,
        Err(CoreError::NotFound(_))
    ));

    let remaining = h
        .services
        .tasks
        .list(keep.id, TaskQuery::default(), bob)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept_task.id);
}
