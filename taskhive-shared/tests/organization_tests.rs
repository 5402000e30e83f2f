//! Organization Registry: creation, invite codes, joining, deletion

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{harness, harness_with_codes, ConstantCode, ScriptedCodes};
use taskhive_shared::error::CoreError;
use taskhive_shared::invite_code::is_well_formed;
use taskhive_shared::services::organizations::{NewOrganization, OrganizationPatch};

fn eng() -> NewOrganization {
    NewOrganization {
        name: "Eng".to_string(),
        description: Some("Engineering".to_string()),
    }
}

#[tokio::test]
async fn test_create_organization() {
    let h = harness();
    let alice = h.user("Alice").await;

    let org = h.services.organizations.create(alice, eng()).await.unwrap();

    assert_eq!(org.name, "Eng");
    assert_eq!(org.description.as_deref(), Some("Engineering"));
    assert_eq!(org.owner_id, alice);
    assert!(is_well_formed(&org.invite_code));
    assert_eq!(h.store.membership_count().await, 0);
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let h = harness();
    let alice = h.user("Alice").await;

    let err = h
        .services
        .organizations
        .create(
            alice,
            NewOrganization {
                name: "  ".to_string(),
                description: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_name_longer_than_column_is_rejected() {
    let h = harness();
    let alice = h.user("Alice").await;
    let registry = &h.services.organizations;

    let err = registry
        .create(
            alice,
            NewOrganization {
                name: "N".repeat(256),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
    assert!(h.store.organizations().await.is_empty());

    let org = registry
        .create(
            alice,
            NewOrganization {
                name: "N".repeat(255),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(org.name.len(), 255);

    let err = registry
        .update(
            org.id,
            OrganizationPatch {
                name: Some("N".repeat(256)),
                ..Default::default()
            },
            alice,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_invite_code_collision_retries() {
    let h = harness_with_codes(Arc::new(ScriptedCodes::new(&["AAAA1111", "AAAA1111"])), 5);
    let alice = h.user("Alice").await;

    let first = h.services.organizations.create(alice, eng()).await.unwrap();
    let second = h.services.organizations.create(alice, eng()).await.unwrap();

    assert_eq!(first.invite_code, "AAAA1111");
    assert_ne!(second.invite_code, "AAAA1111");
}

#[tokio::test]
async fn test_invite_code_exhaustion() {
    let h = harness_with_codes(Arc::new(ConstantCode("SAME0000")), 3);
    let alice = h.user("Alice").await;

    h.services.organizations.create(alice, eng()).await.unwrap();
    let err = h.services.organizations.create(alice, eng()).await.unwrap_err();

    assert!(matches!(err, CoreError::ResourceExhausted(_)));
    assert_eq!(h.store.organizations().await.len(), 1);
}

#[tokio::test]
async fn test_retired_codes_are_not_reissued() {
    let h = harness_with_codes(
        Arc::new(ScriptedCodes::new(&["FIRST001", "SECOND02", "FIRST001", "THIRD003"])),
        5,
    );
    let alice = h.user("Alice").await;

    let org = h.services.organizations.create(alice, eng()).await.unwrap();
    assert_eq!(org.invite_code, "FIRST001");

    let refresh = OrganizationPatch {
        refresh_invite_code: true,
        ..Default::default()
    };
    let org = h
        .services
        .organizations
        .update(org.id, refresh.clone(), alice)
        .await
        .unwrap();
    assert_eq!(org.invite_code, "SECOND02");

    // FIRST001 is retired but still counts as issued
    let org = h
        .services
        .organizations
        .update(org.id, refresh, alice)
        .await
        .unwrap();
    assert_eq!(org.invite_code, "THIRD003");
}

#[tokio::test]
async fn test_update_by_owner_only() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let org = h.org_with(alice, &[bob]).await;

    let patch = OrganizationPatch {
        name: Some("Platform".to_string()),
        description: Some(None),
        ..Default::default()
    };

    let err = h
        .services
        .organizations
        .update(org.id, patch.clone(), bob)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let updated = h.services.organizations.update(org.id, patch, alice).await.unwrap();
    assert_eq!(updated.name, "Platform");
    assert_eq!(updated.description, None);
    assert_eq!(updated.invite_code, org.invite_code);
}

#[tokio::test]
async fn test_empty_patch_returns_unchanged() {
    let h = harness();
    let alice = h.user("Alice").await;
    let org = h.org(alice, "Eng").await;

    let same = h
        .services
        .organizations
        .update(org.id, OrganizationPatch::default(), alice)
        .await
        .unwrap();

    assert_eq!(same, org);
}

#[tokio::test]
async fn test_get_hides_invite_code_from_members() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let carol = h.user("Carol").await;
    let org = h.org_with(alice, &[bob]).await;

    let owner_view = h.services.organizations.get(org.id, alice).await.unwrap();
    assert!(owner_view.is_owner);
    assert_eq!(owner_view.invite_code.as_deref(), Some(org.invite_code.as_str()));

    let member_view = h.services.organizations.get(org.id, bob).await.unwrap();
    assert!(!member_view.is_owner);
    assert_eq!(member_view.invite_code, None);

    let err = h.services.organizations.get(org.id, carol).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[tokio::test]
async fn test_join() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let org = h.org(alice, "Eng").await;

    let lowercase = org.invite_code.to_lowercase();
    let view = h.services.organizations.join(&lowercase, bob).await.unwrap();
    assert_eq!(view.id, org.id);
    assert!(h.services.memberships.is_participant(bob, org.id).await.unwrap());

    let again = h.services.organizations.join(&org.invite_code, bob).await;
    assert_eq!(again.unwrap_err(), CoreError::AlreadyMember);

    let owner = h.services.organizations.join(&org.invite_code, alice).await;
    assert_eq!(owner.unwrap_err(), CoreError::AlreadyMember);
    assert_eq!(h.store.membership_count().await, 1);
}

#[tokio::test]
async fn test_join_rejects_blank_and_unknown_codes() {
    let h = harness();
    let dave = h.user("Dave").await;

    assert!(matches!(
        h.services.organizations.join("   ", dave).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        h.services.organizations.join("ZZZZZZZZ", dave).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_old_code_stops_working_after_refresh() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let org = h.org(alice, "Eng").await;

    h.services
        .organizations
        .update(
            org.id,
            OrganizationPatch {
                refresh_invite_code: true,
                ..Default::default()
            },
            alice,
        )
        .await
        .unwrap();

    assert!(matches!(
        h.services.organizations.join(&org.invite_code, bob).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_for_user_orders_owned_then_joined() {
    let h = harness();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;

    let alices = h.org(alice, "Alice's").await;
    let bobs_first = h.org(bob, "Bob's first").await;
    let bobs_second = h.org(bob, "Bob's second").await;
    h.services.organizations.join(&alices.invite_code, bob).await.unwrap();

    let ids: Vec<_> = h
        .services
        .organizations
        .list_for_user(bob)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();

    assert_eq!(ids, vec![bobs_first.id, bobs_second.id, alices.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_and_refreshes_keep_codes_unique() {
    // Every code is handed out twice, so each second draw collides
    let script: Vec<String> = (0..=32)
        .flat_map(|k| {
            let code = format!("DUP{k:05}");
            [code.clone(), code]
        })
        .collect();
    let refs: Vec<&str> = script.iter().map(String::as_str).collect();
    let codes = Arc::new(ScriptedCodes::new(&refs));

    let h = harness_with_codes(codes.clone(), 100);
    let alice = h.user("Alice").await;
    let seed = h.org(alice, "Seed").await;

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = h.services.organizations.clone();
        let org_id = seed.id;
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                registry
                    .create(
                        alice,
                        NewOrganization {
                            name: format!("Org {i}"),
                            description: None,
                        },
                    )
                    .await
                    .map(|_| ())
            } else {
                registry
                    .update(
                        org_id,
                        OrganizationPatch {
                            refresh_invite_code: true,
                            ..Default::default()
                        },
                        alice,
                    )
                    .await
                    .map(|_| ())
            }
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let orgs = h.store.organizations().await;
    let active: HashSet<_> = orgs.iter().map(|o| o.invite_code.clone()).collect();
    assert_eq!(orgs.len(), 17);
    assert_eq!(active.len(), orgs.len());

    // 33 distinct codes issued: one per create plus one per refresh, all
    // from the script, after 32 collisions
    let issued = h.store.issued_invite_codes().await;
    let scripted: HashSet<String> = script.iter().cloned().collect();
    assert_eq!(issued, scripted);
    assert_eq!(script.len() - codes.remaining(), 33 + 32);
}
