// SPDX-License-Identifier: MIT OR Apache-2.0

use taskboard::test_utils::setup_logging;
use taskboard::{
    Action, Authority, ErrorKind, ItemFields, ItemUpdate, MemoryAuthority, OrderedItem,
    PermissionName, ResourceFields, Service, ServiceError, UserId,
};
use taskboard_store::SqliteStore;

async fn service() -> (Service<MemoryAuthority>, MemoryAuthority) {
    setup_logging();
    let authority = MemoryAuthority::default();
    let service = Service::builder(authority.clone())
        .store(SqliteStore::temporary().await)
        .build()
        .await
        .unwrap();
    (service, authority)
}

fn user(id: &str) -> UserId {
    id.parse().unwrap()
}

fn titles(items: &[OrderedItem]) -> Vec<&str> {
    items.iter().map(|item| item.fields.title.as_str()).collect()
}

fn assert_kind<T: std::fmt::Debug>(result: Result<T, ServiceError>, kind: ErrorKind) {
    match result {
        Err(err) => assert_eq!(err.kind(), kind, "{err}"),
        Ok(value) => panic!("expected {kind:?} error, got {value:?}"),
    }
}

#[tokio::test]
async fn organization_membership() {
    let (service, authority) = service().await;
    let alice = user("auth0|alice");
    let bob = user("auth0|bob");

    let organization = service
        .create_organization(&alice, ResourceFields::new("Panda Inc."))
        .await
        .unwrap();
    assert_eq!(organization.owner_id, alice);

    assert_eq!(
        service.get_organization(&alice, &organization.id).await.unwrap(),
        organization
    );
    assert_kind(
        service.get_organization(&bob, &organization.id).await,
        ErrorKind::Authorization,
    );

    service
        .add_organization_member(&alice, &organization.id, &bob)
        .await
        .unwrap();
    service.get_organization(&bob, &organization.id).await.unwrap();
    assert_kind(
        service
            .update_organization(&bob, &organization.id, ResourceFields::new("Bob Inc."))
            .await,
        ErrorKind::Authorization,
    );

    let mut members = service
        .list_organization_members(&bob, &organization.id)
        .await
        .unwrap();
    members.sort();
    assert_eq!(members, vec![alice.clone(), bob.clone()]);

    let updated = service
        .update_organization(
            &alice,
            &organization.id,
            ResourceFields::new("Panda GmbH").with_description("Bamboo"),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Panda GmbH");
    assert_eq!(
        service.get_organization(&bob, &organization.id).await.unwrap(),
        updated
    );

    assert_kind(
        service
            .remove_organization_member(&alice, &organization.id, &alice)
            .await,
        ErrorKind::Validation,
    );
    service
        .remove_organization_member(&alice, &organization.id, &bob)
        .await
        .unwrap();
    assert_kind(
        service.get_organization(&bob, &organization.id).await,
        ErrorKind::Authorization,
    );

    service
        .delete_organization(&alice, &organization.id)
        .await
        .unwrap();
    assert_kind(
        service.get_organization(&alice, &organization.id).await,
        ErrorKind::NotFound,
    );
    assert!(authority.roles_with_prefix("org").await.unwrap().is_empty());
    assert!(
        authority
            .permissions_with_prefix("org")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn invalid_fields() {
    let (service, authority) = service().await;
    let alice = user("auth0|alice");

    assert_kind(
        service
            .create_organization(&alice, ResourceFields::new(" "))
            .await,
        ErrorKind::Validation,
    );
    assert_kind(
        service
            .create_board(&alice, ResourceFields::new(""), false)
            .await,
        ErrorKind::Validation,
    );
    assert_eq!(authority.calls(), 0);
}

#[tokio::test]
async fn custom_roles() {
    let (service, _authority) = service().await;
    let alice = user("auth0|alice");
    let carol = user("auth0|carol");
    let dave = user("auth0|dave");

    let organization = service
        .create_organization(&alice, ResourceFields::new("Panda Inc."))
        .await
        .unwrap();
    let id = &organization.id;
    service
        .add_organization_member(&alice, id, &carol)
        .await
        .unwrap();
    service.add_organization_member(&alice, id, &dave).await.unwrap();

    let editor = service
        .create_role(&alice, id, "editor", &[Action::Update])
        .await
        .unwrap();
    assert_kind(
        service
            .add_role_member(&dave, id, &editor.role.id, &carol)
            .await,
        ErrorKind::Authorization,
    );

    service
        .add_role_member(&alice, id, &editor.role.id, &carol)
        .await
        .unwrap();
    service
        .update_organization(&carol, id, ResourceFields::new("Carol's Pandas"))
        .await
        .unwrap();

    let update = service
        .update_role(&alice, id, &editor.role.id, &[Action::Read])
        .await
        .unwrap();
    assert_eq!(update.granted.into_iter().collect::<Vec<_>>(), [Action::Read]);
    assert_eq!(update.revoked.into_iter().collect::<Vec<_>>(), [Action::Update]);
    assert_kind(
        service
            .update_organization(&carol, id, ResourceFields::new("Panda Inc."))
            .await,
        ErrorKind::Authorization,
    );

    // Owner, member and editor, delegation roles are not listed.
    let roles = service.list_roles(&alice, id).await.unwrap();
    assert_eq!(roles.len(), 3);

    assert_kind(
        service.delete_role(&carol, id, &editor.role.id).await,
        ErrorKind::Authorization,
    );
    service
        .delete_role(&alice, id, &editor.role.id)
        .await
        .unwrap();
    assert_eq!(service.list_roles(&alice, id).await.unwrap().len(), 2);
    assert_kind(
        service
            .update_role(&alice, id, &editor.role.id, &[Action::Read])
            .await,
        ErrorKind::NotFound,
    );
}

#[tokio::test]
async fn delegated_role_membership() {
    let (service, _authority) = service().await;
    let alice = user("auth0|alice");
    let carol = user("auth0|carol");
    let dave = user("auth0|dave");

    let organization = service
        .create_organization(&alice, ResourceFields::new("Panda Inc."))
        .await
        .unwrap();
    let id = &organization.id;

    let lead = service
        .create_role(&alice, id, "lead", &[Action::Read, Action::CreateRoles])
        .await
        .unwrap();
    let editor = service
        .create_role(&alice, id, "editor", &[Action::Update])
        .await
        .unwrap();
    service
        .add_role_member(&alice, id, &lead.role.id, &carol)
        .await
        .unwrap();

    // Carol manages the members of the role she created, without holding `add_roles`.
    let reviewer = service
        .create_role(&carol, id, "reviewer", &[Action::Read])
        .await
        .unwrap();
    assert!(
        !service
            .has_permission(&carol, &PermissionName::resource(id, Action::AddRoles))
            .await
            .unwrap()
    );
    service
        .add_role_member(&carol, id, &reviewer.role.id, &dave)
        .await
        .unwrap();
    service.get_organization(&dave, id).await.unwrap();
    service
        .remove_role_member(&carol, id, &reviewer.role.id, &dave)
        .await
        .unwrap();
    assert_kind(
        service.get_organization(&dave, id).await,
        ErrorKind::Authorization,
    );

    assert_kind(
        service
            .add_role_member(&carol, id, &editor.role.id, &dave)
            .await,
        ErrorKind::Authorization,
    );
    assert_kind(
        service
            .remove_role_member(&carol, id, &lead.role.id, &carol)
            .await,
        ErrorKind::Authorization,
    );
}

#[tokio::test]
async fn owner_keeps_owner_role() {
    let (service, _authority) = service().await;
    let alice = user("auth0|alice");
    let carol = user("auth0|carol");

    let organization = service
        .create_organization(&alice, ResourceFields::new("Panda Inc."))
        .await
        .unwrap();
    let id = &organization.id;

    let admins = service
        .create_role(&alice, id, "admins", &[Action::Read, Action::RemoveRoles])
        .await
        .unwrap();
    service
        .add_role_member(&alice, id, &admins.role.id, &carol)
        .await
        .unwrap();

    let owner_name = format!("org{id}:owner");
    let owner_role = service
        .list_roles(&carol, id)
        .await
        .unwrap()
        .into_iter()
        .find(|role| role.name == owner_name)
        .unwrap();

    // `remove_roles` covers every role, but not unbinding the owner from their own.
    assert_kind(
        service
            .remove_role_member(&carol, id, &owner_role.id, &alice)
            .await,
        ErrorKind::Validation,
    );
    assert!(
        service
            .has_permission(&alice, &PermissionName::resource(id, Action::Delete))
            .await
            .unwrap()
    );

    // Other members of the owner role can still be removed.
    service
        .add_role_member(&alice, id, &owner_role.id, &carol)
        .await
        .unwrap();
    service
        .remove_role_member(&carol, id, &owner_role.id, &carol)
        .await
        .unwrap();
    assert!(
        !service
            .has_permission(&carol, &PermissionName::resource(id, Action::Delete))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn board_items() {
    let (service, _authority) = service().await;
    let alice = user("auth0|alice");
    let bob = user("auth0|bob");

    let board = service
        .create_board(&alice, ResourceFields::new("Roadmap"), true)
        .await
        .unwrap();

    for title in ["A", "B", "C", "D"] {
        service
            .create_panel(&alice, &board.id, ItemFields::new(title))
            .await
            .unwrap();
    }
    let panels = service.list_panels(&alice, &board.id).await.unwrap();
    assert_eq!(titles(&panels), ["A", "B", "C", "D"]);

    let moved = service
        .move_panel_by_id(&alice, &panels[0].id, 2)
        .await
        .unwrap();
    assert_eq!(moved.position, 2);
    let panels = service.list_panels(&alice, &board.id).await.unwrap();
    assert_eq!(titles(&panels), ["B", "C", "A", "D"]);

    assert_kind(
        service.move_panel_by_id(&alice, &panels[0].id, 4).await,
        ErrorKind::Validation,
    );
    assert_kind(
        service
            .update_panel(
                &alice,
                &panels[0].id,
                ItemUpdate {
                    fields: Some(ItemFields::new("Backlog")),
                    position: Some(-1),
                },
            )
            .await,
        ErrorKind::Validation,
    );
    let unchanged = service.list_panels(&alice, &board.id).await.unwrap();
    assert_eq!(unchanged, panels);

    let stack = service
        .create_stack(&alice, &panels[0].id, ItemFields::new("Ideas"))
        .await
        .unwrap();
    let first = service
        .create_card(&alice, &stack.id, ItemFields::new("Sketch"))
        .await
        .unwrap();
    let second = service
        .create_card(&alice, &stack.id, ItemFields::new("Prototype"))
        .await
        .unwrap();
    assert_eq!((first.position, second.position), (0, 1));

    let renamed = service
        .update_card(
            &alice,
            &second.id,
            ItemUpdate::fields(ItemFields::new("Prototype").with_description("Paper")),
        )
        .await
        .unwrap();
    assert_eq!(renamed.fields.description.as_deref(), Some("Paper"));
    service
        .move_card_by_id(&alice, &second.id, 0)
        .await
        .unwrap();
    service
        .update_stack(&alice, &stack.id, ItemUpdate::fields(ItemFields::new("Plans")))
        .await
        .unwrap();
    service.move_stack_by_id(&alice, &stack.id, 0).await.unwrap();
    let cards = service.list_cards(&alice, &stack.id).await.unwrap();
    assert_eq!(titles(&cards), ["Prototype", "Sketch"]);

    service
        .delete_card_by_id(&alice, &cards[0].id)
        .await
        .unwrap();
    let cards = service.list_cards(&alice, &stack.id).await.unwrap();
    assert_eq!(titles(&cards), ["Sketch"]);
    assert_eq!(cards[0].position, 0);

    // Deleting a panel removes its stacks and cards and closes the gap.
    service
        .delete_panel_by_id(&alice, &panels[0].id)
        .await
        .unwrap();
    assert_kind(
        service.list_cards(&alice, &stack.id).await,
        ErrorKind::NotFound,
    );
    let panels = service.list_panels(&alice, &board.id).await.unwrap();
    assert_eq!(titles(&panels), ["C", "A", "D"]);
    assert_eq!(
        panels.iter().map(|panel| panel.position).collect::<Vec<_>>(),
        [0, 1, 2]
    );

    let stack = service
        .create_stack(&alice, &panels[0].id, ItemFields::new("Later"))
        .await
        .unwrap();
    service
        .delete_stack_by_id(&alice, &stack.id)
        .await
        .unwrap();
    assert!(
        service
            .list_stacks(&alice, &panels[0].id)
            .await
            .unwrap()
            .is_empty()
    );

    service.delete_board(&alice, &board.id).await.unwrap();
    assert_kind(
        service.get_board(&alice, &board.id).await,
        ErrorKind::NotFound,
    );
    assert_kind(
        service.list_panels(&alice, &board.id).await,
        ErrorKind::NotFound,
    );

    assert_kind(
        service
            .create_panel(&bob, &board.id, ItemFields::new("E"))
            .await,
        ErrorKind::NotFound,
    );
}

#[tokio::test]
async fn board_visibility() {
    let (service, _authority) = service().await;
    let alice = user("auth0|alice");
    let bob = user("auth0|bob");
    let carol = user("auth0|carol");

    let board = service
        .create_board(&alice, ResourceFields::new("Roadmap"), true)
        .await
        .unwrap();
    let panel = service
        .create_panel(&alice, &board.id, ItemFields::new("Todo"))
        .await
        .unwrap();

    assert_kind(
        service.get_board(&bob, &board.id).await,
        ErrorKind::Authorization,
    );
    assert_kind(
        service.list_panels(&bob, &board.id).await,
        ErrorKind::Authorization,
    );

    let board = service
        .update_board(&alice, &board.id, ResourceFields::new("Roadmap"), false)
        .await
        .unwrap();
    assert!(!board.is_private);
    assert_eq!(service.get_board(&bob, &board.id).await.unwrap(), board);
    assert_eq!(service.list_panels(&bob, &board.id).await.unwrap(), [panel.clone()]);

    // Reading a public board doesn't allow changing it.
    assert_kind(
        service
            .create_stack(&bob, &panel.id, ItemFields::new("Ideas"))
            .await,
        ErrorKind::Authorization,
    );
    assert_kind(
        service.delete_panel_by_id(&bob, &panel.id).await,
        ErrorKind::Authorization,
    );
    assert_kind(
        service.delete_board(&bob, &board.id).await,
        ErrorKind::Authorization,
    );

    // Board members can read, but not change, private boards.
    service
        .update_board(&alice, &board.id, ResourceFields::new("Roadmap"), true)
        .await
        .unwrap();
    service
        .add_board_member(&alice, &board.id, &carol)
        .await
        .unwrap();
    service.list_panels(&carol, &board.id).await.unwrap();
    assert_kind(
        service
            .update_panel(&carol, &panel.id, ItemUpdate::fields(ItemFields::new("Done")))
            .await,
        ErrorKind::Authorization,
    );
    assert_kind(
        service
            .remove_board_member(&alice, &board.id, &alice)
            .await,
        ErrorKind::Validation,
    );
    service
        .remove_board_member(&alice, &board.id, &carol)
        .await
        .unwrap();
    assert_kind(
        service.list_panels(&carol, &board.id).await,
        ErrorKind::Authorization,
    );
}

#[tokio::test]
async fn concurrent_appends() {
    let (service, _authority) = service().await;
    let alice = user("auth0|alice");

    let board = service
        .create_board(&alice, ResourceFields::new("Roadmap"), false)
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(
        service.create_panel(&alice, &board.id, ItemFields::new("A")),
        service.create_panel(&alice, &board.id, ItemFields::new("B")),
        service.create_panel(&alice, &board.id, ItemFields::new("C")),
    );
    let mut positions = vec![
        a.unwrap().position,
        b.unwrap().position,
        c.unwrap().position,
    ];
    positions.sort();
    assert_eq!(positions, [0, 1, 2]);
}

#[tokio::test]
async fn reads_wait_for_provisioning() {
    let (service, authority) = service().await;
    let alice = user("auth0|alice");

    let roadmap = service
        .create_board(&alice, ResourceFields::new("Roadmap"), false)
        .await
        .unwrap();
    let calls = authority.calls();

    // The read waits for the store while the new board is provisioned.
    let (created, read) = tokio::join!(
        service.create_board(&alice, ResourceFields::new("Backlog"), false),
        service.get_board(&alice, &roadmap.id),
    );
    let backlog = created.unwrap();
    assert_eq!(read.unwrap(), roadmap);
    assert!(authority.calls() > calls);
    assert_eq!(
        service.get_board(&alice, &backlog.id).await.unwrap(),
        backlog
    );
}

#[tokio::test]
async fn failed_provisioning() {
    let (service, authority) = service().await;
    let alice = user("auth0|alice");

    // Nothing was created, the organization is rolled back as well.
    authority.fail_after(0);
    let result = service
        .create_organization(&alice, ResourceFields::new("Panda Inc."))
        .await;
    assert_kind(result, ErrorKind::Dependency);
    authority.recover();
    assert!(authority.roles_with_prefix("org").await.unwrap().is_empty());

    // The owner role was created before the authority failed.
    authority.fail_after(1);
    let result = service
        .create_board(&alice, ResourceFields::new("Roadmap"), true)
        .await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialProvisioning);
    assert!(!err.kind().is_retryable());
    authority.recover();
    assert_eq!(authority.roles_with_prefix("org").await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_teardown_keeps_board() {
    let (service, authority) = service().await;
    let alice = user("auth0|alice");

    let board = service
        .create_board(&alice, ResourceFields::new("Roadmap"), true)
        .await
        .unwrap();
    service
        .create_panel(&alice, &board.id, ItemFields::new("Todo"))
        .await
        .unwrap();

    // Resolving the permission takes three calls: the roles of alice and the permissions of
    // both of them.
    authority.fail_after(3);
    assert_kind(
        service.delete_board(&alice, &board.id).await,
        ErrorKind::Dependency,
    );
    authority.recover();

    assert_eq!(service.get_board(&alice, &board.id).await.unwrap(), board);
    assert_eq!(service.list_panels(&alice, &board.id).await.unwrap().len(), 1);

    service.delete_board(&alice, &board.id).await.unwrap();
    assert_kind(
        service.get_board(&alice, &board.id).await,
        ErrorKind::NotFound,
    );
}

#[tokio::test]
async fn unavailable_authority() {
    let (service, authority) = service().await;
    let alice = user("auth0|alice");

    let organization = service
        .create_organization(&alice, ResourceFields::new("Panda Inc."))
        .await
        .unwrap();
    let read = PermissionName::resource(&organization.id, Action::Read);
    assert!(service.has_permission(&alice, &read).await.unwrap());
    assert!(
        !service
            .has_permission(&user("auth0|bob"), &read)
            .await
            .unwrap()
    );

    authority.fail_after(0);
    let err = service.has_permission(&alice, &read).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);
    assert!(err.kind().is_retryable());
    assert_kind(
        service.get_organization(&alice, &organization.id).await,
        ErrorKind::Dependency,
    );
}
