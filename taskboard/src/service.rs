// SPDX-License-Identifier: MIT OR Apache-2.0

use taskboard_auth::{
    Authority, CustomRole, PermissionResolver, Provisioner, Role, RoleUpdate, Roles,
};
use taskboard_core::{
    Action, Board, Id, ItemFields, ItemKind, ItemUpdate, OrderedItem, Organization,
    PermissionName, Position, ResourceFields, RoleAction, RoleId, RoleName, ScopeKind, UserId,
};
use taskboard_store::{Positions, ResourceStore, SqliteStore, atomically};
use tracing::{debug, info};

use crate::builder::ServiceBuilder;
use crate::error::ServiceError;

/// Organizations, boards and their ordered items, guarded by the roles of the external authority.
///
/// Every operation is run on behalf of a user and checks their permission on the organization or
/// owning board first. Resources are looked up before the check, a missing resource is reported as
/// not found to everyone.
///
/// Creating and deleting a resource touches both the database and the authority. The database
/// transaction stays open while the authority is called and is only committed after it succeeded:
/// a resource is never stored without its roles and is kept when its roles could not be removed,
/// so the delete can be repeated.
///
/// The store allows one open transaction at a time. While an organization or board is created or
/// deleted every other request waits for the authority calls to finish, reads included, which can
/// take several round trips of the authority timeout.
#[derive(Clone, Debug)]
pub struct Service<A> {
    store: SqliteStore<'static>,
    positions: Positions<SqliteStore<'static>>,
    resolver: PermissionResolver<A>,
    provisioner: Provisioner<A>,
    roles: Roles<A>,
}

impl<A> Service<A>
where
    A: Authority + Clone,
    A::Error: Send + Sync + 'static,
{
    pub fn builder(authority: A) -> ServiceBuilder<A> {
        ServiceBuilder::new(authority)
    }

    pub(crate) fn new(store: SqliteStore<'static>, authority: A) -> Self {
        Self {
            positions: Positions::new(store.clone()),
            store,
            resolver: PermissionResolver::new(authority.clone()),
            provisioner: Provisioner::new(authority.clone()),
            roles: Roles::new(authority),
        }
    }

    pub fn store(&self) -> &SqliteStore<'static> {
        &self.store
    }

    /// Returns true if the user holds the permission through any of their roles.
    pub async fn has_permission(
        &self,
        user: &UserId,
        permission: &PermissionName,
    ) -> Result<bool, ServiceError> {
        Ok(self.resolver.has_permission(user, permission).await?)
    }

    // Organizations.

    /// Creates an organization owned by the user, together with its owner and member roles.
    pub async fn create_organization(
        &self,
        user: &UserId,
        fields: ResourceFields,
    ) -> Result<Organization, ServiceError> {
        fields.validate()?;

        let organization = Organization {
            id: Id::new(),
            owner_id: user.clone(),
            name: fields.name,
            description: fields.description,
        };

        atomically(&self.store, async |store: &SqliteStore<'static>| {
            store.insert_organization(&organization).await?;
            self.provisioner
                .initialize_organization(user, &organization.id)
                .await?;
            Ok::<_, ServiceError>(())
        })
        .await?;

        info!(id = %organization.id, owner = %user, "created organization");
        Ok(organization)
    }

    pub async fn get_organization(
        &self,
        user: &UserId,
        id: &Id,
    ) -> Result<Organization, ServiceError> {
        let organization = self.load_organization(id).await?;
        self.authorize(user, id, Action::Read).await?;
        Ok(organization)
    }

    pub async fn update_organization(
        &self,
        user: &UserId,
        id: &Id,
        fields: ResourceFields,
    ) -> Result<Organization, ServiceError> {
        fields.validate()?;
        let mut organization = self.load_organization(id).await?;
        self.authorize(user, id, Action::Update).await?;

        atomically(&self.store, async |store: &SqliteStore<'static>| {
            match store.update_organization(id, &fields).await? {
                true => Ok(()),
                false => Err(ServiceError::NotFound(format!("organization {id}"))),
            }
        })
        .await?;

        organization.name = fields.name;
        organization.description = fields.description;
        Ok(organization)
    }

    /// Deletes an organization together with all its roles and permissions.
    pub async fn delete_organization(&self, user: &UserId, id: &Id) -> Result<(), ServiceError> {
        self.load_organization(id).await?;
        self.authorize(user, id, Action::Delete).await?;

        atomically(&self.store, async |store: &SqliteStore<'static>| {
            store.delete_organization(id).await?;
            self.provisioner.teardown_resource(id).await?;
            Ok::<_, ServiceError>(())
        })
        .await?;

        info!(%id, "deleted organization");
        Ok(())
    }

    pub async fn add_organization_member(
        &self,
        user: &UserId,
        id: &Id,
        member: &UserId,
    ) -> Result<(), ServiceError> {
        self.load_organization(id).await?;
        self.authorize(user, id, Action::AddMembers).await?;
        Ok(self.roles.add_member(id, member).await?)
    }

    /// Removes a user and every role they hold from the organization. The owner can't be
    /// removed.
    pub async fn remove_organization_member(
        &self,
        user: &UserId,
        id: &Id,
        member: &UserId,
    ) -> Result<(), ServiceError> {
        let organization = self.load_organization(id).await?;
        self.authorize(user, id, Action::RemoveMembers).await?;
        if &organization.owner_id == member {
            return Err(ServiceError::Validation(format!(
                "can't remove owner {member} from organization {id}"
            )));
        }
        Ok(self.roles.remove_member(id, member).await?)
    }

    pub async fn list_organization_members(
        &self,
        user: &UserId,
        id: &Id,
    ) -> Result<Vec<UserId>, ServiceError> {
        self.load_organization(id).await?;
        self.authorize(user, id, Action::Read).await?;
        Ok(self.roles.members(id).await?)
    }

    // Roles.

    /// Creates a custom role of an organization granting the given actions. The user is bound to
    /// the delegation role of the new role and manages its members from then on.
    pub async fn create_role(
        &self,
        user: &UserId,
        organization: &Id,
        label: &str,
        actions: &[Action],
    ) -> Result<CustomRole, ServiceError> {
        self.load_organization(organization).await?;
        self.authorize(user, organization, Action::CreateRoles).await?;
        Ok(self
            .roles
            .create_role(user, organization, label, actions)
            .await?)
    }

    /// Replaces the actions granted by a custom role.
    pub async fn update_role(
        &self,
        user: &UserId,
        organization: &Id,
        role: &RoleId,
        actions: &[Action],
    ) -> Result<RoleUpdate, ServiceError> {
        self.load_organization(organization).await?;
        self.authorize(user, organization, Action::EditRoles).await?;
        Ok(self.roles.update_role(organization, role, actions).await?)
    }

    pub async fn delete_role(
        &self,
        user: &UserId,
        organization: &Id,
        role: &RoleId,
    ) -> Result<(), ServiceError> {
        self.load_organization(organization).await?;
        self.authorize(user, organization, Action::DeleteRoles).await?;
        Ok(self.roles.delete_role(organization, role).await?)
    }

    pub async fn list_roles(
        &self,
        user: &UserId,
        organization: &Id,
    ) -> Result<Vec<Role>, ServiceError> {
        self.load_organization(organization).await?;
        self.authorize(user, organization, Action::Read).await?;
        Ok(self.roles.roles(organization).await?)
    }

    /// Binds a user to a role of the organization.
    ///
    /// Allowed with the permission scoped to the role or the organization-wide `add_roles`.
    pub async fn add_role_member(
        &self,
        user: &UserId,
        organization: &Id,
        role: &RoleId,
        member: &UserId,
    ) -> Result<(), ServiceError> {
        self.load_organization(organization).await?;
        if !self
            .resolver
            .can_add_member_to_role(user, organization, role)
            .await?
        {
            return Err(ServiceError::Authorization(PermissionName::role(
                organization,
                role,
                RoleAction::AddMember,
            )));
        }
        Ok(self
            .roles
            .add_role_member(organization, role, member)
            .await?)
    }

    /// Unbinds a user from a role of the organization.
    ///
    /// Allowed with the permission scoped to the role or the organization-wide `remove_roles`. The
    /// owner can't be removed from the owner role.
    pub async fn remove_role_member(
        &self,
        user: &UserId,
        organization: &Id,
        role: &RoleId,
        member: &UserId,
    ) -> Result<(), ServiceError> {
        let loaded = self.load_organization(organization).await?;
        if !self
            .resolver
            .can_remove_member_from_role(user, organization, role)
            .await?
        {
            return Err(ServiceError::Authorization(PermissionName::role(
                organization,
                role,
                RoleAction::RemoveMember,
            )));
        }
        if &loaded.owner_id == member {
            let owner_role = RoleName::owner(organization).to_string();
            let roles = self.roles.roles(organization).await?;
            if roles
                .iter()
                .any(|candidate| &candidate.id == role && candidate.name == owner_role)
            {
                return Err(ServiceError::Validation(format!(
                    "can't remove owner {member} from owner role {role}"
                )));
            }
        }
        Ok(self
            .roles
            .remove_role_member(organization, role, member)
            .await?)
    }

    // Boards.

    /// Creates a board owned by the user, together with its owner and member roles.
    pub async fn create_board(
        &self,
        user: &UserId,
        fields: ResourceFields,
        is_private: bool,
    ) -> Result<Board, ServiceError> {
        fields.validate()?;

        let board = Board {
            id: Id::new(),
            owner_id: user.clone(),
            name: fields.name,
            description: fields.description,
            is_private,
        };

        atomically(&self.store, async |store: &SqliteStore<'static>| {
            store.insert_board(&board).await?;
            self.provisioner.initialize_board(user, &board.id).await?;
            Ok::<_, ServiceError>(())
        })
        .await?;

        info!(id = %board.id, owner = %user, is_private, "created board");
        Ok(board)
    }

    /// Returns a board. Public boards can be read by everyone.
    pub async fn get_board(&self, user: &UserId, id: &Id) -> Result<Board, ServiceError> {
        let board = self.load_board(id).await?;
        self.authorize_read(user, &board).await?;
        Ok(board)
    }

    pub async fn update_board(
        &self,
        user: &UserId,
        id: &Id,
        fields: ResourceFields,
        is_private: bool,
    ) -> Result<Board, ServiceError> {
        fields.validate()?;
        let mut board = self.load_board(id).await?;
        self.authorize(user, id, Action::Update).await?;

        atomically(&self.store, async |store: &SqliteStore<'static>| {
            match store.update_board(id, &fields, is_private).await? {
                true => Ok(()),
                false => Err(ServiceError::NotFound(format!("board {id}"))),
            }
        })
        .await?;

        board.name = fields.name;
        board.description = fields.description;
        board.is_private = is_private;
        Ok(board)
    }

    /// Deletes a board with all its panels, stacks and cards, its roles and permissions.
    pub async fn delete_board(&self, user: &UserId, id: &Id) -> Result<(), ServiceError> {
        self.load_board(id).await?;
        self.authorize(user, id, Action::Delete).await?;

        atomically(&self.store, async |store: &SqliteStore<'static>| {
            store.delete_board(id).await?;
            self.provisioner.teardown_resource(id).await?;
            Ok::<_, ServiceError>(())
        })
        .await?;

        info!(%id, "deleted board");
        Ok(())
    }

    pub async fn add_board_member(
        &self,
        user: &UserId,
        id: &Id,
        member: &UserId,
    ) -> Result<(), ServiceError> {
        self.load_board(id).await?;
        self.authorize(user, id, Action::AddMembers).await?;
        Ok(self.roles.add_member(id, member).await?)
    }

    pub async fn remove_board_member(
        &self,
        user: &UserId,
        id: &Id,
        member: &UserId,
    ) -> Result<(), ServiceError> {
        let board = self.load_board(id).await?;
        self.authorize(user, id, Action::RemoveMembers).await?;
        if &board.owner_id == member {
            return Err(ServiceError::Validation(format!(
                "can't remove owner {member} from board {id}"
            )));
        }
        Ok(self.roles.remove_member(id, member).await?)
    }

    // Panels, stacks and cards.

    /// Appends a panel to the end of a board.
    pub async fn create_panel(
        &self,
        user: &UserId,
        board: &Id,
        fields: ItemFields,
    ) -> Result<OrderedItem, ServiceError> {
        self.create_item(user, ItemKind::Panel, board, fields).await
    }

    /// Appends a stack to the end of a panel.
    pub async fn create_stack(
        &self,
        user: &UserId,
        panel: &Id,
        fields: ItemFields,
    ) -> Result<OrderedItem, ServiceError> {
        self.create_item(user, ItemKind::Stack, panel, fields).await
    }

    /// Appends a card to the end of a stack.
    pub async fn create_card(
        &self,
        user: &UserId,
        stack: &Id,
        fields: ItemFields,
    ) -> Result<OrderedItem, ServiceError> {
        self.create_item(user, ItemKind::Card, stack, fields).await
    }

    pub async fn update_panel(
        &self,
        user: &UserId,
        id: &Id,
        update: ItemUpdate,
    ) -> Result<OrderedItem, ServiceError> {
        self.update_item(user, ItemKind::Panel, id, update).await
    }

    pub async fn update_stack(
        &self,
        user: &UserId,
        id: &Id,
        update: ItemUpdate,
    ) -> Result<OrderedItem, ServiceError> {
        self.update_item(user, ItemKind::Stack, id, update).await
    }

    pub async fn update_card(
        &self,
        user: &UserId,
        id: &Id,
        update: ItemUpdate,
    ) -> Result<OrderedItem, ServiceError> {
        self.update_item(user, ItemKind::Card, id, update).await
    }

    pub async fn move_panel_by_id(
        &self,
        user: &UserId,
        id: &Id,
        position: Position,
    ) -> Result<OrderedItem, ServiceError> {
        self.update_item(user, ItemKind::Panel, id, ItemUpdate::position(position))
            .await
    }

    pub async fn move_stack_by_id(
        &self,
        user: &UserId,
        id: &Id,
        position: Position,
    ) -> Result<OrderedItem, ServiceError> {
        self.update_item(user, ItemKind::Stack, id, ItemUpdate::position(position))
            .await
    }

    pub async fn move_card_by_id(
        &self,
        user: &UserId,
        id: &Id,
        position: Position,
    ) -> Result<OrderedItem, ServiceError> {
        self.update_item(user, ItemKind::Card, id, ItemUpdate::position(position))
            .await
    }

    /// Deletes a panel with all its stacks and cards.
    pub async fn delete_panel_by_id(&self, user: &UserId, id: &Id) -> Result<(), ServiceError> {
        self.delete_item(user, ItemKind::Panel, id).await
    }

    /// Deletes a stack with all its cards.
    pub async fn delete_stack_by_id(&self, user: &UserId, id: &Id) -> Result<(), ServiceError> {
        self.delete_item(user, ItemKind::Stack, id).await
    }

    pub async fn delete_card_by_id(&self, user: &UserId, id: &Id) -> Result<(), ServiceError> {
        self.delete_item(user, ItemKind::Card, id).await
    }

    /// Panels of a board in their order.
    pub async fn list_panels(
        &self,
        user: &UserId,
        board: &Id,
    ) -> Result<Vec<OrderedItem>, ServiceError> {
        self.list_items(user, ItemKind::Panel, board).await
    }

    pub async fn list_stacks(
        &self,
        user: &UserId,
        panel: &Id,
    ) -> Result<Vec<OrderedItem>, ServiceError> {
        self.list_items(user, ItemKind::Stack, panel).await
    }

    pub async fn list_cards(
        &self,
        user: &UserId,
        stack: &Id,
    ) -> Result<Vec<OrderedItem>, ServiceError> {
        self.list_items(user, ItemKind::Card, stack).await
    }

    async fn create_item(
        &self,
        user: &UserId,
        kind: ItemKind,
        scope: &Id,
        fields: ItemFields,
    ) -> Result<OrderedItem, ServiceError> {
        let board = self.owning_board(kind.scope(), scope).await?;
        self.authorize(user, &board.id, Action::Update).await?;
        Ok(self.positions.create(kind, scope, fields).await?)
    }

    async fn update_item(
        &self,
        user: &UserId,
        kind: ItemKind,
        id: &Id,
        update: ItemUpdate,
    ) -> Result<OrderedItem, ServiceError> {
        let item = self.positions.get(kind, id).await?;
        let board = self.owning_board(kind.scope(), &item.scope).await?;
        self.authorize(user, &board.id, Action::Update).await?;
        Ok(self.positions.update(kind, id, update).await?)
    }

    async fn delete_item(
        &self,
        user: &UserId,
        kind: ItemKind,
        id: &Id,
    ) -> Result<(), ServiceError> {
        let item = self.positions.get(kind, id).await?;
        let board = self.owning_board(kind.scope(), &item.scope).await?;
        self.authorize(user, &board.id, Action::Update).await?;
        Ok(self.positions.delete(kind, id).await?)
    }

    async fn list_items(
        &self,
        user: &UserId,
        kind: ItemKind,
        scope: &Id,
    ) -> Result<Vec<OrderedItem>, ServiceError> {
        let board = self.owning_board(kind.scope(), scope).await?;
        self.authorize_read(user, &board).await?;
        Ok(self.positions.list(kind, scope).await?)
    }

    /// Follows the scopes of panels and stacks up to the board they are part of.
    async fn owning_board(&self, kind: ScopeKind, scope: &Id) -> Result<Board, ServiceError> {
        let mut kind = kind;
        let mut scope = scope.clone();
        while let Some(item_kind) = kind.as_item() {
            let item = self.positions.get(item_kind, &scope).await?;
            kind = item_kind.scope();
            scope = item.scope;
        }
        self.load_board(&scope).await
    }

    async fn load_organization(&self, id: &Id) -> Result<Organization, ServiceError> {
        atomically(&self.store, async |store: &SqliteStore<'static>| {
            store
                .get_organization(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("organization {id}")))
        })
        .await
    }

    async fn load_board(&self, id: &Id) -> Result<Board, ServiceError> {
        atomically(&self.store, async |store: &SqliteStore<'static>| {
            store
                .get_board(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("board {id}")))
        })
        .await
    }

    async fn authorize(
        &self,
        user: &UserId,
        resource: &Id,
        action: Action,
    ) -> Result<(), ServiceError> {
        let permission = PermissionName::resource(resource, action);
        if self.resolver.has_permission(user, &permission).await? {
            Ok(())
        } else {
            debug!(%user, %permission, "denied");
            Err(ServiceError::Authorization(permission))
        }
    }

    async fn authorize_read(&self, user: &UserId, board: &Board) -> Result<(), ServiceError> {
        if !board.is_private {
            return Ok(());
        }
        self.authorize(user, &board.id, Action::Read).await
    }
}
