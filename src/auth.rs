//! Role/permission model. An actor's effective permissions are either the
//! full set (static super-admin allowlist) or the union of the permission
//! sets of every role assigned to them. Permission tags are a closed
//! enumeration, validated wherever roles enter the system.

use std::collections::BTreeSet;

use crate::config::AppConfig;
use crate::db::models::User;
use crate::db::Database;
use crate::error::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ManageUsers,
    ManagePayments,
    ApproveTx,
    Reports,
    Broadcast,
    Settings,
    /// Reserved for the super-admin allowlist; never grantable via roles.
    ManageAdmins,
}

pub const ALL_PERMISSIONS: [Permission; 7] = [
    Permission::ManageUsers,
    Permission::ManagePayments,
    Permission::ApproveTx,
    Permission::Reports,
    Permission::Broadcast,
    Permission::Settings,
    Permission::ManageAdmins,
];

impl Permission {
    pub fn tag(self) -> &'static str {
        match self {
            Permission::ManageUsers => "ManageUsers",
            Permission::ManagePayments => "ManagePayments",
            Permission::ApproveTx => "ApproveTx",
            Permission::Reports => "Reports",
            Permission::Broadcast => "Broadcast",
            Permission::Settings => "Settings",
            Permission::ManageAdmins => "ManageAdmins",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        ALL_PERMISSIONS.into_iter().find(|p| p.tag() == tag)
    }
}

pub type PermissionSet = BTreeSet<Permission>;

pub fn full_permission_set() -> PermissionSet {
    ALL_PERMISSIONS.into_iter().collect()
}

/// Parses a stored JSON tag list into a permission set. Unknown tags are an
/// error so that corrupted or hand-edited role rows surface loudly.
pub fn parse_permission_tags(value: &serde_json::Value) -> Result<PermissionSet, BotError> {
    let tags = value
        .as_array()
        .ok_or(BotError::PolicyViolation("role permissions must be a list"))?;
    let mut set = PermissionSet::new();
    for tag in tags {
        let tag = tag
            .as_str()
            .ok_or(BotError::PolicyViolation("permission tag must be a string"))?;
        let perm = Permission::from_tag(tag)
            .ok_or(BotError::PolicyViolation("unknown permission tag"))?;
        set.insert(perm);
    }
    Ok(set)
}

pub fn permission_tags_json(set: &PermissionSet) -> serde_json::Value {
    serde_json::Value::Array(
        set.iter()
            .map(|p| serde_json::Value::String(p.tag().to_string()))
            .collect(),
    )
}

/// Pure composition rule: allowlist beats everything, a non-admin gets
/// nothing, an admin gets the union of their roles.
pub fn compose_permissions(
    is_super_admin: bool,
    is_admin: bool,
    role_sets: &[PermissionSet],
) -> PermissionSet {
    if is_super_admin {
        return full_permission_set();
    }
    if !is_admin {
        return PermissionSet::new();
    }
    role_sets.iter().flatten().copied().collect()
}

/// Effective permissions of the actor behind `telegram_id`. Unknown users
/// have none.
pub async fn permissions_of(
    db: &Database,
    config: &AppConfig,
    telegram_id: i64,
) -> Result<PermissionSet, BotError> {
    if config.is_super_admin(telegram_id) {
        return Ok(full_permission_set());
    }

    let user = match db.get_user_by_telegram_id(telegram_id).await? {
        Some(user) => user,
        None => return Ok(PermissionSet::new()),
    };
    if !user.is_admin {
        return Ok(PermissionSet::new());
    }

    let mut role_sets = Vec::new();
    for role in db.roles_of_user(user.id).await? {
        role_sets.push(parse_permission_tags(&role.permissions)?);
    }
    Ok(compose_permissions(false, true, &role_sets))
}

pub async fn has_permission(
    db: &Database,
    config: &AppConfig,
    telegram_id: i64,
    permission: Permission,
) -> Result<bool, BotError> {
    Ok(permissions_of(db, config, telegram_id).await?.contains(&permission))
}

pub async fn require(
    db: &Database,
    config: &AppConfig,
    telegram_id: i64,
    permission: Permission,
) -> Result<(), BotError> {
    if has_permission(db, config, telegram_id, permission).await? {
        Ok(())
    } else {
        Err(BotError::PermissionDenied(permission))
    }
}

/// Grants admin status (permanent or temporary). Super-admin only; writes
/// the before/after admin flags to the audit log.
pub async fn grant_admin(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    target_telegram_id: i64,
    temporary: bool,
) -> Result<User, BotError> {
    require(db, config, actor_telegram_id, Permission::ManageAdmins).await?;

    let actor = db
        .get_user_by_telegram_id(actor_telegram_id)
        .await?
        .ok_or(BotError::NotFound("actor"))?;
    let target = db
        .get_user_by_telegram_id(target_telegram_id)
        .await?
        .ok_or(BotError::NotFound("user"))?;

    if !target.is_registered {
        return Err(BotError::PolicyViolation("target user is not registered"));
    }
    if target.is_admin || config.is_super_admin(target_telegram_id) {
        return Err(BotError::PolicyViolation("user is already an admin"));
    }

    let action = if temporary { "grant_temporary_admin" } else { "grant_admin" };
    db.set_admin_flags(actor.id, &target, true, temporary, action)
        .await
}

/// Revokes database admin status. Allowlisted super-admins cannot be
/// revoked through this path: the attempt fails and nothing is mutated.
pub async fn revoke_admin(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    target_telegram_id: i64,
) -> Result<User, BotError> {
    require(db, config, actor_telegram_id, Permission::ManageAdmins).await?;

    if config.is_super_admin(target_telegram_id) {
        return Err(BotError::PolicyViolation(
            "super-admins cannot be revoked through the admin UI",
        ));
    }

    let actor = db
        .get_user_by_telegram_id(actor_telegram_id)
        .await?
        .ok_or(BotError::NotFound("actor"))?;
    let target = db
        .get_user_by_telegram_id(target_telegram_id)
        .await?
        .ok_or(BotError::NotFound("user"))?;

    if !target.is_admin {
        return Err(BotError::PolicyViolation("user is not an admin"));
    }

    db.set_admin_flags(actor.id, &target, false, false, "revoke_admin")
        .await
}

/// Attaches an existing role to an admin. The target must already hold
/// admin status; roles carry no weight for ordinary users.
pub async fn assign_role_to_admin(
    db: &Database,
    config: &AppConfig,
    actor_telegram_id: i64,
    target_telegram_id: i64,
    role_name: &str,
) -> Result<(), BotError> {
    require(db, config, actor_telegram_id, Permission::ManageAdmins).await?;

    let target = db
        .get_user_by_telegram_id(target_telegram_id)
        .await?
        .ok_or(BotError::NotFound("user"))?;
    if !target.is_admin {
        return Err(BotError::PolicyViolation("roles can only be assigned to admins"));
    }

    let role = db
        .get_role_by_name(role_name)
        .await?
        .ok_or(BotError::NotFound("role"))?;
    db.assign_role(target.id, role.id).await?;
    tracing::info!(
        target = target_telegram_id,
        role = role_name,
        "role assigned"
    );
    Ok(())
}

/// `ManageAdmins` belongs to the allowlist, not the role table.
pub fn validate_role_grant(permissions: &PermissionSet) -> Result<(), BotError> {
    if permissions.contains(&Permission::ManageAdmins) {
        return Err(BotError::PolicyViolation(
            "ManageAdmins cannot be granted through roles",
        ));
    }
    Ok(())
}

/// Creates or updates a role from a validated tag set.
pub async fn define_role(
    db: &Database,
    name: &str,
    permissions: &PermissionSet,
) -> Result<(), BotError> {
    validate_role_grant(permissions)?;
    db.create_role(name, &permission_tags_json(permissions)).await?;
    Ok(())
}

/// Seeds the standard role set on first startup. Existing roles are left
/// untouched.
pub async fn ensure_default_roles(db: &Database) -> Result<(), BotError> {
    if db.count_roles().await? > 0 {
        return Ok(());
    }

    let defaults: [(&str, &[Permission]); 4] = [
        (
            "Finance Manager",
            &[Permission::ManagePayments, Permission::ApproveTx, Permission::Reports],
        ),
        ("User Manager", &[Permission::ManageUsers, Permission::Reports]),
        ("Support Agent", &[Permission::ManageUsers, Permission::Broadcast]),
        ("Viewer", &[Permission::Reports]),
    ];

    for (name, perms) in defaults {
        let set: PermissionSet = perms.iter().copied().collect();
        define_role(db, name, &set).await?;
    }
    tracing::info!("default roles created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(perms: &[Permission]) -> PermissionSet {
        perms.iter().copied().collect()
    }

    #[test]
    fn super_admin_gets_full_set_regardless_of_roles() {
        let composed = compose_permissions(true, false, &[]);
        assert_eq!(composed, full_permission_set());

        // Role rows make no difference for allowlisted actors.
        let composed = compose_permissions(true, true, &[set(&[Permission::Reports])]);
        assert_eq!(composed, full_permission_set());
    }

    #[test]
    fn non_admin_gets_nothing() {
        let composed = compose_permissions(false, false, &[set(&[Permission::ApproveTx])]);
        assert!(composed.is_empty());
    }

    #[test]
    fn admin_permissions_are_the_union_of_roles() {
        let composed = compose_permissions(
            false,
            true,
            &[
                set(&[Permission::ApproveTx, Permission::Reports]),
                set(&[Permission::Broadcast, Permission::Reports]),
            ],
        );
        assert_eq!(
            composed,
            set(&[Permission::ApproveTx, Permission::Reports, Permission::Broadcast])
        );
    }

    #[test]
    fn tags_round_trip_through_json() {
        let original = set(&[Permission::ManageUsers, Permission::Settings]);
        let json = permission_tags_json(&original);
        assert_eq!(parse_permission_tags(&json).unwrap(), original);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let json = serde_json::json!(["ApproveTx", "LaunchMissiles"]);
        assert!(matches!(
            parse_permission_tags(&json),
            Err(BotError::PolicyViolation(_))
        ));
    }

    #[test]
    fn manage_admins_cannot_enter_a_role() {
        assert_eq!(Permission::from_tag("ManageAdmins"), Some(Permission::ManageAdmins));
        let perms = set(&[Permission::ApproveTx, Permission::ManageAdmins]);
        assert!(matches!(
            validate_role_grant(&perms),
            Err(BotError::PolicyViolation(_))
        ));
        assert!(validate_role_grant(&set(&[Permission::ApproveTx])).is_ok());
    }
}
