//! Which entity types carry a `tenantId` and get filtered.
//!
//! The list is maintained by hand. An entity missing from
//! [`SCOPED_ENTITIES`] is treated as unscoped, so adding a tenant-aware
//! table means editing this file (and the registry tests).

/// Isolation class of an entity type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Scoped,
    Unscoped,
}

/// Entity types whose rows belong to a tenant.
pub const SCOPED_ENTITIES: &[&str] = &[
    "SysUser",
    "SysRole",
    "SysDept",
    "SysPost",
    "SysDictType",
    "SysDictData",
    "SysConfig",
    "SysNotice",
    "SysJob",
    "SysJobLog",
    "SysOperLog",
    "SysLoginLog",
    "SysOss",
    "SysUserRole",
    "SysRoleMenu",
    "SysRoleDept",
    "SysUserPost",
];

/// Known platform-level entity types. Listed for audit only: anything not in
/// [`SCOPED_ENTITIES`] is unscoped whether or not it appears here.
pub const UNSCOPED_ENTITIES: &[&str] = &["SysTenant", "SysTenantPackage", "SysClient", "SysMenu"];

#[must_use]
pub fn classify(entity: &str) -> EntityClass {
    if SCOPED_ENTITIES.contains(&entity) {
        EntityClass::Scoped
    } else {
        EntityClass::Unscoped
    }
}

#[inline]
#[must_use]
pub fn is_scoped(entity: &str) -> bool {
    classify(entity) == EntityClass::Scoped
}
