// Surface roles (spec §3: role ∈ {None, Toplevel, Popup, Subsurface, Cursor})
//
// The role tag only tracks *which* presentation kind a surface has;
// role-specific protocol state (xdg_toplevel configure state,
// subsurface sync mode, ...) is owned by the ways/ layer that
// assigned the role, keyed by SurfaceId, not by this enum.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Toplevel,
    Popup,
    Subsurface,
    Cursor,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Toplevel => "toplevel",
            Role::Popup => "popup",
            Role::Subsurface => "subsurface",
            Role::Cursor => "cursor",
        }
    }
}
