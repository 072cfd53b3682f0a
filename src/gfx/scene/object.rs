//! Static scene objects loaded from the scene file.

use crate::gfx::picking::PickId;
use crate::gfx::resources::mesh::MeshId;
use crate::gfx::scene::graph::NodeId;

/// What an object is, decided once from its name when it is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRole {
    Skybox,
    MuzzleFlash,
    Revolver,
    ChestTop,
    Water,
    Church,
    House,
    Eagle,
    Prop,
}

impl ObjectRole {
    const PREFIXES: [(&'static str, ObjectRole); 8] = [
        ("skybox", ObjectRole::Skybox),
        ("muzzle_flash", ObjectRole::MuzzleFlash),
        ("Revolver", ObjectRole::Revolver),
        ("Chest_Top", ObjectRole::ChestTop),
        ("Water", ObjectRole::Water),
        ("Church", ObjectRole::Church),
        ("House", ObjectRole::House),
        ("Eagle", ObjectRole::Eagle),
    ];

    pub fn from_name(name: &str) -> Self {
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|&(_, role)| role)
            .unwrap_or(ObjectRole::Prop)
    }

    pub fn pick_id(self) -> Option<PickId> {
        match self {
            ObjectRole::Revolver => Some(PickId::Revolver),
            ObjectRole::ChestTop => Some(PickId::ChestTop),
            ObjectRole::Eagle => Some(PickId::Eagle),
            _ => None,
        }
    }

    /// Roles drawn by a dedicated pass instead of the main opaque pass.
    pub fn has_own_pass(self) -> bool {
        matches!(
            self,
            ObjectRole::Skybox | ObjectRole::MuzzleFlash | ObjectRole::Eagle
        )
    }
}

/// A renderable object: a scene node plus the mesh it draws.
#[derive(Debug, Clone)]
pub struct GameObject {
    pub node: NodeId,
    pub role: ObjectRole,
    pub mesh: Option<MeshId>,
    pub visible: bool,
}

impl GameObject {
    pub fn new(node: NodeId, role: ObjectRole, mesh: Option<MeshId>) -> Self {
        Self {
            node,
            role,
            mesh,
            visible: true,
        }
    }
}
