//! # Object Picking
//!
//! Pickable objects are drawn with a stencil tag equal to their [`PickId`].
//! A click reads the tag under the cursor back from the previous frame and
//! maps it to the action for that object.
//!
//! ```
//! use diorama::gfx::picking::PickId;
//!
//! assert_eq!(PickId::from_raw(2), Some(PickId::ChestTop));
//! assert_eq!(PickId::from_raw(0), None);
//! assert_eq!(PickId::Eagle.tag(), 3);
//! ```

/// Stencil tag of a pickable object. Zero means nothing is under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PickId {
    Revolver = 1,
    ChestTop = 2,
    Eagle = 3,
}

impl PickId {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(PickId::Revolver),
            2 => Some(PickId::ChestTop),
            3 => Some(PickId::Eagle),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_id_round_trip() {
        for id in [PickId::Revolver, PickId::ChestTop, PickId::Eagle] {
            assert_eq!(PickId::from_raw(id.tag()), Some(id));
        }
        assert_eq!(PickId::from_raw(4), None);
        assert_eq!(PickId::from_raw(255), None);
    }
}
