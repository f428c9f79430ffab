/// A routing grid cell: column, row and copper layer index (0 = top).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl GridCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn with_layer(&self, z: u8) -> Self {
        Self { z, ..*self }
    }

    pub fn same_xy(&self, other: &GridCoord) -> bool {
        self.x == other.x && self.y == other.y
    }

    pub fn manhattan_xy(&self, other: &GridCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}
