use std::fmt::Debug;

macro_rules! define_index {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline(always)]
            pub fn new(id: usize) -> Self {
                Self(id as u32)
            }
            #[inline(always)]
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// NetId carries the board file's own net number; 0 is the unconnected net.
define_index!(NetId);
define_index!(PadId);
define_index!(FootprintId);

impl NetId {
    pub const UNCONNECTED: NetId = NetId(0);

    pub fn is_connected(&self) -> bool {
        self.0 != 0
    }
}
