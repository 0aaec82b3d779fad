#![doc=include_str!( "../README.md")]
#![deny(clippy::all)]

pub mod allocator;
pub mod map;
pub mod secondary_map;
pub mod slot_table;

pub use allocator::{HandleAllocator, HandleInUse};
pub use map::TinyMap;
pub use secondary_map::TinySecondaryMap;
pub use slot_table::SlotTable;

/// A type usable as a key into [`TinyMap`]/[`TinySecondaryMap`]: a small integer in disguise.
/// Every handle type in the object model (`FederationHandle`, `ConnectHandle`, ...) is one of
/// these, minted by [`key_type!`].
pub trait Key: From<usize> + Copy + Ord {
    fn index(&self) -> usize;
}

/// Declares a new newtype handle wrapping a `u64` index.
#[macro_export]
macro_rules! key_type {
    ($(#[$outer:meta])* $vis:vis $name:ident) => {
        $(#[$outer])*
        #[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name(u64);

        impl $crate::Key for $name {
            fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value as _)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

key_type!(pub DefaultKey);
