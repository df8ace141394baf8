//! Opaque native handles and the resource kinds that wrap them.

use std::fmt;
use std::hash::Hash;

/// An identifier issued by the native API.
///
/// Handles are compared by value; this crate never mints them, it only
/// passes back what native calls returned.
pub trait NativeHandle: Copy + Eq + Hash + fmt::Debug + Default + Send + Sync + 'static {
    /// Raw pointer-sized value of the handle.
    fn as_raw(self) -> usize;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(usize);

        impl $name {
            /// Wrap a raw handle value received from the native layer.
            #[inline]
            pub const fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl NativeHandle for $name {
            #[inline]
            fn as_raw(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

define_handle!(
    /// Native platform identifier.
    PlatformId
);

define_handle!(
    /// Native device identifier.
    DeviceId
);

/// A kind of native resource that has host-visible wrappers.
pub trait ResourceKind: 'static {
    type Handle: NativeHandle;

    /// Host class name of the wrapper, e.g. `"CLPlatform"`.
    const CLASS_NAME: &'static str;
}

/// Marker for platform wrappers.
#[derive(Debug)]
pub enum PlatformKind {}

impl ResourceKind for PlatformKind {
    type Handle = PlatformId;
    const CLASS_NAME: &'static str = "CLPlatform";
}

/// Marker for device wrappers.
#[derive(Debug)]
pub enum DeviceKind {}

impl ResourceKind for DeviceKind {
    type Handle = DeviceId;
    const CLASS_NAME: &'static str = "CLDevice";
}
