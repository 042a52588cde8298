//! Plugin ABI between the host and loadable connector modules.
//!
//! A module exports three C-ABI entry points: an ABI version probe, a factory
//! returning a heap-allocated [`ConnectorBox`], and a destroy function that
//! frees it with the module's own allocator. The host never deallocates the
//! instance itself — it routes destruction back through
//! [`DESTROY_SYMBOL`], then unloads the library.
//!
//! Trait-object layout is not a stable ABI across toolchains; host and module
//! must be built against the same `xconn-api`. [`ABI_VERSION`] is the gate:
//! bump it on any change to the contract types.

use crate::connector::Connector;

/// Bumped on any contract-affecting change.
pub const ABI_VERSION: u32 = 1;

pub const ABI_VERSION_SYMBOL: &[u8] = b"xconn_abi_version";
pub const CREATE_SYMBOL: &[u8] = b"xconn_connector_create";
pub const DESTROY_SYMBOL: &[u8] = b"xconn_connector_destroy";

/// The boxed trait object passed across the module boundary.
pub type ConnectorBox = Box<dyn Connector>;

pub type AbiVersionFn = unsafe extern "C" fn() -> u32;
pub type CreateFn = unsafe extern "C" fn() -> *mut ConnectorBox;
pub type DestroyFn = unsafe extern "C" fn(*mut ConnectorBox);

/// Export the plugin entry points for a connector type.
///
/// The type must implement [`Connector`] and `Default`. Invoke once at the
/// module crate root:
///
/// ```ignore
/// xconn_api::declare_connector!(PaperfeedConnector);
/// ```
#[macro_export]
macro_rules! declare_connector {
    ($connector:ty) => {
        #[no_mangle]
        pub extern "C" fn xconn_abi_version() -> u32 {
            $crate::plugin::ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn xconn_connector_create() -> *mut $crate::plugin::ConnectorBox {
            let connector: $crate::plugin::ConnectorBox =
                Box::new(<$connector as Default>::default());
            Box::into_raw(Box::new(connector))
        }

        /// # Safety
        ///
        /// `ptr` must have been produced by `xconn_connector_create` from
        /// this module and must not be freed twice.
        #[no_mangle]
        pub unsafe extern "C" fn xconn_connector_destroy(
            ptr: *mut $crate::plugin::ConnectorBox,
        ) {
            if !ptr.is_null() {
                // SAFETY: ptr came from Box::into_raw in this module's
                // create function, per the caller contract above.
                drop(Box::from_raw(ptr));
            }
        }
    };
}
