//! BookCourier application library
//!
//! Wires the resource modules (users, books, orders, payments, reviews,
//! wishlist, stats) onto a shared document store and token verifier.

use std::sync::Arc;

use bookcourier_authz::TokenVerifier;
use bookcourier_db::DocumentStore;
use bookcourier_http::AccessControl;
use bookcourier_kernel::ModuleRegistry;

pub mod modules;
pub mod utils;

pub use modules::AppContext;

/// Build the registry of every resource module over the given collaborators.
pub fn registry(
    store: Arc<dyn DocumentStore>,
    verifier: Arc<dyn TokenVerifier>,
) -> ModuleRegistry {
    let ctx = AppContext {
        access: AccessControl::new(verifier, store.clone()),
        store,
    };

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &ctx);
    registry
}
