pub mod books;
pub mod collection;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod stats;
pub mod users;
pub mod wishlist;

use std::sync::Arc;

use bookcourier_db::DocumentStore;
use bookcourier_http::AccessControl;
use bookcourier_kernel::ModuleRegistry;

/// Collaborators built once at startup and handed to every module's router.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn DocumentStore>,
    pub access: AccessControl,
}

/// Register all resource modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, ctx: &AppContext) {
    registry.register(users::create_module(ctx.clone()));
    registry.register(books::create_module(ctx.clone()));
    registry.register(orders::create_module(ctx.clone()));
    registry.register(payments::create_module(ctx.clone()));
    registry.register(reviews::create_module(ctx.clone()));
    registry.register(wishlist::create_module(ctx.clone()));
    registry.register(stats::create_module(ctx.clone()));
}
