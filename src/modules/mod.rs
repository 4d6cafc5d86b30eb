pub mod bookings;
pub mod contacts;
pub mod turfs;

use turfbook_db::Database;
use turfbook_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, db: &Database) {
    registry.register_custom(turfs::create_module(db.clone()));
    registry.register_custom(bookings::create_module(db.clone()));
    registry.register_custom(contacts::create_module(db.clone()));
}
