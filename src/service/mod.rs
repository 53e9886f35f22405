//! CRUD engine: the base table persistence, the id-addressed layer on top of it and the
//! row/item mapping both use.

mod crud;
mod identifiable;
pub mod mapper;
pub use crud::PostgresPersistence;
pub use identifiable::IdentifiablePostgresPersistence;
pub use mapper::{PersistenceOverrides, TableLayout};
