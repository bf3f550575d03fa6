/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Station and announcement persistence backends.
pub mod venue_store;
