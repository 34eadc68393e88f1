/// Database model definitions and matchmaking rules.
pub mod models;
/// Player and lobby persistence.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
