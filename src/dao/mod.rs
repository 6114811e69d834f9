//! Persistence: the client's save gateway and the server's save store.

/// Client-side access to the save API and to exported files.
pub mod gateway;
/// Save records as held by the save store.
pub mod models;
/// Server-side persistence of save records.
pub mod save_store;
/// Storage errors shared by save store backends.
pub mod storage;
