//! Re-exports of the synchronization primitives used throughout the
//! crate, kept in one place so the `Mutex`/`RwLock` choice stays
//! centralized.

pub use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
