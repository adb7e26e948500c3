// SPDX-License-Identifier: GPL-2.0

//! Synchronization primitives used across the device/protocol plane.
//!
//! Two cooperating userspace threads — the main thread and the
//! interrupt worker — share all registries here, so this crate uses
//! the standard library's blocking primitives directly rather than a
//! spin-wait lock: an OS scheduler already exists, so there is nothing
//! to gain from busy-waiting on a futex.

pub use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Rendezvous point between the main thread and the interrupt worker
/// at start-up.
pub type StartBarrier = std::sync::Barrier;
