// SPDX-License-Identifier: GPL-2.0

//! Reference device backends implementing `netstack_core::device::DeviceOps`.
//!
//! Real link-layer drivers (physical NICs, tap devices, ...) are
//! external collaborators outside this crate's scope; these backends
//! exist so `netstack-core` is exercisable end-to-end in tests and the
//! demo binary without any real hardware or kernel tap interface.

pub mod dummy;
pub mod loopback;
