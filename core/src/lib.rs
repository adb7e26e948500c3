// SPDX-License-Identifier: GPL-2.0

//! Core of a userspace device/protocol network stack: a registration
//! and lookup fabric for devices, per-device IP interfaces, and
//! protocol handlers; a deferred-processing pipeline driven by a
//! signal-backed interrupt subsystem; and an IPv4 ingress/egress path.
//!
//! Concrete device backends (loopback, dummy, ...) live in the sibling
//! `netstack-drivers` crate; ARP/ICMP/UDP/TCP handlers are external
//! collaborators registered through [`stack::Stack`].

pub mod addr;
pub mod consts;
pub mod device;
pub mod error;
pub mod iface;
pub mod ip;
pub mod irq;
pub mod logging;
pub mod prelude;
pub mod protocol;
pub mod stack;
pub mod sync;

pub use error::{Error, Result};
pub use stack::Stack;
