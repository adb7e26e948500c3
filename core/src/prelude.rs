// SPDX-License-Identifier: GPL-2.0

//! Common re-exports for crates and binaries consuming `netstack-core`.

pub use crate::addr::{addr_ntop, addr_pton, Ipv4Address};
pub use crate::device::{
	Device, DeviceFlags, DeviceOps, DeviceRegistry, DeviceStatsSnapshot, DeviceType, HardwareAddress,
};
pub use crate::error::{Error, Result};
pub use crate::iface::{Family, IpInterface};
pub use crate::ip::IpUpperHandler;
pub use crate::irq::{IrqFlags, IrqHandler, IRQ_SOFTIRQ, IRQ_TERMINATE};
pub use crate::protocol::ProtocolHandler;
pub use crate::stack::Stack;
