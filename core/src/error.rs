// SPDX-License-Identifier: GPL-2.0

//! Error taxonomy for the device/protocol plane.

use thiserror::Error;

/// Errors surfaced by `netstack_core` to its callers.
///
/// Validation failures on the ingress path (malformed datagrams, bad
/// checksums, non-local destinations) are never represented here:
/// those are logged and dropped silently, with no signal to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
	#[error("irq {0} already registered without IRQF_SHARED on both sides")]
	IrqBusy(i32),
	#[error("no handler registered for irq {0}")]
	IrqNotFound(i32),
	#[error("interrupt worker failed to start")]
	WorkerStartFailed,

	#[error("duplicate protocol type {0:#06x}")]
	ProtocolBusy(u16),
	#[error("no handler registered for protocol {0:#06x}")]
	ProtocolNotFound(u16),
	#[error("failed to allocate a protocol queue entry")]
	QueueAllocFailed,

	#[error("device already has an IP interface attached")]
	InterfaceBusy,
	#[error("device has no IP interface attached")]
	InterfaceNotFound,
	#[error("no IP interface matches address")]
	AddressNotFound,
	#[error("malformed dotted-quad address")]
	MalformedAddress,

	#[error("device is not up")]
	DeviceDown,
	#[error("device is already up")]
	DeviceUp,
	#[error("payload of {len} bytes exceeds device MTU of {mtu} bytes")]
	Mtu { len: usize, mtu: usize },
	#[error("device backend transmit failed")]
	TransmitFailed,
	#[error("device backend open failed")]
	OpenFailed,
	#[error("device backend close failed")]
	CloseFailed,

	#[error("{0}")]
	IngressDropped(&'static str),

	#[error("routing unimplemented: ip_output requires an explicit, locally-owned source address")]
	RoutingUnimplemented,
	#[error("ARP resolution required but unavailable for this destination")]
	ArpUnresolved,
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;
