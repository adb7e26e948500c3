// SPDX-License-Identifier: GPL-2.0

//! Family-interface and IP interface data model.
//!
//! A C-style implementation of this model would attach a
//! family-interface to a device through a tagged union reached by
//! pointer casts ("subclassing via casts"). Rust has no need for the
//! cast: [`Family`] tags the one concrete variant this core
//! implements, and a second family slots in as a second struct plus
//! enum arm without touching any cast machinery.

use std::fmt;
use std::sync::OnceLock;

use crate::addr::{addr_pton, Ipv4Address};
use crate::device::Device;
use crate::error::Result;
use crate::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
	Ip,
}

/// An IPv4 interface: a unicast address and netmask, with a broadcast
/// address derived once at construction and a back-reference to the
/// device it ends up attached to.
pub struct IpInterface {
	family: Family,
	unicast: Ipv4Address,
	netmask: Ipv4Address,
	broadcast: Ipv4Address,
	device: OnceLock<Weak<Device>>,
}

impl IpInterface {
	/// Parses `unicast`/`netmask` and derives the broadcast address.
	/// Not yet attached to any device.
	pub fn alloc(unicast: &str, netmask: &str) -> Result<Arc<IpInterface>> {
		let unicast = addr_pton(unicast)?;
		let netmask = addr_pton(netmask)?;
		let broadcast = Ipv4Address::broadcast_for(unicast, netmask);
		Ok(Arc::new(IpInterface {
			family: Family::Ip,
			unicast,
			netmask,
			broadcast,
			device: OnceLock::new(),
		}))
	}

	pub fn family(&self) -> Family {
		self.family
	}

	pub fn unicast(&self) -> Ipv4Address {
		self.unicast
	}

	pub fn netmask(&self) -> Ipv4Address {
		self.netmask
	}

	pub fn broadcast(&self) -> Ipv4Address {
		self.broadcast
	}

	/// Assigned exactly once, by [`crate::device::DeviceRegistry::add_iface`].
	/// A second call is a logic error in the caller and is silently
	/// ignored, matching `OnceLock`'s semantics.
	pub(crate) fn bind_device(&self, dev: &Arc<Device>) {
		let _ = self.device.set(Arc::downgrade(dev));
	}

	/// The device this interface is attached to, or `None` before
	/// attachment or after the device has been dropped.
	pub fn device(&self) -> Option<Arc<Device>> {
		self.device.get().and_then(Weak::upgrade)
	}
}

impl fmt::Debug for IpInterface {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IpInterface")
			.field("unicast", &self.unicast)
			.field("netmask", &self.netmask)
			.field("broadcast", &self.broadcast)
			.finish()
	}
}

impl fmt::Display for IpInterface {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.unicast, self.netmask)
	}
}
