// SPDX-License-Identifier: GPL-2.0

//! A loopback backend: every transmitted frame is handed straight
//! back to the protocol dispatcher as if it had just arrived.

use std::sync::OnceLock;

use netstack_core::device::{Device, DeviceFlags, DeviceOps, DeviceType, HardwareAddress};
use netstack_core::error::{Error, Result};
use netstack_core::protocol::ProtocolDispatcher;
use netstack_core::stack::Stack;
use netstack_core::sync::{Arc, Weak};

/// The MTU the reference environment's loopback carries (large enough
/// to never fragment a test datagram).
pub const LOOPBACK_MTU: usize = 65535;

pub struct LoopbackBackend {
	protocols: Arc<ProtocolDispatcher>,
	dev: OnceLock<Weak<Device>>,
}

impl LoopbackBackend {
	fn new(protocols: Arc<ProtocolDispatcher>) -> Arc<Self> {
		Arc::new(Self { protocols, dev: OnceLock::new() })
	}
}

impl DeviceOps for LoopbackBackend {
	fn open(&self, dev: &Device) -> Result<()> {
		log::info!("loopback device {} opened", dev.name());
		Ok(())
	}

	fn close(&self, dev: &Device) -> Result<()> {
		log::info!("loopback device {} closed", dev.name());
		Ok(())
	}

	fn transmit(&self, _dev: &Device, link_type: u16, data: &[u8], _dst: &HardwareAddress) -> Result<()> {
		let dev = self.dev.get().and_then(Weak::upgrade).ok_or(Error::TransmitFailed)?;
		log::debug!("loopback redelivering {} bytes as link type {:#06x}", data.len(), link_type);
		self.protocols.input_handler(link_type, data, &dev);
		Ok(())
	}
}

/// Registers a loopback device on `stack` and returns it, already
/// wired to feed its own transmits back into the protocol dispatcher.
pub fn attach(stack: &Stack) -> Arc<Device> {
	let backend = LoopbackBackend::new(stack.protocols_handle());
	let dev = stack.register_device(Device::new(
		DeviceType::Loopback,
		LOOPBACK_MTU,
		DeviceFlags::LOOPBACK | DeviceFlags::BROADCAST,
		HardwareAddress::zero(0),
		HardwareAddress::zero(0),
		Arc::clone(&backend) as Arc<dyn DeviceOps>,
	));
	let _ = backend.dev.set(Arc::downgrade(&dev));
	dev
}

#[cfg(test)]
mod tests {
	use super::*;
	use netstack_core::addr::Ipv4Address;
	use netstack_core::iface::IpInterface;

	#[test]
	fn a_transmitted_frame_is_redelivered_as_ingress() {
		use std::sync::atomic::{AtomicUsize, Ordering};

		let stack = Stack::init().unwrap();
		let dev = attach(&stack);
		let iface = IpInterface::alloc("127.0.0.1", "255.0.0.0").unwrap();
		stack.register_ip_interface(&dev, iface).unwrap();

		let seen = Arc::new(AtomicUsize::new(0));
		let seen2 = Arc::clone(&seen);
		stack.register_ip_handler(Box::new(
			move |data: &[u8], _len: usize, _src: Ipv4Address, _dst: Ipv4Address, _iface: &Arc<IpInterface>| {
				seen2.store(data.len(), Ordering::SeqCst);
			},
		));

		stack.run().unwrap();
		let loop_addr = Ipv4Address::new(127, 0, 0, 1);
		stack.ip_output(1, &[0x41; 8], loop_addr, loop_addr).unwrap();

		std::thread::sleep(std::time::Duration::from_millis(100));
		stack.shutdown();

		assert_eq!(seen.load(Ordering::SeqCst), 20 + 8);
	}
}
