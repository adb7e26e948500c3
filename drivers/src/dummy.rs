// SPDX-License-Identifier: GPL-2.0

//! A dummy backend: accepts every transmit and discards the frame,
//! the canonical stand-in for a link that exists only to exercise the
//! device registry without real I/O.

use std::sync::Mutex;

use netstack_core::device::{Device, DeviceFlags, DeviceOps, DeviceType, HardwareAddress};
use netstack_core::error::Result;
use netstack_core::stack::Stack;
use netstack_core::sync::Arc;

pub const DUMMY_MTU: usize = 1500;

pub struct DummyBackend {
	last_sent: Mutex<Option<Vec<u8>>>,
}

impl DummyBackend {
	fn new() -> Arc<Self> {
		Arc::new(Self { last_sent: Mutex::new(None) })
	}

	/// The most recent frame handed to [`DeviceOps::transmit`], for
	/// tests that want to assert on egress without a real link.
	pub fn last_sent(&self) -> Option<Vec<u8>> {
		self.last_sent.lock().unwrap().clone()
	}
}

impl DeviceOps for DummyBackend {
	fn open(&self, dev: &Device) -> Result<()> {
		log::info!("dummy device {} opened", dev.name());
		Ok(())
	}

	fn close(&self, dev: &Device) -> Result<()> {
		log::info!("dummy device {} closed", dev.name());
		Ok(())
	}

	fn transmit(&self, _dev: &Device, _link_type: u16, data: &[u8], _dst: &HardwareAddress) -> Result<()> {
		log::debug!("dummy discarding {} bytes", data.len());
		*self.last_sent.lock().unwrap() = Some(data.to_vec());
		Ok(())
	}
}

/// Registers a dummy device on `stack` and returns both the device
/// handle and the backend, so tests can inspect `last_sent`.
pub fn attach(stack: &Stack, hwaddr: HardwareAddress) -> (Arc<Device>, Arc<DummyBackend>) {
	let backend = DummyBackend::new();
	let dev = stack.register_device(Device::new(
		DeviceType::Dummy,
		DUMMY_MTU,
		DeviceFlags::NEED_ARP,
		hwaddr,
		HardwareAddress::new(&[0xff; 6]),
		Arc::clone(&backend) as Arc<dyn DeviceOps>,
	));
	(dev, backend)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transmit_records_the_last_frame() {
		let stack = Stack::init().unwrap();
		let (dev, backend) = attach(&stack, HardwareAddress::new(&[0x02, 0, 0, 0, 0, 1]));
		stack.devices().open(&dev).unwrap();
		stack
			.devices()
			.output(&dev, 0x0800, b"hello", &HardwareAddress::new(&[0xff; 6]))
			.unwrap();
		assert_eq!(backend.last_sent(), Some(b"hello".to_vec()));
	}
}
