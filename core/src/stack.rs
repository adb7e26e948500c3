// SPDX-License-Identifier: GPL-2.0

//! Stack facade: wires the interrupt subsystem, device registry,
//! protocol dispatcher, and IP layer together and drives their shared
//! lifecycle.

use crate::consts::LINK_TYPE_IP;
use crate::device::{Device, DeviceRegistry};
use crate::error::Result;
use crate::iface::IpInterface;
use crate::ip::{IpLayer, IpUpperHandler};
use crate::irq::{IrqFlags, IrqSubsystem, IRQ_SOFTIRQ};
use crate::protocol::{ProtocolDispatcher, ProtocolHandler};
use crate::sync::Arc;

/// The top-level context a hosting executable drives: `init` → register
/// backends/protocols/interfaces → `run` → ... → `shutdown`.
pub struct Stack {
	irqs: Arc<IrqSubsystem>,
	devices: Arc<DeviceRegistry>,
	protocols: Arc<ProtocolDispatcher>,
	ip: Arc<IpLayer>,
}

struct IpProtocolHandler {
	ip: Arc<IpLayer>,
}

impl ProtocolHandler for IpProtocolHandler {
	fn handle(&self, data: &[u8], dev: &Arc<Device>) {
		self.ip.ip_input(data, dev);
	}
}

impl Stack {
	/// Initializes the interrupt subsystem then the IP layer, which
	/// registers the IP protocol handler against the dispatcher.
	pub fn init() -> Result<Stack> {
		let irqs = Arc::new(IrqSubsystem::new());
		let devices = Arc::new(DeviceRegistry::new());
		let protocols = Arc::new(ProtocolDispatcher::new());
		let ip = Arc::new(IpLayer::new());

		protocols.bind_irqs(Arc::clone(&irqs));
		ip.bind_devices(Arc::clone(&devices));
		protocols.register_protocol(LINK_TYPE_IP, Arc::new(IpProtocolHandler { ip: Arc::clone(&ip) }))?;

		let drain_protocols = Arc::clone(&protocols);
		irqs.request_irq(
			IRQ_SOFTIRQ,
			Arc::new(move |_irq: i32| {
				drain_protocols.softirq_handler();
				Ok(())
			}),
			IrqFlags::empty(),
			"protocol-softirq",
		)?;

		Ok(Stack { irqs, devices, protocols, ip })
	}

	pub fn devices(&self) -> &DeviceRegistry {
		&self.devices
	}

	pub fn protocols(&self) -> &ProtocolDispatcher {
		&self.protocols
	}

	/// A cloned handle to the protocol dispatcher, for backends that
	/// need to call [`ProtocolDispatcher::input_handler`] from their own
	/// IRQ handler without borrowing the stack.
	pub fn protocols_handle(&self) -> Arc<ProtocolDispatcher> {
		Arc::clone(&self.protocols)
	}

	pub fn ip(&self) -> &IpLayer {
		&self.ip
	}

	pub fn irqs(&self) -> &Arc<IrqSubsystem> {
		&self.irqs
	}

	/// Registers an upper-layer protocol handler against the raw
	/// dispatcher, for protocols that sit beside IP rather than above
	/// it.
	pub fn register_protocol(&self, proto_type: u16, handler: Arc<dyn ProtocolHandler>) -> Result<()> {
		self.protocols.register_protocol(proto_type, handler)
	}

	/// Registers a demultiplex hook invoked on every accepted IPv4
	/// datagram.
	pub fn register_ip_handler(&self, handler: Box<dyn IpUpperHandler>) {
		self.ip.register_upper_handler(handler);
	}

	/// Registers `dev` with the device registry.
	pub fn register_device(&self, dev: Device) -> Arc<Device> {
		self.devices.register(dev)
	}

	/// Attaches `iface` to `dev` and the global IP-interface list.
	pub fn register_ip_interface(&self, dev: &Arc<Device>, iface: Arc<IpInterface>) -> Result<()> {
		self.ip.iface_register(dev, iface)
	}

	/// Starts the interrupt worker and opens every registered device.
	pub fn run(&self) -> Result<()> {
		self.irqs.run()?;
		self.devices.open_all()?;
		Ok(())
	}

	/// Closes every device then stops the worker. Any protocol entries
	/// still queued are dropped without dispatch.
	pub fn shutdown(&self) {
		let _ = self.devices.close_all();
		self.irqs.shutdown();
		self.protocols.drain_without_dispatch();
	}

	/// Emits an IPv4 datagram. Thin pass-through kept on the facade so
	/// callers outside `core` never need to reach into [`IpLayer`]
	/// directly.
	pub fn ip_output(
		&self,
		protocol: u8,
		data: &[u8],
		src: crate::addr::Ipv4Address,
		dst: crate::addr::Ipv4Address,
	) -> Result<usize> {
		self.ip.ip_output(protocol, data, src, dst)
	}
}

