// SPDX-License-Identifier: GPL-2.0

//! IPv4 interface layer: owns IP interfaces, validates incoming
//! datagrams, formats outgoing ones, and delegates ARP resolution to
//! the device's NEED_ARP flag.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::OnceLock;

use crate::addr::{checksum16, Ipv4Address};
use crate::consts::LINK_TYPE_IP;
use crate::device::{Device, DeviceFlags, DeviceRegistry, HardwareAddress};
use crate::error::{Error, Result};
use crate::iface::IpInterface;
use crate::sync::{Arc, RwLock};

const MIN_HEADER_LEN: usize = 20;
/// Fresh IDs start at 128 and wrap naturally.
const INITIAL_ID: u16 = 128;

/// A demultiplex hook for one IP `protocol` number:
/// `(data, len, src, dst, iface)`. `len` is kept as an explicit
/// parameter even though it always equals `data.len()`, so the
/// signature carries the length the same way the rest of this layer's
/// entry points do.
pub trait IpUpperHandler: Send + Sync {
	fn handle(&self, data: &[u8], len: usize, src: Ipv4Address, dst: Ipv4Address, iface: &Arc<IpInterface>);
}

impl<F> IpUpperHandler for F
where
	F: Fn(&[u8], usize, Ipv4Address, Ipv4Address, &Arc<IpInterface>) + Send + Sync,
{
	fn handle(&self, data: &[u8], len: usize, src: Ipv4Address, dst: Ipv4Address, iface: &Arc<IpInterface>) {
		self(data, len, src, dst, iface)
	}
}

/// Owns the global IP-interface list and the outgoing `id` counter.
pub struct IpLayer {
	interfaces: RwLock<Vec<Arc<IpInterface>>>,
	next_id: AtomicU16,
	upper: RwLock<Vec<Box<dyn IpUpperHandler>>>,
	devices: OnceLock<Arc<DeviceRegistry>>,
}

impl Default for IpLayer {
	fn default() -> Self {
		Self::new()
	}
}

impl IpLayer {
	pub fn new() -> Self {
		Self {
			interfaces: RwLock::new(Vec::new()),
			next_id: AtomicU16::new(INITIAL_ID),
			upper: RwLock::new(Vec::new()),
			devices: OnceLock::new(),
		}
	}

	pub(crate) fn bind_devices(&self, devices: Arc<DeviceRegistry>) {
		let _ = self.devices.set(devices);
	}

	fn devices(&self) -> &DeviceRegistry {
		self.devices.get().expect("IpLayer used before Stack::init")
	}

	/// Registers a demultiplex hook invoked by [`Self::ip_input`] on
	/// acceptance.
	pub fn register_upper_handler(&self, handler: Box<dyn IpUpperHandler>) {
		self.upper.write().unwrap().push(handler);
	}

	/// Attaches `iface` to `dev` (via [`DeviceRegistry::add_iface`]) and
	/// prepends it to the global interface list. An interface that
	/// fails device-attachment does not appear on the global list.
	pub fn iface_register(&self, dev: &Arc<Device>, iface: Arc<IpInterface>) -> Result<()> {
		self.devices().add_iface(dev, Arc::clone(&iface))?;
		self.interfaces.write().unwrap().insert(0, iface);
		Ok(())
	}

	/// Returns the interface whose unicast address equals `addr`, or
	/// `None`.
	pub fn iface_select(&self, addr: Ipv4Address) -> Option<Arc<IpInterface>> {
		self.interfaces.read().unwrap().iter().find(|i| i.unicast() == addr).cloned()
	}

	/// Validates an inbound IPv4 datagram against a strict ordered
	/// checklist and, on acceptance, fans it out to every registered
	/// upper handler. Every failure drops silently with a debug log;
	/// there is no upstream signal.
	pub fn ip_input(&self, data: &[u8], dev: &Arc<Device>) {
		if let Err(reason) = self.try_ip_input(data, dev) {
			log::debug!("ip_input dropped {} bytes from {}: {reason}", data.len(), dev.name());
			dev.stats().record_dropped();
		}
	}

	fn try_ip_input(&self, data: &[u8], dev: &Arc<Device>) -> std::result::Result<(), Error> {
		if data.len() < MIN_HEADER_LEN {
			return Err(Error::IngressDropped("datagram shorter than the minimum header"));
		}
		let version = data[0] >> 4;
		if version != 4 {
			return Err(Error::IngressDropped("version field is not 4"));
		}
		let ihl = (data[0] & 0x0f) as usize * 4;
		if ihl > data.len() {
			return Err(Error::IngressDropped("header length exceeds datagram length"));
		}
		let total_len = u16::from_be_bytes([data[2], data[3]]) as usize;
		if total_len > data.len() {
			return Err(Error::IngressDropped("total length exceeds datagram length"));
		}
		if checksum16(&data[..ihl]) != 0 {
			return Err(Error::IngressDropped("header checksum mismatch"));
		}
		let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);
		let mf = flags_and_offset & 0x2000 != 0;
		let frag_offset = flags_and_offset & 0x1fff;
		if mf || frag_offset != 0 {
			return Err(Error::IngressDropped("fragmented datagrams are unsupported"));
		}

		let iface = self.devices().get_iface(dev).ok_or(Error::InterfaceNotFound)?;

		let src = Ipv4Address::from_octets([data[12], data[13], data[14], data[15]]);
		let dst = Ipv4Address::from_octets([data[16], data[17], data[18], data[19]]);
		let locally_destined =
			dst == iface.unicast() || dst == iface.broadcast() || dst == Ipv4Address::LIMITED_BROADCAST;
		if !locally_destined {
			return Err(Error::IngressDropped("destination address is not local"));
		}

		let payload = &data[..total_len];
		log::info!(
			"accepted ipv4 datagram: {src} -> {dst} ({} bytes) on {}",
			payload.len(),
			dev.name()
		);
		for handler in self.upper.read().unwrap().iter() {
			handler.handle(payload, payload.len(), src, dst, &iface);
		}
		Ok(())
	}

	/// Formats and transmits an IPv4 datagram. Fails immediately if
	/// `src` is [`Ipv4Address::ANY`] — routing is unimplemented and
	/// this is the only signal of it.
	pub fn ip_output(&self, protocol: u8, data: &[u8], src: Ipv4Address, dst: Ipv4Address) -> Result<usize> {
		if src.is_any() {
			return Err(Error::RoutingUnimplemented);
		}
		let iface = self.iface_select(src).ok_or(Error::AddressNotFound)?;
		let dev = iface.device().ok_or(Error::InterfaceNotFound)?;

		let total_len = MIN_HEADER_LEN + data.len();
		if total_len > dev.mtu() {
			return Err(Error::Mtu { len: total_len, mtu: dev.mtu() });
		}

		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let mut header = [0u8; MIN_HEADER_LEN];
		header[0] = 0x45; // version 4, IHL 5
		header[1] = 0; // TOS
		header[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
		header[4..6].copy_from_slice(&id.to_be_bytes());
		header[6..8].copy_from_slice(&0u16.to_be_bytes()); // flags/offset
		header[8] = 255; // TTL
		header[9] = protocol;
		header[10..12].copy_from_slice(&0u16.to_be_bytes()); // checksum placeholder
		header[12..16].copy_from_slice(&src.octets());
		header[16..20].copy_from_slice(&dst.octets());
		let checksum = checksum16(&header);
		header[10..12].copy_from_slice(&checksum.to_be_bytes());

		let mut datagram = Vec::with_capacity(total_len);
		datagram.extend_from_slice(&header);
		datagram.extend_from_slice(data);

		self.ip_output_device(&dev, &iface, dst, &datagram)?;
		Ok(datagram.len())
	}

	/// Resolves the destination hardware address and hands the
	/// datagram to the device registry's `output`.
	fn ip_output_device(&self, dev: &Arc<Device>, iface: &Arc<IpInterface>, dst: Ipv4Address, datagram: &[u8]) -> Result<()> {
		let hwaddr = if dev.flags().contains(DeviceFlags::NEED_ARP) {
			if dst == iface.broadcast() || dst == Ipv4Address::LIMITED_BROADCAST {
				dev.peer()
			} else {
				return Err(Error::ArpUnresolved);
			}
		} else {
			HardwareAddress::zero(dev.peer().len())
		};
		self.devices().output(dev, LINK_TYPE_IP, datagram, &hwaddr)
	}

	/// Registered IP interfaces, source-first order (supplemented
	/// introspection surface).
	pub fn interfaces(&self) -> Vec<Arc<IpInterface>> {
		self.interfaces.read().unwrap().clone()
	}
}
