// SPDX-License-Identifier: GPL-2.0

//! Device registry: owns the global device list, the open/close
//! lifecycle, and per-device family-interface attachment.
//!
//! A device's open/close/transmit operations are a trait object
//! rather than a vtable of function pointers; the device list is an
//! append-only `Vec<Arc<Device>>` guarded by an `RwLock` rather than
//! an intrusive singly-linked list.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::iface::{Family, IpInterface};

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct DeviceFlags: u32 {
		const UP = 0b0000_0001;
		const LOOPBACK = 0b0000_0010;
		const BROADCAST = 0b0000_0100;
		const P2P = 0b0000_1000;
		const NEED_ARP = 0b0001_0000;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
	Dummy,
	Loopback,
	Ethernet,
}

/// A link-layer hardware address, up to 16 bytes.
/// Used both for a device's own address and for the peer-or-broadcast
/// address interpreted per device type, and as the `dst` argument
/// handed to [`DeviceOps::transmit`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HardwareAddress {
	len: u8,
	bytes: [u8; Self::MAX_LEN],
}

impl HardwareAddress {
	pub const MAX_LEN: usize = 16;

	pub fn new(bytes: &[u8]) -> Self {
		assert!(bytes.len() <= Self::MAX_LEN, "hardware address exceeds 16 bytes");
		let mut buf = [0u8; Self::MAX_LEN];
		buf[..bytes.len()].copy_from_slice(bytes);
		Self { len: bytes.len() as u8, bytes: buf }
	}

	pub fn zero(len: usize) -> Self {
		assert!(len <= Self::MAX_LEN, "hardware address exceeds 16 bytes");
		Self { len: len as u8, bytes: [0u8; Self::MAX_LEN] }
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes[..self.len as usize]
	}

	pub fn len(&self) -> usize {
		self.len as usize
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}

impl fmt::Display for HardwareAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_empty() {
			return write!(f, "-");
		}
		for (i, b) in self.as_bytes().iter().enumerate() {
			if i > 0 {
				write!(f, ":")?;
			}
			write!(f, "{b:02x}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for HardwareAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "HardwareAddress({self})")
	}
}

/// The operations a backend supplies for its device. `open`/`close`
/// default to a no-op, matching backends with no hardware bring-up
/// step (loopback); a backend that needs one overrides it.
pub trait DeviceOps: Send + Sync {
	fn open(&self, _dev: &Device) -> Result<()> {
		Ok(())
	}

	fn close(&self, _dev: &Device) -> Result<()> {
		Ok(())
	}

	fn transmit(&self, dev: &Device, link_type: u16, data: &[u8], dst: &HardwareAddress) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct DeviceStats {
	bytes_sent: AtomicU64,
	bytes_received: AtomicU64,
	packets_sent: AtomicU64,
	packets_received: AtomicU64,
	errors: AtomicU64,
	dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatsSnapshot {
	pub bytes_sent: u64,
	pub bytes_received: u64,
	pub packets_sent: u64,
	pub packets_received: u64,
	pub errors: u64,
	pub dropped: u64,
}

impl DeviceStats {
	pub(crate) fn record_sent(&self, bytes: usize) {
		self.packets_sent.fetch_add(1, Ordering::Relaxed);
		self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_received(&self, bytes: usize) {
		self.packets_received.fetch_add(1, Ordering::Relaxed);
		self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_dropped(&self) {
		self.dropped.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_error(&self) {
		self.errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> DeviceStatsSnapshot {
		DeviceStatsSnapshot {
			bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
			bytes_received: self.bytes_received.load(Ordering::Relaxed),
			packets_sent: self.packets_sent.load(Ordering::Relaxed),
			packets_received: self.packets_received.load(Ordering::Relaxed),
			errors: self.errors.load(Ordering::Relaxed),
			dropped: self.dropped.load(Ordering::Relaxed),
		}
	}
}

/// A registered network device. `index` and `name`
/// are assigned by [`DeviceRegistry::register`] and immutable
/// thereafter; everything else is fixed at construction except the
/// `UP` flag, which [`DeviceRegistry::open`]/[`close`] toggle.
pub struct Device {
	index: u32,
	name: String,
	device_type: DeviceType,
	mtu: usize,
	flags: RwLock<DeviceFlags>,
	hwaddr: HardwareAddress,
	peer: HardwareAddress,
	ops: Arc<dyn DeviceOps>,
	interfaces: Mutex<Vec<Arc<IpInterface>>>,
	stats: DeviceStats,
}

impl Device {
	/// Builds an unregistered device shell; `index`/`name` are filled in
	/// by [`DeviceRegistry::register`].
	pub fn new(
		device_type: DeviceType,
		mtu: usize,
		flags: DeviceFlags,
		hwaddr: HardwareAddress,
		peer: HardwareAddress,
		ops: Arc<dyn DeviceOps>,
	) -> Self {
		Self {
			index: 0,
			name: String::new(),
			device_type,
			mtu,
			flags: RwLock::new(flags),
			hwaddr,
			peer,
			ops,
			interfaces: Mutex::new(Vec::new()),
			stats: DeviceStats::default(),
		}
	}

	pub fn index(&self) -> u32 {
		self.index
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn device_type(&self) -> DeviceType {
		self.device_type
	}

	pub fn mtu(&self) -> usize {
		self.mtu
	}

	pub fn flags(&self) -> DeviceFlags {
		*self.flags.read().unwrap()
	}

	pub fn hwaddr(&self) -> HardwareAddress {
		self.hwaddr
	}

	pub fn peer(&self) -> HardwareAddress {
		self.peer
	}

	pub fn stats(&self) -> &DeviceStats {
		&self.stats
	}

	fn set_up(&self, up: bool) {
		self.flags.write().unwrap().set(DeviceFlags::UP, up);
	}
}

impl fmt::Debug for Device {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Device")
			.field("index", &self.index)
			.field("name", &self.name)
			.field("device_type", &self.device_type)
			.field("mtu", &self.mtu)
			.field("flags", &self.flags())
			.field("hwaddr", &self.hwaddr)
			.finish()
	}
}

impl fmt::Display for Device {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}[{}]", self.name, self.hwaddr)
	}
}

/// Owns the global device list.
pub struct DeviceRegistry {
	devices: RwLock<Vec<Arc<Device>>>,
	next_index: AtomicU32,
}

impl Default for DeviceRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl DeviceRegistry {
	pub fn new() -> Self {
		Self { devices: RwLock::new(Vec::new()), next_index: AtomicU32::new(0) }
	}

	/// Assigns `index`/`name` and appends `dev` to the device list. Must
	/// be called before [`crate::stack::Stack::run`]; calling it later is
	/// undefined and unsupported.
	pub fn register(&self, mut dev: Device) -> Arc<Device> {
		let index = self.next_index.fetch_add(1, Ordering::SeqCst);
		dev.index = index;
		dev.name = format!("net{index}");
		let dev = Arc::new(dev);
		self.devices.write().unwrap().push(Arc::clone(&dev));
		log::info!("registered device {} ({:?})", dev.name, dev.device_type);
		dev
	}

	/// Attaches `iface` to `dev`. Rejects a second interface of the same
	/// family on one device.
	pub fn add_iface(&self, dev: &Arc<Device>, iface: Arc<IpInterface>) -> Result<()> {
		let mut ifaces = dev.interfaces.lock().unwrap();
		if ifaces.iter().any(|existing| existing.family() == iface.family()) {
			return Err(Error::InterfaceBusy);
		}
		iface.bind_device(dev);
		ifaces.push(iface);
		Ok(())
	}

	/// Returns the interface of `family` attached to `dev`, or `None`.
	/// Only [`Family::Ip`] has a concrete implementation; the lookup is
	/// written generically so a future family slots in without changing
	/// callers.
	pub fn get_iface_for(&self, dev: &Device, family: Family) -> Option<Arc<IpInterface>> {
		dev.interfaces
			.lock()
			.unwrap()
			.iter()
			.find(|i| i.family() == family)
			.cloned()
	}

	/// Convenience for the one concrete family this core implements.
	pub fn get_iface(&self, dev: &Device) -> Option<Arc<IpInterface>> {
		self.get_iface_for(dev, Family::Ip)
	}

	/// Gates on `dev` being up and `data.len() <= dev.mtu()`, then
	/// invokes the backend transmit hook.
	pub fn output(&self, dev: &Device, link_type: u16, data: &[u8], dst: &HardwareAddress) -> Result<()> {
		if !dev.flags().contains(DeviceFlags::UP) {
			dev.stats().record_dropped();
			return Err(Error::DeviceDown);
		}
		if data.len() > dev.mtu {
			dev.stats().record_dropped();
			return Err(Error::Mtu { len: data.len(), mtu: dev.mtu });
		}
		if let Err(e) = dev.ops.transmit(dev, link_type, data, dst) {
			dev.stats().record_error();
			return Err(e);
		}
		dev.stats().record_sent(data.len());
		Ok(())
	}

	pub fn open(&self, dev: &Device) -> Result<()> {
		if dev.flags().contains(DeviceFlags::UP) {
			return Err(Error::DeviceUp);
		}
		dev.ops.open(dev)?;
		dev.set_up(true);
		log::info!("{} up", dev.name);
		Ok(())
	}

	pub fn close(&self, dev: &Device) -> Result<()> {
		if !dev.flags().contains(DeviceFlags::UP) {
			return Err(Error::DeviceDown);
		}
		dev.ops.close(dev)?;
		dev.set_up(false);
		log::info!("{} down", dev.name);
		Ok(())
	}

	/// Opens every registered device.
	pub fn open_all(&self) -> Result<()> {
		for dev in self.devices().iter() {
			self.open(dev)?;
		}
		Ok(())
	}

	/// Closes every registered device.
	pub fn close_all(&self) -> Result<()> {
		for dev in self.devices().iter() {
			self.close(dev)?;
		}
		Ok(())
	}

	/// Introspection surface for the demo binary and tests.
	pub fn devices(&self) -> Vec<Arc<Device>> {
		self.devices.read().unwrap().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::iface::IpInterface;
	use std::sync::Mutex as StdMutex;

	struct CaptureOps {
		sent: StdMutex<Option<Vec<u8>>>,
	}

	impl DeviceOps for CaptureOps {
		fn transmit(&self, _dev: &Device, _lt: u16, data: &[u8], _dst: &HardwareAddress) -> Result<()> {
			*self.sent.lock().unwrap() = Some(data.to_vec());
			Ok(())
		}
	}

	fn capture_device(mtu: usize) -> Device {
		Device::new(
			DeviceType::Dummy,
			mtu,
			DeviceFlags::empty(),
			HardwareAddress::zero(6),
			HardwareAddress::zero(6),
			Arc::new(CaptureOps { sent: StdMutex::new(None) }),
		)
	}

	#[test]
	fn registration_assigns_contiguous_net_names() {
		let registry = DeviceRegistry::new();
		let names: Vec<String> = (0..3)
			.map(|_| registry.register(capture_device(1500)).name().to_string())
			.collect();
		assert_eq!(names, vec!["net0", "net1", "net2"]);
	}

	#[test]
	fn output_respects_the_mtu_boundary() {
		let registry = DeviceRegistry::new();
		let dev = registry.register(capture_device(100));
		registry.open(&dev).unwrap();

		let at_mtu = vec![0u8; 100];
		assert!(registry.output(&dev, 0x0800, &at_mtu, &HardwareAddress::zero(6)).is_ok());

		let over_mtu = vec![0u8; 101];
		assert!(matches!(
			registry.output(&dev, 0x0800, &over_mtu, &HardwareAddress::zero(6)),
			Err(Error::Mtu { .. })
		));
	}

	#[test]
	fn output_fails_while_the_device_is_down() {
		let registry = DeviceRegistry::new();
		let dev = registry.register(capture_device(1500));
		assert!(matches!(registry.output(&dev, 0x0800, b"x", &HardwareAddress::zero(6)), Err(Error::DeviceDown)));
	}

	#[test]
	fn at_most_one_interface_per_family_per_device() {
		let registry = DeviceRegistry::new();
		let dev = registry.register(Device::new(
			DeviceType::Loopback,
			65535,
			DeviceFlags::empty(),
			HardwareAddress::zero(0),
			HardwareAddress::zero(0),
			Arc::new(CaptureOps { sent: StdMutex::new(None) }),
		));
		let first = IpInterface::alloc("127.0.0.1", "255.0.0.0").unwrap();
		let second = IpInterface::alloc("127.0.0.2", "255.0.0.0").unwrap();
		registry.add_iface(&dev, first).unwrap();
		assert!(matches!(registry.add_iface(&dev, second), Err(Error::InterfaceBusy)));
	}
}
