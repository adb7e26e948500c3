// SPDX-License-Identifier: GPL-2.0

//! Protocol dispatcher: owns the global protocol-handler list,
//! per-protocol input queues, and the ingress enqueue / softirq drain
//! pipeline.
//!
//! A C-style linked-queue-per-protocol design is prone to two classic
//! linkage bugs: comparing a pointer instead of the type field when
//! checking for a duplicate registration, and a new entry's `next`
//! ending up self-referential. An owned `Vec<ProtocolEntry>` with a
//! `Mutex<VecDeque<_>>` queue per entry has neither failure mode by
//! construction — there is no pointer to compare and no
//! self-referential link to create.

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::irq::{IrqSubsystem, IRQ_SOFTIRQ};
use crate::sync::Arc;

/// A handler for one protocol type, invoked in worker context with
/// the device the frame arrived on.
pub trait ProtocolHandler: Send + Sync {
	fn handle(&self, data: &[u8], dev: &Arc<Device>);
}

impl<F: Fn(&[u8], &Arc<Device>) + Send + Sync> ProtocolHandler for F {
	fn handle(&self, data: &[u8], dev: &Arc<Device>) {
		self(data, dev)
	}
}

struct QueueEntry {
	dev: Arc<Device>,
	data: Vec<u8>,
}

struct ProtocolEntry {
	proto_type: u16,
	handler: Arc<dyn ProtocolHandler>,
	queue: Mutex<VecDeque<QueueEntry>>,
}

/// Owns the protocol list and input queues.
pub struct ProtocolDispatcher {
	entries: std::sync::RwLock<Vec<ProtocolEntry>>,
	irqs: OnceLock<Arc<IrqSubsystem>>,
}

impl Default for ProtocolDispatcher {
	fn default() -> Self {
		Self::new()
	}
}

impl ProtocolDispatcher {
	pub fn new() -> Self {
		Self { entries: std::sync::RwLock::new(Vec::new()), irqs: OnceLock::new() }
	}

	/// Wires the softirq raiser in; called once by
	/// [`crate::stack::Stack::init`].
	pub(crate) fn bind_irqs(&self, irqs: Arc<IrqSubsystem>) {
		let _ = self.irqs.set(irqs);
	}

	/// Rejects a duplicate `proto_type` and appends a new entry with an
	/// empty queue. Must be called before [`crate::stack::Stack::run`].
	pub fn register_protocol(&self, proto_type: u16, handler: Arc<dyn ProtocolHandler>) -> Result<()> {
		let mut entries = self.entries.write().unwrap();
		if entries.iter().any(|e| e.proto_type == proto_type) {
			return Err(Error::ProtocolBusy(proto_type));
		}
		entries.push(ProtocolEntry { proto_type, handler, queue: Mutex::new(VecDeque::new()) });
		log::info!("registered protocol {proto_type:#06x}");
		Ok(())
	}

	/// Called from device-driver (IRQ-handler) context. Finds the entry
	/// for `proto_type`; if none, silently drops. Copies `data`
	/// byte-for-byte into a new queue entry, enqueues it, then raises
	/// the softirq.
	pub fn input_handler(&self, proto_type: u16, data: &[u8], dev: &Arc<Device>) {
		let entries = self.entries.read().unwrap();
		let Some(entry) = entries.iter().find(|e| e.proto_type == proto_type) else {
			log::debug!("no protocol handler for type {proto_type:#06x}; dropping {} bytes", data.len());
			dev.stats().record_dropped();
			return;
		};
		entry.queue.lock().unwrap().push_back(QueueEntry { dev: Arc::clone(dev), data: data.to_vec() });
		drop(entries);
		self.raise_softirq();
	}

	fn raise_softirq(&self) {
		if let Some(irqs) = self.irqs.get() {
			irqs.raise_irq(IRQ_SOFTIRQ);
		}
	}

	/// Walks every protocol entry and drains its queue to empty,
	/// invoking each entry's handler in FIFO order.
	pub fn softirq_handler(&self) {
		let entries = self.entries.read().unwrap();
		for entry in entries.iter() {
			loop {
				let next = entry.queue.lock().unwrap().pop_front();
				let Some(queued) = next else { break };
				entry.handler.handle(&queued.data, &queued.dev);
			}
		}
	}

	/// Drops every queued entry without dispatching: entries still
	/// queued at shutdown are discarded rather than delivered late.
	pub fn drain_without_dispatch(&self) {
		let entries = self.entries.read().unwrap();
		for entry in entries.iter() {
			entry.queue.lock().unwrap().clear();
		}
	}

	/// Registered protocol types, in registration order.
	pub fn protocol_types(&self) -> Vec<u16> {
		self.entries.read().unwrap().iter().map(|e| e.proto_type).collect()
	}
}
