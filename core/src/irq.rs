// SPDX-License-Identifier: GPL-2.0

//! Interrupt subsystem: a cooperative, single-consumer dispatcher for
//! asynchronous events delivered as numbered IRQs.
//!
//! IRQ numbers map onto POSIX signals, and a dedicated thread waits
//! for them with `signal_hook::iterator::Signals` rather than an
//! internal event channel: `Signals::new` plus
//! `signal_hook::low_level::raise` give wait-free, re-entrant raising
//! with no extra queue of our own to maintain.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use signal_hook::consts::{SIGHUP, SIGUSR1};
use signal_hook::iterator::Signals;
use signal_hook::low_level::raise as signal_raise;

use crate::error::{Error, Result};
use crate::sync::{Arc, RwLock, StartBarrier};

/// The terminate IRQ: shutting the worker down raises this and
/// nothing else is registered against it.
pub const IRQ_TERMINATE: i32 = SIGHUP;
/// The protocol dispatcher's softirq.
pub const IRQ_SOFTIRQ: i32 = SIGUSR1;

bitflags::bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct IrqFlags: u32 {
		const SHARED = 0b01;
	}
}

/// A callback invoked on the interrupt worker thread when its IRQ
/// fires. Return value is logged, never propagated — a failing
/// handler does not stop the dispatch loop.
pub trait IrqHandler: Send + Sync {
	fn handle(&self, irq: i32) -> Result<()>;
}

impl<F: Fn(i32) -> Result<()> + Send + Sync> IrqHandler for F {
	fn handle(&self, irq: i32) -> Result<()> {
		self(irq)
	}
}

struct IrqEntry {
	irq: i32,
	flags: IrqFlags,
	name: &'static str,
	handler: Arc<dyn IrqHandler>,
}

/// Owns the IRQ registration table and the dedicated worker thread,
/// along with the start-up rendezvous barrier between them.
pub struct IrqSubsystem {
	entries: RwLock<Vec<IrqEntry>>,
	worker: std::sync::Mutex<Option<thread::JoinHandle<()>>>,
	worker_id: std::sync::Mutex<Option<ThreadId>>,
	running: AtomicBool,
}

impl Default for IrqSubsystem {
	fn default() -> Self {
		Self::new()
	}
}

impl IrqSubsystem {
	pub fn new() -> Self {
		Self {
			entries: RwLock::new(Vec::new()),
			worker: std::sync::Mutex::new(None),
			worker_id: std::sync::Mutex::new(None),
			running: AtomicBool::new(false),
		}
	}

	/// Registers `handler` for `irq`. Fails unless either no entry for
	/// `irq` exists yet, or every existing entry for `irq` and the new
	/// one both carry [`IrqFlags::SHARED`].
	pub fn request_irq(
		&self,
		irq: i32,
		handler: Arc<dyn IrqHandler>,
		flags: IrqFlags,
		name: &'static str,
	) -> Result<()> {
		let mut entries = self.entries.write().unwrap();
		let existing_shared = entries.iter().filter(|e| e.irq == irq).all(|e| e.flags.contains(IrqFlags::SHARED));
		let has_existing = entries.iter().any(|e| e.irq == irq);
		if has_existing && (!existing_shared || !flags.contains(IrqFlags::SHARED)) {
			return Err(Error::IrqBusy(irq));
		}
		entries.push(IrqEntry { irq, flags, name, handler });
		log::info!("registered irq {irq} handler: {name}");
		Ok(())
	}

	/// Wait-free: asks the dispatcher to eventually run every handler
	/// registered for `irq`. Safe to call from any context, including
	/// from within a handler.
	pub fn raise_irq(&self, irq: i32) {
		if let Err(e) = signal_raise(irq) {
			log::error!("failed to raise irq {irq}: {e}");
		}
	}

	/// Blocks the wait-set signals on every other thread, spawns the
	/// worker, and rendezvous-waits with it before returning (spec
	/// §4.A "run").
	pub fn run(self: &Arc<Self>) -> Result<()> {
		let irqs: Vec<i32> = {
			let mut set: Vec<i32> = self.entries.read().unwrap().iter().map(|e| e.irq).collect();
			set.push(IRQ_TERMINATE);
			set.push(IRQ_SOFTIRQ);
			set.sort_unstable();
			set.dedup();
			set
		};

		let mut signals = Signals::new(&irqs).map_err(|_| Error::WorkerStartFailed)?;
		let barrier = Arc::new(StartBarrier::new(2));
		let worker_barrier = Arc::clone(&barrier);
		let this = Arc::clone(self);

		let handle = thread::Builder::new()
			.name("irq-worker".into())
			.spawn(move || {
				worker_barrier.wait();
				this.running.store(true, Ordering::SeqCst);
				for irq in &mut signals {
					if irq == IRQ_TERMINATE {
						log::info!("irq worker observed terminate signal");
						break;
					}
					this.dispatch(irq);
				}
				this.running.store(false, Ordering::SeqCst);
			})
			.map_err(|_| Error::WorkerStartFailed)?;

		*self.worker_id.lock().unwrap() = Some(handle.thread().id());
		*self.worker.lock().unwrap() = Some(handle);
		barrier.wait();
		Ok(())
	}

	fn dispatch(&self, irq: i32) {
		let entries = self.entries.read().unwrap();
		for entry in entries.iter().filter(|e| e.irq == irq) {
			if let Err(e) = entry.handler.handle(irq) {
				log::error!("irq {} handler {} returned an error: {e}", entry.irq, entry.name);
			}
		}
	}

	/// Raises the terminate IRQ and joins the worker. Idempotent: a
	/// second call, or a call before [`run`](Self::run), observes no
	/// worker to join and returns immediately.
	pub fn shutdown(&self) {
		let handle = self.worker.lock().unwrap().take();
		let Some(handle) = handle else {
			return;
		};
		if handle.thread().id() == thread::current().id() {
			return;
		}
		self.raise_irq(IRQ_TERMINATE);
		let _ = handle.join();
	}
}

impl fmt::Debug for IrqSubsystem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IrqSubsystem")
			.field("entries", &self.entries.read().unwrap().len())
			.field("running", &self.running.load(Ordering::Relaxed))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;
	use std::sync::Mutex as StdMutex;
	use std::time::Duration;

	// Every test in this binary shares the same process-wide signal
	// numbers; running them concurrently would let one test's raise
	// reach another test's worker. Serialize.
	static SERIAL: StdMutex<()> = StdMutex::new(());

	#[test]
	fn duplicate_non_shared_registration_fails() {
		let _guard = SERIAL.lock().unwrap();
		let irqs = IrqSubsystem::new();
		let custom = 35;
		irqs.request_irq(custom, Arc::new(|_: i32| Ok(())), IrqFlags::empty(), "a").unwrap();
		assert!(matches!(
			irqs.request_irq(custom, Arc::new(|_: i32| Ok(())), IrqFlags::empty(), "b"),
			Err(Error::IrqBusy(_))
		));
	}

	#[test]
	fn shared_registration_succeeds_when_both_sides_opt_in() {
		let _guard = SERIAL.lock().unwrap();
		let irqs = IrqSubsystem::new();
		let custom = 36;
		irqs.request_irq(custom, Arc::new(|_: i32| Ok(())), IrqFlags::SHARED, "a").unwrap();
		assert!(irqs.request_irq(custom, Arc::new(|_: i32| Ok(())), IrqFlags::SHARED, "b").is_ok());
	}

	#[test]
	fn shutdown_before_run_is_a_safe_noop() {
		let _guard = SERIAL.lock().unwrap();
		let irqs = Arc::new(IrqSubsystem::new());
		irqs.shutdown();
	}

	#[test]
	fn worker_starts_dispatches_and_joins_on_terminate() {
		let _guard = SERIAL.lock().unwrap();
		let irqs = Arc::new(IrqSubsystem::new());
		let custom = 37;
		let hits = Arc::new(AtomicUsize::new(0));
		let hits2 = Arc::clone(&hits);
		irqs.request_irq(
			custom,
			Arc::new(move |_: i32| {
				hits2.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}),
			IrqFlags::empty(),
			"counter",
		)
		.unwrap();

		irqs.run().unwrap();
		irqs.raise_irq(custom);
		thread::sleep(Duration::from_millis(50));
		assert_eq!(hits.load(Ordering::SeqCst), 1);

		irqs.shutdown();
	}
}
