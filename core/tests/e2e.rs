// SPDX-License-Identifier: GPL-2.0

//! End-to-end scenarios exercised against the reference loopback/dummy
//! backends from `netstack-drivers`.
//!
//! Every `Stack` in this binary shares the same process-wide signal
//! numbers for its terminate/softirq IRQs, so tests that call `run`
//! are serialized behind `SERIAL` — otherwise one test's terminate
//! signal could reach another test's still-running worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netstack_core::addr::{checksum16, Ipv4Address};
use netstack_core::device::Device;
use netstack_core::error::Error;
use netstack_core::iface::IpInterface;
use netstack_core::stack::Stack;
use netstack_drivers::loopback;

static SERIAL: Mutex<()> = Mutex::new(());

fn settle() {
	std::thread::sleep(Duration::from_millis(80));
}

/// Installs the env_logger subscriber at most once per test binary;
/// `env_logger::init()` panics on a second call, and each `#[test]`
/// runs in its own thread within the same process.
fn init_logging() {
	let _ = env_logger::try_init();
}

/// Scenario 1: loopback round-trip through ip_output → softirq →
/// ip_input → upper handler.
#[test]
fn loopback_round_trip_delivers_an_8_byte_payload() {
	let _guard = SERIAL.lock().unwrap();
	init_logging();
	let stack = Stack::init().unwrap();
	let dev = loopback::attach(&stack);
	let iface = IpInterface::alloc("127.0.0.1", "255.0.0.0").unwrap();
	stack.register_ip_interface(&dev, iface).unwrap();

	let observed = Arc::new(Mutex::new(None));
	let observed2 = Arc::clone(&observed);
	stack.register_ip_handler(Box::new(
		move |data: &[u8], len: usize, src: Ipv4Address, dst: Ipv4Address, _iface: &Arc<IpInterface>| {
			*observed2.lock().unwrap() = Some((data.to_vec(), len, src, dst));
		},
	));

	stack.run().unwrap();
	let loop_addr = Ipv4Address::new(127, 0, 0, 1);
	stack.ip_output(1, &[0x41; 8], loop_addr, loop_addr).unwrap();
	settle();
	stack.shutdown();

	let (data, len, src, dst) = observed.lock().unwrap().clone().expect("upper handler observed a datagram");
	assert_eq!(len, 8);
	assert_eq!(data, vec![0x41; 8]);
	assert_eq!(src, loop_addr);
	assert_eq!(dst, loop_addr);
}

/// Scenario 2: three frames injected directly via `input_handler`
/// reach a counting handler after one softirq drain.
#[test]
fn three_injected_frames_reach_the_counting_handler() {
	let _guard = SERIAL.lock().unwrap();
	init_logging();
	let stack = Stack::init().unwrap();
	let dev = loopback::attach(&stack);

	let count = Arc::new(AtomicUsize::new(0));
	let count2 = Arc::clone(&count);
	stack
		.register_protocol(
			0x8899,
			Arc::new(move |_data: &[u8], _dev: &Arc<Device>| {
				count2.fetch_add(1, Ordering::SeqCst);
			}),
		)
		.unwrap();

	stack.run().unwrap();
	for _ in 0..3 {
		stack.protocols().input_handler(0x8899, b"x", &dev);
	}
	settle();
	stack.shutdown();

	assert_eq!(count.load(Ordering::SeqCst), 3);
}

/// Scenario 3: directed broadcast is accepted, an address outside the
/// subnet is dropped.
#[test]
fn directed_broadcast_is_accepted_foreign_subnet_is_dropped() {
	let _guard = SERIAL.lock().unwrap();
	init_logging();
	let stack = Stack::init().unwrap();
	let dev = loopback::attach(&stack);
	let iface = IpInterface::alloc("10.0.0.2", "255.255.255.0").unwrap();
	stack.register_ip_interface(&dev, iface).unwrap();

	let accepted = datagram_to(Ipv4Address::new(10, 0, 0, 5), Ipv4Address::new(10, 0, 0, 255));
	let rejected = datagram_to(Ipv4Address::new(10, 0, 0, 5), Ipv4Address::new(10, 0, 1, 1));

	let count = Arc::new(AtomicUsize::new(0));
	let count2 = Arc::clone(&count);
	stack.register_ip_handler(Box::new(
		move |_data: &[u8], _len: usize, _src: Ipv4Address, _dst: Ipv4Address, _iface: &Arc<IpInterface>| {
			count2.fetch_add(1, Ordering::SeqCst);
		},
	));

	stack.run().unwrap();
	stack.protocols().input_handler(0x0800, &accepted, &dev);
	settle();
	stack.protocols().input_handler(0x0800, &rejected, &dev);
	settle();
	stack.shutdown();

	assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Scenario 4: a bit-flipped checksum is dropped before the handler runs.
#[test]
fn a_bad_checksum_is_dropped_without_invoking_the_handler() {
	let _guard = SERIAL.lock().unwrap();
	init_logging();
	let stack = Stack::init().unwrap();
	let dev = loopback::attach(&stack);
	let iface = IpInterface::alloc("10.0.0.2", "255.255.255.0").unwrap();
	stack.register_ip_interface(&dev, iface).unwrap();

	let mut datagram = datagram_to(Ipv4Address::new(10, 0, 0, 5), Ipv4Address::new(10, 0, 0, 2));
	datagram[10] ^= 0xff;

	let count = Arc::new(AtomicUsize::new(0));
	let count2 = Arc::clone(&count);
	stack.register_ip_handler(Box::new(
		move |_data: &[u8], _len: usize, _src: Ipv4Address, _dst: Ipv4Address, _iface: &Arc<IpInterface>| {
			count2.fetch_add(1, Ordering::SeqCst);
		},
	));

	stack.run().unwrap();
	stack.protocols().input_handler(0x0800, &datagram, &dev);
	settle();
	stack.shutdown();

	assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// Scenario 5: `ip_output` with `src = 0.0.0.0` fails with "routing
/// unimplemented", with no stack running at all.
#[test]
fn ip_output_with_any_source_reports_routing_unimplemented() {
	let _guard = SERIAL.lock().unwrap();
	init_logging();
	let stack = Stack::init().unwrap();
	let result = stack.ip_output(1, b"x", Ipv4Address::ANY, Ipv4Address::new(10, 0, 0, 1));
	assert!(matches!(result, Err(Error::RoutingUnimplemented)));
}

/// Scenario 6: start, raise terminate, join the worker within budget.
#[test]
fn shutdown_joins_the_worker_promptly() {
	let _guard = SERIAL.lock().unwrap();
	init_logging();
	let stack = Stack::init().unwrap();
	loopback::attach(&stack);
	stack.run().unwrap();

	let start = std::time::Instant::now();
	stack.shutdown();
	assert!(start.elapsed() < Duration::from_millis(500));
}

fn datagram_to(src: Ipv4Address, dst: Ipv4Address) -> Vec<u8> {
	let mut header = [0u8; 20];
	header[0] = 0x45;
	header[2..4].copy_from_slice(&20u16.to_be_bytes());
	header[8] = 255;
	header[9] = 1;
	header[12..16].copy_from_slice(&src.octets());
	header[16..20].copy_from_slice(&dst.octets());
	let checksum = checksum16(&header);
	header[10..12].copy_from_slice(&checksum.to_be_bytes());
	header.to_vec()
}
