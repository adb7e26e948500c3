// SPDX-License-Identifier: GPL-2.0

//! Hosting executable: `init` → register backends → register
//! upper-layer protocols → register IP interfaces → `run` → block
//! until signalled → `shutdown`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use netstack_core::addr::{addr_pton, Ipv4Address};
use netstack_core::device::HardwareAddress;
use netstack_core::iface::IpInterface;
use netstack_core::stack::Stack;
use netstack_drivers::{dummy, loopback};

#[derive(Parser, Debug)]
#[command(name = "netd", about = "Runs the device/protocol plane against reference backends")]
struct Cli {
	/// Unicast address for the loopback device's IP interface.
	#[arg(long, default_value = "127.0.0.1")]
	loopback_addr: String,

	/// Netmask for the loopback device's IP interface.
	#[arg(long, default_value = "255.0.0.0")]
	loopback_netmask: String,

	/// Also attach a dummy (discard) device alongside loopback.
	#[arg(long)]
	with_dummy: bool,

	/// Send one IPv4 datagram to the loopback address after `run` and
	/// exit once it has had time to round-trip.
	#[arg(long)]
	ping: bool,
}

fn main() {
	env_logger::init();
	let cli = Cli::parse();

	let stack = Stack::init().expect("stack init");

	let loop_dev = loopback::attach(&stack);
	let loop_iface = IpInterface::alloc(&cli.loopback_addr, &cli.loopback_netmask).expect("loopback interface");
	stack.register_ip_interface(&loop_dev, loop_iface).expect("attach loopback interface");

	stack.register_ip_handler(Box::new(
		|data: &[u8], len: usize, src: Ipv4Address, dst: Ipv4Address, _iface: &Arc<IpInterface>| {
			log::info!("ip datagram accepted: {src} -> {dst}, {len} bytes: {data:?}");
		},
	));

	if cli.with_dummy {
		dummy::attach(&stack, HardwareAddress::new(&[0x02, 0, 0, 0, 0, 1]));
	}

	stack.run().expect("stack run");
	log::info!("netd running, devices: {:?}", stack.devices().devices().iter().map(|d| d.name().to_string()).collect::<Vec<_>>());

	if cli.ping {
		let addr = addr_pton(&cli.loopback_addr).expect("valid loopback address");
		stack.ip_output(1, b"ping", addr, addr).expect("ip_output");
		std::thread::sleep(Duration::from_millis(100));
	} else {
		wait_for_ctrl_c();
	}

	stack.shutdown();
}

/// Blocks until SIGINT (Ctrl+C) arrives. Runs on the main thread,
/// independent of the stack's own interrupt worker, which has already
/// claimed `IRQ_TERMINATE`/`IRQ_SOFTIRQ` for itself.
fn wait_for_ctrl_c() {
	let mut signals = signal_hook::iterator::Signals::new([signal_hook::consts::SIGINT]).expect("install SIGINT handler");
	signals.forever().next();
	log::info!("SIGINT received, shutting down");
}
