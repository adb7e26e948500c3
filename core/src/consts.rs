// SPDX-License-Identifier: GPL-2.0

//! Link-layer type codes, reused from the Ethernet registry.

/// IPv4, carried on top of the link layer this core multiplexes by.
pub const LINK_TYPE_IP: u16 = 0x0800;
/// ARP — resolved by an external collaborator; the code is reserved
/// here only because device backends need it to tag frames.
pub const LINK_TYPE_ARP: u16 = 0x0806;
/// IPv6 — out of scope for this core; reserved for completeness.
pub const LINK_TYPE_IPV6: u16 = 0x86DD;
