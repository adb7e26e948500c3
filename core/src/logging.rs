// SPDX-License-Identifier: GPL-2.0

//! Logging conventions for the device/protocol plane.
//!
//! This crate runs in userspace, so it logs through the `log` facade:
//! call sites use `log::info!` etc. and the hosting binary
//! (`demos/netd`) installs a concrete logger (`env_logger`) at
//! startup. Library crates never install one themselves — that
//! decision belongs to the binary.
//!
//! Conventions:
//! - configuration/resource errors log at [`log::Level::Error`];
//! - dropped ingress datagrams log at [`log::Level::Debug`] (routine
//!   under a noisy link, not exceptional);
//! - successful registration and lifecycle transitions log at
//!   [`log::Level::Info`].
