// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Symbolic service name to broker port mapping.
//!
//! Every process bound to the same name must arrive at the same port, so the
//! mapping is a versioned contract:
//!
//! ```text
//! port = NAME_PORT_BASE + fnv1a_32(utf8(name)) % NAME_PORT_RANGE
//! ```
//!
//! The result lies in `[1024, 32767]`, below the common ephemeral ranges.

/// Version of the name to port contract.
pub const NAME_PORT_DERIVATION_VERSION: u32 = 1;

/// First port a name can map to.
pub const NAME_PORT_BASE: u16 = 1024;

/// Number of ports names are spread over.
pub const NAME_PORT_RANGE: u32 = 31744;

const FNV32_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV32_PRIME: u32 = 0x01000193;

/// FNV-1a, 32 bit.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV32_PRIME)
    })
}

/// Port a broker bound to `name` listens on.
pub fn derive_port(name: &str) -> u16 {
    let offset = fnv1a_32(name.as_bytes()) % NAME_PORT_RANGE;
    NAME_PORT_BASE + offset as u16
}
