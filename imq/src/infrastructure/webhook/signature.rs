// /////////////////////////////////////////////////////////////////////////////
// IMQ - Intelligent Merge Queue
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Webhook Signature Verification
//!
//! HMAC-SHA256 verification of the `X-Hub-Signature-256` header: the hosting
//! service signs the raw request body with the shared secret and sends
//! `sha256=<hex>`. Verification recomputes the MAC over the exact bytes
//! received and compares in constant time (via `Mac::verify_slice`), so
//! timing side channels cannot leak the secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix the hosting service puts in front of the hex digest.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies a `sha256=<hex>` signature over the raw body.
///
/// Returns `false` for a missing header, a malformed header, or a MAC
/// mismatch. An empty secret means verification is disabled and the caller
/// should not invoke this at all.
pub fn verify_signature(secret: &str, body: &[u8], signature_header: Option<&str>) -> bool {
    let Some(header) = signature_header else {
        return false;
    };
    let Some(hex_digest) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the `sha256=<hex>` header value for a body (test helper and
/// outbound-delivery support).
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}
