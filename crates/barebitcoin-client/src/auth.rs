//! HMAC-SHA256 request signing for the Bare Bitcoin API.
//!
//! The signed message is `method || path || SHA256(nonce || body)`, keyed
//! with the base64-decoded API secret. The result is sent base64-encoded in
//! the `x-bb-api-hmac` header.

use anyhow::{Context, Result};
use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_HMAC: &str = "x-bb-api-hmac";
pub const HEADER_NONCE: &str = "x-bb-api-nonce";
pub const HEADER_KEY: &str = "x-bb-api-key";

pub fn sign(secret: &str, method: &str, path: &str, nonce: i64, body: &str) -> Result<String> {
    let decoded_secret = BASE64_STANDARD
        .decode(secret)
        .context("Bare Bitcoin secret is not valid base64")?;

    let hashed = Sha256::digest(format!("{}{}", nonce, body).as_bytes());
    let message = [method.as_bytes(), path.as_bytes(), hashed.as_slice()].concat();

    let mut mac = HmacSha256::new_from_slice(&decoded_secret).context("Invalid HMAC key")?;
    mac.update(&message);
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}
