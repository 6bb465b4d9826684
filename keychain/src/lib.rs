// Copyright 2025 The PKICash Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Key material for the transaction layer: Ed25519 secret/public keys and
//! signatures, hex-encoded everywhere they travel or rest. Every signature
//! in the protocol is produced over a `build_payload` output, never over a
//! structured serialisation, so signing inputs stay canonical without a
//! JSON canonicaliser.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

mod keyfile;
mod types;

pub use crate::keyfile::{load_key, save_key};
pub use crate::types::{
	generate_keypair, Error, PublicKey, SecretKey, Signature, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE,
	SIGNATURE_SIZE,
};

/// Builds a canonical signing input by joining the parts with an ASCII pipe
/// and encoding as UTF-8.
pub fn build_payload(parts: &[&str]) -> Vec<u8> {
	parts.join("|").into_bytes()
}

#[cfg(test)]
mod test {
	use super::build_payload;

	#[test]
	fn payload_joins_with_pipe() {
		assert_eq!(build_payload(&["a", "b", "c"]), b"a|b|c".to_vec());
		assert_eq!(build_payload(&["solo"]), b"solo".to_vec());
		assert_eq!(build_payload(&[]), Vec::<u8>::new());
	}

	#[test]
	fn payload_is_order_sensitive() {
		assert_ne!(build_payload(&["a", "b"]), build_payload(&["b", "a"]));
	}
}
