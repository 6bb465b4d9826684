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

//! Envelope framing: zlib-compressed JSON. Decoding tolerates peers that
//! skipped compression; anything else is malformed and gets dropped at the
//! receiver.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::types::{Envelope, Error};

/// Encodes an envelope into its wire form.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, Error> {
	let json = serde_json::to_vec(envelope).map_err(|e| Error::Encode(format!("{}", e)))?;
	let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
	encoder
		.write_all(&json)
		.map_err(|e| Error::Encode(format!("{}", e)))?;
	encoder
		.finish()
		.map_err(|e| Error::Encode(format!("{}", e)))
}

/// Decodes a wire frame back into an envelope. Falls back to plain JSON
/// when the data is not zlib-compressed.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, Error> {
	let mut decoder = ZlibDecoder::new(data);
	let mut decompressed = Vec::new();
	if decoder.read_to_end(&mut decompressed).is_ok() {
		if let Ok(envelope) = serde_json::from_slice(&decompressed) {
			return Ok(envelope);
		}
	}
	serde_json::from_slice(data).map_err(|_| Error::Malformed)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::types::Role;

	fn sample() -> Envelope {
		Envelope {
			msg_type: "transaction".to_string(),
			from_hash: "ab".repeat(16),
			from_role: Role::Wallet,
			payload: serde_json::json!({"coin_id": "coin-1", "pk_next": "cd".repeat(32)}),
			ts: "2025-06-01T12:00:00".to_string(),
		}
	}

	#[test]
	fn envelope_roundtrip() {
		let envelope = sample();
		let wire = encode_envelope(&envelope).unwrap();
		let back = decode_envelope(&wire).unwrap();
		assert_eq!(back, envelope);
	}

	#[test]
	fn plain_json_is_accepted() {
		let envelope = sample();
		let raw = serde_json::to_vec(&envelope).unwrap();
		let back = decode_envelope(&raw).unwrap();
		assert_eq!(back, envelope);
	}

	#[test]
	fn garbage_is_malformed() {
		assert_eq!(
			decode_envelope(b"definitely not an envelope").unwrap_err(),
			Error::Malformed
		);
		assert_eq!(decode_envelope(&[]).unwrap_err(), Error::Malformed);
	}

	#[test]
	fn type_field_is_renamed_on_the_wire() {
		let wire = serde_json::to_string(&sample()).unwrap();
		assert!(wire.contains("\"type\":\"transaction\""));
	}
}
