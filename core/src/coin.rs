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

//! The coin: a bearer token with immutable identity and mutable ownership.

use pkicash_keychain::{build_payload, PublicKey, Signature};

/// A coin as it travels on the wire and rests in stores. `coin_id`, `value`,
/// `pk_issuer`, `issuer_signature` and `pk_engine` never change after mint;
/// only `pk_current` moves, and only when the engine accepts a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
	/// Stable identifier, assigned by the issuer at mint
	pub coin_id: String,
	/// Face value
	#[serde(rename = "waarde")]
	pub value: u64,
	/// Verification key of the current owner; must sign the next transfer
	pub pk_current: PublicKey,
	/// Verification key of the minting issuer
	pub pk_issuer: PublicKey,
	/// Issuer signature over `(coin_id, value, pk_issuer)`
	pub issuer_signature: Signature,
	/// Opaque identifier of the authoritative engine
	pub state_engine_endpoint: String,
	/// Verification key of the authoritative engine
	pub pk_engine: PublicKey,
}

impl Coin {
	/// The canonical signing input for the issuer signature. Built from the
	/// immutable identity fields only, so it stays verifiable after any
	/// number of ownership changes.
	pub fn issuer_payload(&self) -> Vec<u8> {
		build_payload(&[
			&self.coin_id,
			&self.value.to_string(),
			&self.pk_issuer.to_hex(),
		])
	}

	/// Verifies the issuer signature under the coin's own issuer key.
	pub fn verify_issuer(&self) -> bool {
		self.pk_issuer
			.verify(&self.issuer_payload(), &self.issuer_signature)
	}

	/// Wallet-side acceptance check: the issuer must be in the caller's
	/// trusted set and the mint signature must hold.
	pub fn validate(&self, trusted_issuers: &[PublicKey]) -> bool {
		trusted_issuers.contains(&self.pk_issuer) && self.verify_issuer()
	}
}

#[cfg(test)]
mod test {
	use crate::issuer::Issuer;
	use pkicash_keychain::{generate_keypair, Signature, SIGNATURE_SIZE};

	#[test]
	fn issuer_signature_verifies() {
		let issuer = Issuer::new();
		let (_, pk_owner) = generate_keypair();
		let (_, pk_engine) = generate_keypair();
		let (coin, _) = issuer
			.issue_coin(10, &pk_owner, "engine-a", &pk_engine)
			.unwrap();
		assert!(coin.verify_issuer());
	}

	#[test]
	fn tampered_signature_fails() {
		let issuer = Issuer::new();
		let (_, pk_owner) = generate_keypair();
		let (_, pk_engine) = generate_keypair();
		let (mut coin, _) = issuer
			.issue_coin(10, &pk_owner, "engine-a", &pk_engine)
			.unwrap();
		coin.issuer_signature = Signature::from_bytes(&[0; SIGNATURE_SIZE]).unwrap();
		assert!(!coin.verify_issuer());
	}

	#[test]
	fn tampered_value_fails() {
		let issuer = Issuer::new();
		let (_, pk_owner) = generate_keypair();
		let (_, pk_engine) = generate_keypair();
		let (mut coin, _) = issuer
			.issue_coin(10, &pk_owner, "engine-a", &pk_engine)
			.unwrap();
		coin.value = 1000;
		assert!(!coin.verify_issuer());
	}

	#[test]
	fn json_roundtrip_preserves_coin() {
		let issuer = Issuer::new();
		let (_, pk_owner) = generate_keypair();
		let (_, pk_engine) = generate_keypair();
		let (coin, _) = issuer
			.issue_coin(25, &pk_owner, "engine-a", &pk_engine)
			.unwrap();

		let json = serde_json::to_string(&coin).unwrap();
		// wire format uses the historical field name
		assert!(json.contains("\"waarde\":25"));
		let back: super::Coin = serde_json::from_str(&json).unwrap();
		assert_eq!(back, coin);
		assert!(back.verify_issuer());
	}

	#[test]
	fn validate_needs_trusted_issuer() {
		let issuer = Issuer::new();
		let (_, pk_owner) = generate_keypair();
		let (_, pk_engine) = generate_keypair();
		let (coin, _) = issuer
			.issue_coin(5, &pk_owner, "engine-a", &pk_engine)
			.unwrap();

		assert!(coin.validate(&[*issuer.public_key()]));
		assert!(!coin.validate(&[]));
		let (_, stranger) = generate_keypair();
		assert!(!coin.validate(&[stranger]));
	}
}
