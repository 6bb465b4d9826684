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

//! The issuer (bank) role: mints coins. Stateless apart from its signing
//! key, which persists as a single hex-encoded file.

use std::path::Path;

use log::info;
use uuid::Uuid;

use pkicash_keychain::{
	self as keychain, build_payload, generate_keypair, PublicKey, SecretKey,
};

use crate::coin::Coin;
use crate::types::TransferInfo;
use crate::Error;

/// Mints coins and signs the statements that make them spendable.
pub struct Issuer {
	sk: SecretKey,
	pk: PublicKey,
}

impl Issuer {
	/// Creates an issuer with a freshly generated key.
	pub fn new() -> Issuer {
		let (sk, pk) = generate_keypair();
		Issuer { sk, pk }
	}

	/// Creates an issuer around an existing signing key.
	pub fn with_key(sk: SecretKey) -> Issuer {
		let pk = sk.public_key();
		Issuer { sk, pk }
	}

	/// The issuer's verification key.
	pub fn public_key(&self) -> &PublicKey {
		&self.pk
	}

	/// Mints a coin of the given value for the given recipient.
	///
	/// Two signatures are produced: the issuance statement over
	/// `(coin_id, value, pk_issuer)` and the initial transfer over
	/// `(coin_id, pk_recipient)`. The coin starts with the issuer as owner
	/// so the first hand-off goes through the same ledger path as every
	/// later transfer; the engine registers the coin and applies the
	/// initial transfer in one step and the issuer never shows up as owner
	/// in the recipient's view.
	pub fn issue_coin(
		&self,
		value: u64,
		pk_recipient: &PublicKey,
		engine_endpoint: &str,
		pk_engine: &PublicKey,
	) -> Result<(Coin, TransferInfo), Error> {
		if value == 0 {
			return Err(Error::ZeroValue);
		}

		let coin_id = Uuid::new_v4().to_string();

		let issuer_payload =
			build_payload(&[&coin_id, &value.to_string(), &self.pk.to_hex()]);
		let issuer_signature = self.sk.sign(&issuer_payload);

		let transfer_payload = build_payload(&[&coin_id, &pk_recipient.to_hex()]);
		let transfer_signature = self.sk.sign(&transfer_payload);

		let coin = Coin {
			coin_id,
			value,
			pk_current: self.pk,
			pk_issuer: self.pk,
			issuer_signature,
			state_engine_endpoint: engine_endpoint.to_string(),
			pk_engine: *pk_engine,
		};

		info!("minted coin {} with value {}", coin.coin_id, value);

		Ok((
			coin,
			TransferInfo {
				pk_next: *pk_recipient,
				transfer_signature,
			},
		))
	}

	/// Persists the signing key to a mode-restricted file.
	pub fn save_key(&self, path: &Path) -> Result<(), keychain::Error> {
		keychain::save_key(path, &self.sk)
	}

	/// Loads an issuer from a key file written with `save_key`.
	pub fn load_key(path: &Path) -> Result<Issuer, keychain::Error> {
		let sk = keychain::load_key(path)?;
		Ok(Issuer::with_key(sk))
	}
}
