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

//! The authoritative transfer ledger. Every mutation is validated against
//! the stored current-owner key, applied and confirmed inside one atomic
//! batch. A replayed transfer is signed against a key the ledger has
//! already moved past, so it fails verification; no spent flag is needed.

use std::path::Path;

use log::{debug, info, warn};

use pkicash_core::{Coin, Confirmation, Delivery, Status, TransferRequest};
use pkicash_keychain::{self as keychain, generate_keypair, PublicKey, SecretKey, Signature};

use crate::error::Error;
use crate::store::{CoinRow, EngineStore};

/// Read-only view of a single ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinState {
	/// Coin identifier
	pub coin_id: String,
	/// Current owner key
	pub pk_current: PublicKey,
	/// Full coin record
	pub coin: Coin,
}

/// The state engine. All state-mutating operations funnel through a single
/// write transaction at a time; reads may run concurrently.
pub struct StateEngine {
	store: EngineStore,
	sk: SecretKey,
	pk: PublicKey,
}

impl StateEngine {
	/// Creates an engine with a freshly generated signing key.
	pub fn new(db_root: &str) -> Result<StateEngine, Error> {
		let (sk, _) = generate_keypair();
		StateEngine::with_key(db_root, sk)
	}

	/// Creates an engine around an existing signing key.
	pub fn with_key(db_root: &str, sk: SecretKey) -> Result<StateEngine, Error> {
		let store = EngineStore::new(db_root)?;
		let pk = sk.public_key();
		Ok(StateEngine { store, sk, pk })
	}

	/// Opens an engine, loading the signing key from the given file or
	/// generating and saving a fresh one if the file does not exist.
	pub fn open(db_root: &str, key_path: &Path) -> Result<StateEngine, Error> {
		let sk = if key_path.exists() {
			keychain::load_key(key_path)?
		} else {
			let (sk, _) = generate_keypair();
			keychain::save_key(key_path, &sk)?;
			sk
		};
		StateEngine::with_key(db_root, sk)
	}

	/// The engine's verification key, carried by every coin it governs.
	pub fn public_key(&self) -> &PublicKey {
		&self.pk
	}

	/// Adds an issuer key to the trusted set. Idempotent.
	pub fn register_issuer(&self, pk: &PublicKey) -> Result<(), Error> {
		let batch = self.store.batch()?;
		batch.register_issuer(pk)?;
		batch.commit()?;
		info!("registered trusted issuer {}", pk);
		Ok(())
	}

	/// Whether the issuer key is trusted.
	pub fn is_trusted_issuer(&self, pk: &PublicKey) -> Result<bool, Error> {
		Ok(self.store.is_trusted_issuer(pk)?)
	}

	/// All trusted issuer keys.
	pub fn list_issuers(&self) -> Result<Vec<PublicKey>, Error> {
		Ok(self.store.issuers()?)
	}

	/// Registers a freshly minted coin and applies its initial transfer in
	/// one step, so the recorded owner is the recipient and the issuer
	/// never appears as owner. Queues an `issued` confirmation for the
	/// recipient.
	pub fn register_coin(
		&self,
		coin: &Coin,
		recipient_dest: &str,
		pk_next: &PublicKey,
		transfer_signature: &Signature,
	) -> Result<Confirmation, Error> {
		if !self.store.is_trusted_issuer(&coin.pk_issuer)? {
			return Err(Error::UntrustedIssuer(coin.pk_issuer.to_hex()));
		}
		if !coin.verify_issuer() {
			return Err(Error::InvalidSignature(format!(
				"issuer signature on coin {}",
				coin.coin_id
			)));
		}
		let payload = TransferRequest::payload(&coin.coin_id, pk_next);
		if !coin.pk_current.verify(&payload, transfer_signature) {
			return Err(Error::InvalidSignature(format!(
				"initial transfer on coin {}",
				coin.coin_id
			)));
		}

		let batch = self.store.batch()?;
		if batch.coin_exists(&coin.coin_id)? {
			return Err(Error::DuplicateCoin(coin.coin_id.clone()));
		}

		let mut owned = coin.clone();
		owned.pk_current = *pk_next;

		batch.save_coin(&CoinRow {
			pk_current: *pk_next,
			coin: owned.clone(),
		})?;

		let confirmation = self.sign_confirmation(&coin.coin_id, pk_next, Status::Issued);
		batch.enqueue_delivery(
			recipient_dest,
			Delivery {
				coin: owned,
				confirmation: confirmation.clone(),
				description: None,
				sender_dest: None,
			},
		)?;
		batch.commit()?;

		info!(
			"registered coin {} (value {}) for {}",
			coin.coin_id, coin.value, recipient_dest
		);
		Ok(confirmation)
	}

	/// Applies a transfer: verifies the signature against the stored
	/// current owner, advances ownership and queues a `confirmed`
	/// confirmation for the recipient. Verification and update share one
	/// write transaction, so two transfers signed against the same stale
	/// owner key cannot both succeed.
	pub fn process_transaction(&self, tx: &TransferRequest) -> Result<Confirmation, Error> {
		let batch = self.store.batch()?;

		let row = match batch.get_coin(&tx.coin_id)? {
			Some(row) => row,
			None => return Err(Error::UnknownCoin(tx.coin_id.clone())),
		};

		let payload = TransferRequest::payload(&tx.coin_id, &tx.pk_next);
		if !row.pk_current.verify(&payload, &tx.signature) {
			warn!(
				"rejected transfer of {}: signature does not match current owner",
				tx.coin_id
			);
			return Err(Error::InvalidSignature(format!(
				"transfer on coin {}",
				tx.coin_id
			)));
		}

		let mut coin = row.coin;
		coin.pk_current = tx.pk_next;

		batch.save_coin(&CoinRow {
			pk_current: tx.pk_next,
			coin: coin.clone(),
		})?;

		let confirmation = self.sign_confirmation(&tx.coin_id, &tx.pk_next, Status::Confirmed);
		batch.enqueue_delivery(
			&tx.recipient_dest,
			Delivery {
				coin,
				confirmation: confirmation.clone(),
				description: tx.description.clone(),
				sender_dest: None,
			},
		)?;
		batch.commit()?;

		info!(
			"transferred coin {} to {} for {}",
			tx.coin_id, tx.pk_next, tx.recipient_dest
		);
		Ok(confirmation)
	}

	/// Returns all undelivered rows for the recipient, in insertion order,
	/// and marks them delivered in the same transaction. Each row is
	/// returned by exactly one fetch; rows themselves persist, see
	/// `delivered_history`.
	pub fn get_pending_deliveries(&self, recipient_dest: &str) -> Result<Vec<Delivery>, Error> {
		let batch = self.store.batch()?;
		let rows = batch.pending_deliveries(recipient_dest)?;

		let mut deliveries = Vec::with_capacity(rows.len());
		for (key, mut row) in rows {
			row.delivered = true;
			batch.save_delivery(&key, &row)?;
			deliveries.push(row.delivery);
		}
		batch.commit()?;

		debug!(
			"handed {} pending deliveries to {}",
			deliveries.len(),
			recipient_dest
		);
		Ok(deliveries)
	}

	/// Already-delivered rows for the recipient, in insertion order. A
	/// recipient that crashed mid-consume recovers by filtering this view
	/// by coin id; the delivered flag is not touched.
	pub fn delivered_history(&self, recipient_dest: &str) -> Result<Vec<Delivery>, Error> {
		let rows = self.store.deliveries(recipient_dest, true)?;
		Ok(rows.into_iter().map(|row| row.delivery).collect())
	}

	/// Current ownership of a single coin, if registered.
	pub fn get_coin_state(&self, coin_id: &str) -> Result<Option<CoinState>, Error> {
		Ok(self.store.get_coin(coin_id)?.map(|row| CoinState {
			coin_id: row.coin.coin_id.clone(),
			pk_current: row.pk_current,
			coin: row.coin,
		}))
	}

	/// All ledger rows.
	pub fn list_coins(&self) -> Result<Vec<CoinState>, Error> {
		Ok(self
			.store
			.coins()?
			.into_iter()
			.map(|row| CoinState {
				coin_id: row.coin.coin_id.clone(),
				pk_current: row.pk_current,
				coin: row.coin,
			})
			.collect())
	}

	fn sign_confirmation(
		&self,
		coin_id: &str,
		pk_next: &PublicKey,
		status: Status,
	) -> Confirmation {
		let payload = Confirmation::payload(coin_id, pk_next, status);
		Confirmation {
			coin_id: coin_id.to_string(),
			pk_next: *pk_next,
			status,
			engine_signature: self.sk.sign(&payload),
			pk_engine: self.pk,
		}
	}
}
