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

//! Implements storage primitives required by the engine ledger: the coins
//! table, the trusted-issuer set and the pending-delivery queue, all in a
//! single LMDB database under distinct key prefixes.

use std::sync::Arc;

use pkicash_core::{Coin, Delivery};
use pkicash_keychain::PublicKey;
use pkicash_store::{self as store, to_key, u64_to_key};

const DB_NAME: &str = "engine";

const COIN_PREFIX: u8 = b'c';
const ISSUER_PREFIX: u8 = b'i';
const DELIVERY_PREFIX: u8 = b'd';
const DELIVERY_HEAD_PREFIX: u8 = b'm';

/// A ledger row: the single source of truth for who owns a coin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRow {
	/// Verification key that must sign the next transfer
	pub pk_current: PublicKey,
	/// Full coin record, with `pk_current` kept in sync
	pub coin: Coin,
}

/// A queued delivery awaiting a fetch by its recipient. Rows are never
/// deleted; `delivered` flips to true exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRow {
	/// Transport destination of the recipient
	pub recipient_dest: String,
	/// The payload handed to the recipient
	pub delivery: Delivery,
	/// Whether a fetch already returned this row
	pub delivered: bool,
}

/// The engine ledger backed by a key-value store.
pub struct EngineStore {
	db: store::Store,
}

impl EngineStore {
	/// Opens (or creates) the ledger under the given directory.
	pub fn new(db_root: &str) -> Result<EngineStore, store::Error> {
		let env = Arc::new(store::new_env(db_root.to_string()));
		let db = store::Store::open(env, DB_NAME);
		Ok(EngineStore { db })
	}

	/// Reads a single ledger row.
	pub fn get_coin(&self, coin_id: &str) -> Result<Option<CoinRow>, store::Error> {
		self.db.get_ser(&to_key(COIN_PREFIX, coin_id.as_bytes()))
	}

	/// Whether the issuer key is in the trusted set.
	pub fn is_trusted_issuer(&self, pk: &PublicKey) -> Result<bool, store::Error> {
		self.db
			.exists(&to_key(ISSUER_PREFIX, pk.to_hex().as_bytes()))
	}

	/// All trusted issuer keys.
	pub fn issuers(&self) -> Result<Vec<PublicKey>, store::Error> {
		let iter = self.db.iter::<PublicKey>(&[ISSUER_PREFIX, store::SEP])?;
		Ok(iter.map(|(_, pk)| pk).collect())
	}

	/// All ledger rows.
	pub fn coins(&self) -> Result<Vec<CoinRow>, store::Error> {
		let iter = self.db.iter::<CoinRow>(&[COIN_PREFIX, store::SEP])?;
		Ok(iter.map(|(_, row)| row).collect())
	}

	/// All delivery rows for the recipient matching the delivered flag,
	/// in insertion order.
	pub fn deliveries(
		&self,
		recipient_dest: &str,
		delivered: bool,
	) -> Result<Vec<DeliveryRow>, store::Error> {
		let iter = self.db.iter::<DeliveryRow>(&[DELIVERY_PREFIX, store::SEP])?;
		Ok(iter
			.map(|(_, row)| row)
			.filter(|row| row.recipient_dest == recipient_dest && row.delivered == delivered)
			.collect())
	}

	/// Builds a batch for atomic mutation of the ledger.
	pub fn batch(&self) -> Result<EngineBatch<'_>, store::Error> {
		Ok(EngineBatch {
			db: self.db.batch()?,
		})
	}
}

/// An atomic unit of ledger mutation. Reads go through the underlying
/// write transaction, so verify-then-update sequences are serialized
/// against every other writer.
pub struct EngineBatch<'a> {
	db: store::Batch<'a>,
}

impl<'a> EngineBatch<'a> {
	/// Reads a ledger row, seeing the batch's own writes.
	pub fn get_coin(&self, coin_id: &str) -> Result<Option<CoinRow>, store::Error> {
		self.db.get_ser(&to_key(COIN_PREFIX, coin_id.as_bytes()))
	}

	/// Whether a ledger row exists for the coin id.
	pub fn coin_exists(&self, coin_id: &str) -> Result<bool, store::Error> {
		self.db.exists(&to_key(COIN_PREFIX, coin_id.as_bytes()))
	}

	/// Inserts or updates a ledger row.
	pub fn save_coin(&self, row: &CoinRow) -> Result<(), store::Error> {
		self.db
			.put_ser(&to_key(COIN_PREFIX, row.coin.coin_id.as_bytes()), row)
	}

	/// Adds the issuer key to the trusted set (idempotent).
	pub fn register_issuer(&self, pk: &PublicKey) -> Result<(), store::Error> {
		self.db
			.put_ser(&to_key(ISSUER_PREFIX, pk.to_hex().as_bytes()), pk)
	}

	/// Appends a delivery row at the tail of the queue.
	pub fn enqueue_delivery(
		&self,
		recipient_dest: &str,
		delivery: Delivery,
	) -> Result<(), store::Error> {
		let head_key = to_key(DELIVERY_HEAD_PREFIX, b"head");
		let next_id: u64 = self.db.get_ser(&head_key)?.unwrap_or(0);
		let row = DeliveryRow {
			recipient_dest: recipient_dest.to_string(),
			delivery,
			delivered: false,
		};
		self.db.put_ser(&u64_to_key(DELIVERY_PREFIX, next_id), &row)?;
		self.db.put_ser(&head_key, &(next_id + 1))
	}

	/// Undelivered rows for the recipient, in insertion order, with their
	/// storage keys so they can be flipped in this same batch.
	pub fn pending_deliveries(
		&self,
		recipient_dest: &str,
	) -> Result<Vec<(Vec<u8>, DeliveryRow)>, store::Error> {
		let iter = self.db.iter::<DeliveryRow>(&[DELIVERY_PREFIX, store::SEP])?;
		Ok(iter
			.filter(|(_, row)| {
				row.recipient_dest == recipient_dest && !row.delivered
			})
			.collect())
	}

	/// Writes back a delivery row under its storage key.
	pub fn save_delivery(&self, key: &[u8], row: &DeliveryRow) -> Result<(), store::Error> {
		self.db.put_ser(key, row)
	}

	/// Commits the batch.
	pub fn commit(self) -> Result<(), store::Error> {
		self.db.commit()
	}
}
