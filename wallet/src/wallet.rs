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

//! Wallet state and the operations that drive it. The spend path follows
//! sign-then-engine-ack-then-delete: `create_transaction` leaves the coin
//! in place and only `confirm_send`, called once the engine accepted the
//! transfer, removes it. A failed transfer therefore leaves the coin
//! spendable.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, MAIN_SEPARATOR};
use std::thread;
use std::time::Duration;

use chrono::Local;
use failure::ResultExt;
use log::{debug, info, warn};

use pkicash_core::{
	Coin, Confirmation, Delivery, IncomingRequest, RequestStatus, Status, TransferRequest,
};
use pkicash_keychain::{generate_keypair, PublicKey};

use crate::error::{Error, ErrorKind};
use crate::types::*;

const DAT_FILE: &str = "wallet.json";
const BCK_FILE: &str = "wallet.bck";
const LOCK_FILE: &str = "wallet.lock";

/// Upper bound on speculatively generated receive keypairs. Past it the
/// oldest key is evicted; a delivery against an evicted key is rejected
/// rather than silently lost.
pub const MAX_PENDING_KEYPAIRS: usize = 512;

const LOCK_RETRIES: u32 = 10;

/// A single wallet, backed by one JSON document on disk. Every mutating
/// operation persists before returning; concurrent access from transport
/// callbacks must be serialized by the caller.
pub struct Wallet {
	data: WalletData,
	data_file_path: String,
	backup_file_path: String,
	lock_file_path: String,
}

impl Wallet {
	/// Opens the wallet under the given directory, creating an empty one
	/// if no data file exists yet. The address is recorded on first open.
	pub fn open(data_dir: &str, address: &str) -> Result<Wallet, Error> {
		fs::create_dir_all(data_dir).context(ErrorKind::IO)?;

		let data_file_path = format!("{}{}{}", data_dir, MAIN_SEPARATOR, DAT_FILE);
		let backup_file_path = format!("{}{}{}", data_dir, MAIN_SEPARATOR, BCK_FILE);
		let lock_file_path = format!("{}{}{}", data_dir, MAIN_SEPARATOR, LOCK_FILE);

		let existing = Path::new(&data_file_path).exists();
		let mut data = if existing {
			let file = File::open(&data_file_path)
				.context(ErrorKind::WalletFile("Could not open wallet file"))?;
			serde_json::from_reader(file)
				.context(ErrorKind::WalletFile("Error reading wallet file"))?
		} else {
			WalletData::default()
		};
		if data.address.is_empty() {
			data.address = address.to_string();
		}

		let wallet = Wallet {
			data,
			data_file_path,
			backup_file_path,
			lock_file_path,
		};
		if !existing {
			wallet.save()?;
		}
		Ok(wallet)
	}

	/// This wallet's transport destination.
	pub fn address(&self) -> &str {
		&self.data.address
	}

	/// Records the transport destination this wallet is reachable at.
	pub fn set_address(&mut self, address: &str) -> Result<(), Error> {
		self.data.address = address.to_string();
		self.save()
	}

	// ── receive-key lifecycle ───────────────────────────────

	/// Generates a fresh receive keypair and returns its public key as
	/// hex. The secret half stays in the pending set until the matching
	/// delivery arrives.
	pub fn generate_receive_keypair(&mut self) -> Result<String, Error> {
		let (sk, pk) = generate_keypair();
		let pk_hex = pk.to_hex();
		self.data.pending_keypairs.push(PendingKeypair {
			pk,
			sk,
			created: now(),
		});
		if self.data.pending_keypairs.len() > MAX_PENDING_KEYPAIRS {
			let evicted = self.data.pending_keypairs.remove(0);
			warn!(
				"pending keypair store full, evicted oldest receive key {}",
				evicted.pk
			);
		}
		self.save()?;
		Ok(pk_hex)
	}

	/// Whether a pending receive key exists for the given public key.
	pub fn has_pending_key(&self, pk: &PublicKey) -> bool {
		self.data.pending_keypairs.iter().any(|p| p.pk == *pk)
	}

	/// Installs a coin delivered by the engine. The engine signature on
	/// the confirmation is verified first; then the pending receive key
	/// matching the coin's owner key is consumed. A delivery addressed to
	/// a key this wallet never issued is rejected without state change.
	pub fn receive_from_engine(&mut self, delivery: &Delivery) -> Result<(), Error> {
		let coin = &delivery.coin;
		let confirmation = &delivery.confirmation;

		let payload =
			Confirmation::payload(&coin.coin_id, &coin.pk_current, confirmation.status);
		if !confirmation
			.pk_engine
			.verify(&payload, &confirmation.engine_signature)
		{
			return Err(ErrorKind::InvalidConfirmation.into());
		}
		if confirmation.pk_engine != coin.pk_engine {
			return Err(ErrorKind::WrongEngine.into());
		}

		let pos = self
			.data
			.pending_keypairs
			.iter()
			.position(|p| p.pk == coin.pk_current)
			.ok_or_else(|| ErrorKind::MissingPendingKey(coin.pk_current.to_hex()))?;
		let pending = self.data.pending_keypairs.remove(pos);

		self.data.coins.insert(
			coin.coin_id.clone(),
			OwnedCoin {
				coin: coin.clone(),
				sk_current: pending.sk,
			},
		);

		let action = match confirmation.status {
			Status::Issued => LOG_ACTION_RECEIVED_ISSUED,
			Status::Confirmed => LOG_ACTION_RECEIVED_PAYMENT,
		};
		self.log(
			action,
			&coin.coin_id,
			Some(coin.value),
			delivery.sender_dest.clone(),
			delivery.description.clone(),
		);

		self.advance_requests(&coin.pk_current.to_hex());

		info!(
			"installed coin {} (value {}) via {}",
			coin.coin_id, coin.value, action
		);
		self.save()
	}

	// ── spending ────────────────────────────────────────────

	/// Signs a transfer of an owned coin to the given next owner. The
	/// coin is not removed; see `confirm_send`.
	pub fn create_transaction(
		&self,
		coin_id: &str,
		pk_next: &PublicKey,
		recipient_dest: &str,
		description: Option<String>,
	) -> Result<TransferRequest, Error> {
		let entry = self
			.data
			.coins
			.get(coin_id)
			.ok_or_else(|| ErrorKind::CoinNotFound(coin_id.to_string()))?;

		let payload = TransferRequest::payload(coin_id, pk_next);
		let signature = entry.sk_current.sign(&payload);

		Ok(TransferRequest {
			coin_id: coin_id.to_string(),
			pk_next: *pk_next,
			recipient_dest: recipient_dest.to_string(),
			signature,
			description,
		})
	}

	/// Removes a spent coin after the engine accepted the transfer and
	/// appends the spend to the log. Never call this before the engine
	/// acknowledged; the wallet must not hold both the secret key and a
	/// committed spend of the same coin.
	pub fn confirm_send(
		&mut self,
		coin_id: &str,
		recipient_dest: &str,
		description: Option<String>,
	) -> Result<(), Error> {
		let entry = self
			.data
			.coins
			.remove(coin_id)
			.ok_or_else(|| ErrorKind::CoinNotFound(coin_id.to_string()))?;

		self.log(
			LOG_ACTION_SENT,
			coin_id,
			Some(entry.coin.value),
			Some(recipient_dest.to_string()),
			description,
		);
		debug!("confirmed send of coin {} to {}", coin_id, recipient_dest);
		self.save()
	}

	// ── views ───────────────────────────────────────────────

	/// Total face value of all owned coins.
	pub fn get_balance(&self) -> u64 {
		self.data.coins.values().map(|e| e.coin.value).sum()
	}

	/// Owned coins, as (coin id, value) pairs.
	pub fn list_coins(&self) -> Vec<(String, u64)> {
		self.data
			.coins
			.iter()
			.map(|(id, e)| (id.clone(), e.coin.value))
			.collect()
	}

	/// A single owned coin record, if held.
	pub fn get_coin(&self, coin_id: &str) -> Option<&Coin> {
		self.data.coins.get(coin_id).map(|e| &e.coin)
	}

	/// The transaction log, newest entry first.
	pub fn transaction_log(&self) -> Vec<TxLogEntry> {
		let mut log = self.data.transaction_log.clone();
		log.reverse();
		log
	}

	/// Wallet-side coin acceptance check against a trusted-issuer list.
	pub fn validate_coin(coin: &Coin, trusted_issuers: &[PublicKey]) -> bool {
		coin.validate(trusted_issuers)
	}

	// ── request ledgers ─────────────────────────────────────

	/// Records a coin request sent to a bank.
	pub fn add_outgoing_coin_request(
		&mut self,
		bank_dest: &str,
		public_keys: Vec<String>,
		description: Option<String>,
	) -> Result<(), Error> {
		self.data.outgoing_coin_requests.push(OutgoingCoinRequest {
			bank_dest: bank_dest.to_string(),
			amount: public_keys.len() as u32,
			public_keys,
			received: 0,
			status: RequestStatus::Pending,
			ts: now(),
			description,
		});
		self.save()
	}

	/// Records a payment request sent to another wallet.
	pub fn add_outgoing_payment_request(
		&mut self,
		dest: &str,
		public_keys: Vec<String>,
		description: Option<String>,
	) -> Result<(), Error> {
		self.data
			.outgoing_payment_requests
			.push(OutgoingPaymentRequest {
				dest: dest.to_string(),
				amount: public_keys.len() as u32,
				public_keys,
				received: 0,
				status: RequestStatus::Pending,
				ts: now(),
				description,
			});
		self.save()
	}

	/// Parks an administrative message for operator action.
	pub fn add_incoming_request(&mut self, request: IncomingRequest) -> Result<(), Error> {
		self.data.incoming_requests.push(request);
		self.save()
	}

	/// The incoming-requests ledger.
	pub fn incoming_requests(&self) -> &[IncomingRequest] {
		&self.data.incoming_requests
	}

	/// Coin requests this wallet has sent out.
	pub fn outgoing_coin_requests(&self) -> &[OutgoingCoinRequest] {
		&self.data.outgoing_coin_requests
	}

	/// Payment requests this wallet has sent out.
	pub fn outgoing_payment_requests(&self) -> &[OutgoingPaymentRequest] {
		&self.data.outgoing_payment_requests
	}

	/// Moves an incoming request out of pending. Transitions are
	/// monotonic; acting on a settled request is an error.
	pub fn settle_incoming(
		&mut self,
		idx: usize,
		status: RequestStatus,
	) -> Result<IncomingRequest, Error> {
		let len = self.data.incoming_requests.len();
		let request = self
			.data
			.incoming_requests
			.get_mut(idx)
			.ok_or(ErrorKind::RequestNotFound(idx))?;
		if !request.settle(status) {
			return Err(ErrorKind::RequestAlreadySettled.into());
		}
		let settled = request.clone();
		debug!(
			"settled incoming request {}/{} as {:?}",
			idx + 1,
			len,
			settled.status
		);
		self.save()?;
		Ok(settled)
	}

	/// Accepts an incoming payment request by generating a fresh receive
	/// key for the payer. Returns the public key to send back.
	pub fn accept_incoming(&mut self, idx: usize) -> Result<String, Error> {
		{
			let request = self
				.data
				.incoming_requests
				.get(idx)
				.ok_or(ErrorKind::RequestNotFound(idx))?;
			if !request.status.is_pending() {
				return Err(ErrorKind::RequestAlreadySettled.into());
			}
		}
		let pk_hex = self.generate_receive_keypair()?;
		self.mark_accepted(idx, &pk_hex)?;
		Ok(pk_hex)
	}

	/// Settles an incoming request as accepted and records the receive key
	/// that was handed out for it.
	pub fn mark_accepted(&mut self, idx: usize, pk_hex: &str) -> Result<(), Error> {
		let request = self
			.data
			.incoming_requests
			.get_mut(idx)
			.ok_or(ErrorKind::RequestNotFound(idx))?;
		if !request.settle(RequestStatus::Accepted) {
			return Err(ErrorKind::RequestAlreadySettled.into());
		}
		request.generated_pk = Some(pk_hex.to_string());
		self.save()
	}

	/// Records a receive key a peer handed us in reply to a payment
	/// request of ours.
	pub fn add_received_response(&mut self, response: ReceivedResponse) -> Result<(), Error> {
		self.data.received_responses.push(response);
		self.save()
	}

	/// Receive keys peers handed us, oldest first.
	pub fn received_responses(&self) -> &[ReceivedResponse] {
		&self.data.received_responses
	}

	/// Marks pending incoming requests from the given peer as paid. Used
	/// when the operator pays a peer directly rather than through the
	/// approval flow.
	pub fn mark_paid_requests_from(&mut self, from_hash: &str) -> Result<(), Error> {
		let mut changed = false;
		for request in &mut self.data.incoming_requests {
			if request.status.is_pending() && request.from_hash == from_hash {
				request.settle(RequestStatus::Paid);
				changed = true;
			}
		}
		if changed {
			self.save()?;
		}
		Ok(())
	}

	/// Marks the oldest pending coin request to the given bank declined.
	pub fn decline_outgoing_coin_request_from(&mut self, bank_dest: &str) -> Result<(), Error> {
		for request in &mut self.data.outgoing_coin_requests {
			if request.status.is_pending() && request.bank_dest == bank_dest {
				request.status = RequestStatus::Declined;
				self.save()?;
				return Ok(());
			}
		}
		Ok(())
	}

	/// Marks the oldest pending payment request to the given wallet
	/// declined.
	pub fn decline_outgoing_payment_request_from(&mut self, dest: &str) -> Result<(), Error> {
		for request in &mut self.data.outgoing_payment_requests {
			if request.status.is_pending() && request.dest == dest {
				request.status = RequestStatus::Declined;
				self.save()?;
				return Ok(());
			}
		}
		Ok(())
	}

	// ── internals ───────────────────────────────────────────

	/// Matches a delivered coin's owner key against outstanding requests
	/// and advances their state (`pending` → `partial` → fulfilled).
	fn advance_requests(&mut self, pk_hex: &str) {
		for request in &mut self.data.outgoing_coin_requests {
			if !request.status.is_open() {
				continue;
			}
			if let Some(pos) = request.public_keys.iter().position(|pk| pk == pk_hex) {
				request.public_keys.remove(pos);
				request.received += 1;
				request.status = if request.public_keys.is_empty() {
					RequestStatus::Approved
				} else {
					RequestStatus::Partial
				};
				return;
			}
		}
		for request in &mut self.data.outgoing_payment_requests {
			if !request.status.is_open() {
				continue;
			}
			if let Some(pos) = request.public_keys.iter().position(|pk| pk == pk_hex) {
				request.public_keys.remove(pos);
				request.received += 1;
				request.status = if request.public_keys.is_empty() {
					RequestStatus::Paid
				} else {
					RequestStatus::Partial
				};
				return;
			}
		}
	}

	fn log(
		&mut self,
		action: &str,
		coin_id: &str,
		value: Option<u64>,
		counterparty: Option<String>,
		description: Option<String>,
	) {
		self.data.transaction_log.push(TxLogEntry {
			timestamp: now(),
			action: action.to_string(),
			coin_id: coin_id.to_string(),
			value,
			counterparty,
			description,
		});
	}

	/// Write the wallet data to disk, under the lock file, keeping a
	/// backup of the previous version.
	fn save(&self) -> Result<(), Error> {
		self.acquire_lock()?;
		let res = self.write_files();
		self.release_lock();
		res
	}

	fn write_files(&self) -> Result<(), Error> {
		if Path::new(&self.data_file_path).exists() {
			fs::copy(&self.data_file_path, &self.backup_file_path)
				.context(ErrorKind::WalletFile("Could not back up wallet file"))?;
		}
		let mut data_file = File::create(&self.data_file_path)
			.context(ErrorKind::WalletFile("Could not create wallet file"))?;
		let res_json =
			serde_json::to_vec_pretty(&self.data).context(ErrorKind::Format)?;
		data_file
			.write_all(res_json.as_slice())
			.context(ErrorKind::WalletFile("Error writing wallet file"))?;
		Ok(())
	}

	/// There is no portable file lock, so a "should not exist" lock
	/// directory stands in for one; contention backs off with growing
	/// sleeps before giving up.
	fn acquire_lock(&self) -> Result<(), Error> {
		for attempt in 0..LOCK_RETRIES {
			match fs::create_dir(&self.lock_file_path) {
				Ok(_) => return Ok(()),
				Err(_) => {
					thread::sleep(Duration::from_millis(100 * u64::from(attempt + 1)));
				}
			}
		}
		warn!("failed to acquire wallet lock at {}", self.lock_file_path);
		Err(ErrorKind::WalletFile("Failed to acquire wallet lock file").into())
	}

	fn release_lock(&self) {
		let _ = fs::remove_dir(&self.lock_file_path);
	}
}

fn now() -> String {
	Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
