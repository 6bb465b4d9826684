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

//! The wallet actor: receives deliveries, drives payments and bridges
//! payment requests to transfers. A coin's engine is resolved through the
//! configured endpoint map only; there is no fallback to whatever engine
//! happens to be announced.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use chrono::Local;
use log::{debug, info, warn};

use pkicash_core::{Delivery, IncomingRequest, RequestStatus};
use pkicash_keychain::PublicKey;
use pkicash_transport::{Envelope, Role, TransportRef};
use pkicash_util::Mutex;
use pkicash_wallet::{
	OutgoingCoinRequest, OutgoingPaymentRequest, ReceivedResponse, TxLogEntry, Wallet,
};

use crate::error::Error;
use crate::types::{msg, EventBus, PaymentRequestPayload, PaymentResponsePayload};

/// The wallet actor.
pub struct WalletServer {
	wallet: Mutex<Wallet>,
	transport: TransportRef,
	engine_map: HashMap<String, String>,
	name: String,
	bus: EventBus,
}

impl WalletServer {
	/// Opens the wallet under `data_dir`, wires the dispatch thread and
	/// announces the wallet. `engine_map` is the configured mapping from
	/// coin engine endpoints to transport destinations.
	pub fn start(
		transport: TransportRef,
		data_dir: &str,
		name: &str,
		engine_map: HashMap<String, String>,
	) -> Result<Arc<WalletServer>, Error> {
		let dest = transport.dest_hash();
		let wallet = Wallet::open(data_dir, &dest)?;

		let server = Arc::new(WalletServer {
			wallet: Mutex::new(wallet),
			transport,
			engine_map,
			name: name.to_string(),
			bus: EventBus::new(),
		});

		let (tx, rx) = mpsc::channel::<Envelope>();
		server.transport.on_message(Box::new(move |envelope| {
			let _ = tx.send(envelope);
		}));
		let dispatch = server.clone();
		thread::Builder::new()
			.name("wallet-dispatch".to_string())
			.spawn(move || {
				for envelope in rx {
					dispatch.handle_message(envelope);
				}
			})
			.map_err(|e| Error::IO(format!("{}", e)))?;

		server.transport.announce(&server.name, "");
		info!("wallet {} up at {}", name, server.transport.dest_hash());
		Ok(server)
	}

	/// Subscription to this actor's event stream.
	pub fn events(&self) -> mpsc::Receiver<crate::types::Event> {
		self.bus.subscribe()
	}

	/// This wallet's transport destination.
	pub fn dest_hash(&self) -> String {
		self.transport.dest_hash()
	}

	/// Total face value of owned coins.
	pub fn balance(&self) -> u64 {
		self.wallet.lock().get_balance()
	}

	/// Owned coins as (coin id, value) pairs.
	pub fn coins(&self) -> Vec<(String, u64)> {
		self.wallet.lock().list_coins()
	}

	/// The transaction log, newest first.
	pub fn transaction_log(&self) -> Vec<TxLogEntry> {
		self.wallet.lock().transaction_log()
	}

	/// The administrative requests ledger.
	pub fn incoming_requests(&self) -> Vec<IncomingRequest> {
		self.wallet.lock().incoming_requests().to_vec()
	}

	/// Receive keys peers handed us in response to payment requests.
	pub fn received_responses(&self) -> Vec<ReceivedResponse> {
		self.wallet.lock().received_responses().to_vec()
	}

	/// Coin requests this wallet has sent to banks.
	pub fn outgoing_coin_requests(&self) -> Vec<OutgoingCoinRequest> {
		self.wallet.lock().outgoing_coin_requests().to_vec()
	}

	/// Payment requests this wallet has sent to peers.
	pub fn outgoing_payment_requests(&self) -> Vec<OutgoingPaymentRequest> {
		self.wallet.lock().outgoing_payment_requests().to_vec()
	}

	/// Asks a bank for `amount` fresh coins, supplying one receive key per
	/// coin (operator action).
	pub fn request_coins(
		&self,
		bank_dest: &str,
		amount: u32,
		description: Option<String>,
	) -> Result<(), Error> {
		if amount == 0 {
			return Err(Error::ArgumentError("amount must be positive".to_string()));
		}
		let mut wallet = self.wallet.lock();
		let mut public_keys = Vec::with_capacity(amount as usize);
		for _ in 0..amount {
			public_keys.push(wallet.generate_receive_keypair()?);
		}

		self.transport.send(
			bank_dest,
			Role::Bank,
			msg::COIN_REQUEST,
			serde_json::json!({
				"amount": amount,
				"wallet_dest": self.transport.dest_hash(),
				"public_keys": public_keys,
				"description": description,
			}),
		)?;
		wallet.add_outgoing_coin_request(bank_dest, public_keys, description)?;
		Ok(())
	}

	/// Asks another wallet to pay us `amount` coins (operator action).
	pub fn request_payment(
		&self,
		peer_dest: &str,
		amount: u32,
		description: Option<String>,
	) -> Result<(), Error> {
		if amount == 0 {
			return Err(Error::ArgumentError("amount must be positive".to_string()));
		}
		let mut wallet = self.wallet.lock();
		let mut public_keys = Vec::with_capacity(amount as usize);
		for _ in 0..amount {
			public_keys.push(wallet.generate_receive_keypair()?);
		}

		self.transport.send(
			peer_dest,
			Role::Wallet,
			msg::PAYMENT_REQUEST,
			serde_json::json!({
				"address": self.transport.dest_hash(),
				"pk": public_keys[0],
				"public_keys": public_keys,
				"amount": amount,
				"description": description,
			}),
		)?;
		wallet.add_outgoing_payment_request(peer_dest, public_keys, description)?;
		Ok(())
	}

	/// Pays one coin to a peer: signs the transfer, hands it to the coin's
	/// engine and, once the send went through, commits the spend locally
	/// (operator action).
	pub fn pay(
		&self,
		coin_id: &str,
		pk_next: &PublicKey,
		recipient_dest: &str,
		description: Option<String>,
	) -> Result<(), Error> {
		let mut wallet = self.wallet.lock();
		self.pay_locked(&mut wallet, coin_id, pk_next, recipient_dest, description)?;
		wallet.mark_paid_requests_from(recipient_dest)?;
		Ok(())
	}

	/// Approves an incoming payment request, paying one coin per supplied
	/// receive key up to `approve_amount` and the number of owned coins.
	/// Returns how many coins went out.
	pub fn approve_payment(
		&self,
		idx: usize,
		approve_amount: Option<u32>,
		description: Option<String>,
	) -> Result<u32, Error> {
		let mut wallet = self.wallet.lock();
		let request = {
			let request = wallet
				.incoming_requests()
				.get(idx)
				.ok_or(Error::RequestNotFound(idx))?;
			if !request.status.is_pending() {
				return Err(Error::RequestAlreadySettled);
			}
			request.clone()
		};

		let payload: PaymentRequestPayload =
			serde_json::from_value(request.payload.clone())
				.map_err(|e| Error::ArgumentError(format!("{}", e)))?;
		let mut public_keys = payload.public_keys;
		if public_keys.is_empty() && !payload.pk.is_empty() {
			public_keys.push(payload.pk);
		}
		if public_keys.is_empty() {
			return Err(Error::ArgumentError(
				"no public keys in payment request".to_string(),
			));
		}

		let recipient_dest = request.from_hash.clone();
		let requested = public_keys.len() as u32;
		let granted = approve_amount.unwrap_or(requested).max(1).min(requested);
		let description = description.or(payload.description);

		let coin_ids: Vec<String> = wallet
			.list_coins()
			.into_iter()
			.map(|(id, _)| id)
			.take(granted as usize)
			.collect();

		let mut sent = 0;
		for (coin_id, pk_hex) in coin_ids.iter().zip(public_keys.iter()) {
			let pk_next = PublicKey::from_hex(pk_hex)?;
			match self.pay_locked(
				&mut wallet,
				coin_id,
				&pk_next,
				&recipient_dest,
				description.clone(),
			) {
				Ok(_) => sent += 1,
				Err(e) => warn!("could not pay with coin {}: {}", coin_id, e),
			}
		}

		wallet.settle_incoming(idx, RequestStatus::Paid)?;
		info!("approved payment request: sent {} coin(s)", sent);
		Ok(sent)
	}

	/// Accepts an incoming payment request by handing the requester a
	/// fresh receive key (operator action).
	pub fn accept_request(&self, idx: usize) -> Result<String, Error> {
		let mut wallet = self.wallet.lock();
		let request = {
			let request = wallet
				.incoming_requests()
				.get(idx)
				.ok_or(Error::RequestNotFound(idx))?;
			if !request.status.is_pending() {
				return Err(Error::RequestAlreadySettled);
			}
			request.clone()
		};

		let pk_hex = wallet.generate_receive_keypair()?;
		self.transport.send(
			&request.from_hash,
			Role::Wallet,
			msg::PAYMENT_RESPONSE,
			serde_json::to_value(&PaymentResponsePayload {
				pk: pk_hex.clone(),
				address: self.transport.dest_hash(),
				original_request: request.payload.clone(),
			})
			.map_err(|e| Error::ArgumentError(format!("{}", e)))?,
		)?;
		wallet.mark_accepted(idx, &pk_hex)?;
		Ok(pk_hex)
	}

	/// Declines an incoming payment request and tells the requester.
	pub fn decline_request(&self, idx: usize, reason: &str) -> Result<(), Error> {
		let mut wallet = self.wallet.lock();
		let request = wallet.settle_incoming(idx, RequestStatus::Declined)?;
		if let Err(e) = self.transport.send(
			&request.from_hash,
			Role::Wallet,
			msg::PAYMENT_DECLINED,
			serde_json::json!({
				"address": self.transport.dest_hash(),
				"reason": reason,
			}),
		) {
			warn!("could not notify {}: {}", request.from_hash, e);
		}
		Ok(())
	}

	/// The transfer path shared by `pay` and `approve_payment`. The caller
	/// holds the wallet lock; the coin is only removed after the engine
	/// send went through.
	fn pay_locked(
		&self,
		wallet: &mut Wallet,
		coin_id: &str,
		pk_next: &PublicKey,
		recipient_dest: &str,
		description: Option<String>,
	) -> Result<(), Error> {
		let engine_dest = {
			let coin = wallet
				.get_coin(coin_id)
				.ok_or_else(|| Error::Wallet(
					pkicash_wallet::ErrorKind::CoinNotFound(coin_id.to_string()).into(),
				))?;
			self.resolve_engine(&coin.state_engine_endpoint)?
		};

		let tx =
			wallet.create_transaction(coin_id, pk_next, recipient_dest, description.clone())?;
		self.transport.send(
			&engine_dest,
			Role::Engine,
			msg::TRANSACTION,
			serde_json::to_value(&tx).map_err(|e| Error::ArgumentError(format!("{}", e)))?,
		)?;
		wallet.confirm_send(coin_id, recipient_dest, description)?;
		Ok(())
	}

	/// Maps a coin's engine endpoint to a transport destination through
	/// configuration. An unmapped endpoint is an error surfaced to the
	/// operator, never silently re-bound.
	fn resolve_engine(&self, endpoint: &str) -> Result<String, Error> {
		self.engine_map
			.get(endpoint)
			.cloned()
			.ok_or_else(|| Error::UnmappedEngine(endpoint.to_string()))
	}

	fn handle_message(&self, envelope: Envelope) {
		debug!(
			"wallet got {} from {} ({})",
			envelope.msg_type, envelope.from_hash, envelope.from_role
		);
		match envelope.msg_type.as_str() {
			msg::COIN_DELIVERY | msg::COIN_TRANSFER => self.on_delivery(envelope),
			msg::TX_CONFIRMED => {
				self.bus.publish(
					"tx_confirmed",
					serde_json::json!({
						"coin_id": envelope.payload["coin_id"],
						"status": envelope.payload["status"],
					}),
				);
			}
			msg::PAYMENT_REQUEST => self.on_payment_request(envelope),
			msg::PAYMENT_RESPONSE => self.on_payment_response(envelope),
			msg::COIN_REQUEST_DECLINED => {
				let mut wallet = self.wallet.lock();
				if let Err(e) =
					wallet.decline_outgoing_coin_request_from(&envelope.from_hash)
				{
					warn!("could not record declined coin request: {}", e);
				}
				self.bus.publish(
					"coin_request_declined",
					serde_json::json!({ "reason": envelope.payload["reason"] }),
				);
			}
			msg::PAYMENT_DECLINED => {
				let mut wallet = self.wallet.lock();
				if let Err(e) =
					wallet.decline_outgoing_payment_request_from(&envelope.from_hash)
				{
					warn!("could not record declined payment request: {}", e);
				}
				self.bus.publish(
					"payment_declined",
					serde_json::json!({ "from_hash": envelope.from_hash }),
				);
			}
			other => debug!("wallet ignoring message type {}", other),
		}
	}

	/// Installs a delivered coin. A delivery that fails verification or
	/// matches no pending key is dropped with no state change.
	fn on_delivery(&self, envelope: Envelope) {
		let delivery: Delivery = match serde_json::from_value(envelope.payload) {
			Ok(delivery) => delivery,
			Err(e) => {
				debug!("malformed delivery payload: {}", e);
				return;
			}
		};

		let mut wallet = self.wallet.lock();
		match wallet.receive_from_engine(&delivery) {
			Ok(_) => {
				self.bus.publish(
					"coin_received",
					serde_json::json!({
						"coin_id": delivery.coin.coin_id,
						"waarde": delivery.coin.value,
						"status": delivery.confirmation.status,
					}),
				);
			}
			Err(e) => {
				warn!(
					"dropping delivery of coin {}: {}",
					delivery.coin.coin_id, e
				);
			}
		}
	}

	fn on_payment_request(&self, envelope: Envelope) {
		{
			let mut wallet = self.wallet.lock();
			let res = wallet.add_incoming_request(IncomingRequest {
				request_type: msg::PAYMENT_REQUEST.to_string(),
				from_hash: envelope.from_hash.clone(),
				from_role: envelope.from_role.to_string(),
				payload: envelope.payload.clone(),
				ts: now(),
				status: RequestStatus::Pending,
				generated_pk: None,
			});
			if let Err(e) = res {
				warn!("could not record payment request: {}", e);
				return;
			}
		}
		self.bus.publish(
			"payment_request",
			serde_json::json!({
				"from_hash": envelope.from_hash,
				"address": envelope.payload["address"],
				"pk": envelope.payload["pk"],
			}),
		);
	}

	fn on_payment_response(&self, envelope: Envelope) {
		let pk = envelope.payload["pk"].as_str().unwrap_or("").to_string();
		let address = envelope.payload["address"].as_str().unwrap_or("").to_string();
		{
			let mut wallet = self.wallet.lock();
			let res = wallet.add_received_response(ReceivedResponse {
				from_hash: envelope.from_hash.clone(),
				pk: pk.clone(),
				address: address.clone(),
				ts: now(),
			});
			if let Err(e) = res {
				warn!("could not record payment response: {}", e);
				return;
			}
		}
		self.bus.publish(
			"payment_response",
			serde_json::json!({
				"from_hash": envelope.from_hash,
				"pk": pk,
				"address": address,
			}),
		);
	}
}

fn now() -> String {
	Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
