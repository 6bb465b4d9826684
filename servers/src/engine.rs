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

//! The engine actor: wraps the ledger, dispatches inbound protocol
//! messages and pushes queued deliveries out to recipients.

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use chrono::Local;
use log::{debug, info, warn};

use pkicash_core::{IncomingRequest, RequestStatus};
use pkicash_engine::StateEngine;
use pkicash_keychain::PublicKey;
use pkicash_transport::{Envelope, Role, TransportRef};
use pkicash_util::Mutex;

use crate::error::Error;
use crate::types::{msg, EventBus, RegisterCoinPayload};

const DATA_FILE: &str = "engine_data.json";
const KEY_FILE: &str = "engine.key";

/// Engine-side actor state that lives outside the ledger proper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineData {
	/// Display names for registered issuers
	#[serde(default)]
	pub issuer_names: HashMap<String, String>,
	/// Administrative requests awaiting operator action
	#[serde(default)]
	pub incoming_requests: Vec<IncomingRequest>,
	/// Endpoint identifier stamped into coins this engine governs
	#[serde(default)]
	pub endpoint: String,
}

/// The engine actor.
pub struct EngineServer {
	engine: StateEngine,
	transport: TransportRef,
	state: Mutex<EngineData>,
	data_dir: String,
	name: String,
	bus: EventBus,
}

impl EngineServer {
	/// Opens the ledger under `data_dir`, wires the dispatch thread to the
	/// transport and announces the engine.
	pub fn start(
		transport: TransportRef,
		data_dir: &str,
		name: &str,
		endpoint: &str,
	) -> Result<Arc<EngineServer>, Error> {
		std::fs::create_dir_all(data_dir).map_err(|e| Error::IO(format!("{}", e)))?;
		let key_path = Path::new(data_dir).join(KEY_FILE);
		let engine = StateEngine::open(data_dir, &key_path)?;

		let mut data = load_data(data_dir);
		data.endpoint = endpoint.to_string();

		let server = Arc::new(EngineServer {
			engine,
			transport,
			state: Mutex::new(data),
			data_dir: data_dir.to_string(),
			name: name.to_string(),
			bus: EventBus::new(),
		});

		let (tx, rx) = mpsc::channel::<Envelope>();
		server.transport.on_message(Box::new(move |envelope| {
			let _ = tx.send(envelope);
		}));
		let dispatch = server.clone();
		thread::Builder::new()
			.name("engine-dispatch".to_string())
			.spawn(move || {
				for envelope in rx {
					dispatch.handle_message(envelope);
				}
			})
			.map_err(|e| Error::IO(format!("{}", e)))?;

		server.announce();
		info!(
			"engine {} up at {} (endpoint {})",
			name,
			server.transport.dest_hash(),
			endpoint
		);
		Ok(server)
	}

	/// Broadcasts the engine's presence and transaction key.
	pub fn announce(&self) {
		self.transport
			.announce(&self.name, &self.engine.public_key().to_hex());
	}

	/// The wrapped ledger, for read-only inspection.
	pub fn engine(&self) -> &StateEngine {
		&self.engine
	}

	/// Subscription to this actor's event stream.
	pub fn events(&self) -> mpsc::Receiver<crate::types::Event> {
		self.bus.subscribe()
	}

	/// The administrative requests ledger.
	pub fn incoming_requests(&self) -> Vec<IncomingRequest> {
		self.state.lock().incoming_requests.clone()
	}

	/// Registers an issuer directly (operator action) and notifies the
	/// bank when its address is known.
	pub fn register_issuer(
		&self,
		pk: &PublicKey,
		issuer_name: Option<&str>,
		address: Option<&str>,
	) -> Result<(), Error> {
		self.engine.register_issuer(pk)?;
		{
			let mut state = self.state.lock();
			if let Some(name) = issuer_name {
				state.issuer_names.insert(pk.to_hex(), name.to_string());
			}
			save_data(&self.data_dir, &state);
		}
		self.bus
			.publish("issuer_registered", serde_json::json!({ "pk": pk.to_hex() }));

		if let Some(address) = address {
			let confirmed = self.issuer_confirmed_payload();
			if let Err(e) = self
				.transport
				.send(address, Role::Bank, msg::ISSUER_CONFIRMED, confirmed)
			{
				warn!("could not notify bank at {}: {}", address, e);
			}
		}
		Ok(())
	}

	/// Approves a pending administrative request.
	pub fn approve_request(&self, idx: usize) -> Result<(), Error> {
		let request = self.peek_pending(idx)?;

		match request.request_type.as_str() {
			msg::REGISTER_ISSUER => {
				let pk_hex = request.payload["pk_issuer"].as_str().unwrap_or("").to_string();
				let pk = PublicKey::from_hex(&pk_hex)?;
				self.engine.register_issuer(&pk)?;

				{
					let mut state = self.state.lock();
					if let Some(name) = request.payload["bank_name"].as_str() {
						if !name.is_empty() {
							state.issuer_names.insert(pk_hex.clone(), name.to_string());
						}
					}
					state.incoming_requests[idx].settle(RequestStatus::Approved);
					save_data(&self.data_dir, &state);
				}

				self.bus
					.publish("issuer_registered", serde_json::json!({ "pk": pk_hex }));

				let confirmed = self.issuer_confirmed_payload();
				if let Err(e) = self.transport.send(
					&request.from_hash,
					Role::Bank,
					msg::ISSUER_CONFIRMED,
					confirmed,
				) {
					warn!("could not notify bank at {}: {}", request.from_hash, e);
				}
				Ok(())
			}
			other => Err(Error::ArgumentError(format!(
				"cannot approve request of type {}",
				other
			))),
		}
	}

	/// Declines a pending administrative request and tells the requester.
	pub fn decline_request(&self, idx: usize, reason: &str) -> Result<(), Error> {
		let request = self.peek_pending(idx)?;
		{
			let mut state = self.state.lock();
			state.incoming_requests[idx].settle(RequestStatus::Declined);
			save_data(&self.data_dir, &state);
		}
		if let Err(e) = self.transport.send(
			&request.from_hash,
			Role::Bank,
			msg::ISSUER_DECLINED,
			serde_json::json!({ "reason": reason }),
		) {
			warn!("could not notify {}: {}", request.from_hash, e);
		}
		Ok(())
	}

	/// Asks a bank to register with this engine.
	pub fn request_bank_registration(&self, bank_dest: &str) -> Result<(), Error> {
		let endpoint = self.state.lock().endpoint.clone();
		self.transport.send(
			bank_dest,
			Role::Bank,
			msg::ENGINE_REGISTER_REQUEST,
			serde_json::json!({
				"pk_engine": self.engine.public_key().to_hex(),
				"engine_name": self.name,
				"engine_dest": self.transport.dest_hash(),
				"engine_endpoint": endpoint,
			}),
		)?;
		Ok(())
	}

	fn issuer_confirmed_payload(&self) -> serde_json::Value {
		let endpoint = self.state.lock().endpoint.clone();
		serde_json::json!({
			"pk_engine": self.engine.public_key().to_hex(),
			"engine_dest": self.transport.dest_hash(),
			"engine_endpoint": endpoint,
		})
	}

	fn peek_pending(&self, idx: usize) -> Result<IncomingRequest, Error> {
		let state = self.state.lock();
		let request = state
			.incoming_requests
			.get(idx)
			.ok_or(Error::RequestNotFound(idx))?;
		if !request.status.is_pending() {
			return Err(Error::RequestAlreadySettled);
		}
		Ok(request.clone())
	}

	fn handle_message(&self, envelope: Envelope) {
		debug!(
			"engine got {} from {} ({})",
			envelope.msg_type, envelope.from_hash, envelope.from_role
		);
		match envelope.msg_type.as_str() {
			msg::REGISTER_ISSUER => self.on_register_issuer(envelope),
			msg::BANK_REGISTER_RESPONSE => self.on_bank_register_response(envelope),
			msg::BANK_REGISTER_DECLINED => {
				self.bus.publish(
					"request_declined",
					serde_json::json!({ "reason": envelope.payload["reason"] }),
				);
			}
			msg::REGISTER_COIN => self.on_register_coin(envelope),
			msg::TRANSACTION => self.on_transaction(envelope),
			other => debug!("engine ignoring message type {}", other),
		}
	}

	/// An issuer-registration request lands in the pending queue; only the
	/// operator moves it further.
	fn on_register_issuer(&self, envelope: Envelope) {
		if envelope.payload["pk_issuer"].as_str().unwrap_or("").is_empty() {
			return;
		}
		{
			let mut state = self.state.lock();
			state.incoming_requests.push(IncomingRequest {
				request_type: msg::REGISTER_ISSUER.to_string(),
				from_hash: envelope.from_hash,
				from_role: envelope.from_role.to_string(),
				payload: envelope.payload,
				ts: now(),
				status: RequestStatus::Pending,
				generated_pk: None,
			});
			save_data(&self.data_dir, &state);
		}
		self.bus.publish(
			"new_request",
			serde_json::json!({ "request_type": msg::REGISTER_ISSUER }),
		);
	}

	/// The bank approved our registration request; its key goes straight
	/// into the trusted set.
	fn on_bank_register_response(&self, envelope: Envelope) {
		let pk_hex = envelope.payload["pk_issuer"].as_str().unwrap_or("");
		let pk = match PublicKey::from_hex(pk_hex) {
			Ok(pk) => pk,
			Err(_) => return,
		};
		if let Err(e) = self.engine.register_issuer(&pk) {
			warn!("could not register issuer {}: {}", pk_hex, e);
			return;
		}
		{
			let mut state = self.state.lock();
			if let Some(name) = envelope.payload["bank_name"].as_str() {
				if !name.is_empty() {
					state
						.issuer_names
						.insert(pk_hex.to_string(), name.to_string());
				}
			}
			save_data(&self.data_dir, &state);
		}
		self.bus
			.publish("issuer_registered", serde_json::json!({ "pk": pk_hex }));
	}

	fn on_register_coin(&self, envelope: Envelope) {
		let payload: RegisterCoinPayload = match serde_json::from_value(envelope.payload) {
			Ok(payload) => payload,
			Err(e) => {
				debug!("malformed register_coin payload: {}", e);
				return;
			}
		};

		match self.engine.register_coin(
			&payload.coin,
			&payload.recipient_dest,
			&payload.pk_next,
			&payload.transfer_signature,
		) {
			Ok(_) => {}
			Err(e) => {
				warn!("register_coin for {} rejected: {}", payload.coin.coin_id, e);
				return;
			}
		}

		self.bus.publish(
			"coin_registered",
			serde_json::json!({ "coin_id": payload.coin.coin_id }),
		);

		self.push_deliveries(
			&payload.recipient_dest,
			msg::COIN_DELIVERY,
			payload.description.as_deref(),
			&envelope.from_hash,
		);
	}

	fn on_transaction(&self, envelope: Envelope) {
		let tx: pkicash_core::TransferRequest =
			match serde_json::from_value(envelope.payload) {
				Ok(tx) => tx,
				Err(e) => {
					debug!("malformed transaction payload: {}", e);
					return;
				}
			};

		let confirmation = match self.engine.process_transaction(&tx) {
			Ok(confirmation) => confirmation,
			Err(e) => {
				warn!("transaction for {} rejected: {}", tx.coin_id, e);
				return;
			}
		};

		self.bus.publish(
			"transaction",
			serde_json::json!({ "coin_id": tx.coin_id }),
		);

		if let Err(e) = self.transport.send(
			&envelope.from_hash,
			envelope.from_role,
			msg::TX_CONFIRMED,
			serde_json::json!({
				"coin_id": tx.coin_id,
				"status": confirmation.status,
			}),
		) {
			warn!("could not confirm tx to {}: {}", envelope.from_hash, e);
		}

		self.push_deliveries(
			&tx.recipient_dest,
			msg::COIN_TRANSFER,
			tx.description.as_deref(),
			&envelope.from_hash,
		);
	}

	/// Drains the pending-delivery queue for a recipient and pushes each
	/// row out. A failed push is logged; the row stays recoverable through
	/// the engine's delivered history.
	fn push_deliveries(
		&self,
		recipient_dest: &str,
		delivery_type: &str,
		description: Option<&str>,
		sender_dest: &str,
	) {
		let deliveries = match self.engine.get_pending_deliveries(recipient_dest) {
			Ok(deliveries) => deliveries,
			Err(e) => {
				warn!("could not fetch deliveries for {}: {}", recipient_dest, e);
				return;
			}
		};
		for mut delivery in deliveries {
			if delivery.description.is_none() {
				delivery.description = description.map(String::from);
			}
			delivery.sender_dest = Some(sender_dest.to_string());
			let payload = match serde_json::to_value(&delivery) {
				Ok(payload) => payload,
				Err(e) => {
					warn!("could not encode delivery: {}", e);
					continue;
				}
			};
			if let Err(e) =
				self.transport
					.send(recipient_dest, Role::Wallet, delivery_type, payload)
			{
				warn!(
					"delivery of {} to {} failed ({}); recoverable from history",
					delivery.coin.coin_id, recipient_dest, e
				);
			}
		}
	}
}

fn load_data(data_dir: &str) -> EngineData {
	let path = Path::new(data_dir).join(DATA_FILE);
	std::fs::File::open(&path)
		.ok()
		.and_then(|file| serde_json::from_reader(file).ok())
		.unwrap_or_default()
}

fn save_data(data_dir: &str, data: &EngineData) {
	let path = Path::new(data_dir).join(DATA_FILE);
	let res = std::fs::File::create(&path).map_err(|e| format!("{}", e)).and_then(|file| {
		serde_json::to_writer_pretty(file, data).map_err(|e| format!("{}", e))
	});
	if let Err(e) = res {
		warn!("could not persist engine data: {}", e);
	}
}

fn now() -> String {
	Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
