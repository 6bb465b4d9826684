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

//! The bank actor: wraps the issuer, keeps the issued-coins register and
//! decides (through its operator) which wallets get new coins.

use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use chrono::Local;
use log::{debug, info, warn};

use pkicash_core::{IncomingRequest, Issuer, RequestStatus};
use pkicash_keychain::PublicKey;
use pkicash_transport::{Envelope, Role, TransportRef};
use pkicash_util::Mutex;

use crate::error::Error;
use crate::types::{msg, CoinRequestPayload, EventBus, RegisterCoinPayload};

const DATA_FILE: &str = "bank.json";
const KEY_FILE: &str = "issuer.key";

/// One row of the bank's issued-coins register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCoin {
	/// When the coin was minted
	pub timestamp: String,
	/// The coin's identifier
	pub coin_id: String,
	/// Face value
	#[serde(rename = "waarde")]
	pub value: u64,
	/// Destination the coin was issued to
	pub recipient: String,
}

/// Bank-side actor state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankData {
	/// Every coin this bank ever minted
	#[serde(default)]
	pub issued_coins: Vec<IssuedCoin>,
	/// Whether an engine accepted this bank as issuer
	#[serde(default)]
	pub registered_at_engine: bool,
	/// The engine's transport destination
	#[serde(default)]
	pub engine_address: Option<String>,
	/// The engine's verification key, hex
	#[serde(default)]
	pub engine_pk: Option<String>,
	/// The endpoint identifier to stamp into coins
	#[serde(default)]
	pub engine_endpoint: Option<String>,
	/// Administrative requests awaiting operator action
	#[serde(default)]
	pub incoming_requests: Vec<IncomingRequest>,
}

/// The bank actor.
pub struct BankServer {
	issuer: Issuer,
	transport: TransportRef,
	state: Mutex<BankData>,
	data_dir: String,
	name: String,
	coin_value: u64,
	bus: EventBus,
}

impl BankServer {
	/// Loads (or creates) the issuer key under `data_dir`, wires the
	/// dispatch thread and announces the bank.
	pub fn start(
		transport: TransportRef,
		data_dir: &str,
		name: &str,
		coin_value: u64,
	) -> Result<Arc<BankServer>, Error> {
		std::fs::create_dir_all(data_dir).map_err(|e| Error::IO(format!("{}", e)))?;
		let key_path = Path::new(data_dir).join(KEY_FILE);
		let issuer = if key_path.exists() {
			Issuer::load_key(&key_path)?
		} else {
			let issuer = Issuer::new();
			issuer.save_key(&key_path)?;
			issuer
		};

		let server = Arc::new(BankServer {
			issuer,
			transport,
			state: Mutex::new(load_data(data_dir)),
			data_dir: data_dir.to_string(),
			name: name.to_string(),
			coin_value,
			bus: EventBus::new(),
		});

		let (tx, rx) = mpsc::channel::<Envelope>();
		server.transport.on_message(Box::new(move |envelope| {
			let _ = tx.send(envelope);
		}));
		let dispatch = server.clone();
		thread::Builder::new()
			.name("bank-dispatch".to_string())
			.spawn(move || {
				for envelope in rx {
					dispatch.handle_message(envelope);
				}
			})
			.map_err(|e| Error::IO(format!("{}", e)))?;

		server
			.transport
			.announce(&server.name, &server.issuer.public_key().to_hex());
		info!("bank {} up at {}", name, server.transport.dest_hash());
		Ok(server)
	}

	/// The issuer's verification key.
	pub fn public_key(&self) -> PublicKey {
		*self.issuer.public_key()
	}

	/// Subscription to this actor's event stream.
	pub fn events(&self) -> mpsc::Receiver<crate::types::Event> {
		self.bus.subscribe()
	}

	/// Snapshot of the bank's state.
	pub fn data(&self) -> BankData {
		self.state.lock().clone()
	}

	/// Asks an engine to accept this bank as a trusted issuer.
	pub fn register_at_engine(&self, engine_dest: &str) -> Result<(), Error> {
		self.transport.send(
			engine_dest,
			Role::Engine,
			msg::REGISTER_ISSUER,
			serde_json::json!({
				"pk_issuer": self.issuer.public_key().to_hex(),
				"bank_name": self.name,
			}),
		)?;
		Ok(())
	}

	/// Mints a coin for a recipient and sends it to the registered engine
	/// for registration and delivery (operator action).
	pub fn issue_to(
		&self,
		value: u64,
		pk_recipient: &PublicKey,
		recipient_dest: &str,
		description: Option<String>,
	) -> Result<String, Error> {
		let (engine_dest, engine_pk_hex, endpoint) = self.engine_binding()?;
		let pk_engine = PublicKey::from_hex(&engine_pk_hex)?;

		let (coin, transfer) =
			self.issuer
				.issue_coin(value, pk_recipient, &endpoint, &pk_engine)?;

		{
			let mut state = self.state.lock();
			state.issued_coins.push(IssuedCoin {
				timestamp: now(),
				coin_id: coin.coin_id.clone(),
				value,
				recipient: recipient_dest.to_string(),
			});
			save_data(&self.data_dir, &state);
		}

		let coin_id = coin.coin_id.clone();
		let payload = RegisterCoinPayload {
			coin,
			recipient_dest: recipient_dest.to_string(),
			pk_next: transfer.pk_next,
			transfer_signature: transfer.transfer_signature,
			description,
		};
		self.transport.send(
			&engine_dest,
			Role::Engine,
			msg::REGISTER_COIN,
			serde_json::to_value(&payload)
				.map_err(|e| Error::ArgumentError(format!("{}", e)))?,
		)?;
		Ok(coin_id)
	}

	/// Approves a pending administrative request. For a coin request the
	/// operator may cap how many coins are actually issued; the cap is
	/// clamped to the number of receive keys supplied. Returns how many
	/// coins were issued (zero for registration approvals).
	pub fn approve_request(
		&self,
		idx: usize,
		approve_amount: Option<u32>,
		description: Option<String>,
	) -> Result<u32, Error> {
		let request = self.peek_pending(idx)?;

		match request.request_type.as_str() {
			msg::ENGINE_REGISTER_REQUEST => {
				let engine_dest = request.payload["engine_dest"]
					.as_str()
					.unwrap_or(&request.from_hash)
					.to_string();
				let engine_pk = request.payload["pk_engine"].as_str().unwrap_or("");
				let endpoint = request.payload["engine_endpoint"]
					.as_str()
					.unwrap_or(&engine_dest)
					.to_string();
				{
					let mut state = self.state.lock();
					state.registered_at_engine = true;
					state.engine_address = Some(engine_dest.clone());
					state.engine_pk = Some(engine_pk.to_string());
					state.engine_endpoint = Some(endpoint);
					state.incoming_requests[idx].settle(RequestStatus::Approved);
					save_data(&self.data_dir, &state);
				}
				self.transport.send(
					&request.from_hash,
					Role::Engine,
					msg::BANK_REGISTER_RESPONSE,
					serde_json::json!({
						"pk_issuer": self.issuer.public_key().to_hex(),
						"bank_name": self.name,
					}),
				)?;
				Ok(0)
			}
			msg::COIN_REQUEST => {
				let payload: CoinRequestPayload =
					serde_json::from_value(request.payload.clone())
						.map_err(|e| Error::ArgumentError(format!("{}", e)))?;
				if payload.public_keys.is_empty() {
					return Err(Error::ArgumentError(
						"no public keys in coin request".to_string(),
					));
				}

				let wallet_dest = if payload.wallet_dest.is_empty() {
					request.from_hash.clone()
				} else {
					payload.wallet_dest.clone()
				};
				let requested = payload.public_keys.len() as u32;
				let granted = approve_amount.unwrap_or(requested).max(1).min(requested);
				let description = description.or(payload.description);

				let mut issued = 0;
				for pk_hex in payload.public_keys.iter().take(granted as usize) {
					let pk_owner = PublicKey::from_hex(pk_hex)?;
					match self.issue_to(
						self.coin_value,
						&pk_owner,
						&wallet_dest,
						description.clone(),
					) {
						Ok(_) => issued += 1,
						Err(e) => warn!("could not issue coin for {}: {}", pk_hex, e),
					}
				}

				{
					let mut state = self.state.lock();
					state.incoming_requests[idx].settle(RequestStatus::Approved);
					save_data(&self.data_dir, &state);
				}
				info!("approved coin request: issued {} coin(s)", issued);
				Ok(issued)
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

		let decline_type = match request.request_type.as_str() {
			msg::ENGINE_REGISTER_REQUEST => msg::BANK_REGISTER_DECLINED,
			msg::COIN_REQUEST => msg::COIN_REQUEST_DECLINED,
			_ => return Ok(()),
		};
		let target_role = match request.from_role.as_str() {
			"engine" => Role::Engine,
			_ => Role::Wallet,
		};
		if let Err(e) = self.transport.send(
			&request.from_hash,
			target_role,
			decline_type,
			serde_json::json!({ "reason": reason }),
		) {
			warn!("could not notify {}: {}", request.from_hash, e);
		}
		Ok(())
	}

	fn engine_binding(&self) -> Result<(String, String, String), Error> {
		let state = self.state.lock();
		if !state.registered_at_engine {
			return Err(Error::NoEngine);
		}
		let engine_dest = state.engine_address.clone().ok_or(Error::NoEngine)?;
		let engine_pk = state.engine_pk.clone().ok_or(Error::NoEngine)?;
		let endpoint = state
			.engine_endpoint
			.clone()
			.unwrap_or_else(|| engine_dest.clone());
		Ok((engine_dest, engine_pk, endpoint))
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
			"bank got {} from {} ({})",
			envelope.msg_type, envelope.from_hash, envelope.from_role
		);
		match envelope.msg_type.as_str() {
			msg::ENGINE_REGISTER_REQUEST => self.park_request(envelope),
			msg::ISSUER_CONFIRMED => self.on_issuer_confirmed(envelope),
			msg::ISSUER_DECLINED => {
				self.bus.publish(
					"request_declined",
					serde_json::json!({ "reason": envelope.payload["reason"] }),
				);
			}
			msg::COIN_REQUEST => self.park_request(envelope),
			other => debug!("bank ignoring message type {}", other),
		}
	}

	/// Administrative messages wait for the operator.
	fn park_request(&self, envelope: Envelope) {
		let request_type = envelope.msg_type.clone();
		{
			let mut state = self.state.lock();
			state.incoming_requests.push(IncomingRequest {
				request_type: request_type.clone(),
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
			serde_json::json!({ "request_type": request_type }),
		);
	}

	/// The engine accepted us as issuer; record the binding used for all
	/// future mints.
	fn on_issuer_confirmed(&self, envelope: Envelope) {
		let engine_dest = envelope.payload["engine_dest"]
			.as_str()
			.unwrap_or(&envelope.from_hash)
			.to_string();
		let engine_pk = envelope.payload["pk_engine"].as_str().unwrap_or("");
		let endpoint = envelope.payload["engine_endpoint"]
			.as_str()
			.unwrap_or(&engine_dest)
			.to_string();
		{
			let mut state = self.state.lock();
			state.registered_at_engine = true;
			state.engine_address = Some(engine_dest.clone());
			state.engine_pk = Some(engine_pk.to_string());
			state.engine_endpoint = Some(endpoint);
			save_data(&self.data_dir, &state);
		}
		self.bus.publish(
			"issuer_registered",
			serde_json::json!({
				"engine_address": engine_dest,
				"engine_pk": engine_pk,
			}),
		);
	}
}

fn load_data(data_dir: &str) -> BankData {
	let path = Path::new(data_dir).join(DATA_FILE);
	std::fs::File::open(&path)
		.ok()
		.and_then(|file| serde_json::from_reader(file).ok())
		.unwrap_or_default()
}

fn save_data(data_dir: &str, data: &BankData) {
	let path = Path::new(data_dir).join(DATA_FILE);
	let res = std::fs::File::create(&path).map_err(|e| format!("{}", e)).and_then(|file| {
		serde_json::to_writer_pretty(file, data).map_err(|e| format!("{}", e))
	});
	if let Err(e) = res {
		warn!("could not persist bank data: {}", e);
	}
}

fn now() -> String {
	Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
