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

//! Shared actor types: message type tags, typed payload shapes and the
//! bounded event fan-out used to keep presentation layers informed.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use pkicash_core::Coin;
use pkicash_keychain::{PublicKey, Signature};
use pkicash_util::Mutex;

/// Message types as they appear in envelope `type` fields.
pub mod msg {
	/// bank → engine: ask to be registered as a trusted issuer
	pub const REGISTER_ISSUER: &str = "register_issuer";
	/// engine → bank: engine asks a bank to register with it
	pub const ENGINE_REGISTER_REQUEST: &str = "engine_register_request";
	/// bank → engine: bank approved the engine's registration request
	pub const BANK_REGISTER_RESPONSE: &str = "bank_register_response";
	/// engine → bank: issuer registration succeeded
	pub const ISSUER_CONFIRMED: &str = "issuer_confirmed";
	/// engine → bank: issuer registration was declined
	pub const ISSUER_DECLINED: &str = "issuer_declined";
	/// bank → engine: registration request was declined
	pub const BANK_REGISTER_DECLINED: &str = "bank_register_declined";
	/// bank → engine: register a freshly minted coin
	pub const REGISTER_COIN: &str = "register_coin";
	/// wallet → bank: ask for fresh coins
	pub const COIN_REQUEST: &str = "coin_request";
	/// bank → wallet: coin request was declined
	pub const COIN_REQUEST_DECLINED: &str = "coin_request_declined";
	/// wallet → engine: transfer an owned coin
	pub const TRANSACTION: &str = "transaction";
	/// engine → sending wallet: the transfer was accepted
	pub const TX_CONFIRMED: &str = "tx_confirmed";
	/// engine → receiving wallet: a freshly issued coin
	pub const COIN_DELIVERY: &str = "coin_delivery";
	/// engine → receiving wallet: a transferred coin
	pub const COIN_TRANSFER: &str = "coin_transfer";
	/// wallet → wallet: ask to be paid
	pub const PAYMENT_REQUEST: &str = "payment_request";
	/// wallet → wallet: a receive key in reply to a payment request
	pub const PAYMENT_RESPONSE: &str = "payment_response";
	/// wallet → wallet: payment request was declined
	pub const PAYMENT_DECLINED: &str = "payment_declined";
}

/// Payload of a `register_coin` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCoinPayload {
	/// The minted coin
	pub coin: Coin,
	/// Destination the delivery should be queued for
	pub recipient_dest: String,
	/// First owner of the coin
	pub pk_next: PublicKey,
	/// Issuer signature over the initial transfer
	pub transfer_signature: Signature,
	/// Free-form note for the recipient
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Payload of a `coin_request` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRequestPayload {
	/// Number of coins asked for
	pub amount: u32,
	/// Destination deliveries should go to
	pub wallet_dest: String,
	/// One receive key per requested coin
	pub public_keys: Vec<String>,
	/// Free-form note
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Payload of a `payment_request` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequestPayload {
	/// Address of the requesting wallet
	pub address: String,
	/// First receive key, kept for peers that expect a single key
	pub pk: String,
	/// One receive key per requested coin
	#[serde(default)]
	pub public_keys: Vec<String>,
	/// Number of coins asked for
	pub amount: u32,
	/// Free-form note
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Payload of a `payment_response` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponsePayload {
	/// The receive key generated for the payer
	pub pk: String,
	/// Address of the responding wallet
	pub address: String,
	/// The request being answered, echoed back verbatim
	pub original_request: serde_json::Value,
}

/// A notification for presentation layers. Not part of the protocol
/// contract; consumers may miss events under load.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
	/// Event discriminator ("coin_received", "new_request", ...)
	pub kind: String,
	/// Event-specific fields
	pub data: serde_json::Value,
}

/// Queue depth per subscriber; the slowest consumer is dropped on
/// overflow, never the producer.
pub const EVENT_QUEUE_SIZE: usize = 50;

/// Bounded broadcast of actor events with per-subscriber queues.
#[derive(Clone)]
pub struct EventBus {
	subscribers: Arc<Mutex<Vec<SyncSender<Event>>>>,
}

impl EventBus {
	/// A bus with no subscribers.
	pub fn new() -> EventBus {
		EventBus {
			subscribers: Arc::new(Mutex::new(Vec::new())),
		}
	}

	/// Registers a subscriber and returns its receiving end.
	pub fn subscribe(&self) -> Receiver<Event> {
		let (tx, rx) = sync_channel(EVENT_QUEUE_SIZE);
		self.subscribers.lock().push(tx);
		rx
	}

	/// Publishes an event to all subscribers. A subscriber whose queue is
	/// full or whose receiver is gone is dropped.
	pub fn publish(&self, kind: &str, data: serde_json::Value) {
		let event = Event {
			kind: kind.to_string(),
			data,
		};
		let mut subscribers = self.subscribers.lock();
		subscribers.retain(|tx| match tx.try_send(event.clone()) {
			Ok(_) => true,
			Err(TrySendError::Full(_)) => false,
			Err(TrySendError::Disconnected(_)) => false,
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn events_reach_all_subscribers() {
		let bus = EventBus::new();
		let rx1 = bus.subscribe();
		let rx2 = bus.subscribe();

		bus.publish("ping", serde_json::json!({"n": 1}));

		assert_eq!(rx1.recv().unwrap().kind, "ping");
		assert_eq!(rx2.recv().unwrap().kind, "ping");
	}

	#[test]
	fn overflowing_subscriber_is_dropped_without_blocking() {
		let bus = EventBus::new();
		let _rx_slow = bus.subscribe();
		for i in 0..(EVENT_QUEUE_SIZE + 10) {
			bus.publish("tick", serde_json::json!({ "i": i }));
		}
		// the slow subscriber is gone; a fresh one still receives
		let rx = bus.subscribe();
		bus.publish("after", serde_json::json!({}));
		assert_eq!(rx.recv().unwrap().kind, "after");
	}

	#[test]
	fn dead_subscriber_is_pruned() {
		let bus = EventBus::new();
		drop(bus.subscribe());
		bus.publish("noop", serde_json::json!({}));
		let rx = bus.subscribe();
		bus.publish("live", serde_json::json!({}));
		assert_eq!(rx.recv().unwrap().kind, "live");
	}
}
