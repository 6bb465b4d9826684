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

//! Types persisted in the wallet's data document.

use std::collections::HashMap;

use pkicash_core::{Coin, IncomingRequest, RequestStatus};
use pkicash_keychain::{PublicKey, SecretKey};

/// Log action for a spent coin
pub const LOG_ACTION_SENT: &str = "verstuurd";
/// Log action for a coin received fresh from the bank
pub const LOG_ACTION_RECEIVED_ISSUED: &str = "ontvangen van bank";
/// Log action for a coin received as a payment
pub const LOG_ACTION_RECEIVED_PAYMENT: &str = "betaling ontvangen";

/// A coin the wallet owns, together with the secret key needed to spend it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedCoin {
	/// The coin record as last confirmed by the engine
	pub coin: Coin,
	/// Secret key whose public key equals `coin.pk_current`
	pub sk_current: SecretKey,
}

/// A speculatively generated receive keypair, waiting for a delivery
/// addressed to its public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingKeypair {
	/// Public half, handed out to whoever will send the coin
	pub pk: PublicKey,
	/// Secret half, installed with the coin on receipt
	pub sk: SecretKey,
	/// When the keypair was generated
	pub created: String,
}

/// One row of the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxLogEntry {
	/// When the event was recorded
	pub timestamp: String,
	/// What happened (`verstuurd`, `ontvangen van bank`, ...)
	pub action: String,
	/// The coin involved
	pub coin_id: String,
	/// Face value, when known
	#[serde(rename = "waarde")]
	pub value: Option<u64>,
	/// The other party's transport destination
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub counterparty: Option<String>,
	/// Free-form note carried with the transfer
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// An in-flight request for fresh coins sent to a bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingCoinRequest {
	/// Destination of the bank the request went to
	pub bank_dest: String,
	/// Number of coins requested
	pub amount: u32,
	/// Receive keys supplied with the request; drained as coins arrive
	pub public_keys: Vec<String>,
	/// Deliveries matched so far
	pub received: u32,
	/// Lifecycle state
	pub status: RequestStatus,
	/// When the request was sent
	pub ts: String,
	/// Free-form note
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// An in-flight payment request sent to another wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingPaymentRequest {
	/// Destination of the wallet asked to pay
	pub dest: String,
	/// Number of coins requested
	pub amount: u32,
	/// Receive keys supplied with the request; drained as coins arrive
	pub public_keys: Vec<String>,
	/// Deliveries matched so far
	pub received: u32,
	/// Lifecycle state
	pub status: RequestStatus,
	/// When the request was sent
	pub ts: String,
	/// Free-form note
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// A receive key another wallet handed us in reply to a payment request
/// of ours, usable as `pk_next` for a direct payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedResponse {
	/// Destination of the responding wallet
	pub from_hash: String,
	/// The receive key it generated for us
	pub pk: String,
	/// The address it asked to be paid at
	pub address: String,
	/// When the response arrived
	pub ts: String,
}

/// The wallet's persisted state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletData {
	/// This wallet's transport destination
	#[serde(default)]
	pub address: String,
	/// Owned coins by coin id
	#[serde(default)]
	pub coins: HashMap<String, OwnedCoin>,
	/// Receive keypairs awaiting delivery, oldest first
	#[serde(default)]
	pub pending_keypairs: Vec<PendingKeypair>,
	/// Append-only event history
	#[serde(default)]
	pub transaction_log: Vec<TxLogEntry>,
	/// Coin requests sent to banks
	#[serde(default)]
	pub outgoing_coin_requests: Vec<OutgoingCoinRequest>,
	/// Payment requests sent to other wallets
	#[serde(default)]
	pub outgoing_payment_requests: Vec<OutgoingPaymentRequest>,
	/// Administrative requests received from peers
	#[serde(default)]
	pub incoming_requests: Vec<IncomingRequest>,
	/// Receive keys peers handed us in response to payment requests
	#[serde(default)]
	pub received_responses: Vec<ReceivedResponse>,
}
