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

//! Protocol records surrounding the coin: transfers, engine confirmations,
//! delivery rows and the request-ledger entries every role keeps.

use std::fmt;

use pkicash_keychain::{build_payload, PublicKey, Signature};

use crate::coin::Coin;

/// Status tag carried by an engine confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	/// The coin was registered and handed to its first owner
	Issued,
	/// An existing coin moved between owners
	Confirmed,
}

impl Status {
	/// The wire representation, also used inside signing payloads.
	pub fn as_str(&self) -> &'static str {
		match *self {
			Status::Issued => "issued",
			Status::Confirmed => "confirmed",
		}
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// An engine-signed record proving a ledger mutation was accepted. The only
/// evidence a wallet trusts as proof of receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
	/// Coin the mutation applied to
	pub coin_id: String,
	/// Owner recorded by the mutation
	pub pk_next: PublicKey,
	/// Whether the mutation was a mint or a transfer
	pub status: Status,
	/// Engine signature over `(coin_id, pk_next, status)`
	pub engine_signature: Signature,
	/// Key the signature verifies under
	pub pk_engine: PublicKey,
}

impl Confirmation {
	/// The canonical signing input for a confirmation.
	pub fn payload(coin_id: &str, pk_next: &PublicKey, status: Status) -> Vec<u8> {
		build_payload(&[coin_id, &pk_next.to_hex(), status.as_str()])
	}

	/// Verifies the engine signature against the confirmation's own fields.
	pub fn verify(&self) -> bool {
		let payload = Confirmation::payload(&self.coin_id, &self.pk_next, self.status);
		self.pk_engine.verify(&payload, &self.engine_signature)
	}
}

/// A signed request to move a coin to a new owner. Valid only relative to
/// the engine's current owner key for the coin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
	/// Coin to move
	pub coin_id: String,
	/// Verification key of the incoming owner
	pub pk_next: PublicKey,
	/// Transport destination the delivery should be queued for
	#[serde(alias = "recipient_address")]
	pub recipient_dest: String,
	/// Signature over `(coin_id, pk_next)` by the current owner
	pub signature: Signature,
	/// Free-form note carried through to the delivery
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl TransferRequest {
	/// The canonical signing input for a transfer.
	pub fn payload(coin_id: &str, pk_next: &PublicKey) -> Vec<u8> {
		build_payload(&[coin_id, &pk_next.to_hex()])
	}
}

/// The initial transfer statement produced at mint time, moving the fresh
/// coin from the issuer to its first owner through the regular ledger path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
	/// First owner of the coin
	pub pk_next: PublicKey,
	/// Issuer signature over `(coin_id, pk_next)`
	pub transfer_signature: Signature,
}

/// A delivery row: the coin and confirmation an engine queued for a
/// recipient that has not fetched them yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
	/// The coin, already showing the recipient as owner
	pub coin: Coin,
	/// Proof the engine accepted the mutation
	pub confirmation: Confirmation,
	/// Free-form note from the sender
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Transport destination of the sending party
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sender_dest: Option<String>,
}

/// Lifecycle state of a tracked protocol request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
	/// Waiting for operator or counterparty action
	Pending,
	/// Some but not all expected deliveries arrived
	Partial,
	/// Recipient accepted and replied with a receive key
	Accepted,
	/// Operator approved the request
	Approved,
	/// Operator or counterparty declined the request
	Declined,
	/// Fully paid out
	Paid,
}

impl RequestStatus {
	/// Whether the request still awaits a first decision.
	pub fn is_pending(&self) -> bool {
		*self == RequestStatus::Pending
	}

	/// Whether the request can still absorb deliveries.
	pub fn is_open(&self) -> bool {
		match *self {
			RequestStatus::Pending | RequestStatus::Partial => true,
			_ => false,
		}
	}
}

/// An administrative message parked in a role's incoming-requests list,
/// awaiting explicit operator action. Once it leaves `Pending` it is frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRequest {
	/// Message type that created the request
	pub request_type: String,
	/// Transport destination of the requester
	pub from_hash: String,
	/// Role the requester announced
	pub from_role: String,
	/// Raw request payload, kept verbatim for the operator
	pub payload: serde_json::Value,
	/// Arrival timestamp
	pub ts: String,
	/// Current lifecycle state
	pub status: RequestStatus,
	/// Receive key generated when accepting a payment request
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub generated_pk: Option<String>,
}

impl IncomingRequest {
	/// Moves the request out of `Pending`. Returns false (and leaves the
	/// request untouched) when it was already settled; transitions are
	/// monotonic.
	pub fn settle(&mut self, to: RequestStatus) -> bool {
		if self.status.is_pending() {
			self.status = to;
			true
		} else {
			false
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::issuer::Issuer;
	use pkicash_keychain::generate_keypair;

	#[test]
	fn status_wire_names() {
		assert_eq!(serde_json::to_string(&Status::Issued).unwrap(), "\"issued\"");
		assert_eq!(
			serde_json::to_string(&Status::Confirmed).unwrap(),
			"\"confirmed\""
		);
	}

	#[test]
	fn confirmation_verifies_own_fields() {
		let (sk_engine, pk_engine) = generate_keypair();
		let (_, pk_next) = generate_keypair();
		let payload = Confirmation::payload("coin-1", &pk_next, Status::Issued);
		let confirmation = Confirmation {
			coin_id: "coin-1".to_string(),
			pk_next,
			status: Status::Issued,
			engine_signature: sk_engine.sign(&payload),
			pk_engine,
		};
		assert!(confirmation.verify());

		let mut tampered = confirmation.clone();
		tampered.status = Status::Confirmed;
		assert!(!tampered.verify());
	}

	#[test]
	fn transfer_request_accepts_legacy_field_name() {
		let issuer = Issuer::new();
		let (_, pk_owner) = generate_keypair();
		let (_, pk_engine) = generate_keypair();
		let (coin, transfer) = issuer
			.issue_coin(1, &pk_owner, "engine-a", &pk_engine)
			.unwrap();

		let json = format!(
			r#"{{"coin_id":"{}","pk_next":"{}","recipient_address":"addr-a","signature":"{}"}}"#,
			coin.coin_id,
			transfer.pk_next.to_hex(),
			transfer.transfer_signature.to_hex()
		);
		let tx: TransferRequest = serde_json::from_str(&json).unwrap();
		assert_eq!(tx.recipient_dest, "addr-a");
	}

	#[test]
	fn settled_requests_are_frozen() {
		let mut req = IncomingRequest {
			request_type: "coin_request".to_string(),
			from_hash: "abcd".to_string(),
			from_role: "wallet".to_string(),
			payload: serde_json::json!({}),
			ts: "2025-01-01 00:00:00".to_string(),
			status: RequestStatus::Pending,
			generated_pk: None,
		};
		assert!(req.settle(RequestStatus::Declined));
		assert!(!req.settle(RequestStatus::Approved));
		assert_eq!(req.status, RequestStatus::Declined);
	}
}
