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

//! Message types that transit between actors and related support types.

use std::fmt;

use failure::Fail;

/// The role an actor participates as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// The authoritative ledger
	Engine,
	/// The issuer of new coins
	Bank,
	/// A coin-holding wallet
	Wallet,
}

impl Role {
	/// The wire representation.
	pub fn as_str(&self) -> &'static str {
		match *self {
			Role::Engine => "engine",
			Role::Bank => "bank",
			Role::Wallet => "wallet",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// The typed envelope every message travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Message type, the dispatch key
	#[serde(rename = "type")]
	pub msg_type: String,
	/// Sender's destination hash
	pub from_hash: String,
	/// Sender's role
	pub from_role: Role,
	/// Message body, shape depends on `msg_type`
	pub payload: serde_json::Value,
	/// ISO-8601 send timestamp
	pub ts: String,
}

/// What an actor advertises about itself in an announce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceInfo {
	/// Display name
	pub name: String,
	/// Announced role
	pub role: Role,
	/// Transaction-layer public key, hex
	pub pk_transaction: String,
	/// Destination hash the announce came from
	pub dest_hash: String,
	/// When the announce was last seen
	pub seen: String,
}

/// One row of the persistent message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogEntry {
	/// "in" or "out"
	pub direction: String,
	/// Message type
	#[serde(rename = "type")]
	pub msg_type: String,
	/// The peer's destination hash
	pub peer_hash: String,
	/// The peer's role
	pub peer_role: Role,
	/// Message body
	pub payload: serde_json::Value,
	/// Timestamp
	pub ts: String,
}

/// Transport failure taxonomy. Sends that fail create no remote state; the
/// operator may retry, protocol correctness does not depend on it.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// No route to the destination could be discovered in time
	#[fail(display = "No path to destination {}", _0)]
	NoPath(String),
	/// The link was established but the send did not complete in time
	#[fail(display = "Timeout sending to {}", _0)]
	Timeout(String),
	/// The link closed before the message was handed over
	#[fail(display = "Link closed before message was sent")]
	LinkClosed,
	/// The envelope could not be decompressed or parsed; receivers drop
	/// these silently
	#[fail(display = "Malformed envelope")]
	Malformed,
	/// Envelope could not be serialized
	#[fail(display = "Envelope encoding error: {}", _0)]
	Encode(String),
}
