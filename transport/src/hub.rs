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

//! An in-process transport wiring actor endpoints together through the
//! real envelope codec. Stands in for the mesh in tests and the demo
//! harness; an unknown destination surfaces as `NoPath`, the same failure
//! an unreachable mesh peer produces.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use log::debug;
use rand::RngCore;

use pkicash_util::{self as util, Mutex};

use crate::envelope::{decode_envelope, encode_envelope};
use crate::registry::{AnnounceRegistry, MessageLog};
use crate::types::{AnnounceInfo, Envelope, Error, MessageLogEntry, Role};
use crate::{MessageHandler, Transport};

type EndpointMap = Arc<Mutex<HashMap<String, Arc<MemoryTransport>>>>;

/// Creates and connects `MemoryTransport` endpoints.
#[derive(Clone)]
pub struct MemoryHub {
	endpoints: EndpointMap,
}

impl MemoryHub {
	/// A hub with no endpoints yet.
	pub fn new() -> MemoryHub {
		MemoryHub {
			endpoints: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Creates an endpoint for an actor of the given role, with transport
	/// state persisted under the given directory. The destination hash is
	/// a fresh random identity.
	pub fn endpoint(&self, role: Role, data_dir: &str) -> Arc<MemoryTransport> {
		let mut id = [0u8; 16];
		rand::thread_rng().fill_bytes(&mut id);
		let dest_hash = util::to_hex(id.to_vec());

		let transport = Arc::new(MemoryTransport {
			dest_hash: dest_hash.clone(),
			role,
			handlers: Mutex::new(Vec::new()),
			registry: AnnounceRegistry::open(data_dir),
			message_log: MessageLog::open(data_dir),
			endpoints: self.endpoints.clone(),
		});
		self.endpoints.lock().insert(dest_hash, transport.clone());
		transport
	}
}

/// One actor's endpoint on a `MemoryHub`. Inbound handlers run on the
/// sender's thread, so they must enqueue work rather than block.
pub struct MemoryTransport {
	dest_hash: String,
	role: Role,
	handlers: Mutex<Vec<MessageHandler>>,
	registry: AnnounceRegistry,
	message_log: MessageLog,
	endpoints: EndpointMap,
}

impl MemoryTransport {
	/// The persistent in/out message history of this endpoint.
	pub fn message_log(&self) -> Vec<MessageLogEntry> {
		self.message_log.entries()
	}

	fn deliver(&self, wire: &[u8]) {
		let envelope = match decode_envelope(wire) {
			Ok(envelope) => envelope,
			Err(_) => {
				// a peer sent us garbage; drop it
				debug!("{}: dropping malformed envelope", self.dest_hash);
				return;
			}
		};
		self.message_log.append(MessageLogEntry {
			direction: "in".to_string(),
			msg_type: envelope.msg_type.clone(),
			peer_hash: envelope.from_hash.clone(),
			peer_role: envelope.from_role,
			payload: envelope.payload.clone(),
			ts: envelope.ts.clone(),
		});
		let handlers = self.handlers.lock();
		for handler in handlers.iter() {
			handler(envelope.clone());
		}
	}
}

impl Transport for MemoryTransport {
	fn dest_hash(&self) -> String {
		self.dest_hash.clone()
	}

	fn role(&self) -> Role {
		self.role
	}

	fn announce(&self, name: &str, pk_transaction: &str) {
		let info = AnnounceInfo {
			name: name.to_string(),
			role: self.role,
			pk_transaction: pk_transaction.to_string(),
			dest_hash: self.dest_hash.clone(),
			seen: now(),
		};
		let peers: Vec<Arc<MemoryTransport>> = self
			.endpoints
			.lock()
			.values()
			.filter(|peer| peer.dest_hash != self.dest_hash)
			.cloned()
			.collect();
		for peer in peers {
			peer.registry.record(info.clone());
		}
		debug!("{} announced as {} ({})", self.dest_hash, name, self.role);
	}

	fn send(
		&self,
		dest_hash: &str,
		target_role: Role,
		msg_type: &str,
		payload: serde_json::Value,
	) -> Result<(), Error> {
		// contact strings may carry a "|pk" suffix; route on the hash part
		let dest = dest_hash.split('|').next().unwrap_or("");

		let envelope = Envelope {
			msg_type: msg_type.to_string(),
			from_hash: self.dest_hash.clone(),
			from_role: self.role,
			payload: payload.clone(),
			ts: now(),
		};
		let wire = encode_envelope(&envelope)?;

		let peer = self
			.endpoints
			.lock()
			.get(dest)
			.cloned()
			.ok_or_else(|| Error::NoPath(dest.to_string()))?;

		self.message_log.append(MessageLogEntry {
			direction: "out".to_string(),
			msg_type: msg_type.to_string(),
			peer_hash: dest.to_string(),
			peer_role: target_role,
			payload,
			ts: envelope.ts.clone(),
		});

		peer.deliver(&wire);
		Ok(())
	}

	fn on_message(&self, handler: MessageHandler) {
		self.handlers.lock().push(handler);
	}

	fn announces(&self) -> HashMap<String, AnnounceInfo> {
		self.registry.all()
	}
}

fn now() -> String {
	Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod test {
	use super::*;
	use std::fs;
	use std::sync::mpsc;

	fn setup(test_dir: &str) {
		let _ = fs::remove_dir_all(test_dir);
		fs::create_dir_all(test_dir).unwrap();
	}

	#[test]
	fn send_reaches_registered_peer() {
		let test_dir = "test_output/hub_send";
		setup(test_dir);

		let hub = MemoryHub::new();
		let a = hub.endpoint(Role::Wallet, &format!("{}/a", test_dir));
		let b = hub.endpoint(Role::Engine, &format!("{}/b", test_dir));

		let (tx, rx) = mpsc::channel();
		b.on_message(Box::new(move |envelope| {
			tx.send(envelope).unwrap();
		}));

		a.send(
			&b.dest_hash(),
			Role::Engine,
			"transaction",
			serde_json::json!({"coin_id": "coin-1"}),
		)
		.unwrap();

		let received = rx.recv().unwrap();
		assert_eq!(received.msg_type, "transaction");
		assert_eq!(received.from_hash, a.dest_hash());
		assert_eq!(received.from_role, Role::Wallet);
		assert_eq!(received.payload["coin_id"], "coin-1");

		let _ = fs::remove_dir_all(test_dir);
	}

	#[test]
	fn send_to_unknown_destination_is_no_path() {
		let test_dir = "test_output/hub_no_path";
		setup(test_dir);

		let hub = MemoryHub::new();
		let a = hub.endpoint(Role::Wallet, &format!("{}/a", test_dir));

		match a
			.send("00".repeat(16).as_str(), Role::Engine, "ping", serde_json::json!({}))
			.unwrap_err()
		{
			Error::NoPath(_) => (),
			e => panic!("expected NoPath, got {:?}", e),
		}

		let _ = fs::remove_dir_all(test_dir);
	}

	#[test]
	fn contact_string_suffix_is_stripped() {
		let test_dir = "test_output/hub_contact_suffix";
		setup(test_dir);

		let hub = MemoryHub::new();
		let a = hub.endpoint(Role::Bank, &format!("{}/a", test_dir));
		let b = hub.endpoint(Role::Engine, &format!("{}/b", test_dir));

		let (tx, rx) = mpsc::channel();
		b.on_message(Box::new(move |envelope| {
			tx.send(envelope.msg_type).unwrap();
		}));

		let contact = format!("{}|{}", b.dest_hash(), "ab".repeat(32));
		a.send(&contact, Role::Engine, "register_issuer", serde_json::json!({}))
			.unwrap();
		assert_eq!(rx.recv().unwrap(), "register_issuer");

		let _ = fs::remove_dir_all(test_dir);
	}

	#[test]
	fn announces_reach_other_endpoints() {
		let test_dir = "test_output/hub_announce";
		setup(test_dir);

		let hub = MemoryHub::new();
		let engine = hub.endpoint(Role::Engine, &format!("{}/engine", test_dir));
		let wallet = hub.endpoint(Role::Wallet, &format!("{}/wallet", test_dir));

		engine.announce("State Engine", &"ab".repeat(32));

		let seen = wallet.announces();
		assert_eq!(seen.len(), 1);
		let info = &seen[&engine.dest_hash()];
		assert_eq!(info.role, Role::Engine);
		assert_eq!(info.name, "State Engine");
		// the announcer does not record itself
		assert!(engine.announces().is_empty());

		let _ = fs::remove_dir_all(test_dir);
	}
}
