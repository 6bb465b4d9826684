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

//! The transport seam the protocol core talks through. The mesh itself is
//! external; this crate defines the trait the actors consume, the envelope
//! framing that goes over it, the announce registry and message log every
//! endpoint keeps, and an in-process hub implementation used by tests and
//! the demo harness.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate serde_derive;

pub mod envelope;
pub mod hub;
pub mod registry;
mod types;

pub use crate::envelope::{decode_envelope, encode_envelope};
pub use crate::hub::{MemoryHub, MemoryTransport};
pub use crate::registry::{AnnounceRegistry, MessageLog};
pub use crate::types::{AnnounceInfo, Envelope, Error, MessageLogEntry, Role};

use std::collections::HashMap;
use std::sync::Arc;

/// Callback invoked for every inbound envelope.
pub type MessageHandler = Box<dyn Fn(Envelope) + Send + Sync>;

/// The interface an actor consumes to reach its peers. The underlying mesh
/// may reorder, drop or duplicate messages; only eventual delivery of some
/// messages is assumed.
pub trait Transport: Send + Sync {
	/// This endpoint's destination hash, the address peers send to.
	fn dest_hash(&self) -> String;

	/// The role this endpoint is announced under.
	fn role(&self) -> Role;

	/// Broadcasts this actor's presence with its display name and
	/// transaction public key.
	fn announce(&self, name: &str, pk_transaction: &str);

	/// Sends a typed message to another actor. Blocks up to the path
	/// discovery timeout; a failed send creates no remote state.
	fn send(
		&self,
		dest_hash: &str,
		target_role: Role,
		msg_type: &str,
		payload: serde_json::Value,
	) -> Result<(), Error>;

	/// Registers a callback for inbound messages.
	fn on_message(&self, handler: MessageHandler);

	/// All actors discovered through announces, by destination hash.
	fn announces(&self) -> HashMap<String, AnnounceInfo>;
}

/// Shared handle to a transport implementation.
pub type TransportRef = Arc<dyn Transport>;
