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

//! Per-endpoint transport state: the registry of actors discovered through
//! announces and the persistent in/out message history. Both persist as
//! JSON best-effort; an IO failure costs history, never correctness.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::debug;

use pkicash_util::Mutex;

use crate::types::{AnnounceInfo, MessageLogEntry};

const ANNOUNCES_FILE: &str = "announces.json";
const MESSAGE_LOG_FILE: &str = "message_log.json";

/// Actors discovered on the mesh, keyed by destination hash.
pub struct AnnounceRegistry {
	announces: Mutex<HashMap<String, AnnounceInfo>>,
	path: PathBuf,
}

impl AnnounceRegistry {
	/// Opens the registry under the given directory, loading any
	/// previously persisted announces.
	pub fn open(data_dir: &str) -> AnnounceRegistry {
		let path = Path::new(data_dir).join(ANNOUNCES_FILE);
		let announces = load_json(&path).unwrap_or_default();
		AnnounceRegistry {
			announces: Mutex::new(announces),
			path,
		}
	}

	/// Records (or refreshes) a discovered actor.
	pub fn record(&self, info: AnnounceInfo) {
		let mut announces = self.announces.lock();
		announces.insert(info.dest_hash.clone(), info);
		save_json(&self.path, &*announces);
	}

	/// All discovered actors.
	pub fn all(&self) -> HashMap<String, AnnounceInfo> {
		self.announces.lock().clone()
	}
}

/// Append-only history of messages this endpoint sent and received.
pub struct MessageLog {
	entries: Mutex<Vec<MessageLogEntry>>,
	path: PathBuf,
}

impl MessageLog {
	/// Opens the log under the given directory, loading prior history.
	pub fn open(data_dir: &str) -> MessageLog {
		let path = Path::new(data_dir).join(MESSAGE_LOG_FILE);
		let entries = load_json(&path).unwrap_or_default();
		MessageLog {
			entries: Mutex::new(entries),
			path,
		}
	}

	/// Appends one entry and persists.
	pub fn append(&self, entry: MessageLogEntry) {
		let mut entries = self.entries.lock();
		entries.push(entry);
		save_json(&self.path, &*entries);
	}

	/// The full history, oldest first.
	pub fn entries(&self) -> Vec<MessageLogEntry> {
		self.entries.lock().clone()
	}
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
	let file = File::open(path).ok()?;
	serde_json::from_reader(file).ok()
}

fn save_json<T: serde::Serialize>(path: &Path, value: &T) {
	if let Some(parent) = path.parent() {
		let _ = fs::create_dir_all(parent);
	}
	let res = File::create(path)
		.map_err(|e| format!("{}", e))
		.and_then(|file| serde_json::to_writer_pretty(file, value).map_err(|e| format!("{}", e)));
	if let Err(e) = res {
		debug!("could not persist {}: {}", path.display(), e);
	}
}
