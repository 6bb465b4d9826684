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

//! Persistence of a single signing key as one hex line in a
//! mode-restricted file. Used for the engine and issuer keys.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::types::{Error, SecretKey};

/// Writes the key to the given path as a single hex line. On unix the file
/// mode is restricted to the owner.
pub fn save_key(path: &Path, sk: &SecretKey) -> Result<(), Error> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(|e| Error::KeyFile(format!("{}", e)))?;
	}
	let mut file = File::create(path).map_err(|e| Error::KeyFile(format!("{}", e)))?;
	file.write_all(sk.to_hex().as_bytes())
		.map_err(|e| Error::KeyFile(format!("{}", e)))?;
	restrict_permissions(path)?;
	debug!("saved key file at {}", path.display());
	Ok(())
}

/// Reads a key previously written with `save_key`.
pub fn load_key(path: &Path) -> Result<SecretKey, Error> {
	let mut file = File::open(path).map_err(|e| Error::KeyFile(format!("{}", e)))?;
	let mut buffer = String::new();
	file.read_to_string(&mut buffer)
		.map_err(|e| Error::KeyFile(format!("{}", e)))?;
	SecretKey::from_hex(buffer.trim())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), Error> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, fs::Permissions::from_mode(0o600))
		.map_err(|e| Error::KeyFile(format!("{}", e)))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), Error> {
	Ok(())
}
