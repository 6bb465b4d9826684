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

//! Loading and writing of the pkicash.toml configuration file.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::types::{ConfigError, ConfigMembers, GlobalConfig, CONFIG_FILE_NAME};

impl Default for GlobalConfig {
	fn default() -> GlobalConfig {
		GlobalConfig {
			config_file_path: None,
			using_config_file: false,
			members: ConfigMembers::default(),
		}
	}
}

impl GlobalConfig {
	/// Loads configuration from the given file.
	pub fn from_file(path: &Path) -> Result<GlobalConfig, ConfigError> {
		if !path.exists() {
			return Err(ConfigError::FileNotFoundError(
				path.to_string_lossy().into_owned(),
			));
		}
		let mut file = File::open(path)?;
		let mut contents = String::new();
		file.read_to_string(&mut contents)?;

		let members: ConfigMembers = toml::from_str(&contents).map_err(|e| {
			ConfigError::ParseError(path.to_string_lossy().into_owned(), format!("{}", e))
		})?;

		Ok(GlobalConfig {
			config_file_path: Some(PathBuf::from(path)),
			using_config_file: true,
			members,
		})
	}

	/// Serializes the current configuration to a TOML string.
	pub fn ser_config(&self) -> Result<String, ConfigError> {
		toml::to_string(&self.members)
			.map_err(|e| ConfigError::SerializationError(format!("{}", e)))
	}

	/// Writes the current configuration to the given file.
	pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let serialized = self.ser_config()?;
		let mut file = File::create(path)?;
		file.write_all(serialized.as_bytes())?;
		Ok(())
	}
}

/// Finds or creates the configuration for a run: reads `pkicash.toml` from
/// the given directory if present, writes a default one there otherwise.
pub fn initial_setup(dir: &Path) -> Result<GlobalConfig, ConfigError> {
	let config_path = dir.join(CONFIG_FILE_NAME);
	if config_path.exists() {
		GlobalConfig::from_file(&config_path)
	} else {
		let mut config = GlobalConfig::default();
		config.write_to_file(&config_path)?;
		config.config_file_path = Some(config_path);
		Ok(config)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::fs;

	#[test]
	fn read_config() {
		let toml_str = r#"
			[engine]
			data_dir = "data/engine"
			name = "State Engine"
			endpoint = "engine-main"

			[bank]
			data_dir = "data/bank"
			name = "Bank"
			coin_value = 5

			[wallet]
			data_dir = "data/wallet-1"
			name = "Alice"

			[engine_map]
			engine-main = "aabbccdd"
		"#;

		let members: ConfigMembers = toml::from_str(toml_str).unwrap();
		assert_eq!(members.bank.coin_value, 5);
		assert_eq!(members.wallet.name, "Alice");
		assert_eq!(
			members.engine_map.get("engine-main").map(String::as_str),
			Some("aabbccdd")
		);
		// logging falls back to defaults when the section is absent
		assert!(members.logging.log_to_stdout);
	}

	#[test]
	fn initial_setup_writes_and_reads_back() {
		let test_dir = "test_output/config_initial_setup";
		let _ = fs::remove_dir_all(test_dir);
		fs::create_dir_all(test_dir).unwrap();

		let created = initial_setup(Path::new(test_dir)).unwrap();
		assert!(created.config_file_path.is_some());

		let reread = initial_setup(Path::new(test_dir)).unwrap();
		assert!(reread.using_config_file);
		assert_eq!(reread.members, created.members);

		let _ = fs::remove_dir_all(test_dir);
	}
}
