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

//! Public types for config modules

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use pkicash_util::LoggingConfig;

/// Name of the config file expected in an actor's data directory.
pub const CONFIG_FILE_NAME: &str = "pkicash.toml";

/// Error type wrapping config errors.
#[derive(Debug)]
pub enum ConfigError {
	/// Error with parsing of config file
	ParseError(String, String),

	/// Error with fileIO while reading config file
	FileIOError(String, String),

	/// No file found
	FileNotFoundError(String),

	/// Error serializing config values
	SerializationError(String),
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			ConfigError::ParseError(ref file_name, ref message) => write!(
				f,
				"Error parsing configuration file at {} - {}",
				file_name, message
			),
			ConfigError::FileIOError(ref file_name, ref message) => {
				write!(f, "{} {}", message, file_name)
			}
			ConfigError::FileNotFoundError(ref file_name) => {
				write!(f, "Configuration file not found: {}", file_name)
			}
			ConfigError::SerializationError(ref message) => {
				write!(f, "Error serializing configuration: {}", message)
			}
		}
	}
}

impl From<io::Error> for ConfigError {
	fn from(error: io::Error) -> ConfigError {
		ConfigError::FileIOError(
			String::from(""),
			format!("Error loading config file: {}", error),
		)
	}
}

/// Engine-role settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
	/// Directory holding the ledger db and key file
	pub data_dir: String,
	/// Display name used in announces
	pub name: String,
	/// Endpoint identifier stamped into coins this engine governs
	pub endpoint: String,
}

impl Default for EngineConfig {
	fn default() -> EngineConfig {
		EngineConfig {
			data_dir: "data/engine".to_string(),
			name: "State Engine".to_string(),
			endpoint: "engine-main".to_string(),
		}
	}
}

/// Bank-role settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankConfig {
	/// Directory holding the issuer key and bank state
	pub data_dir: String,
	/// Display name used in announces
	pub name: String,
	/// Face value of coins issued for coin requests
	pub coin_value: u64,
}

impl Default for BankConfig {
	fn default() -> BankConfig {
		BankConfig {
			data_dir: "data/bank".to_string(),
			name: "Bank".to_string(),
			coin_value: 1,
		}
	}
}

/// Wallet-role settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
	/// Directory holding the wallet document
	pub data_dir: String,
	/// Display name used in announces
	pub name: String,
}

impl Default for WalletConfig {
	fn default() -> WalletConfig {
		WalletConfig {
			data_dir: "data/wallet".to_string(),
			name: "Wallet".to_string(),
		}
	}
}

/// Going to hold all of the various configuration types separately for
/// now, then put them together as a single GlobalConfig object afterwards.
/// This flattens the configuration file into logical sections, as they
/// tend to be quite nested in the code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigMembers {
	/// Engine config
	#[serde(default)]
	pub engine: EngineConfig,
	/// Bank config
	#[serde(default)]
	pub bank: BankConfig,
	/// Wallet config
	#[serde(default)]
	pub wallet: WalletConfig,
	/// Logging config
	#[serde(default)]
	pub logging: LoggingConfig,
	/// Authoritative mapping from a coin's `state_engine_endpoint` to the
	/// transport destination of that engine. Wallets refuse to fall back
	/// to arbitrary announced engines; an unmapped endpoint is an error.
	#[serde(default)]
	pub engine_map: HashMap<String, String>,
}

impl Default for ConfigMembers {
	fn default() -> ConfigMembers {
		ConfigMembers {
			engine: EngineConfig::default(),
			bank: BankConfig::default(),
			wallet: WalletConfig::default(),
			logging: LoggingConfig::default(),
			engine_map: HashMap::new(),
		}
	}
}

/// The top-level configuration, tracking where it was read from.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
	/// Keep track of the file we've read
	pub config_file_path: Option<PathBuf>,
	/// Whether a config file was used or defaults applied
	pub using_config_file: bool,
	/// The configuration itself
	pub members: ConfigMembers,
}
