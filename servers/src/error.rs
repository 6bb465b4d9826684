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

//! Actor-level error type, mostly wrappers around the underlying crates.

use failure::Fail;

/// Everything an operator-facing server operation can fail with.
#[derive(Debug, Fail)]
pub enum Error {
	/// Ledger rejected the operation
	#[fail(display = "Engine error: {}", _0)]
	Engine(pkicash_engine::Error),
	/// Wallet rejected the operation
	#[fail(display = "Wallet error: {}", _0)]
	Wallet(pkicash_wallet::Error),
	/// Send failed; no remote state was created
	#[fail(display = "Transport error: {}", _0)]
	Transport(pkicash_transport::Error),
	/// Key material failure
	#[fail(display = "Keychain error: {}", _0)]
	Keychain(pkicash_keychain::Error),
	/// Coin construction failure
	#[fail(display = "Core error: {}", _0)]
	Core(pkicash_core::Error),
	/// A coin names an engine endpoint the configuration does not map to
	/// a transport destination. There is deliberately no fallback to an
	/// announced engine.
	#[fail(display = "No engine mapping for endpoint {}", _0)]
	UnmappedEngine(String),
	/// Operator acted on a request index that does not exist
	#[fail(display = "Request {} not found", _0)]
	RequestNotFound(usize),
	/// Operator acted on a request that already left the pending state
	#[fail(display = "Request already settled")]
	RequestAlreadySettled,
	/// The bank is not registered at an engine yet
	#[fail(display = "Not registered at an engine")]
	NoEngine,
	/// Malformed operator input
	#[fail(display = "{}", _0)]
	ArgumentError(String),
	/// IO failure on actor state
	#[fail(display = "IO error: {}", _0)]
	IO(String),
}

impl From<pkicash_engine::Error> for Error {
	fn from(e: pkicash_engine::Error) -> Error {
		Error::Engine(e)
	}
}

impl From<pkicash_wallet::Error> for Error {
	fn from(e: pkicash_wallet::Error) -> Error {
		Error::Wallet(e)
	}
}

impl From<pkicash_transport::Error> for Error {
	fn from(e: pkicash_transport::Error) -> Error {
		Error::Transport(e)
	}
}

impl From<pkicash_keychain::Error> for Error {
	fn from(e: pkicash_keychain::Error) -> Error {
		Error::Keychain(e)
	}
}

impl From<pkicash_core::Error> for Error {
	fn from(e: pkicash_core::Error) -> Error {
		Error::Core(e)
	}
}
