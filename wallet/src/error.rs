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

//! Implementation specific error types
use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

use pkicash_keychain as keychain;

/// Error definition
#[derive(Debug)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Wallet errors, mostly wrappers around underlying crypto or I/O errors.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// The wallet does not hold the coin
	#[fail(display = "Coin {} not in wallet", _0)]
	CoinNotFound(String),
	/// A delivery arrived for a receive key this wallet never issued, or
	/// one that was evicted from the bounded pending set
	#[fail(display = "No pending keypair for pk {}", _0)]
	MissingPendingKey(String),
	/// The engine signature on a confirmation failed to verify
	#[fail(display = "Invalid engine signature on confirmation")]
	InvalidConfirmation,
	/// The confirmation was signed by a different engine than the coin
	/// declares as authoritative
	#[fail(display = "Confirmation signed by unexpected engine")]
	WrongEngine,
	/// Keychain error
	#[fail(display = "Keychain error: {}", _0)]
	Keychain(keychain::Error),
	/// Error when reading or writing the wallet file
	#[fail(display = "Wallet data error: {}", _0)]
	WalletFile(&'static str),
	/// IO error
	#[fail(display = "IO error")]
	IO,
	/// Error when formatting json
	#[fail(display = "Serde JSON error")]
	Format,
	/// An operator acted on a request index that does not exist
	#[fail(display = "Request {} not found", _0)]
	RequestNotFound(usize),
	/// An operator acted on a request that already left the pending state
	#[fail(display = "Request already settled")]
	RequestAlreadySettled,
	/// Other
	#[fail(display = "Generic error: {}", _0)]
	GenericError(String),
}

impl Fail for Error {
	fn cause(&self) -> Option<&dyn Fail> {
		self.inner.cause()
	}

	fn backtrace(&self) -> Option<&Backtrace> {
		self.inner.backtrace()
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.inner, f)
	}
}

impl Error {
	/// get kind
	pub fn kind(&self) -> ErrorKind {
		self.inner.get_context().clone()
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Error {
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<Context<ErrorKind>> for Error {
	fn from(inner: Context<ErrorKind>) -> Error {
		Error { inner }
	}
}

impl From<keychain::Error> for Error {
	fn from(error: keychain::Error) -> Error {
		Error {
			inner: Context::new(ErrorKind::Keychain(error)),
		}
	}
}
