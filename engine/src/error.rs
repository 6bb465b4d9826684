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

//! Engine error types. A closed set: callers match on these to decide
//! whether a failure is final (authorisation) or retryable (storage).

use failure::Fail;

use pkicash_keychain as keychain;
use pkicash_store as store;

/// Everything that can go wrong applying a mutation to the ledger.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// The coin names an issuer the engine was never told to trust.
	/// Final; no ledger write happened.
	#[fail(display = "Issuer {} is not trusted", _0)]
	UntrustedIssuer(String),
	/// An issuer, transfer or confirmation signature failed to verify.
	/// Final; never retried.
	#[fail(display = "Invalid signature: {}", _0)]
	InvalidSignature(String),
	/// A transfer targeted a coin id absent from the ledger.
	#[fail(display = "Unknown coin {}", _0)]
	UnknownCoin(String),
	/// A coin with this id is already registered. Replayed mints land here.
	#[fail(display = "Coin {} already registered", _0)]
	DuplicateCoin(String),
	/// Underlying storage failure.
	#[fail(display = "Store error: {}", _0)]
	Store(store::Error),
	/// Key material failure.
	#[fail(display = "Keychain error: {}", _0)]
	Keychain(keychain::Error),
}

impl From<store::Error> for Error {
	fn from(e: store::Error) -> Error {
		Error::Store(e)
	}
}

impl From<keychain::Error> for Error {
	fn from(e: keychain::Error) -> Error {
		Error::Keychain(e)
	}
}
