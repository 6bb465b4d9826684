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

//! The coin data model and its cryptographic invariants: coins, transfers,
//! engine confirmations, delivery rows and the issuer role that mints new
//! coins. Everything here is transport- and storage-agnostic.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate serde_derive;

use failure::Fail;

pub mod coin;
pub mod issuer;
pub mod types;

pub use crate::coin::Coin;
pub use crate::issuer::Issuer;
pub use crate::types::{
	Confirmation, Delivery, IncomingRequest, RequestStatus, Status, TransferInfo,
	TransferRequest,
};

/// Errors raised while building core types.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// Coins carry strictly positive face values
	#[fail(display = "Coin value must be positive")]
	ZeroValue,
	/// Wraps key material failures
	#[fail(display = "Keychain error: {}", _0)]
	Keychain(pkicash_keychain::Error),
}

impl From<pkicash_keychain::Error> for Error {
	fn from(e: pkicash_keychain::Error) -> Error {
		Error::Keychain(e)
	}
}
