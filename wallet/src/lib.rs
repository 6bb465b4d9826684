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

//! The wallet: holds the secret key for every coin it owns, pre-generates
//! one-time receive keys, signs outgoing transfers and verifies engine
//! confirmations on incoming coins. State lives in a single JSON document
//! written through a lock file with a backup of the previous version.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate serde_derive;

mod error;
pub mod types;
mod wallet;

pub use crate::error::{Error, ErrorKind};
pub use crate::types::{
	OutgoingCoinRequest, OutgoingPaymentRequest, OwnedCoin, PendingKeypair, ReceivedResponse,
	TxLogEntry, WalletData,
};
pub use crate::wallet::{Wallet, MAX_PENDING_KEYPAIRS};
