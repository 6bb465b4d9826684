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

//! Embedded storage for ledger state, based on LMDB. Values are stored as
//! serde_json documents so the persisted rows stay readable with stock
//! tooling; all writes go through an atomic `Batch`.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate failure_derive;

use byteorder::{BigEndian, WriteBytesExt};

pub mod lmdb;

pub use crate::lmdb::{new_env, option_to_not_found, Batch, Error, SerIterator, Store};

/// Separator between a table prefix and the row key.
pub const SEP: u8 = b':';

/// Builds a prefixed db key from a table prefix and a row key.
pub fn to_key(prefix: u8, k: &[u8]) -> Vec<u8> {
	let mut res = Vec::with_capacity(k.len() + 2);
	res.push(prefix);
	res.push(SEP);
	res.extend_from_slice(k);
	res
}

/// Builds a prefixed db key from a table prefix and a numeric row id,
/// big-endian so iteration order matches insertion order.
pub fn u64_to_key(prefix: u8, val: u64) -> Vec<u8> {
	let mut u64_vec = vec![];
	u64_vec.write_u64::<BigEndian>(val).unwrap();
	to_key(prefix, &u64_vec)
}
