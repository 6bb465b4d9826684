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

//! The state engine: the single trusted authority keeping the ledger of
//! who currently owns which coin. Validates every transfer signature,
//! produces signed confirmations and buffers deliveries per recipient.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate serde_derive;

mod engine;
mod error;
mod store;

pub use crate::engine::{CoinState, StateEngine};
pub use crate::error::Error;
pub use crate::store::{CoinRow, DeliveryRow, EngineStore};
