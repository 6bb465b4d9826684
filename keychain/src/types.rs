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

//! Newtypes around the Ed25519 primitives. Raw bytes are kept internally;
//! dalek types are only constructed at the point of use so a stored key
//! that fails to parse surfaces as a verification failure, not a panic.

use std::fmt;

use ed25519_dalek::{
	ExpandedSecretKey, PublicKey as DalekPublicKey, SecretKey as DalekSecretKey,
	Signature as DalekSignature, Verifier,
};
use failure::Fail;
use rand::rngs::OsRng;
use serde::{de, ser, Deserialize};
use zeroize::Zeroize;

use pkicash_util as util;

/// Size of a serialized secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;
/// Size of a serialized public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of a serialized signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Keychain error type
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// Hex string could not be decoded
	#[fail(display = "Invalid hex encoding: {}", _0)]
	Hex(String),
	/// Byte slice had the wrong length or was not a valid secret key
	#[fail(display = "Invalid secret key")]
	InvalidSecretKey,
	/// Byte slice had the wrong length or was not a valid curve point
	#[fail(display = "Invalid public key")]
	InvalidPublicKey,
	/// Byte slice had the wrong length for a signature
	#[fail(display = "Invalid signature encoding")]
	InvalidSignature,
	/// Failure reading or writing a key file
	#[fail(display = "Key file error: {}", _0)]
	KeyFile(String),
}

/// An Ed25519 signing key. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; SECRET_KEY_SIZE]);

impl SecretKey {
	/// Builds a secret key from its canonical 32-byte encoding.
	pub fn from_bytes(bytes: &[u8]) -> Result<SecretKey, Error> {
		if bytes.len() != SECRET_KEY_SIZE {
			return Err(Error::InvalidSecretKey);
		}
		// reject byte strings dalek would refuse later
		DalekSecretKey::from_bytes(bytes).map_err(|_| Error::InvalidSecretKey)?;
		let mut key = [0; SECRET_KEY_SIZE];
		key.copy_from_slice(bytes);
		Ok(SecretKey(key))
	}

	/// Builds a secret key from lowercase hex.
	pub fn from_hex(hex: &str) -> Result<SecretKey, Error> {
		let bytes =
			util::from_hex(hex.to_string()).map_err(|e| Error::Hex(format!("{}", e)))?;
		SecretKey::from_bytes(&bytes)
	}

	/// Hex encoding of the canonical 32 bytes.
	pub fn to_hex(&self) -> String {
		util::to_hex(self.0.to_vec())
	}

	/// The verification key matching this signing key.
	pub fn public_key(&self) -> PublicKey {
		let sk = DalekSecretKey::from_bytes(&self.0).expect("validated on construction");
		let pk = DalekPublicKey::from(&sk);
		PublicKey(pk.to_bytes())
	}

	/// Signs the message, returning a detached signature.
	pub fn sign(&self, msg: &[u8]) -> Signature {
		let sk = DalekSecretKey::from_bytes(&self.0).expect("validated on construction");
		let pk = DalekPublicKey::from(&sk);
		let expanded: ExpandedSecretKey = (&sk).into();
		Signature(expanded.sign(msg, &pk).to_bytes())
	}
}

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// never print secret bytes
		write!(f, "SecretKey(…)")
	}
}

impl ser::Serialize for SecretKey {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: ser::Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> de::Deserialize<'de> for SecretKey {
	fn deserialize<D>(deserializer: D) -> Result<SecretKey, D::Error>
	where
		D: de::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		SecretKey::from_hex(&s).map_err(de::Error::custom)
	}
}

/// An Ed25519 verification key, identifying the owner of a coin or the
/// signer of a confirmation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
	/// Builds a public key from its canonical 32-byte encoding.
	pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey, Error> {
		if bytes.len() != PUBLIC_KEY_SIZE {
			return Err(Error::InvalidPublicKey);
		}
		let mut key = [0; PUBLIC_KEY_SIZE];
		key.copy_from_slice(bytes);
		Ok(PublicKey(key))
	}

	/// Builds a public key from lowercase hex.
	pub fn from_hex(hex: &str) -> Result<PublicKey, Error> {
		let bytes =
			util::from_hex(hex.to_string()).map_err(|e| Error::Hex(format!("{}", e)))?;
		PublicKey::from_bytes(&bytes)
	}

	/// Hex encoding of the canonical 32 bytes.
	pub fn to_hex(&self) -> String {
		util::to_hex(self.0.to_vec())
	}

	/// Verifies a detached signature over the message. Returns false for
	/// any failure, including a key that is not a valid curve point; a
	/// verification failure is an authorisation failure, not an I/O error.
	pub fn verify(&self, msg: &[u8], sig: &Signature) -> bool {
		let pk = match DalekPublicKey::from_bytes(&self.0) {
			Ok(pk) => pk,
			Err(_) => return false,
		};
		let sig = match DalekSignature::from_bytes(&sig.0) {
			Ok(sig) => sig,
			Err(_) => return false,
		};
		pk.verify(msg, &sig).is_ok()
	}
}

impl fmt::Display for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl fmt::Debug for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PublicKey({})", self.to_hex())
	}
}

impl ser::Serialize for PublicKey {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: ser::Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> de::Deserialize<'de> for PublicKey {
	fn deserialize<D>(deserializer: D) -> Result<PublicKey, D::Error>
	where
		D: de::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		PublicKey::from_hex(&s).map_err(de::Error::custom)
	}
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
	/// Builds a signature from its canonical 64-byte encoding.
	pub fn from_bytes(bytes: &[u8]) -> Result<Signature, Error> {
		if bytes.len() != SIGNATURE_SIZE {
			return Err(Error::InvalidSignature);
		}
		let mut sig = [0; SIGNATURE_SIZE];
		sig.copy_from_slice(bytes);
		Ok(Signature(sig))
	}

	/// Builds a signature from lowercase hex.
	pub fn from_hex(hex: &str) -> Result<Signature, Error> {
		let bytes =
			util::from_hex(hex.to_string()).map_err(|e| Error::Hex(format!("{}", e)))?;
		Signature::from_bytes(&bytes)
	}

	/// Hex encoding of the canonical 64 bytes.
	pub fn to_hex(&self) -> String {
		util::to_hex(self.0.to_vec())
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Signature({})", self.to_hex())
	}
}

impl ser::Serialize for Signature {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: ser::Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> de::Deserialize<'de> for Signature {
	fn deserialize<D>(deserializer: D) -> Result<Signature, D::Error>
	where
		D: de::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Signature::from_hex(&s).map_err(de::Error::custom)
	}
}

/// Generates a fresh Ed25519 keypair from the OS entropy source.
pub fn generate_keypair() -> (SecretKey, PublicKey) {
	let mut csprng = OsRng {};
	let keypair = ed25519_dalek::Keypair::generate(&mut csprng);
	let sk = SecretKey(keypair.secret.to_bytes());
	let pk = PublicKey(keypair.public.to_bytes());
	(sk, pk)
}
