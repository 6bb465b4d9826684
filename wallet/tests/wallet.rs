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

use std::fs;

use pkicash_core::{Delivery, IncomingRequest, Issuer, RequestStatus, TransferRequest};
use pkicash_engine::StateEngine;
use pkicash_keychain::{generate_keypair, PublicKey, Signature, SIGNATURE_SIZE};
use pkicash_util as util;
use pkicash_wallet::{ErrorKind, Wallet, MAX_PENDING_KEYPAIRS};

fn clean_output_dir(test_dir: &str) {
	let _ = fs::remove_dir_all(test_dir);
}

fn setup(test_dir: &str) {
	util::init_test_logger();
	clean_output_dir(test_dir);
}

/// Mints a coin to one of the wallet's pending receive keys and returns
/// the delivery the engine queued for it.
fn deliver_to(
	engine: &StateEngine,
	issuer: &Issuer,
	wallet: &mut Wallet,
	value: u64,
	dest: &str,
) -> Delivery {
	let pk_hex = wallet.generate_receive_keypair().unwrap();
	let pk = PublicKey::from_hex(&pk_hex).unwrap();
	let (coin, transfer) = issuer
		.issue_coin(value, &pk, "engine-a", engine.public_key())
		.unwrap();
	engine
		.register_coin(&coin, dest, &transfer.pk_next, &transfer.transfer_signature)
		.unwrap();
	let mut deliveries = engine.get_pending_deliveries(dest).unwrap();
	assert_eq!(deliveries.len(), 1);
	deliveries.remove(0)
}

#[test]
fn receive_installs_spendable_coin() {
	let test_dir = "test_output/wallet_receive";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let delivery = deliver_to(&engine, &issuer, &mut wallet, 10, "addr-a");
	wallet.receive_from_engine(&delivery).unwrap();

	assert_eq!(wallet.get_balance(), 10);
	assert_eq!(wallet.list_coins().len(), 1);
	// the pending key was consumed
	assert!(!wallet.has_pending_key(&delivery.coin.pk_current));

	// the installed secret key signs transfers that verify under the
	// coin's recorded owner key
	let coin_id = delivery.coin.coin_id.clone();
	let (_, pk_b) = generate_keypair();
	let tx = wallet
		.create_transaction(&coin_id, &pk_b, "addr-b", None)
		.unwrap();
	let payload = TransferRequest::payload(&coin_id, &pk_b);
	assert!(wallet
		.get_coin(&coin_id)
		.unwrap()
		.pk_current
		.verify(&payload, &tx.signature));

	clean_output_dir(test_dir);
}

#[test]
fn delivery_for_unknown_key_rejected() {
	let test_dir = "test_output/wallet_unknown_key";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	// the delivery is addressed to a key wallet B never issued
	let mut wallet_a = Wallet::open(&format!("{}/wallet_a", test_dir), "addr-a").unwrap();
	let mut wallet_b = Wallet::open(&format!("{}/wallet_b", test_dir), "addr-b").unwrap();
	let delivery = deliver_to(&engine, &issuer, &mut wallet_a, 10, "addr-a");

	match wallet_b.receive_from_engine(&delivery).unwrap_err().kind() {
		ErrorKind::MissingPendingKey(_) => (),
		e => panic!("expected MissingPendingKey, got {:?}", e),
	}
	assert_eq!(wallet_b.get_balance(), 0);
	assert!(wallet_b.transaction_log().is_empty());

	clean_output_dir(test_dir);
}

#[test]
fn tampered_confirmation_rejected() {
	let test_dir = "test_output/wallet_bad_confirmation";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let mut delivery = deliver_to(&engine, &issuer, &mut wallet, 10, "addr-a");
	delivery.confirmation.engine_signature =
		Signature::from_bytes(&[0; SIGNATURE_SIZE]).unwrap();

	match wallet.receive_from_engine(&delivery).unwrap_err().kind() {
		ErrorKind::InvalidConfirmation => (),
		e => panic!("expected InvalidConfirmation, got {:?}", e),
	}
	assert_eq!(wallet.get_balance(), 0);
	// the pending key survives a rejected delivery
	assert!(wallet.has_pending_key(&delivery.coin.pk_current));

	clean_output_dir(test_dir);
}

#[test]
fn confirmation_from_wrong_engine_rejected() {
	let test_dir = "test_output/wallet_wrong_engine";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let mut delivery = deliver_to(&engine, &issuer, &mut wallet, 10, "addr-a");
	// the coin claims a different authoritative engine than the one that
	// signed the confirmation
	let (_, other_engine) = generate_keypair();
	delivery.coin.pk_engine = other_engine;

	match wallet.receive_from_engine(&delivery).unwrap_err().kind() {
		ErrorKind::WrongEngine => (),
		e => panic!("expected WrongEngine, got {:?}", e),
	}
	assert_eq!(wallet.get_balance(), 0);

	clean_output_dir(test_dir);
}

#[test]
fn spend_removes_coin_only_after_confirm() {
	let test_dir = "test_output/wallet_spend";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let delivery = deliver_to(&engine, &issuer, &mut wallet, 10, "addr-a");
	wallet.receive_from_engine(&delivery).unwrap();
	let coin_id = delivery.coin.coin_id.clone();

	let (_, pk_b) = generate_keypair();
	let tx = wallet
		.create_transaction(&coin_id, &pk_b, "addr-b", None)
		.unwrap();
	// signing alone does not spend
	assert_eq!(wallet.get_balance(), 10);

	engine.process_transaction(&tx).unwrap();
	wallet.confirm_send(&coin_id, "addr-b", None).unwrap();
	assert_eq!(wallet.get_balance(), 0);

	let log = wallet.transaction_log();
	assert_eq!(log[0].action, "verstuurd");
	assert_eq!(log[0].value, Some(10));

	// the coin is gone; a second spend attempt fails locally
	match wallet
		.create_transaction(&coin_id, &pk_b, "addr-b", None)
		.unwrap_err()
		.kind()
	{
		ErrorKind::CoinNotFound(_) => (),
		e => panic!("expected CoinNotFound, got {:?}", e),
	}

	clean_output_dir(test_dir);
}

#[test]
fn failed_transfer_leaves_coin_spendable() {
	let test_dir = "test_output/wallet_failed_transfer";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let delivery = deliver_to(&engine, &issuer, &mut wallet, 10, "addr-a");
	wallet.receive_from_engine(&delivery).unwrap();
	let coin_id = delivery.coin.coin_id.clone();

	// a transfer whose signature the engine rejects
	let (sk_mallory, _) = generate_keypair();
	let (_, pk_b) = generate_keypair();
	let payload = TransferRequest::payload(&coin_id, &pk_b);
	let forged = TransferRequest {
		coin_id: coin_id.clone(),
		pk_next: pk_b,
		recipient_dest: "addr-b".to_string(),
		signature: sk_mallory.sign(&payload),
		description: None,
	};
	assert!(engine.process_transaction(&forged).is_err());

	// wallet state unchanged; the legitimate spend still goes through
	assert_eq!(wallet.get_balance(), 10);
	let tx = wallet
		.create_transaction(&coin_id, &pk_b, "addr-b", None)
		.unwrap();
	engine.process_transaction(&tx).unwrap();
	wallet.confirm_send(&coin_id, "addr-b", None).unwrap();
	assert_eq!(wallet.get_balance(), 0);

	clean_output_dir(test_dir);
}

#[test]
fn transaction_log_is_append_only() {
	let test_dir = "test_output/wallet_log_monotonic";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();

	let first = deliver_to(&engine, &issuer, &mut wallet, 5, "addr-a");
	wallet.receive_from_engine(&first).unwrap();
	let snapshot = wallet.transaction_log();
	assert_eq!(snapshot.len(), 1);

	let second = deliver_to(&engine, &issuer, &mut wallet, 7, "addr-a");
	wallet.receive_from_engine(&second).unwrap();
	let log = wallet.transaction_log();
	assert_eq!(log.len(), 2);
	// the earlier entry is untouched (log is newest-first on read)
	assert_eq!(log[1], snapshot[0]);

	clean_output_dir(test_dir);
}

#[test]
fn pending_keypairs_are_bounded() {
	let test_dir = "test_output/wallet_pending_bound";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();

	let oldest_hex = wallet.generate_receive_keypair().unwrap();
	let oldest = PublicKey::from_hex(&oldest_hex).unwrap();
	for _ in 0..MAX_PENDING_KEYPAIRS {
		wallet.generate_receive_keypair().unwrap();
	}
	// the bound pushed the oldest key out
	assert!(!wallet.has_pending_key(&oldest));

	// a delivery against the evicted key is rejected, not silently lost
	let (coin, transfer) = issuer
		.issue_coin(10, &oldest, "engine-a", engine.public_key())
		.unwrap();
	engine
		.register_coin(&coin, "addr-a", &transfer.pk_next, &transfer.transfer_signature)
		.unwrap();
	let deliveries = engine.get_pending_deliveries("addr-a").unwrap();
	match wallet
		.receive_from_engine(&deliveries[0])
		.unwrap_err()
		.kind()
	{
		ErrorKind::MissingPendingKey(_) => (),
		e => panic!("expected MissingPendingKey, got {:?}", e),
	}

	clean_output_dir(test_dir);
}

#[test]
fn wallet_state_survives_reopen() {
	let test_dir = "test_output/wallet_reopen";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let wallet_dir = format!("{}/wallet", test_dir);
	let coin_id;
	{
		let mut wallet = Wallet::open(&wallet_dir, "addr-a").unwrap();
		let delivery = deliver_to(&engine, &issuer, &mut wallet, 10, "addr-a");
		wallet.receive_from_engine(&delivery).unwrap();
		coin_id = delivery.coin.coin_id.clone();
	}
	{
		let wallet = Wallet::open(&wallet_dir, "").unwrap();
		assert_eq!(wallet.address(), "addr-a");
		assert_eq!(wallet.get_balance(), 10);
		assert!(wallet.get_coin(&coin_id).is_some());
		assert_eq!(wallet.transaction_log().len(), 1);
	}

	clean_output_dir(test_dir);
}

#[test]
fn coin_request_advances_on_deliveries() {
	let test_dir = "test_output/wallet_coin_request";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let pk1 = wallet.generate_receive_keypair().unwrap();
	let pk2 = wallet.generate_receive_keypair().unwrap();
	wallet
		.add_outgoing_coin_request("bank-1", vec![pk1.clone(), pk2.clone()], None)
		.unwrap();

	for pk_hex in [pk1, pk2].iter() {
		let pk = PublicKey::from_hex(pk_hex).unwrap();
		let (coin, transfer) = issuer
			.issue_coin(1, &pk, "engine-a", engine.public_key())
			.unwrap();
		engine
			.register_coin(&coin, "addr-a", &transfer.pk_next, &transfer.transfer_signature)
			.unwrap();
	}

	let deliveries = engine.get_pending_deliveries("addr-a").unwrap();
	assert_eq!(deliveries.len(), 2);

	wallet.receive_from_engine(&deliveries[0]).unwrap();
	assert_eq!(
		wallet.outgoing_coin_requests()[0].status,
		RequestStatus::Partial
	);
	wallet.receive_from_engine(&deliveries[1]).unwrap();
	let request = &wallet.outgoing_coin_requests()[0];
	assert_eq!(request.status, RequestStatus::Approved);
	assert_eq!(request.received, 2);
	assert_eq!(wallet.get_balance(), 2);

	clean_output_dir(test_dir);
}

#[test]
fn payment_request_is_paid_when_drained() {
	let test_dir = "test_output/wallet_payment_request";
	setup(test_dir);

	let issuer = Issuer::new();
	let engine = StateEngine::new(&format!("{}/engine", test_dir)).unwrap();
	engine.register_issuer(issuer.public_key()).unwrap();

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	let pk_hex = wallet.generate_receive_keypair().unwrap();
	wallet
		.add_outgoing_payment_request("addr-b", vec![pk_hex.clone()], Some("lunch".to_string()))
		.unwrap();

	let pk = PublicKey::from_hex(&pk_hex).unwrap();
	let (coin, transfer) = issuer
		.issue_coin(1, &pk, "engine-a", engine.public_key())
		.unwrap();
	engine
		.register_coin(&coin, "addr-a", &transfer.pk_next, &transfer.transfer_signature)
		.unwrap();
	let deliveries = engine.get_pending_deliveries("addr-a").unwrap();
	wallet.receive_from_engine(&deliveries[0]).unwrap();

	assert_eq!(
		wallet.outgoing_payment_requests()[0].status,
		RequestStatus::Paid
	);

	clean_output_dir(test_dir);
}

#[test]
fn incoming_requests_settle_once() {
	let test_dir = "test_output/wallet_incoming_requests";
	setup(test_dir);

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	wallet
		.add_incoming_request(IncomingRequest {
			request_type: "payment_request".to_string(),
			from_hash: "addr-b".to_string(),
			from_role: "wallet".to_string(),
			payload: serde_json::json!({"amount": 1}),
			ts: "2025-01-01 00:00:00".to_string(),
			status: RequestStatus::Pending,
			generated_pk: None,
		})
		.unwrap();

	let settled = wallet
		.settle_incoming(0, RequestStatus::Declined)
		.unwrap();
	assert_eq!(settled.status, RequestStatus::Declined);

	match wallet
		.settle_incoming(0, RequestStatus::Paid)
		.unwrap_err()
		.kind()
	{
		ErrorKind::RequestAlreadySettled => (),
		e => panic!("expected RequestAlreadySettled, got {:?}", e),
	}
	match wallet
		.settle_incoming(5, RequestStatus::Paid)
		.unwrap_err()
		.kind()
	{
		ErrorKind::RequestNotFound(5) => (),
		e => panic!("expected RequestNotFound, got {:?}", e),
	}

	clean_output_dir(test_dir);
}

#[test]
fn accepting_a_request_hands_out_a_receive_key() {
	let test_dir = "test_output/wallet_accept_request";
	setup(test_dir);

	let mut wallet = Wallet::open(&format!("{}/wallet", test_dir), "addr-a").unwrap();
	wallet
		.add_incoming_request(IncomingRequest {
			request_type: "payment_request".to_string(),
			from_hash: "addr-b".to_string(),
			from_role: "wallet".to_string(),
			payload: serde_json::json!({}),
			ts: "2025-01-01 00:00:00".to_string(),
			status: RequestStatus::Pending,
			generated_pk: None,
		})
		.unwrap();

	let pk_hex = wallet.accept_incoming(0).unwrap();
	let pk = PublicKey::from_hex(&pk_hex).unwrap();
	assert!(wallet.has_pending_key(&pk));

	let request = &wallet.incoming_requests()[0];
	assert_eq!(request.status, RequestStatus::Accepted);
	assert_eq!(request.generated_pk, Some(pk_hex));

	clean_output_dir(test_dir);
}
