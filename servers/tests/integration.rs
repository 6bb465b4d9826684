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

//! End-to-end flows across all four actors over the in-process hub:
//! issuer registration, coin issuance, wallet-to-wallet payment, and the
//! decline paths.

use std::collections::HashMap;
use std::fs;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pkicash_core::RequestStatus;
use pkicash_servers::{BankServer, EngineServer, Error, Event, WalletServer};
use pkicash_transport::{MemoryHub, Role, Transport};
use pkicash_util as util;

const ENGINE_ENDPOINT: &str = "engine-main";

struct TestNet {
	engine: Arc<EngineServer>,
	bank: Arc<BankServer>,
	wallet_a: Arc<WalletServer>,
	wallet_b: Arc<WalletServer>,
	engine_dest: String,
	bank_dest: String,
	hub: MemoryHub,
	test_dir: String,
}

fn clean_output_dir(test_dir: &str) {
	let _ = fs::remove_dir_all(test_dir);
}

fn setup_net(test_dir: &str) -> TestNet {
	util::init_test_logger();
	clean_output_dir(test_dir);

	let hub = MemoryHub::new();

	let engine_transport = hub.endpoint(Role::Engine, &format!("{}/engine", test_dir));
	let engine_dest = engine_transport.dest_hash();
	let engine = EngineServer::start(
		engine_transport,
		&format!("{}/engine", test_dir),
		"State Engine",
		ENGINE_ENDPOINT,
	)
	.unwrap();

	let bank_transport = hub.endpoint(Role::Bank, &format!("{}/bank", test_dir));
	let bank_dest = bank_transport.dest_hash();
	let bank =
		BankServer::start(bank_transport, &format!("{}/bank", test_dir), "Bank", 1).unwrap();

	let mut engine_map = HashMap::new();
	engine_map.insert(ENGINE_ENDPOINT.to_string(), engine_dest.clone());

	let wallet_a = WalletServer::start(
		hub.endpoint(Role::Wallet, &format!("{}/wallet_a", test_dir)),
		&format!("{}/wallet_a", test_dir),
		"Alice",
		engine_map.clone(),
	)
	.unwrap();
	let wallet_b = WalletServer::start(
		hub.endpoint(Role::Wallet, &format!("{}/wallet_b", test_dir)),
		&format!("{}/wallet_b", test_dir),
		"Bob",
		engine_map,
	)
	.unwrap();

	TestNet {
		engine,
		bank,
		wallet_a,
		wallet_b,
		engine_dest,
		bank_dest,
		hub,
		test_dir: test_dir.to_string(),
	}
}

/// Blocks until the bus delivers an event of the given kind, skipping
/// unrelated ones.
fn wait_for(rx: &Receiver<Event>, kind: &str) -> Event {
	let deadline = Instant::now() + Duration::from_secs(10);
	loop {
		let remaining = deadline
			.checked_duration_since(Instant::now())
			.unwrap_or_else(|| panic!("timed out waiting for event {}", kind));
		let event = rx
			.recv_timeout(remaining)
			.unwrap_or_else(|_| panic!("timed out waiting for event {}", kind));
		if event.kind == kind {
			return event;
		}
	}
}

/// Runs the bank-registration handshake: bank asks, engine operator
/// approves, bank records the binding.
fn register_bank(net: &TestNet) {
	let engine_events = net.engine.events();
	let bank_events = net.bank.events();

	net.bank.register_at_engine(&net.engine_dest).unwrap();
	wait_for(&engine_events, "new_request");

	net.engine.approve_request(0).unwrap();
	wait_for(&bank_events, "issuer_registered");

	let data = net.bank.data();
	assert!(data.registered_at_engine);
	assert_eq!(data.engine_address.as_deref(), Some(net.engine_dest.as_str()));
	assert_eq!(data.engine_endpoint.as_deref(), Some(ENGINE_ENDPOINT));
}

#[test]
fn full_lifecycle_issue_and_pay() {
	let test_dir = "test_output/servers_full_lifecycle";
	let net = setup_net(test_dir);

	register_bank(&net);

	// wallet A asks the bank for two coins
	let bank_events = net.bank.events();
	let wallet_a_events = net.wallet_a.events();
	net.wallet_a.request_coins(&net.bank_dest, 2, None).unwrap();
	wait_for(&bank_events, "new_request");

	// the bank operator approves; the engine registers and pushes both
	// deliveries to wallet A
	net.bank.approve_request(0, None, None).unwrap();
	wait_for(&wallet_a_events, "coin_received");
	wait_for(&wallet_a_events, "coin_received");

	assert_eq!(net.wallet_a.balance(), 2);
	let log = net.wallet_a.transaction_log();
	assert_eq!(log.len(), 2);
	assert!(log.iter().all(|e| e.action == "ontvangen van bank"));
	let coin_requests = net.wallet_a.outgoing_coin_requests();
	assert_eq!(coin_requests[0].status, RequestStatus::Approved);

	// the coin request is fully served
	let engine_coins = net.engine.engine().list_coins().unwrap();
	assert_eq!(engine_coins.len(), 2);

	// wallet B asks wallet A for one coin
	let wallet_b_events = net.wallet_b.events();
	net.wallet_b
		.request_payment(&net.wallet_a.dest_hash(), 1, Some("lunch".to_string()))
		.unwrap();
	wait_for(&wallet_a_events, "payment_request");

	// wallet A's operator approves and pays
	let sent = net.wallet_a.approve_payment(0, None, None).unwrap();
	assert_eq!(sent, 1);
	wait_for(&wallet_a_events, "tx_confirmed");
	wait_for(&wallet_b_events, "coin_received");

	assert_eq!(net.wallet_a.balance(), 1);
	assert_eq!(net.wallet_b.balance(), 1);

	// ledgers on both sides agree on the outcome
	let a_requests = net.wallet_a.incoming_requests();
	assert_eq!(a_requests[0].status, RequestStatus::Paid);
	let b_log = net.wallet_b.transaction_log();
	assert_eq!(b_log[0].action, "betaling ontvangen");
	assert_eq!(b_log[0].description.as_deref(), Some("lunch"));

	// spending an already-spent coin fails locally
	let spent_coin = net
		.wallet_b
		.transaction_log()
		.first()
		.map(|e| e.coin_id.clone())
		.unwrap();
	let (_, pk) = pkicash_keychain::generate_keypair();
	match net
		.wallet_a
		.pay(&spent_coin, &pk, &net.wallet_b.dest_hash(), None)
		.unwrap_err()
	{
		Error::Wallet(_) => (),
		e => panic!("expected Wallet error, got {:?}", e),
	}

	clean_output_dir(test_dir);
}

#[test]
fn declined_coin_request_flows_back() {
	let test_dir = "test_output/servers_declined_coin_request";
	let net = setup_net(test_dir);

	register_bank(&net);

	let bank_events = net.bank.events();
	let wallet_a_events = net.wallet_a.events();
	net.wallet_a.request_coins(&net.bank_dest, 1, None).unwrap();
	wait_for(&bank_events, "new_request");

	net.bank.decline_request(0, "no coins for you").unwrap();
	wait_for(&wallet_a_events, "coin_request_declined");

	assert_eq!(net.wallet_a.balance(), 0);
	// approving after declining is rejected; the transition is frozen
	match net.bank.approve_request(0, None, None).unwrap_err() {
		Error::RequestAlreadySettled => (),
		e => panic!("expected RequestAlreadySettled, got {:?}", e),
	}

	clean_output_dir(test_dir);
}

#[test]
fn declined_payment_request_flows_back() {
	let test_dir = "test_output/servers_declined_payment";
	let net = setup_net(test_dir);

	let wallet_a_events = net.wallet_a.events();
	let wallet_b_events = net.wallet_b.events();

	net.wallet_b
		.request_payment(&net.wallet_a.dest_hash(), 1, None)
		.unwrap();
	wait_for(&wallet_a_events, "payment_request");

	net.wallet_a.decline_request(0, "not today").unwrap();
	wait_for(&wallet_b_events, "payment_declined");

	assert_eq!(
		net.wallet_a.incoming_requests()[0].status,
		RequestStatus::Declined
	);
	let outgoing = net.wallet_b.outgoing_payment_requests();
	assert_eq!(outgoing.len(), 1);
	assert_eq!(outgoing[0].status, RequestStatus::Declined);

	clean_output_dir(test_dir);
}

#[test]
fn declined_issuer_registration_flows_back() {
	let test_dir = "test_output/servers_declined_issuer";
	let net = setup_net(test_dir);

	let engine_events = net.engine.events();
	let bank_events = net.bank.events();

	net.bank.register_at_engine(&net.engine_dest).unwrap();
	wait_for(&engine_events, "new_request");

	net.engine.decline_request(0, "unknown bank").unwrap();
	wait_for(&bank_events, "request_declined");

	assert!(!net.bank.data().registered_at_engine);
	assert!(net.engine.engine().list_issuers().unwrap().is_empty());

	clean_output_dir(test_dir);
}

#[test]
fn accepting_a_payment_request_returns_a_key() {
	let test_dir = "test_output/servers_accept_request";
	let net = setup_net(test_dir);

	let wallet_a_events = net.wallet_a.events();
	let wallet_b_events = net.wallet_b.events();

	// B asks A; A hands B a receive key instead of paying
	net.wallet_b
		.request_payment(&net.wallet_a.dest_hash(), 1, None)
		.unwrap();
	wait_for(&wallet_a_events, "payment_request");

	let pk_hex = net.wallet_a.accept_request(0).unwrap();
	let event = wait_for(&wallet_b_events, "payment_response");
	assert_eq!(event.data["pk"], pk_hex);

	let responses = net.wallet_b.received_responses();
	assert_eq!(responses.len(), 1);
	assert_eq!(responses[0].pk, pk_hex);
	assert_eq!(
		net.wallet_a.incoming_requests()[0].status,
		RequestStatus::Accepted
	);

	clean_output_dir(test_dir);
}

#[test]
fn unmapped_engine_endpoint_blocks_payment() {
	let test_dir = "test_output/servers_unmapped_engine";
	let net = setup_net(test_dir);

	register_bank(&net);

	// wallet C has no engine mapping configured
	let wallet_c = WalletServer::start(
		net.hub
			.endpoint(Role::Wallet, &format!("{}/wallet_c", net.test_dir)),
		&format!("{}/wallet_c", net.test_dir),
		"Carol",
		HashMap::new(),
	)
	.unwrap();

	let bank_events = net.bank.events();
	let wallet_c_events = wallet_c.events();
	wallet_c.request_coins(&net.bank_dest, 1, None).unwrap();
	wait_for(&bank_events, "new_request");
	net.bank.approve_request(0, None, None).unwrap();
	wait_for(&wallet_c_events, "coin_received");

	// receiving works, but spending requires an explicit engine mapping
	let coin_id = wallet_c.coins()[0].0.clone();
	let (_, pk) = pkicash_keychain::generate_keypair();
	match wallet_c
		.pay(&coin_id, &pk, &net.wallet_a.dest_hash(), None)
		.unwrap_err()
	{
		Error::UnmappedEngine(endpoint) => assert_eq!(endpoint, ENGINE_ENDPOINT),
		e => panic!("expected UnmappedEngine, got {:?}", e),
	}
	// the coin is still there, nothing was spent
	assert_eq!(wallet_c.balance(), 1);

	clean_output_dir(test_dir);
}
