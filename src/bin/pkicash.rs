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

//! Main entry point: inspects actor state on disk and runs the in-process
//! demo harness that drives all four roles through a full coin lifecycle.

use std::path::Path;
use std::process::exit;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use clap::{App, Arg, ArgMatches, SubCommand};
use log::info;

use pkicash_config as config;
use pkicash_config::GlobalConfig;
use pkicash_engine::StateEngine;
use pkicash_servers::{BankServer, EngineServer, Event, WalletServer};
use pkicash_transport::{MemoryHub, Role, Transport};
use pkicash_util::init_logger;
use pkicash_wallet::Wallet;

fn main() {
	let args = App::new("pkicash")
		.version("0.1.0")
		.author("The PKICash Team")
		.about("Offline-capable digital cash over an unreliable mesh transport.")
		.arg(
			Arg::with_name("dir")
				.short("d")
				.long("dir")
				.help("Base directory holding pkicash.toml and actor data")
				.takes_value(true)
				.default_value("."),
		)
		.subcommand(
			SubCommand::with_name("demo")
				.about("Run engine, bank and two wallets in-process through a full lifecycle"),
		)
		.subcommand(
			SubCommand::with_name("engine")
				.about("Show the engine's ledger state")
		)
		.subcommand(
			SubCommand::with_name("wallet")
				.about("Show a wallet's balance, coins and history")
				.arg(
					Arg::with_name("log")
						.long("log")
						.help("Also print the transaction log"),
				),
		)
		.get_matches();

	let base_dir = args.value_of("dir").unwrap().to_string();
	let config = match config::initial_setup(Path::new(&base_dir)) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("could not load configuration: {}", e);
			exit(1);
		}
	};
	init_logger(Some(config.members.logging.clone()));

	let res = match args.subcommand() {
		("demo", Some(_)) => cmd_demo(&base_dir, &config),
		("engine", Some(_)) => cmd_engine(&base_dir, &config),
		("wallet", Some(m)) => cmd_wallet(&base_dir, &config, m),
		_ => {
			eprintln!("{}", args.usage());
			Ok(())
		}
	};

	if let Err(e) = res {
		eprintln!("error: {}", e);
		exit(1);
	}
}

fn cmd_engine(base_dir: &str, config: &GlobalConfig) -> Result<(), String> {
	let data_dir = join(base_dir, &config.members.engine.data_dir);
	let key_path = Path::new(&data_dir).join("engine.key");
	let engine =
		StateEngine::open(&data_dir, &key_path).map_err(|e| format!("{}", e))?;

	println!("engine public key: {}", engine.public_key());
	println!("trusted issuers:");
	for pk in engine.list_issuers().map_err(|e| format!("{}", e))? {
		println!("  {}", pk);
	}
	println!("coins:");
	for state in engine.list_coins().map_err(|e| format!("{}", e))? {
		println!(
			"  {}  value {}  owner {}",
			state.coin_id, state.coin.value, state.pk_current
		);
	}
	Ok(())
}

fn cmd_wallet(base_dir: &str, config: &GlobalConfig, m: &ArgMatches<'_>) -> Result<(), String> {
	let data_dir = join(base_dir, &config.members.wallet.data_dir);
	let wallet = Wallet::open(&data_dir, "").map_err(|e| format!("{}", e))?;

	println!("address: {}", wallet.address());
	println!("balance: {}", wallet.get_balance());
	println!("coins:");
	for (coin_id, value) in wallet.list_coins() {
		println!("  {}  value {}", coin_id, value);
	}
	if m.is_present("log") {
		println!("history:");
		for entry in wallet.transaction_log() {
			println!(
				"  {}  {}  {}  {}",
				entry.timestamp,
				entry.action,
				entry.coin_id,
				entry.value.map(|v| v.to_string()).unwrap_or_default()
			);
		}
	}
	Ok(())
}

/// Wires all four actors over an in-process hub and walks them through a
/// full lifecycle: registration, issuance, and a wallet-to-wallet payment.
fn cmd_demo(base_dir: &str, config: &GlobalConfig) -> Result<(), String> {
	let members = &config.members;
	let hub = MemoryHub::new();

	let engine_dir = join(base_dir, &members.engine.data_dir);
	let engine_transport = hub.endpoint(Role::Engine, &engine_dir);
	let engine_dest = engine_transport.dest_hash();
	let engine = EngineServer::start(
		engine_transport,
		&engine_dir,
		&members.engine.name,
		&members.engine.endpoint,
	)
	.map_err(|e| format!("{}", e))?;

	let bank_dir = join(base_dir, &members.bank.data_dir);
	let bank_transport = hub.endpoint(Role::Bank, &bank_dir);
	let bank_dest = bank_transport.dest_hash();
	let bank = BankServer::start(
		bank_transport,
		&bank_dir,
		&members.bank.name,
		members.bank.coin_value,
	)
	.map_err(|e| format!("{}", e))?;

	let mut engine_map = members.engine_map.clone();
	engine_map.insert(members.engine.endpoint.clone(), engine_dest.clone());

	let alice_dir = join(base_dir, "data/wallet-alice");
	let alice = WalletServer::start(
		hub.endpoint(Role::Wallet, &alice_dir),
		&alice_dir,
		"Alice",
		engine_map.clone(),
	)
	.map_err(|e| format!("{}", e))?;
	let bob_dir = join(base_dir, "data/wallet-bob");
	let bob = WalletServer::start(
		hub.endpoint(Role::Wallet, &bob_dir),
		&bob_dir,
		"Bob",
		engine_map,
	)
	.map_err(|e| format!("{}", e))?;

	let engine_events = engine.events();
	let bank_events = bank.events();
	let alice_events = alice.events();
	let bob_events = bob.events();

	// bank registers with the engine; the engine operator approves
	println!("registering bank at engine …");
	bank.register_at_engine(&engine_dest)
		.map_err(|e| format!("{}", e))?;
	wait_for(&engine_events, "new_request")?;
	engine.approve_request(0).map_err(|e| format!("{}", e))?;
	wait_for(&bank_events, "issuer_registered")?;

	// Alice asks for three coins; the bank operator approves
	println!("requesting coins for Alice …");
	alice
		.request_coins(&bank_dest, 3, None)
		.map_err(|e| format!("{}", e))?;
	wait_for(&bank_events, "new_request")?;
	bank.approve_request(0, None, None)
		.map_err(|e| format!("{}", e))?;
	for _ in 0..3 {
		wait_for(&alice_events, "coin_received")?;
	}
	println!("Alice's balance: {}", alice.balance());

	// Bob asks Alice for a payment; Alice approves
	println!("Bob requests a payment from Alice …");
	bob.request_payment(&alice.dest_hash(), 1, Some("demo".to_string()))
		.map_err(|e| format!("{}", e))?;
	wait_for(&alice_events, "payment_request")?;
	alice
		.approve_payment(0, None, None)
		.map_err(|e| format!("{}", e))?;
	wait_for(&bob_events, "coin_received")?;

	println!("Alice's balance: {}", alice.balance());
	println!("Bob's balance:   {}", bob.balance());
	info!("demo complete");
	Ok(())
}

fn wait_for(rx: &Receiver<Event>, kind: &str) -> Result<Event, String> {
	let deadline = Duration::from_secs(15);
	loop {
		let event = rx
			.recv_timeout(deadline)
			.map_err(|_| format!("timed out waiting for {}", kind))?;
		if event.kind == kind {
			return Ok(event);
		}
	}
}

fn join(base_dir: &str, rel: &str) -> String {
	Path::new(base_dir).join(rel).to_string_lossy().into_owned()
}
