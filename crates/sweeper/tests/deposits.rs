use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::primitives::{Address, Bytes, U256, utils::parse_ether};
use deposit_sweeper::{
    Network,
    config::MonitorConfig,
    error::LedgerError,
    keys::PlaintextKeys,
    monitor::{Monitor, StartupError},
    registry::AddressRegistry,
    repository::MemoryStore,
    scanner::{BlockCursor, Scanner, Step},
    sweep::Sweeper,
    testing::{self, MockLedger},
    types::DepositRecord,
};
use fastnum::{UD128, udec128};
use tokio_util::sync::CancellationToken;

type TestSweeper = Sweeper<MockLedger, MemoryStore, MemoryStore, PlaintextKeys>;

struct Env {
    ledger: Arc<MockLedger>,
    store: Arc<MemoryStore>,
    config: Arc<MonitorConfig>,
    registry: Arc<AddressRegistry>,
    sweeper: Arc<TestSweeper>,
    core: Address,
    /// Watched sub-wallet, id 7.
    a: Address,
}

impl Env {
    async fn new() -> Self {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_gas_price(5_000_000_000);
        let core = testing::signer(1);
        ledger.set_native_balance(core.address(), parse_ether("1").unwrap());

        let store = Arc::new(MemoryStore::with_wallets([testing::wallet(7, 2)]));
        let config =
            Arc::new(MonitorConfig::new(testing::network(), core.address(), core.clone()).unwrap());
        let registry = Arc::new(AddressRegistry::new());
        registry.refresh(&*store).await.unwrap();
        let sweeper = Arc::new(Sweeper::new(
            config.clone(),
            ledger.clone(),
            store.clone(),
            store.clone(),
            Arc::new(PlaintextKeys),
        ));

        Self {
            ledger,
            store,
            config,
            registry,
            sweeper,
            core: core.address(),
            a: testing::signer(2).address(),
        }
    }

    fn scanner(&self, height: u64) -> Scanner<MockLedger, TestSweeper> {
        Scanner::with_cursor(
            self.config.clone(),
            self.ledger.clone(),
            self.registry.clone(),
            self.sweeper.clone(),
            BlockCursor::new(height),
        )
    }
}

/// Watched address with a live balance of 50 gets swept and credited once.
#[tokio::test]
async fn deposit_is_swept_and_recorded() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(50));
    // the amount in calldata doesn't matter
    let deposit = testing::transfer_tx(0x01, env.a, testing::tokens(3));
    let height = env.ledger.push_block(vec![deposit.clone()]);

    let mut scanner = env.scanner(height);
    assert!(matches!(scanner.step().await, Step::Processed { swept: 1, .. }));
    assert_eq!(scanner.cursor().next(), height + 1);

    let sent = env.ledger.submitted();
    assert_eq!(sent.len(), 2);
    // gas top-up from the core wallet: 60000 * 5 gwei
    assert_eq!((sent[0].from, sent[0].to), (env.core, env.a));
    assert_eq!(sent[0].value, parse_ether("0.0003").unwrap());
    // token sweep from the sub-wallet
    assert_eq!((sent[1].from, sent[1].to), (env.a, testing::TOKEN));
    assert!(sent[1].success);

    assert_eq!(env.ledger.token_balance_of(env.a), U256::ZERO);
    assert_eq!(env.ledger.token_balance_of(env.core), testing::tokens(50));
    assert_eq!(
        env.store.deposits(),
        vec![DepositRecord {
            sub_wallet_id: 7,
            currency_id: 2,
            amount: udec128!(50),
            fee: UD128::ZERO,
            tx_hash: deposit.hash,
        }]
    );
}

#[tokio::test]
async fn deposit_below_minimum_is_dropped() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(5));
    let height = env.ledger.push_block(vec![testing::transfer_tx(0x01, env.a, testing::tokens(5))]);

    let mut scanner = env.scanner(height);
    assert!(matches!(scanner.step().await, Step::Processed { swept: 0, .. }));

    assert!(env.ledger.submitted().is_empty());
    assert!(env.store.deposits().is_empty());
    assert_eq!(env.ledger.token_balance_of(env.a), testing::tokens(5));
}

/// Balance that didn't clear the minimum is swept once a later transfer
/// lifts it over.
#[tokio::test]
async fn accumulated_balance_is_swept_on_next_transfer() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(5));
    let first = env.ledger.push_block(vec![testing::transfer_tx(0x01, env.a, testing::tokens(5))]);
    let mut scanner = env.scanner(first);
    scanner.step().await;
    assert!(env.store.deposits().is_empty());

    env.ledger.set_token_balance(env.a, testing::tokens(12));
    let second = testing::transfer_tx(0x02, env.a, testing::tokens(7));
    env.ledger.push_block(vec![second.clone()]);
    assert!(matches!(scanner.step().await, Step::Processed { swept: 1, .. }));

    let deposits = env.store.deposits();
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].amount, udec128!(12));
    assert_eq!(deposits[0].tx_hash, second.hash);
}

#[tokio::test]
async fn short_payload_is_not_a_transfer() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(50));
    let mut tx = testing::transfer_tx(0x01, env.a, testing::tokens(50));
    tx.input = Bytes::copy_from_slice(&tx.input[..40]);
    let height = env.ledger.push_block(vec![tx]);

    let mut scanner = env.scanner(height);
    assert!(matches!(scanner.step().await, Step::Processed { swept: 0, .. }));
    assert_eq!(scanner.cursor().next(), height + 1);
    assert!(env.ledger.submitted().is_empty());
}

/// Block reads fail twice, the scanner backs off twice without moving and
/// then processes the block exactly once.
#[tokio::test(start_paused = true)]
async fn block_failures_back_off_without_advancing() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(50));
    let deposit = testing::transfer_tx(0x01, env.a, testing::tokens(50));
    let height = env.ledger.push_block(vec![deposit.clone()]);
    env.ledger
        .fail_block(height, LedgerError::Connectivity("connection refused".to_string()), 2);

    let pauses = Arc::new(Mutex::new(Vec::new()));
    let sleep = {
        let pauses = pauses.clone();
        move |duration: Duration| {
            pauses.lock().unwrap().push(duration);
            tokio::time::sleep(duration)
        }
    };
    let cancel = CancellationToken::new();
    let scan = tokio::spawn(env.scanner(height).run(cancel.clone(), sleep));

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(env.store.deposits().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    cancel.cancel();
    let cursor = scan.await.unwrap();

    assert_eq!(cursor.next(), height + 1);
    let pauses = pauses.lock().unwrap().clone();
    assert_eq!(pauses[..2], [Duration::from_secs(5), Duration::from_secs(5)]);
    assert!(pauses[2..].iter().all(|p| *p == Duration::from_secs(2)));
    assert_eq!(env.store.deposits().len(), 1);
    assert_eq!(env.store.deposits()[0].tx_hash, deposit.hash);
}

#[tokio::test(start_paused = true)]
async fn rpc_errors_use_short_backoff() {
    let env = Env::new().await;
    let height = env.ledger.push_block(vec![]);
    env.ledger.fail_block(height, LedgerError::Rpc("header not found".to_string()), 1);

    let pauses = Arc::new(Mutex::new(Vec::new()));
    let sleep = {
        let pauses = pauses.clone();
        move |duration: Duration| {
            pauses.lock().unwrap().push(duration);
            tokio::time::sleep(duration)
        }
    };
    let cancel = CancellationToken::new();
    let scan = tokio::spawn(env.scanner(height).run(cancel.clone(), sleep));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();

    assert_eq!(scan.await.unwrap().next(), height + 1);
    assert_eq!(pauses.lock().unwrap()[0], Duration::from_secs(1));
}

#[tokio::test]
async fn failed_gas_funding_never_transfers_tokens() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(50));
    env.ledger.set_native_balance(env.core, U256::ZERO);
    let height = env.ledger.push_block(vec![testing::transfer_tx(0x01, env.a, testing::tokens(50))]);

    let mut scanner = env.scanner(height);
    // sweep failures don't hold the scan back
    assert!(matches!(scanner.step().await, Step::Processed { swept: 0, .. }));

    assert!(env.ledger.submitted().is_empty());
    assert_eq!(env.ledger.token_balance_of(env.a), testing::tokens(50));
    assert!(env.store.deposits().is_empty());
}

#[tokio::test]
async fn rescanned_block_does_not_double_credit() {
    let env = Env::new().await;
    env.ledger.set_token_balance(env.a, testing::tokens(50));
    let height = env.ledger.push_block(vec![testing::transfer_tx(0x01, env.a, testing::tokens(50))]);

    env.scanner(height).step().await;
    // e.g. restart at the same height, balance topped up again meanwhile
    env.ledger.set_token_balance(env.a, testing::tokens(50));
    env.scanner(height).step().await;

    assert_eq!(env.store.deposits().len(), 1);
    assert_eq!(env.store.balance(7, 2), udec128!(50));
}

#[tokio::test(start_paused = true)]
async fn monitor_sweeps_new_blocks_until_shutdown() {
    let env = Env::new().await;
    let handle = Monitor::start(env.sweeper.clone()).await.unwrap();
    assert_eq!(handle.health().size, 1);

    env.ledger.set_token_balance(env.a, testing::tokens(50));
    let deposit = testing::transfer_tx(0x01, env.a, testing::tokens(50));
    let height = env.ledger.push_block(vec![deposit.clone()]);

    // new sub-wallet shows up on the next refresh
    let b = testing::wallet(8, 3);
    env.store.add_wallet(b.clone());
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(handle.registry().contains(&b.address));

    let cursor = handle.shutdown().await.unwrap();
    assert_eq!(cursor.next(), height + 1);
    assert_eq!(env.store.deposits().len(), 1);
    assert_eq!(env.store.deposits()[0].tx_hash, deposit.hash);
}

#[tokio::test]
async fn monitor_refuses_wrong_chain() {
    let env = Env::new().await;
    let core = testing::signer(1);
    let config = MonitorConfig::new(
        Network::custom(56, testing::TOKEN, 18, 18),
        core.address(),
        core,
    )
    .unwrap();

    let sweeper = Sweeper::new(
        Arc::new(config),
        env.ledger.clone(),
        env.store.clone(),
        env.store.clone(),
        Arc::new(PlaintextKeys),
    );

    let err = Monitor::start(Arc::new(sweeper)).await.err().unwrap();
    assert!(matches!(err, StartupError::ChainMismatch { expected: 56, actual: testing::CHAIN_ID }));
}

#[tokio::test]
async fn monitor_requires_reachable_ledger() {
    let env = Env::new().await;
    env.ledger.fail_head(LedgerError::Connectivity("connection refused".to_string()), 1);

    let err = Monitor::start(env.sweeper.clone()).await.err().unwrap();
    assert!(matches!(err, StartupError::Ledger(e) if e.is_connectivity()));
}

/// Withdrawal paid out while the monitor tops up a sub-wallet from the same
/// core wallet.
#[tokio::test(start_paused = true)]
async fn withdrawal_while_monitor_runs_shares_core_nonces() {
    let env = Env::new().await;
    // wide enough for the scanner to reach the top-up mid-withdrawal
    env.ledger.set_nonce_latency(Duration::from_secs(3));
    env.ledger.set_token_balance(env.core, testing::tokens(100));
    let handle = Monitor::start(env.sweeper.clone()).await.unwrap();

    env.ledger.set_token_balance(env.a, testing::tokens(50));
    let deposit = testing::transfer_tx(0x01, env.a, testing::tokens(50));
    let height = env.ledger.push_block(vec![deposit.clone()]);

    let payout = Address::repeat_byte(0x99);
    let withdrawal = env.sweeper.withdraw_from_core(payout, udec128!(10)).await.unwrap();
    assert_eq!(withdrawal.amount, udec128!(10));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let cursor = handle.shutdown().await.unwrap();
    assert_eq!(cursor.next(), height + 1);

    let core_txs = env
        .ledger
        .submitted()
        .into_iter()
        .filter(|tx| tx.from == env.core)
        .collect::<Vec<_>>();
    assert_eq!(core_txs.len(), 2);
    assert!(core_txs.iter().all(|tx| tx.success));
    assert_eq!(core_txs.iter().map(|tx| tx.nonce).collect::<Vec<_>>(), [0, 1]);

    assert_eq!(env.ledger.token_balance_of(payout), testing::tokens(10));
    assert_eq!(env.ledger.token_balance_of(env.core), testing::tokens(140));
    assert_eq!(env.store.deposits().len(), 1);
    assert_eq!(env.store.deposits()[0].tx_hash, deposit.hash);
}
