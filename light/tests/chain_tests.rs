use lds_chain_core::{Address, BlockNumber, Log};
use lds_hashes::Hash;
use lds_light::{
    chain::{ChainError, InsertStatus},
    config::Config,
    odr::{OdrError, RetrievalRequest},
    test_helpers::{ChainFixture, FixtureBlock, TestEnv},
};
use lds_notify::{events::EventType, notification::Notification, subscription::Subscription};
use lds_utils::triggers::CancelSignal;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

fn config() -> Config {
    Config { bloom_section_size: 10, ..Default::default() }
}

fn drain(subscription: &Subscription) -> Vec<Notification> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

fn header_hashes(notifications: &[Notification]) -> Vec<Hash> {
    notifications
        .iter()
        .map(|notification| match notification {
            Notification::NewHeads(header) | Notification::ChainSide(header) | Notification::Chain(header) => header.hash,
            other => panic!("unexpected notification {other}"),
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_head_selectors() {
    let fixture = ChainFixture::linear(8);
    let env = TestEnv::with_fixture(config(), &fixture);
    let tip = fixture.tip();

    assert_eq!(env.chain.head_header().hash, tip.hash);
    let head = env.chain.chain_head();
    assert_eq!((head.hash, head.number, head.td), (tip.hash, 7, 8));
    for selector in [BlockNumber::Latest, BlockNumber::Pending] {
        assert_eq!(env.chain.header_at(selector).unwrap().unwrap().hash, tip.hash);
    }
    assert_eq!(env.chain.header_at(BlockNumber::Earliest).unwrap().unwrap().hash, fixture.header(0).hash);
    assert_eq!(env.chain.header_at(BlockNumber::Number(3)).unwrap().unwrap().hash, fixture.header(3).hash);
    assert!(env.chain.header_at(BlockNumber::Number(8)).unwrap().is_none());
    assert_eq!(env.chain.td_by_hash(fixture.header(3).hash).unwrap(), Some(4));
    assert_eq!(env.chain.header_by_hash(fixture.header(5).hash).unwrap().unwrap().number, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_insert_header_validation() {
    let fixture = ChainFixture::linear(6);
    let env = TestEnv::with_fixture(config(), &fixture);

    assert_eq!(env.chain.insert_header(fixture.header(3).as_ref().clone()).unwrap(), InsertStatus::Known);
    assert_eq!(env.chain.insert_header(fixture.tip().as_ref().clone()).unwrap(), InsertStatus::Known);

    let mut tampered = FixtureBlock::child_of(fixture.tip(), 0, 1, vec![], None).header.as_ref().clone();
    tampered.timestamp += 1;
    assert!(matches!(env.chain.insert_header(tampered), Err(ChainError::InvalidHeader(6, _))));

    let orphan = FixtureBlock::child_of(&FixtureBlock::child_of(fixture.tip(), 0, 1, vec![], None).header, 0, 1, vec![], None);
    assert!(matches!(env.chain.insert_header(orphan.header.as_ref().clone()), Err(ChainError::UnknownParent(7, _))));
    assert_eq!(env.chain.chain_head().number, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reorg_to_heavier_branch() {
    let emitter = Address::repeat_byte(7);
    let logs = move |number: u64| match number {
        9 | 10 => vec![Log::new(emitter, vec![Hash::from_u64_word(number)], vec![])],
        _ => vec![],
    };
    let fixture = ChainFixture::build(11, logs, |_| None);
    let env = TestEnv::with_fixture(config(), &fixture);
    let never = CancelSignal::never();

    // Receipts of the blocks about to be retracted are known locally
    for number in [9, 10] {
        env.chain.block_receipts(fixture.header(number).hash, &never).await.unwrap();
    }
    let branch_logs = move |number: u64| match number {
        10 => vec![Log::new(emitter, vec![Hash::from_u64_word(1010)], vec![])],
        _ => vec![],
    };
    let branch = fixture.branch(8, 3, 5, 1, branch_logs);
    branch.iter().for_each(|block| block.serve_by_hash(&env.provider));
    env.chain.receipts_of(&branch[1].header, &never).await.unwrap();

    let side = env.notifier.subscribe(EventType::ChainSide, None);
    let canonical = env.notifier.subscribe(EventType::Chain, None);
    let heads = env.notifier.subscribe(EventType::NewHeads, None);
    let removed = env.notifier.subscribe(EventType::RemovedLogs, None);
    let added = env.notifier.subscribe(EventType::Logs, None);

    // Equal or lighter branches do not take over
    assert_eq!(env.chain.insert_header(branch[0].header.as_ref().clone()).unwrap(), InsertStatus::SideChain);
    assert_eq!(env.chain.insert_header(branch[1].header.as_ref().clone()).unwrap(), InsertStatus::SideChain);
    assert_eq!(env.chain.chain_head().hash, fixture.tip().hash);
    assert_eq!(header_hashes(&drain(&side)), vec![branch[0].header.hash, branch[1].header.hash]);

    assert_eq!(env.chain.insert_header(branch[2].header.as_ref().clone()).unwrap(), InsertStatus::Canonical);
    let head = env.chain.chain_head();
    assert_eq!((head.hash, head.number, head.td), (branch[2].header.hash, 11, 12));
    for (offset, block) in branch.iter().enumerate() {
        assert_eq!(env.chain.header_by_number(9 + offset as u64).unwrap().unwrap().hash, block.header.hash);
    }
    assert_eq!(env.chain.header_by_number(8).unwrap().unwrap().hash, fixture.header(8).hash);
    // Retracted headers are still known by hash
    assert!(env.chain.header_by_hash(fixture.header(10).hash).unwrap().is_some());

    assert_eq!(header_hashes(&drain(&side)), vec![fixture.header(10).hash, fixture.header(9).hash]);
    assert_eq!(header_hashes(&drain(&canonical)), branch.iter().map(|block| block.header.hash).collect::<Vec<_>>());
    assert_eq!(header_hashes(&drain(&heads)), vec![branch[2].header.hash]);

    let removed = drain(&removed);
    assert_eq!(removed.len(), 1);
    let Notification::RemovedLogs(logs) = &removed[0] else { panic!("unexpected notification {}", removed[0]) };
    assert_eq!(logs.iter().map(|log| (log.block_number, log.removed)).collect::<Vec<_>>(), vec![(10, true), (9, true)]);

    let added = drain(&added);
    assert_eq!(added.len(), 1);
    let Notification::Logs(logs) = &added[0] else { panic!("unexpected notification {}", added[0]) };
    assert_eq!(logs.len(), 1);
    assert_eq!((logs[0].block_hash, logs[0].topics[0], logs[0].removed), (branch[1].header.hash, Hash::from_u64_word(1010), false));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_set_head_rolls_back() {
    let fixture = ChainFixture::linear(21);
    let env = TestEnv::with_fixture(config(), &fixture);
    let (_, halt) = env.chain.head_with_halt_listener();

    assert!(matches!(env.chain.set_head(25), Err(ChainError::UnknownCanonical(25))));
    assert!(!halt.is_triggered());

    env.chain.set_head(15).unwrap();
    assert!(halt.is_triggered());
    assert!(!env.chain.head_with_halt_listener().1.is_triggered());
    let head = env.chain.chain_head();
    assert_eq!((head.hash, head.number, head.td), (fixture.header(15).hash, 15, 16));
    assert_eq!(env.chain.head_header().hash, fixture.header(15).hash);
    for number in 16..=20 {
        assert!(env.chain.header_by_number(number).unwrap().is_none());
    }

    // Re-extending with the very same headers makes them canonical again
    for number in 16..=20 {
        assert_eq!(env.chain.insert_header(fixture.header(number).as_ref().clone()).unwrap(), InsertStatus::Canonical);
    }
    assert_eq!(env.chain.chain_head().hash, fixture.tip().hash);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_late_answer_does_not_recanonicalize() {
    let fixture = ChainFixture::linear(61);
    let env = TestEnv::with_checkpoint(config(), &fixture, 40);
    env.provider.set_delay(|_, _| Duration::from_millis(200));

    let pending = {
        let odr = env.odr().clone();
        tokio::spawn(async move { odr.resolve(RetrievalRequest::HeaderByNumber(59), &CancelSignal::never()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    env.chain.set_head(40).unwrap();
    // Height 59 is above the rolled back head, so the answer has nothing to be verified against
    assert_eq!(pending.await.unwrap().unwrap_err(), OdrError::NotFound);

    assert_eq!(env.chain.chain_head().number, 40);
    assert!(env.chain.header_by_number(59).unwrap().is_none());
    assert!(env.chain.header_by_number_odr(59, &CancelSignal::never()).await.unwrap().is_none());
    assert!(env.chain.header_by_hash(fixture.header(59).hash).unwrap().is_none());
}

#[test]
fn test_halt_listener_comes_with_its_head() {
    let fixture = ChainFixture::linear(21);
    let env = TestEnv::with_fixture(config(), &fixture);

    for round in 0..200 {
        let observed = std::thread::scope(|scope| {
            let readers = (0..2)
                .map(|_| scope.spawn(|| (0..50).map(|_| env.chain.head_with_halt_listener()).collect::<Vec<_>>()))
                .collect::<Vec<_>>();
            env.chain.set_head(10).unwrap();
            readers.into_iter().flat_map(|reader| reader.join().unwrap()).collect::<Vec<_>>()
        });
        // The old head always comes with the listener fired by the rollback, the new one with a live listener
        for (head, halt) in observed {
            match halt.is_triggered() {
                true => assert_eq!(head.number, 20, "round {round}"),
                false => assert_eq!(head.number, 10, "round {round}"),
            }
        }
        for number in 11..=20 {
            env.chain.insert_header(fixture.header(number).as_ref().clone()).unwrap();
        }
    }
}

#[test]
fn test_head_is_never_torn() {
    let fixture = ChainFixture::linear(21);
    let env = TestEnv::with_fixture(config(), &fixture);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let snapshot = env.chain.head_snapshot();
                    assert_eq!(snapshot.header.hash, snapshot.head.hash);
                    assert_eq!(snapshot.header.number, snapshot.head.number);
                    assert_eq!(snapshot.head.td, snapshot.head.number as u128 + 1);
                    let latest = env.chain.header_at(BlockNumber::Latest).unwrap().unwrap();
                    assert_eq!(fixture.header(latest.number).hash, latest.hash);
                }
            });
        }
        for round in 0..30u64 {
            env.chain.set_head(10 + round % 5).unwrap();
            for number in 11 + round % 5..=20 {
                env.chain.insert_header(fixture.header(number).as_ref().clone()).unwrap();
            }
        }
        done.store(true, Ordering::Relaxed);
    });
    assert_eq!(env.chain.chain_head().number, 20);
}
