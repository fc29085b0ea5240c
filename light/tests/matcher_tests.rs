use itertools::Itertools;
use lds_chain_core::{Address, Bloom, Log, LogFilter};
use lds_hashes::Hash;
use lds_light::{
    bloombits::{BloomStatus, InterruptReason, Matcher, MatcherError},
    config::Config,
    odr::{OdrError, ProviderError, RetrievalRequest},
    test_helpers::{ChainFixture, TestEnv},
};
use std::time::Duration;

const EMITTER: Address = Address::repeat_byte(0x11);
const OTHER: Address = Address::repeat_byte(0x22);

fn config() -> Config {
    Config { bloom_section_size: 10, bloom_queue_capacity: 4, result_stream_capacity: 4, ..Default::default() }
}

fn log(address: Address, topic: u64) -> Log {
    Log::new(address, vec![Hash::from_u64_word(topic)], vec![])
}

/// Matches at blocks 105, 187 and 210, a bloom false positive at 150
fn sparse_fixture(length: u64) -> ChainFixture {
    let logs = |number: u64| match number {
        105 => vec![log(EMITTER, 1)],
        187 => vec![log(OTHER, 2), log(EMITTER, 3), log(EMITTER, 4)],
        210 | 222 => vec![log(EMITTER, 5)],
        _ => vec![],
    };
    let noise = |number: u64| {
        (number == 150).then(|| {
            let mut bloom = Bloom::EMPTY;
            bloom.accrue(EMITTER.as_ref());
            bloom
        })
    };
    ChainFixture::build(length, logs, noise)
}

/// Scrambles response latencies so that sections complete out of order
fn scramble(env: &TestEnv, seed: u64) {
    env.provider.set_delay(move |request, _| {
        let ms = match request {
            RetrievalRequest::BloomSection { index } => (index * 37 + seed * 11) % 17,
            RetrievalRequest::Receipts { number, .. } => (number * 13 + seed) % 11,
            _ => 0,
        };
        Duration::from_millis(ms)
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ordered_matches_for_every_pool_size() {
    let fixture = sparse_fixture(230);
    for threads in 1..=10 {
        let env = TestEnv::with_fixture(config(), &fixture);
        scramble(&env, threads as u64);
        let matcher = Matcher::new(env.chain.clone(), &env.config).with_threads(threads);
        assert_eq!(matcher.bloom_status(), BloomStatus { section_size: 10, sections: 23 });

        let session = matcher.start_session(LogFilter::with_address(EMITTER), 100, 199).unwrap();
        let (stream, _handle) = session.into_parts();
        let (logs, err) = stream.collect().await;
        assert_eq!(err, None, "pool size {threads}");
        assert_eq!(
            logs.iter().map(|log| (log.block_number, log.log_index, log.topics[0])).collect_vec(),
            vec![(105, 0, Hash::from_u64_word(1)), (187, 1, Hash::from_u64_word(3)), (187, 2, Hash::from_u64_word(4))],
            "pool size {threads}"
        );
        assert!(logs.iter().all(|log| log.address == EMITTER && !log.removed));
        assert_eq!(logs[0].block_hash, fixture.header(105).hash);

        // Only candidate blocks had their receipts retrieved, the false positive included
        for number in [105, 150, 187] {
            assert_eq!(env.provider.fetch_count(&RetrievalRequest::receipts(fixture.header(number))), 1);
        }
        assert_eq!(env.provider.fetch_count(&RetrievalRequest::receipts(fixture.header(106))), 0);
        assert_eq!(env.provider.fetch_count(&RetrievalRequest::BloomSection { index: 9 }), 0);
        assert_eq!(env.provider.fetch_count(&RetrievalRequest::BloomSection { index: 20 }), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_topic_filter_and_partial_sections() {
    let fixture = sparse_fixture(230);
    let env = TestEnv::with_fixture(config(), &fixture);
    let matcher = Matcher::new(env.chain.clone(), &env.config);

    let filter = LogFilter::new(vec![], vec![vec![Hash::from_u64_word(2), Hash::from_u64_word(5)]]);
    let (logs, err) = matcher.start_session(filter, 186, 211).unwrap().into_parts().0.collect().await;
    assert_eq!(err, None);
    assert_eq!(logs.iter().map(|log| (log.block_number, log.address)).collect_vec(), vec![(187, OTHER), (210, EMITTER)]);

    // An empty range end
    let (logs, err) = matcher.start_session(LogFilter::with_address(EMITTER), 106, 149).unwrap().into_parts().0.collect().await;
    assert_eq!((logs.len(), err), (0, None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unindexed_tail() {
    // Head 224: sections 0 to 21 are complete, 220 to 224 is searched through header blooms
    let fixture = sparse_fixture(225);
    let env = TestEnv::with_fixture(config(), &fixture);
    let matcher = Matcher::new(env.chain.clone(), &env.config);
    assert_eq!(matcher.bloom_status().sections, 22);

    let (logs, err) = matcher.start_session(LogFilter::with_address(EMITTER), 205, 224).unwrap().into_parts().0.collect().await;
    assert_eq!(err, None);
    assert_eq!(logs.iter().map(|log| log.block_number).collect_vec(), vec![210, 222]);
    assert_eq!(env.provider.fetch_count(&RetrievalRequest::BloomSection { index: 20 }), 1);
    assert_eq!(env.provider.fetch_count(&RetrievalRequest::BloomSection { index: 22 }), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_search_across_checkpoint_gap() {
    // Headers above 100 are only known to the peers, up to the checkpoint at 229
    let fixture = sparse_fixture(230);
    let env = TestEnv::with_checkpoint(config(), &fixture, 100);
    scramble(&env, 5);
    let matcher = Matcher::new(env.chain.clone(), &env.config).with_threads(4);

    let (logs, err) = matcher.start_session(LogFilter::with_address(EMITTER), 100, 199).unwrap().into_parts().0.collect().await;
    assert_eq!(err, None);
    assert_eq!(logs.iter().map(|log| log.block_number).collect_vec(), vec![105, 187, 187]);
    assert_eq!(logs[1].block_hash, fixture.header(187).hash);

    // Sections were verified against headers retrieved once each, walking down from the checkpoint
    for number in 101..229 {
        assert_eq!(env.provider.fetch_count(&RetrievalRequest::HeaderByNumber(number)), 1, "height {number}");
        assert_eq!(env.chain.header_by_number(number).unwrap().unwrap().hash, fixture.header(number).hash);
    }
    assert_eq!(env.provider.fetch_count(&RetrievalRequest::BloomSection { index: 15 }), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalid_ranges() {
    let fixture = sparse_fixture(50);
    let env = TestEnv::with_fixture(config(), &fixture);
    let matcher = Matcher::new(env.chain.clone(), &env.config);
    assert!(matches!(matcher.start_session(LogFilter::default(), 10, 5), Err(MatcherError::InvalidRange(10, 5))));
    assert!(matches!(matcher.start_session(LogFilter::default(), 10, 50), Err(MatcherError::InvalidRange(10, 50))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retrieval_failure_reports_resume_point() {
    let fixture = sparse_fixture(230);
    let env = TestEnv::with_fixture(config(), &fixture);
    scramble(&env, 3);
    env.provider.fail(RetrievalRequest::receipts(fixture.header(187)), ProviderError::Peer("boom".to_owned()));
    let matcher = Matcher::new(env.chain.clone(), &env.config).with_threads(4);

    let (logs, err) = matcher.start_session(LogFilter::with_address(EMITTER), 100, 199).unwrap().into_parts().0.collect().await;
    assert_eq!(logs.iter().map(|log| log.block_number).collect_vec(), vec![105]);
    let err = err.unwrap();
    assert_eq!(err.last_block(), Some(179));
    assert_eq!(err, MatcherError::Interrupted { last_block: Some(179), reason: InterruptReason::Retrieval(OdrError::PeerError("boom".to_owned())) });

    // Failing in the very first section leaves no resume point
    let env = TestEnv::with_fixture(config(), &fixture);
    let matcher = Matcher::new(env.chain.clone(), &env.config).with_threads(4);
    env.provider.fail(RetrievalRequest::BloomSection { index: 10 }, ProviderError::NotFound);
    let (logs, err) = matcher.start_session(LogFilter::with_address(EMITTER), 100, 199).unwrap().into_parts().0.collect().await;
    assert!(logs.is_empty());
    assert_eq!(err, Some(MatcherError::Interrupted { last_block: None, reason: InterruptReason::Retrieval(OdrError::NotFound) }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_stops_promptly() {
    // Every block but genesis matches
    let fixture = ChainFixture::build(230, |number| vec![log(EMITTER, number)], |_| None);
    let env = TestEnv::with_fixture(config(), &fixture);
    env.provider.set_delay(|_, _| Duration::from_millis(20));
    let matcher = Matcher::new(env.chain.clone(), &env.config).with_threads(4);

    let mut session = matcher.start_session(LogFilter::with_address(EMITTER), 0, 229).unwrap();
    let handle = session.cancel_handle();
    let first = session.next().await.unwrap().unwrap();
    assert_eq!(first.block_number, 1);

    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(session.next().await.is_none());
    assert!(session.next().await.is_none());

    // Dispatches already in flight may complete, but no new ones start
    tokio::time::sleep(Duration::from_millis(100)).await;
    let fetches = env.provider.total_fetches();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(env.provider.total_fetches(), fetches);
    assert!(fetches < 230);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropping_the_stream_cancels() {
    let fixture = sparse_fixture(230);
    let env = TestEnv::with_fixture(config(), &fixture);
    let matcher = Matcher::new(env.chain.clone(), &env.config);
    let (stream, handle) = matcher.start_session(LogFilter::with_address(EMITTER), 0, 229).unwrap().into_parts();
    drop(stream);
    assert!(handle.is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rollback_halts_running_sessions() {
    let fixture = sparse_fixture(230);
    let env = TestEnv::with_fixture(config(), &fixture);
    env.provider.set_delay(|request, _| match request {
        RetrievalRequest::BloomSection { index } if *index >= 15 => Duration::from_millis(300),
        _ => Duration::ZERO,
    });
    let matcher = Matcher::new(env.chain.clone(), &env.config).with_threads(2);

    let session = matcher.start_session(LogFilter::with_address(EMITTER), 100, 199).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    env.chain.set_head(120).unwrap();

    let (logs, err) = tokio::time::timeout(Duration::from_secs(1), session.into_parts().0.collect()).await.unwrap();
    assert_eq!(logs.iter().map(|log| log.block_number).collect_vec(), vec![105]);
    let err = err.unwrap();
    assert!(matches!(err, MatcherError::Interrupted { reason: InterruptReason::Halted, .. }), "{err}");
    assert!(err.last_block().is_some_and(|block| block < 150));

    // Sessions started after the rollback are bound to the new head
    assert!(matches!(matcher.start_session(LogFilter::with_address(EMITTER), 100, 150), Err(MatcherError::InvalidRange(100, 150))));
    let (logs, err) = matcher.start_session(LogFilter::with_address(EMITTER), 100, 120).unwrap().into_parts().0.collect().await;
    assert_eq!((logs.len(), err), (1, None));
}
