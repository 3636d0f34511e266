//! Single-producer sum-of-N demo.
//!
//! One producer thread claims and publishes sequences as fast as the ring
//! allows; one consumer thread drains batches and accumulates a running
//! total, reporting throughput once every number up to `MAX_NUMBER` has
//! been summed.

use cadence::handler::{EventHandler, FatalExceptionHandler};
use cadence::{BatchEventProcessor, BatchSizeLimiter, Disruptor, DisruptorConfig, Sequencer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const RING_SIZE: usize = 1 << 16;
const MAX_NUMBER: u64 = 1_000_000;

struct SummingHandler {
    total: Arc<AtomicU64>,
}

impl EventHandler<u64> for SummingHandler {
    type Error = std::convert::Infallible;

    fn on_batch(&mut self, batch: &[u64], _starting_sequence: i64) -> Result<(), Self::Error> {
        let partial: u64 = batch.iter().sum();
        self.total.fetch_add(partial, Ordering::Relaxed);
        Ok(())
    }
}

fn main() {
    let config = DisruptorConfig::new(RING_SIZE).unwrap();
    let wait = Arc::new(cadence::BusySpinWaitStrategy::new());
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
    let consumer_thread = std::thread::spawn(move || {
        processor.run();
    });

    let start = Instant::now();
    let sequencer = topology.sequencer().clone();
    let ring = topology.ring().clone();
    for n in 1..=MAX_NUMBER {
        let seq = sequencer.next(1);
        unsafe {
            *ring.get_mut(seq) = n;
        }
        sequencer.publish(seq);
    }

    while control.sequence().get_acquire() < MAX_NUMBER as i64 - 1 {
        std::hint::spin_loop();
    }
    let elapsed = start.elapsed();
    control.halt();
    consumer_thread.join().unwrap();

    println!(
        "published and consumed {MAX_NUMBER} events in {elapsed:?}, sum = {}",
        total.load(Ordering::Relaxed)
    );
}
