//! Multi-producer demo: several producer threads claim disjoint sequences
//! concurrently via CAS; a single consumer drains the resulting contiguous
//! stream and counts everything it saw.

use cadence::handler::{EventHandler, FatalExceptionHandler};
use cadence::{BatchEventProcessor, BatchSizeLimiter, DisruptorConfig, MultiProducerTopology, ProducerMode, Sequencer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const RING_SIZE: usize = 1 << 14;
const PRODUCERS: usize = 4;
const EVENTS_PER_PRODUCER: u64 = 250_000;

struct CountingHandler {
    count: Arc<AtomicU64>,
}

impl EventHandler<u64> for CountingHandler {
    type Error = std::convert::Infallible;

    fn on_batch(&mut self, batch: &[u64], _starting_sequence: i64) -> Result<(), Self::Error> {
        self.count.fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

fn main() {
    let config = DisruptorConfig::new(RING_SIZE).unwrap().with_producer_mode(ProducerMode::Multi);
    let wait = Arc::new(cadence::BusySpinWaitStrategy::new());
    let topology: MultiProducerTopology<u64, _> = MultiProducerTopology::new(config, wait.clone()).unwrap();
    let count = Arc::new(AtomicU64::new(0));

    let mut processor = BatchEventProcessor::new(
        topology.ring().clone(),
        topology.sequencer().clone(),
        topology.barrier(wait, Vec::new()),
        CountingHandler { count: count.clone() },
        FatalExceptionHandler,
        BatchSizeLimiter::default(),
    );
    topology.add_gating_sequences(&[processor.sequence()]).unwrap();

    let control = processor.handle();
    let consumer_thread = std::thread::spawn(move || {
        processor.run();
    });

    let start = Instant::now();
    let producer_threads: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let sequencer = topology.sequencer().clone();
            let ring = topology.ring().clone();
            std::thread::spawn(move || {
                for i in 0..EVENTS_PER_PRODUCER {
                    let seq = sequencer.next(1);
                    unsafe {
                        *ring.get_mut(seq) = id as u64 * EVENTS_PER_PRODUCER + i;
                    }
                    sequencer.publish(seq);
                }
            })
        })
        .collect();

    for handle in producer_threads {
        handle.join().unwrap();
    }

    let expected = PRODUCERS as u64 * EVENTS_PER_PRODUCER;
    while control.sequence().get_acquire() < expected as i64 - 1 {
        std::hint::spin_loop();
    }
    let elapsed = start.elapsed();
    control.halt();
    consumer_thread.join().unwrap();

    println!(
        "{PRODUCERS} producers published {expected} events, consumer saw {} in {elapsed:?}",
        count.load(Ordering::Relaxed)
    );
}
