//! Background-thread random number generation
//!
//! Some simulator configurations are limited by the throughput of the random
//! engine itself. This adapter moves word generation onto a dedicated thread
//! that fills fixed-size blocks into a bounded queue, so that generation
//! overlaps with the simulation proper. It hands out exactly the word
//! sequence the wrapped engine would have produced.

use rand::{Error, RngCore};

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::thread::JoinHandle;

/// Number of 64-bit words per block handed over the queue.
const WORDS_PER_BLOCK: usize = 1 << 16;

/// An engine adapter that precomputes random words on a background thread.
///
/// `num_blocks` bounds the amount of readahead: at most that many filled
/// blocks are ever queued. The worker thread shuts down when the adapter is
/// dropped.
pub struct AsyncRandomEngine {
    filled: Option<Receiver<Vec<u64>>>,
    recycled: SyncSender<Vec<u64>>,
    /// Current block, consumed from the back
    current: Vec<u64>,
    worker: Option<JoinHandle<()>>,
}

impl AsyncRandomEngine {
    /// Wrap `engine`, generating words ahead of use into `num_blocks` buffers.
    pub fn new<E>(mut engine: E, num_blocks: usize) -> Self
    where
        E: RngCore + Send + 'static,
    {
        assert!(num_blocks > 0, "need at least one readahead block");

        let (filled_tx, filled_rx) = sync_channel::<Vec<u64>>(num_blocks);
        let (recycled_tx, recycled_rx) = sync_channel::<Vec<u64>>(num_blocks + 1);

        let worker = std::thread::spawn(move || loop {
            let mut block = match recycled_rx.try_recv() {
                Ok(block) => block,
                Err(TryRecvError::Empty) => Vec::with_capacity(WORDS_PER_BLOCK),
                Err(TryRecvError::Disconnected) => return,
            };
            block.clear();
            block.extend((0..WORDS_PER_BLOCK).map(|_| engine.next_u64()));
            // The consumer reads from the back; reverse so that the oldest
            // generated word comes out first.
            block.reverse();
            if filled_tx.send(block).is_err() {
                return;
            }
        });

        Self {
            filled: Some(filled_rx),
            recycled: recycled_tx,
            current: Vec::new(),
            worker: Some(worker),
        }
    }
}

impl RngCore for AsyncRandomEngine {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        if let Some(word) = self.current.pop() {
            return word;
        }
        let filled = self
            .filled
            .as_ref()
            .expect("random generator thread already shut down");
        let block = filled
            .recv()
            .expect("random generator thread died unexpectedly");
        let spent = std::mem::replace(&mut self.current, block);
        let _ = self.recycled.try_send(spent);
        self.current.pop().expect("received an empty block")
    }

    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let word = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl Drop for AsyncRandomEngine {
    fn drop(&mut self) {
        // Closing both queue ends unblocks the worker whatever it is doing
        drop(self.filled.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::DefaultEngine;
    use rand::SeedableRng;

    #[test]
    fn delivers_the_wrapped_engine_sequence() {
        let mut reference = DefaultEngine::seed_from_u64(123);
        let mut engine = AsyncRandomEngine::new(DefaultEngine::seed_from_u64(123), 4);

        // More than one block, so handover is exercised
        for i in 0..3 * WORDS_PER_BLOCK {
            assert_eq!(engine.next_u64(), reference.next_u64(), "word {}", i);
        }
    }

    #[test]
    fn shuts_down_cleanly_mid_block() {
        let engine = AsyncRandomEngine::new(DefaultEngine::seed_from_u64(5), 2);
        drop(engine);
    }
}
