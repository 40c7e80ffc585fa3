use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use laminar_store::Store;
use laminar_types::Block;
use tracing::error;

/// Metadata key holding the height of the last block submitted to DA.
pub const LAST_SUBMITTED_HEIGHT_KEY: &str = "last submitted";

/// Tracks blocks that still need to be published to the DA layer.
///
/// Assertions this type relies on:
/// - blocks are durable in the store before being submitted to DA
/// - blocks are always pushed to DA in order of height
/// - DA submission of a batch is atomic
///
/// `last_submitted_height` advances only after DA confirmation. If a
/// confirmation is lost (crash before the metadata write lands), the blocks
/// are re-submitted on restart; full nodes drop duplicates, so the only cost
/// is the extra DA fee.
pub struct PendingBlocks<S> {
    store: Arc<S>,
    last_submitted_height: AtomicU64,
}

impl<S: Store> PendingBlocks<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            last_submitted_height: AtomicU64::new(0),
        }
    }

    /// Blocks awaiting DA submission, ascending by height.
    ///
    /// Lazily loads the persisted tracker state on first use. If a store read
    /// fails mid-scan, the blocks read so far are returned together with the
    /// error so the caller can still make forward progress.
    pub fn pending(&self) -> (Vec<Block>, Option<anyhow::Error>) {
        let mut last_submitted = self.last_submitted_height.load(Ordering::Acquire);
        if last_submitted == 0 {
            if let Err(e) = self.load_from_store() {
                return (vec![], Some(e));
            }
            last_submitted = self.last_submitted_height.load(Ordering::Acquire);
        }

        let height = self.store.height();
        if last_submitted == height {
            return (vec![], None);
        }
        if last_submitted > height {
            panic!(
                "height of last block submitted to DA ({last_submitted}) is greater than height of last block ({height})"
            );
        }

        let mut blocks = Vec::with_capacity((height - last_submitted) as usize);
        for h in last_submitted + 1..=height {
            match self.store.get_block(h) {
                Ok(block) => blocks.push(block),
                Err(e) => return (blocks, Some(e.into())),
            }
        }
        (blocks, None)
    }

    pub fn is_empty(&self) -> bool {
        self.store.height() == self.last_submitted_height.load(Ordering::Acquire)
    }

    /// Advances the tracker to `max(current, up_to)` after DA confirmation
    /// and mirrors the new value to store metadata.
    ///
    /// A failed metadata write does not roll back the in-memory advance; the
    /// worst case after a restart is a duplicate DA submission.
    pub fn mark_submitted(&self, up_to: u64) {
        loop {
            let current = self.last_submitted_height.load(Ordering::Acquire);
            if up_to <= current {
                return;
            }
            if self
                .last_submitted_height
                .compare_exchange(current, up_to, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if let Err(e) = self
                    .store
                    .set_metadata(LAST_SUBMITTED_HEIGHT_KEY, up_to.to_string().as_bytes())
                {
                    error!(
                        error = %e,
                        up_to,
                        "failed to store height of latest block submitted to DA"
                    );
                }
                return;
            }
        }
    }

    fn load_from_store(&self) -> anyhow::Result<()> {
        // Absent metadata means the key was never written; not an error.
        let Some(raw) = self.store.get_metadata(LAST_SUBMITTED_HEIGHT_KEY)? else {
            return Ok(());
        };
        let last_submitted = std::str::from_utf8(&raw)?.parse::<u64>()?;
        let _ = self.last_submitted_height.compare_exchange(
            0,
            last_submitted,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use laminar_store::{BlockStore, InMemoryKv, PrefixKv};
    use laminar_types::test_utils::random_block;
    use laminar_types::Commit;
    use proptest::prelude::*;

    use super::*;

    type TestStore = BlockStore<PrefixKv<InMemoryKv>>;

    fn test_store() -> (Arc<InMemoryKv>, Arc<TestStore>) {
        let base = Arc::new(InMemoryKv::new());
        let store = Arc::new(BlockStore::new(PrefixKv::new(base.clone(), "0")).unwrap());
        (base, store)
    }

    fn reopen(base: &Arc<InMemoryKv>) -> Arc<TestStore> {
        Arc::new(BlockStore::new(PrefixKv::new(base.clone(), "0")).unwrap())
    }

    fn put_blocks(store: &TestStore, heights: impl IntoIterator<Item = u64>) {
        for h in heights {
            let block = random_block(h, 1);
            let commit = Commit {
                height: h,
                header_hash: block.hash(),
                signatures: vec![vec![0u8; 64]],
            };
            store.put_block(&block, &commit).unwrap();
        }
    }

    #[test]
    fn pending_returns_unsubmitted_range_in_order() {
        let (_base, store) = test_store();
        put_blocks(&store, 1..=5);

        let pending = PendingBlocks::new(store);
        pending.mark_submitted(2);

        let (blocks, err) = pending.pending();
        assert!(err.is_none());
        let heights: Vec<u64> = blocks.iter().map(|b| b.height()).collect();
        assert_eq!(heights, vec![3, 4, 5]);
        assert!(!pending.is_empty());

        pending.mark_submitted(5);
        let (blocks, err) = pending.pending();
        assert!(err.is_none());
        assert!(blocks.is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn mark_submitted_is_monotone() {
        let (_base, store) = test_store();
        put_blocks(&store, 1..=5);
        let pending = PendingBlocks::new(store.clone());

        pending.mark_submitted(4);
        pending.mark_submitted(2);

        let (blocks, _) = pending.pending();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].height(), 5);
        assert_eq!(
            store.get_metadata(LAST_SUBMITTED_HEIGHT_KEY).unwrap(),
            Some(b"4".to_vec())
        );
    }

    #[test]
    fn survives_restart_via_metadata() {
        let (base, store) = test_store();
        put_blocks(&store, 1..=4);
        let pending = PendingBlocks::new(store);
        pending.mark_submitted(3);

        // a fresh tracker over the same backing store lazily reloads
        let pending = PendingBlocks::new(reopen(&base));
        let (blocks, err) = pending.pending();
        assert!(err.is_none());
        let heights: Vec<u64> = blocks.iter().map(|b| b.height()).collect();
        assert_eq!(heights, vec![4]);
    }

    #[test]
    fn missing_metadata_resubmits_everything() {
        let (_base, store) = test_store();
        put_blocks(&store, 1..=3);

        let pending = PendingBlocks::new(store);
        let (blocks, err) = pending.pending();
        assert!(err.is_none());
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    #[should_panic(expected = "greater than height of last block")]
    fn submitted_beyond_store_height_aborts() {
        let (_base, store) = test_store();
        store
            .set_metadata(LAST_SUBMITTED_HEIGHT_KEY, b"5")
            .unwrap();

        let pending = PendingBlocks::new(store);
        let _ = pending.pending();
    }

    proptest! {
        /// For any store height H and any sequence of mark_submitted calls,
        /// pending() is exactly the ascending range (max(marks), H].
        #[test]
        fn pending_matches_unsubmitted_range(
            height in 1u64..12,
            marks in prop::collection::vec(0u64..12, 0..6),
        ) {
            let (_base, store) = test_store();
            put_blocks(&store, 1..=height);
            let pending = PendingBlocks::new(store);

            let mut watermark = 0u64;
            for mark in marks {
                let mark = mark.min(height);
                pending.mark_submitted(mark);
                watermark = watermark.max(mark);
            }

            let (blocks, err) = pending.pending();
            prop_assert!(err.is_none());
            let heights: Vec<u64> = blocks.iter().map(|b| b.height()).collect();
            let expected: Vec<u64> = (watermark + 1..=height).collect();
            prop_assert_eq!(heights, expected);
        }
    }
}
