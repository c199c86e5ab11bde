//! Read-only views over a slice of blocks.
//!
//! These never take locks themselves; [`ChainStore`](crate::ChainStore)
//! calls them on the slice it holds under its read guard.

use crate::block::{Block, BlockRecord, Payload};
use crate::error::{LedgerError, LedgerResult};

/// Plain records for every block, in chain order.
pub fn list(blocks: &[Block]) -> Vec<BlockRecord> {
    blocks.iter().map(Block::to_record).collect()
}

/// The block at position `index`.
pub fn block_at(blocks: &[Block], index: u64) -> LedgerResult<&Block> {
    usize::try_from(index)
        .ok()
        .and_then(|i| blocks.get(i))
        .ok_or(LedgerError::BlockNotFound(index))
}

/// Lazily yields the payloads recorded for `student_id`, in chain order.
/// Payloads without a student id (genesis) are skipped.
pub fn records_for_student<'a>(
    blocks: &'a [Block],
    student_id: &'a str,
) -> impl Iterator<Item = &'a Payload> + 'a {
    blocks
        .iter()
        .map(Block::data)
        .filter(move |data| data.student_id() == Some(student_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::StudentRecord;

    fn sample_chain() -> Vec<Block> {
        let genesis = Block::genesis();
        let b1 = Block::next(&genesis, StudentRecord::new("S1", "Ann", "Math", 90).into());
        let b2 = Block::next(&b1, StudentRecord::new("S2", "Bob", "Math", 72).into());
        let b3 = Block::next(&b2, StudentRecord::new("S1", "Ann", "Physics", 81).into());
        vec![genesis, b1, b2, b3]
    }

    #[test]
    fn list_preserves_order() {
        let chain = sample_chain();
        let indices: Vec<u64> = list(&chain).iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn block_at_bounds() {
        let chain = sample_chain();
        assert_eq!(block_at(&chain, 2).unwrap().index(), 2);
        assert_eq!(block_at(&chain, 4), Err(LedgerError::BlockNotFound(4)));
        assert_eq!(
            block_at(&chain, u64::MAX),
            Err(LedgerError::BlockNotFound(u64::MAX))
        );
    }

    #[test]
    fn records_for_student_filters_in_chain_order() {
        let chain = sample_chain();
        let subjects: Vec<&str> = records_for_student(&chain, "S1")
            .filter_map(Payload::as_record)
            .map(|r| r.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["Math", "Physics"]);
    }

    #[test]
    fn unknown_student_yields_nothing() {
        let chain = sample_chain();
        assert_eq!(records_for_student(&chain, "S9").count(), 0);
        // "genesis" is the sentinel's info value, not a student id.
        assert_eq!(records_for_student(&chain, "genesis").count(), 0);
    }
}
