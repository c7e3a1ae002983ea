//! Property tests over randomized allocate/free sequences.
//!
//! Walks the managed bank's entire header chain after every step,
//! verifying region boundaries never overlap or leave gaps, that header
//! and boundary tag always agree, and that no two free regions ever sit
//! adjacent to each other. A final full round-trip check confirms the
//! pool re-coalesces back to its initial single free region.

use pfa::region::{BoundaryTagView, FreeView};
use pfa::{FRAME_SIZE, OffsetTranslator};
use pfa_harness::Fixture;
use proptest::prelude::*;

const BANK_FRAMES: u64 = 32;

/// Walks every region header/tag pair across `[base, base + total)`,
/// asserting tag-mirror (P3) and exact coverage with no overlap (P1, P2)
/// as a byproduct of the walk itself never skipping or double-counting
/// bytes.
fn walk(base: u64, total: u64, t: &OffsetTranslator) -> Vec<(u64, u64, bool)> {
	let mut out = Vec::new();
	let mut addr = base;
	let end = base + total;
	while addr < end {
		let header = FreeView::from_raw(addr).size_and_flags(t);
		let size = header.total_size();
		assert!(size > 0, "zero-sized region at {addr:#x}");
		assert!(addr + size <= end, "region at {addr:#x} overruns the bank");

		let tag = BoundaryTagView::from_raw(addr + size - BoundaryTagView::SIZE).size_and_flags(t);
		assert_eq!(header.to_bits(), tag.to_bits(), "header/tag mismatch at {addr:#x}");

		out.push((addr, size, header.is_allocated()));
		addr += size;
	}
	assert_eq!(addr, end, "region walk did not exactly cover the bank");
	out
}

fn assert_no_adjacent_free(regions: &[(u64, u64, bool)]) {
	for pair in regions.windows(2) {
		assert!(
			pair[0].2 || pair[1].2,
			"adjacent free regions at {:#x} and {:#x}",
			pair[0].0,
			pair[1].0
		);
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn alloc_free_sequences_preserve_shape_invariants(
		sizes in proptest::collection::vec(1u64..=(3 * FRAME_SIZE), 1..60),
		free_every in 1usize..5,
	) {
		let fixture = Fixture::single_bank(BANK_FRAMES);
		let mut pfa = fixture.allocator();
		let t = OffsetTranslator::identity();
		let base = fixture.banks[0].start;
		let total = BANK_FRAMES * FRAME_SIZE;

		let mut live: Vec<*mut u8> = Vec::new();

		for (i, size) in sizes.into_iter().enumerate() {
			let p = pfa.allocate(size);
			if !p.is_null() {
				live.push(p);
			}

			assert_no_adjacent_free(&walk(base, total, &t));

			if !live.is_empty() && i % free_every == 0 {
				let freed = live.remove(0);
				// SAFETY: `freed` came from `allocate` on this allocator and
				// has not yet been freed.
				unsafe { pfa.free(freed) };
				assert_no_adjacent_free(&walk(base, total, &t));
			}
		}

		for p in live {
			// SAFETY: every pointer here came from `allocate` and has not
			// yet been freed.
			unsafe { pfa.free(p) };
		}

		let regions = walk(base, total, &t);
		prop_assert_eq!(regions.len(), 1, "pool did not fully recoalesce: {:?}", regions);
		prop_assert_eq!(regions[0], (base, total, false));
	}
}
