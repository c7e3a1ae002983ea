//! End-to-end allocator behaviour over synthetic, host-backed memory maps.

use pfa::region::{AllocView, BoundaryTagView, FreeView};
use pfa::{FRAME_SIZE, MemoryType, OffsetTranslator};
use pfa_harness::{Bank, Fixture};

fn read_free_size(addr: u64, t: &OffsetTranslator) -> u64 {
	FreeView::from_raw(addr).size_and_flags(t).total_size()
}

#[test]
fn single_bank() {
	let fixture = Fixture::single_bank(256);
	let mut pfa = fixture.allocator();
	let t = OffsetTranslator::identity();
	let base = fixture.banks[0].start;

	assert_eq!(read_free_size(base, &t), 256 * FRAME_SIZE);

	let p = pfa.allocate(1000);
	assert_eq!(p as u64, base + AllocView::HEADER_SIZE);

	let remaining_total = 256 * FRAME_SIZE - FRAME_SIZE;
	assert_eq!(read_free_size(base + FRAME_SIZE, &t), remaining_total);

	let payload = remaining_total - AllocView::HEADER_SIZE - BoundaryTagView::SIZE;
	let q = pfa.allocate(payload);
	assert_eq!(q as u64, base + FRAME_SIZE + AllocView::HEADER_SIZE);
}

#[test]
fn split_bank_with_hole() {
	let low = Bank::new(16);
	let reserved = Bank::new(1);
	let high = Bank::new(16);
	let fixture = Fixture::from_banks(&[
		(MemoryType::Conventional, &low),
		(MemoryType::Reserved, &reserved),
		(MemoryType::Conventional, &high),
	]);
	let t = OffsetTranslator::identity();
	let mut pfa = fixture.allocator();

	assert_eq!(read_free_size(fixture.banks[0].start, &t), 16 * FRAME_SIZE);
	assert_eq!(read_free_size(fixture.banks[2].start, &t), 16 * FRAME_SIZE);

	let p = pfa.allocate(70000);
	assert!(p.is_null());
}

#[test]
fn coalesce_both_sides() {
	let fixture = Fixture::single_bank(4);
	let mut pfa = fixture.allocator();
	let t = OffsetTranslator::identity();
	let base = fixture.banks[0].start;

	let a = pfa.allocate(1);
	let b = pfa.allocate(1);
	let c = pfa.allocate(1);
	assert!(!a.is_null() && !b.is_null() && !c.is_null());

	// SAFETY: `b` was just returned by `allocate` and has not been freed.
	unsafe { pfa.free(b) };
	assert_eq!(read_free_size(base + FRAME_SIZE, &t), FRAME_SIZE);

	// SAFETY: `a` was just returned by `allocate` and has not been freed.
	unsafe { pfa.free(a) };
	assert_eq!(read_free_size(base, &t), 2 * FRAME_SIZE);

	// SAFETY: `c` was just returned by `allocate` and has not been freed.
	unsafe { pfa.free(c) };
	assert_eq!(read_free_size(base, &t), 4 * FRAME_SIZE);
}

#[test]
fn best_fit_selection() {
	let low = Bank::new(2); // 8192
	let mid = Bank::new(1); // 4096
	let high = Bank::new(4); // 16384
	let fixture = Fixture::from_banks(&[
		(MemoryType::Conventional, &low),
		(MemoryType::Conventional, &mid),
		(MemoryType::Conventional, &high),
	]);
	let mut pfa = fixture.allocator();
	let t = OffsetTranslator::identity();

	let p = pfa.allocate(1);
	assert_eq!(p as u64, fixture.banks[1].start + AllocView::HEADER_SIZE);

	let mid_header = AllocView::from_raw(fixture.banks[1].start).size_and_flags(&t);
	assert!(mid_header.is_allocated());
	assert_eq!(mid_header.total_size(), FRAME_SIZE);

	assert_eq!(read_free_size(fixture.banks[0].start, &t), 2 * FRAME_SIZE);
	assert_eq!(read_free_size(fixture.banks[2].start, &t), 4 * FRAME_SIZE);
}

#[test]
fn excludes_zero_page() {
	use pfa::{MemoryDescriptor, MemoryMap};

	let second = Bank::new(1);
	let zero = Bank { start: 0, size: FRAME_SIZE };
	let bytes = pfa_harness::build_map(&[
		(MemoryType::Conventional, &zero),
		(MemoryType::Conventional, &second),
	]);
	let map = MemoryMap::new(&bytes, MemoryDescriptor::MIN_SIZE);

	assert!(!map.is_usable(0));
	assert!(map.is_usable(second.start));
}

#[test]
fn loadercode_excluded() {
	let code = Bank::new(1);
	let data = Bank::new(1);
	let fixture = Fixture::from_banks(&[
		(MemoryType::LoaderCode, &code),
		(MemoryType::Conventional, &data),
	]);
	let t = OffsetTranslator::identity();
	let _pfa = fixture.allocator();

	assert_eq!(read_free_size(fixture.banks[1].start, &t), FRAME_SIZE);
	assert_eq!(read_free_size(fixture.banks[0].start, &t), 0);
}
