//! The free-region index: a CLRS-style red-black tree whose nodes are the
//! free regions themselves, keyed by total region size.
//!
//! A single sentinel (black, self-referential parent/children) stands in
//! for every nil leaf and the parent of the root; its parent pointer is
//! writable because delete-fixup reads `x.parent` after `x` has been
//! transplanted with the sentinel.

use crate::{
	region::{Colour, FreeView, SizeAndFlags},
	translate::PhysicalAddressTranslator,
};

/// An ordered set of free regions, keyed by total size, with zero
/// auxiliary allocation: linkage and colour live inside each region's own
/// header.
pub(crate) struct RedBlackIndex {
	/// Physical address of the tree root, or `sentinel` if empty.
	pub(crate) root: u64,
	/// Physical address of the sentinel node.
	pub(crate) sentinel: u64,
}

impl RedBlackIndex {
	/// Initializes an empty index over a caller-supplied sentinel.
	pub(crate) fn new<T: PhysicalAddressTranslator>(sentinel: u64, t: &T) -> Self {
		let sv = FreeView::from_raw(sentinel);
		sv.set_size_and_flags(t, SizeAndFlags::new(0, false, Colour::Black));
		sv.set_parent(t, sentinel);
		sv.set_left(t, sentinel);
		sv.set_right(t, sentinel);
		Self { root: sentinel, sentinel }
	}

	fn key<T: PhysicalAddressTranslator>(&self, n: u64, t: &T) -> u64 {
		FreeView::from_raw(n).size_and_flags(t).total_size()
	}

	fn colour_at<T: PhysicalAddressTranslator>(&self, n: u64, t: &T) -> Colour {
		FreeView::from_raw(n).colour(t)
	}

	fn set_colour_at<T: PhysicalAddressTranslator>(&self, n: u64, t: &T, colour: Colour) {
		FreeView::from_raw(n).set_colour(t, colour);
	}

	fn parent_of<T: PhysicalAddressTranslator>(&self, n: u64, t: &T) -> u64 {
		FreeView::from_raw(n).parent(t)
	}

	fn set_parent_of<T: PhysicalAddressTranslator>(&self, n: u64, t: &T, value: u64) {
		FreeView::from_raw(n).set_parent(t, value);
	}

	fn left_of<T: PhysicalAddressTranslator>(&self, n: u64, t: &T) -> u64 {
		FreeView::from_raw(n).left(t)
	}

	fn set_left_of<T: PhysicalAddressTranslator>(&self, n: u64, t: &T, value: u64) {
		FreeView::from_raw(n).set_left(t, value);
	}

	fn right_of<T: PhysicalAddressTranslator>(&self, n: u64, t: &T) -> u64 {
		FreeView::from_raw(n).right(t)
	}

	fn set_right_of<T: PhysicalAddressTranslator>(&self, n: u64, t: &T, value: u64) {
		FreeView::from_raw(n).set_right(t, value);
	}

	/// Pivots `x` and its right subtree left; `x`'s right child becomes
	/// its parent.
	pub(crate) fn rotate_left<T: PhysicalAddressTranslator>(&mut self, x: u64, t: &T) {
		let y = self.right_of(x, t);

		self.set_right_of(x, t, self.left_of(y, t));
		if self.left_of(y, t) != self.sentinel {
			self.set_parent_of(self.left_of(y, t), t, x);
		}

		let x_parent = self.parent_of(x, t);
		self.set_parent_of(y, t, x_parent);
		if x_parent == self.sentinel {
			self.root = y;
		} else if x == self.left_of(x_parent, t) {
			self.set_left_of(x_parent, t, y);
		} else {
			self.set_right_of(x_parent, t, y);
		}

		self.set_left_of(y, t, x);
		self.set_parent_of(x, t, y);
	}

	/// Pivots `y` and its left subtree right; `y`'s left child becomes
	/// its parent.
	pub(crate) fn rotate_right<T: PhysicalAddressTranslator>(&mut self, y: u64, t: &T) {
		let x = self.left_of(y, t);

		self.set_left_of(y, t, self.right_of(x, t));
		if self.right_of(x, t) != self.sentinel {
			self.set_parent_of(self.right_of(x, t), t, y);
		}

		let y_parent = self.parent_of(y, t);
		self.set_parent_of(x, t, y_parent);
		if y_parent == self.sentinel {
			self.root = x;
		} else if y == self.left_of(y_parent, t) {
			self.set_left_of(y_parent, t, x);
		} else {
			self.set_right_of(y_parent, t, x);
		}

		self.set_right_of(x, t, y);
		self.set_parent_of(y, t, x);
	}

	fn find_insert_parent<T: PhysicalAddressTranslator>(&self, key: u64, t: &T) -> u64 {
		let mut x = self.root;
		let mut y = self.sentinel;
		while x != self.sentinel {
			y = x;
			x = if key < self.key(x, t) {
				self.left_of(x, t)
			} else {
				self.right_of(x, t)
			};
		}
		y
	}

	/// Returns the free region with the smallest size `>= value`, or the
	/// sentinel if none exists.
	pub(crate) fn find_best_fit<T: PhysicalAddressTranslator>(&self, value: u64, t: &T) -> u64 {
		let mut x = self.root;
		let mut best = self.sentinel;
		while x != self.sentinel {
			let key = self.key(x, t);
			if value <= key {
				best = x;
			}
			x = if value < key {
				self.left_of(x, t)
			} else {
				self.right_of(x, t)
			};
		}
		best
	}

	/// Links `z` into the tree by its current size-and-flags key, and
	/// rebalances.
	///
	/// Writes only linkage and colour bits into `z`'s header; no memory
	/// is allocated for bookkeeping.
	pub(crate) fn insert<T: PhysicalAddressTranslator>(&mut self, z: u64, t: &T) {
		let key = self.key(z, t);
		let y = self.find_insert_parent(key, t);

		self.set_parent_of(z, t, y);
		if y == self.sentinel {
			self.root = z;
		} else if key < self.key(y, t) {
			self.set_left_of(y, t, z);
		} else {
			self.set_right_of(y, t, z);
		}

		self.set_left_of(z, t, self.sentinel);
		self.set_right_of(z, t, self.sentinel);
		self.set_colour_at(z, t, Colour::Red);

		self.insert_fixup(z, t);
	}

	fn insert_fixup<T: PhysicalAddressTranslator>(&mut self, mut z: u64, t: &T) {
		while self.colour_at(self.parent_of(z, t), t) == Colour::Red {
			let zp = self.parent_of(z, t);
			let zg = self.parent_of(zp, t);

			if zp == self.left_of(zg, t) {
				let y = self.right_of(zg, t);
				if self.colour_at(y, t) == Colour::Red {
					self.set_colour_at(zg, t, Colour::Red);
					self.set_colour_at(y, t, Colour::Black);
					self.set_colour_at(zp, t, Colour::Black);
					z = zg;
				} else {
					if z == self.right_of(zp, t) {
						z = zp;
						self.rotate_left(z, t);
					}
					let zp2 = self.parent_of(z, t);
					let zg2 = self.parent_of(zp2, t);
					self.set_colour_at(zp2, t, Colour::Black);
					self.set_colour_at(zg2, t, Colour::Red);
					self.rotate_right(zg2, t);
				}
			} else {
				let y = self.left_of(zg, t);
				if self.colour_at(y, t) == Colour::Red {
					self.set_colour_at(zg, t, Colour::Red);
					self.set_colour_at(y, t, Colour::Black);
					self.set_colour_at(zp, t, Colour::Black);
					z = zg;
				} else {
					if z == self.left_of(zp, t) {
						z = zp;
						self.rotate_right(z, t);
					}
					let zp2 = self.parent_of(z, t);
					let zg2 = self.parent_of(zp2, t);
					self.set_colour_at(zp2, t, Colour::Black);
					self.set_colour_at(zg2, t, Colour::Red);
					self.rotate_left(zg2, t);
				}
			}
		}
		self.set_colour_at(self.root, t, Colour::Black);
	}

	fn transplant<T: PhysicalAddressTranslator>(&mut self, u: u64, v: u64, t: &T) {
		let up = self.parent_of(u, t);
		if up == self.sentinel {
			self.root = v;
		} else if u == self.left_of(up, t) {
			self.set_left_of(up, t, v);
		} else {
			self.set_right_of(up, t, v);
		}
		self.set_parent_of(v, t, up);
	}

	/// Finds the minimum-keyed node in the subtree rooted at `x`.
	pub(crate) fn minimum<T: PhysicalAddressTranslator>(&self, mut x: u64, t: &T) -> u64 {
		while self.left_of(x, t) != self.sentinel {
			x = self.left_of(x, t);
		}
		x
	}

	/// Unlinks `z` from the tree and rebalances. Does not touch `z`'s
	/// size-and-flags word; the caller is free to reuse or overwrite the
	/// memory `z` described.
	pub(crate) fn delete<T: PhysicalAddressTranslator>(&mut self, z: u64, t: &T) {
		let mut y = z;
		let mut y_orig_colour = self.colour_at(y, t);
		let x;

		if self.left_of(z, t) == self.sentinel {
			x = self.right_of(z, t);
			self.transplant(z, x, t);
		} else if self.right_of(z, t) == self.sentinel {
			x = self.left_of(z, t);
			self.transplant(z, x, t);
		} else {
			y = self.minimum(self.right_of(z, t), t);
			y_orig_colour = self.colour_at(y, t);
			x = self.right_of(y, t);

			if y != self.right_of(z, t) {
				self.transplant(y, x, t);
				self.set_right_of(y, t, self.right_of(z, t));
				self.set_parent_of(self.right_of(y, t), t, y);
			} else {
				self.set_parent_of(x, t, y);
			}

			self.transplant(z, y, t);
			self.set_left_of(y, t, self.left_of(z, t));
			self.set_parent_of(self.left_of(y, t), t, y);
			self.set_colour_at(y, t, self.colour_at(z, t));
		}

		if y_orig_colour == Colour::Black {
			self.delete_fixup(x, t);
		}
	}

	fn delete_fixup<T: PhysicalAddressTranslator>(&mut self, mut x: u64, t: &T) {
		while x != self.root && self.colour_at(x, t) == Colour::Black {
			let xp = self.parent_of(x, t);

			if x == self.left_of(xp, t) {
				let mut w = self.right_of(xp, t);
				if self.colour_at(w, t) == Colour::Red {
					self.set_colour_at(w, t, Colour::Black);
					self.set_colour_at(xp, t, Colour::Red);
					self.rotate_left(xp, t);
					w = self.right_of(self.parent_of(x, t), t);
				}

				if self.colour_at(self.left_of(w, t), t) == Colour::Black
					&& self.colour_at(self.right_of(w, t), t) == Colour::Black
				{
					self.set_colour_at(w, t, Colour::Red);
					x = self.parent_of(x, t);
				} else {
					if self.colour_at(self.right_of(w, t), t) == Colour::Black {
						self.set_colour_at(self.left_of(w, t), t, Colour::Black);
						self.set_colour_at(w, t, Colour::Red);
						self.rotate_right(w, t);
						w = self.right_of(self.parent_of(x, t), t);
					}
					let xp2 = self.parent_of(x, t);
					self.set_colour_at(w, t, self.colour_at(xp2, t));
					self.set_colour_at(xp2, t, Colour::Black);
					self.set_colour_at(self.right_of(w, t), t, Colour::Black);
					self.rotate_left(xp2, t);
					x = self.root;
				}
			} else {
				let mut w = self.left_of(xp, t);
				if self.colour_at(w, t) == Colour::Red {
					self.set_colour_at(w, t, Colour::Black);
					self.set_colour_at(xp, t, Colour::Red);
					self.rotate_right(xp, t);
					w = self.left_of(self.parent_of(x, t), t);
				}

				if self.colour_at(self.right_of(w, t), t) == Colour::Black
					&& self.colour_at(self.left_of(w, t), t) == Colour::Black
				{
					self.set_colour_at(w, t, Colour::Red);
					x = self.parent_of(x, t);
				} else {
					if self.colour_at(self.left_of(w, t), t) == Colour::Black {
						self.set_colour_at(self.right_of(w, t), t, Colour::Black);
						self.set_colour_at(w, t, Colour::Red);
						self.rotate_left(w, t);
						w = self.left_of(self.parent_of(x, t), t);
					}
					let xp2 = self.parent_of(x, t);
					self.set_colour_at(w, t, self.colour_at(xp2, t));
					self.set_colour_at(xp2, t, Colour::Black);
					self.set_colour_at(self.left_of(w, t), t, Colour::Black);
					self.rotate_right(xp2, t);
					x = self.root;
				}
			}
		}
		self.set_colour_at(x, t, Colour::Black);
	}
}
