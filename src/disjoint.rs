/*!
Lock-free parallel disjoint sets, after "Wait-free Parallel Algorithms
for the Union-Find Problem" (Anderson & Woll).

Used to group handles into simple components and complement edges
into connected components, from parallel or serial contexts alike.
*/

use std::sync::atomic::{AtomicU64, Ordering};

pub struct DisjointSets {
    parent: Vec<AtomicU64>,
    rank: Vec<AtomicU64>,
}

impl DisjointSets {
    pub fn new(size: usize) -> Self {
        let mut parent = Vec::with_capacity(size);
        let mut rank = Vec::with_capacity(size);
        for i in 0..size {
            parent.push(AtomicU64::new(i as u64));
            rank.push(AtomicU64::new(0));
        }
        Self { parent, rank }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    #[inline]
    fn parent_of(&self, id: u64) -> u64 {
        self.parent[id as usize].load(Ordering::SeqCst)
    }

    #[inline]
    fn rank_of(&self, id: u64) -> u64 {
        self.rank[id as usize].load(Ordering::SeqCst)
    }

    /// Find the representative of `id`'s set, halving the path along
    /// the way.
    pub fn find(&self, mut id: u64) -> u64 {
        loop {
            let parent = self.parent_of(id);
            if parent == id {
                return id;
            }
            let grandparent = self.parent_of(parent);
            let _ = self.parent[id as usize].compare_exchange(
                parent,
                grandparent,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            id = grandparent;
        }
    }

    /// True if both ids are currently in the same set.
    pub fn same(&self, mut id_1: u64, mut id_2: u64) -> bool {
        loop {
            id_1 = self.find(id_1);
            id_2 = self.find(id_2);

            if id_1 == id_2 {
                return true;
            }
            if self.parent_of(id_1) == id_1 {
                return false;
            }
        }
    }

    /// Merge the sets of the two ids, returning the surviving
    /// representative.
    pub fn unite(&self, mut id_1: u64, mut id_2: u64) -> u64 {
        loop {
            id_1 = self.find(id_1);
            id_2 = self.find(id_2);

            if id_1 == id_2 {
                return id_1;
            }

            let mut r_1 = self.rank_of(id_1);
            let mut r_2 = self.rank_of(id_2);

            // the lower-ranked root is attached under the other
            if r_1 > r_2 || (r_1 == r_2 && id_1 < id_2) {
                std::mem::swap(&mut r_1, &mut r_2);
                std::mem::swap(&mut id_1, &mut id_2);
            }

            if self.parent[id_1 as usize]
                .compare_exchange(id_1, id_2, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                continue;
            }

            if r_1 == r_2 {
                let _ = self.rank[id_2 as usize].compare_exchange(
                    r_2,
                    r_2 + 1,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
            }

            return id_2;
        }
    }
}
