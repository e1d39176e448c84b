//! The theta-tree of spec.md §4.7: a complete binary tree over tasks sorted by `est`, each leaf
//! holding an `(est, proc, present)` triple, each internal node caching the sum of processing
//! times of present descendants (`sigmaP`) and the earliest completion time achievable over the
//! subtree (`ect`). Backs the overload check and detectable-precedences/not-first/not-last
//! filters of the n-ary disjunctive propagator (spec.md §4.9).

use crate::propagators::task::SENTINEL_MAX;
use crate::propagators::task::SENTINEL_MIN;

const NEG_INF: i64 = i64::MIN / 4;

/// `(est, proc)` of a task, indexed by the caller's own id — passed to [`ThetaTree::init`] in any
/// order; the tree sorts internally and remembers the mapping from id to leaf.
#[derive(Clone, Copy, Debug)]
pub struct ThetaEntry {
    pub est: i32,
    pub proc: i32,
}

#[derive(Clone, Debug)]
pub struct ThetaTree {
    size: usize,
    leaf_of_id: Vec<usize>,
    est: Vec<i32>,
    proc: Vec<i32>,
    present: Vec<bool>,
    sigma_p: Vec<i64>,
    ect: Vec<i64>,
}

impl ThetaTree {
    /// Sorts `entries` by `est` and fills the leaves in that order (spec.md §4.7). All tasks
    /// start out absent; callers `add` them as the outer algorithm's sweep admits them.
    pub fn init(entries: &[ThetaEntry]) -> Self {
        let n = entries.len();
        let size = n.max(1).next_power_of_two();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| entries[i].est);

        let mut leaf_of_id = vec![0usize; n];
        let mut est = vec![SENTINEL_MIN; size];
        let mut proc = vec![0i32; size];
        for (slot, &original_id) in order.iter().enumerate() {
            leaf_of_id[original_id] = slot;
            est[slot] = entries[original_id].est;
            proc[slot] = entries[original_id].proc;
        }

        let mut tree = ThetaTree {
            size,
            leaf_of_id,
            est,
            proc,
            present: vec![false; size],
            sigma_p: vec![0; 2 * size],
            ect: vec![NEG_INF; 2 * size],
        };
        for slot in 0..size {
            tree.recompute_node(size + slot);
        }
        for node in (1..size).rev() {
            tree.recompute_node(node);
        }
        tree
    }

    fn recompute_node(&mut self, node: usize) {
        if node >= self.size {
            let slot = node - self.size;
            if self.present[slot] {
                self.sigma_p[node] = self.proc[slot] as i64;
                self.ect[node] = self.est[slot] as i64 + self.proc[slot] as i64;
            } else {
                self.sigma_p[node] = 0;
                self.ect[node] = NEG_INF;
            }
        } else {
            let left = 2 * node;
            let right = 2 * node + 1;
            self.sigma_p[node] = self.sigma_p[left] + self.sigma_p[right];
            self.ect[node] = (self.ect[left] + self.sigma_p[right]).max(self.ect[right]);
        }
    }

    fn propagate_up(&mut self, mut node: usize) {
        while node > 1 {
            node /= 2;
            self.recompute_node(node);
        }
    }

    pub fn add(&mut self, id: usize) {
        let slot = self.leaf_of_id[id];
        if self.present[slot] {
            return;
        }
        self.present[slot] = true;
        let leaf = self.size + slot;
        self.recompute_node(leaf);
        self.propagate_up(leaf);
    }

    pub fn remove(&mut self, id: usize) {
        let slot = self.leaf_of_id[id];
        if !self.present[slot] {
            return;
        }
        self.present[slot] = false;
        let leaf = self.size + slot;
        self.recompute_node(leaf);
        self.propagate_up(leaf);
    }

    pub fn is_present(&self, id: usize) -> bool {
        self.present[self.leaf_of_id[id]]
    }

    pub fn get_ect(&self) -> i32 {
        clamp(self.ect[1])
    }

    /// Reads `ect(root)` as if `id` were not present, without disturbing the tree afterwards
    /// (spec.md §4.7).
    pub fn get_ect_without(&mut self, id: usize) -> i32 {
        if !self.is_present(id) {
            return self.get_ect();
        }
        self.remove(id);
        let result = self.get_ect();
        self.add(id);
        result
    }
}

fn clamp(value: i64) -> i32 {
    value.clamp(SENTINEL_MIN as i64, SENTINEL_MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ect_of_a_single_present_task() {
        let mut tree = ThetaTree::init(&[ThetaEntry { est: 3, proc: 4 }]);
        assert_eq!(tree.get_ect(), SENTINEL_MIN);
        tree.add(0);
        assert_eq!(tree.get_ect(), 7);
    }

    #[test]
    fn ect_accounts_for_interleaved_est() {
        // est/proc: 0:(0,3) 1:(1,3) 2:(5,2)
        let entries = [
            ThetaEntry { est: 0, proc: 3 },
            ThetaEntry { est: 1, proc: 3 },
            ThetaEntry { est: 5, proc: 2 },
        ];
        let mut tree = ThetaTree::init(&entries);
        tree.add(0);
        tree.add(1);
        // Sequentially: task 0 from [0,3), task 1 cannot start before 3 -> ect = 6.
        assert_eq!(tree.get_ect(), 6);
        tree.add(2);
        // Task 2 can only start after both others finish (est=5 < ect so far): ect = 6 + 2 = 8.
        assert_eq!(tree.get_ect(), 8);
    }

    #[test]
    fn remove_undoes_a_contribution() {
        let entries = [
            ThetaEntry { est: 0, proc: 3 },
            ThetaEntry { est: 1, proc: 3 },
        ];
        let mut tree = ThetaTree::init(&entries);
        tree.add(0);
        tree.add(1);
        assert_eq!(tree.get_ect(), 6);
        tree.remove(0);
        assert_eq!(tree.get_ect(), 4);
    }

    #[test]
    fn get_ect_without_restores_state() {
        let entries = [
            ThetaEntry { est: 0, proc: 3 },
            ThetaEntry { est: 1, proc: 3 },
        ];
        let mut tree = ThetaTree::init(&entries);
        tree.add(0);
        tree.add(1);
        assert_eq!(tree.get_ect_without(0), 4);
        // Original state is restored afterwards.
        assert_eq!(tree.get_ect(), 6);
        assert!(tree.is_present(0));
    }
}
