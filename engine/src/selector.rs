//! Random selection of entries under a count or size budget.
//!
//! All functions take the random source explicitly so a seeded `StdRng`
//! reproduces a selection exactly.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::model::{DirectoryInventory, MediaEntry, SelectionBudget};

/// Select according to `budget`, balanced across source directories or not.
pub fn select<R: Rng + ?Sized>(
    inventory: &DirectoryInventory,
    budget: SelectionBudget,
    balanced: bool,
    rng: &mut R,
) -> Vec<MediaEntry> {
    match budget {
        SelectionBudget::ByCount(n) => select_by_count(inventory, n, balanced, rng),
        SelectionBudget::BySize(target) => select_by_size(inventory, target, balanced, rng),
    }
}

/// Select up to `n` entries without replacement.
///
/// Unbalanced: a uniform sample of `min(n, total)` entries from all
/// directories. Balanced: each directory contributes `n / dirs` entries, the
/// first `n % dirs` directories one more, each capped at its own pool; any
/// shortfall is then topped up uniformly from the entries not yet chosen.
pub fn select_by_count<R: Rng + ?Sized>(
    inventory: &DirectoryInventory,
    n: usize,
    balanced: bool,
    rng: &mut R,
) -> Vec<MediaEntry> {
    let all = inventory.all_entries();
    let n = n.min(all.len());
    if n == 0 {
        return Vec::new();
    }
    if !balanced || inventory.dir_count() == 0 {
        return all.choose_multiple(rng, n).cloned().collect();
    }

    let dir_count = inventory.dir_count();
    let base = n / dir_count;
    let mut remainder = n % dir_count;

    let mut selected = Vec::with_capacity(n);
    for (_, pool) in inventory.iter() {
        let mut share = base;
        if remainder > 0 {
            share += 1;
            remainder -= 1;
        }
        let take = share.min(pool.len());
        selected.extend(pool.choose_multiple(rng, take).cloned());
    }

    if selected.len() < n {
        let chosen: HashSet<&Path> = selected.iter().map(|e| e.path.as_path()).collect();
        let rest: Vec<&MediaEntry> = all
            .iter()
            .filter(|e| !chosen.contains(e.path.as_path()))
            .collect();
        let missing = n - selected.len();
        let top_up: Vec<MediaEntry> = rest
            .choose_multiple(rng, missing)
            .map(|e| (*e).clone())
            .collect();
        selected.extend(top_up);
    }
    selected
}

/// Select entries whose total size stays within `target_bytes`.
///
/// Unbalanced: shuffle everything once, then walk the order adding each entry
/// that still fits, stopping once the target is reached. Entries that would
/// overshoot are skipped, so the result can under-fill.
///
/// Balanced: entries are grouped by the folder that directly contains them,
/// so each subfolder of a source directory is its own group. Every group gets
/// `target_bytes / groups` (the integer remainder is dropped, so the total
/// never exceeds the target) and fills it smallest-first.
pub fn select_by_size<R: Rng + ?Sized>(
    inventory: &DirectoryInventory,
    target_bytes: u64,
    balanced: bool,
    rng: &mut R,
) -> Vec<MediaEntry> {
    if target_bytes == 0 || inventory.is_empty() {
        return Vec::new();
    }

    if !balanced {
        let mut shuffled = inventory.all_entries();
        shuffled.shuffle(rng);
        return fill_greedy(shuffled, target_bytes);
    }

    let groups = group_by_parent(inventory.all_entries());
    if groups.is_empty() {
        return Vec::new();
    }
    let share = target_bytes / groups.len() as u64;

    let mut selected = Vec::new();
    for mut group in groups {
        group.sort_by(|a, b| a.size_bytes.cmp(&b.size_bytes).then_with(|| a.path.cmp(&b.path)));
        selected.extend(fill_greedy(group, share));
    }
    selected
}

/// Group entries by their parent folder, groups in first-seen order.
fn group_by_parent(entries: Vec<MediaEntry>) -> Vec<Vec<MediaEntry>> {
    let mut index: HashMap<PathBuf, usize> = HashMap::new();
    let mut groups: Vec<Vec<MediaEntry>> = Vec::new();
    for entry in entries {
        let parent = entry.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let slot = *index.entry(parent).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(entry);
    }
    groups
}

fn fill_greedy(candidates: Vec<MediaEntry>, budget: u64) -> Vec<MediaEntry> {
    let mut total = 0u64;
    let mut selected = Vec::new();
    for entry in candidates {
        if total + entry.size_bytes <= budget {
            total += entry.size_bytes;
            selected.push(entry);
        }
        if total >= budget {
            break;
        }
    }
    selected
}
