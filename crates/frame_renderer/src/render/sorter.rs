//! # Draw-Surface Sorter
//!
//! Orders a view's surfaces ascending by packed sort key.
//!
//! Short ranges (at most [`CUTOFF`] surfaces) use a selection pass that
//! moves the largest key to the end on each iteration. Longer ranges are
//! partitioned around their middle element by an iterative quicksort; the
//! larger partition is pushed on an explicit stack and the smaller one is
//! processed next, which bounds the stack to `log2(n)` entries.

use crate::render::draw_surface::DrawSurface;

/// Ranges at or below this size are selection sorted
pub const CUTOFF: usize = 8;

/// Sort surfaces ascending by sort key
pub fn sort_draw_surfaces(surfs: &mut [DrawSurface]) {
    if surfs.len() < 2 {
        return;
    }

    // inclusive (lo, hi) ranges still to sort
    let mut stack: Vec<(usize, usize)> = Vec::with_capacity(usize::BITS as usize);
    let (mut lo, mut hi) = (0, surfs.len() - 1);

    loop {
        let size = hi - lo + 1;
        if size <= CUTOFF {
            short_sort(&mut surfs[lo..=hi]);
        } else {
            let (left_end, right_start) = partition(surfs, lo, hi);
            // left is lo..left_end, right is right_start..=hi
            let left_size = left_end - lo;
            let right_size = hi + 1 - right_start;

            if left_size >= right_size {
                if left_size > 1 {
                    stack.push((lo, left_end - 1));
                }
                if right_size > 1 {
                    lo = right_start;
                    continue;
                }
            } else {
                if right_size > 1 {
                    stack.push((right_start, hi));
                }
                if left_size > 1 {
                    hi = left_end - 1;
                    continue;
                }
            }
        }

        match stack.pop() {
            Some((next_lo, next_hi)) => {
                lo = next_lo;
                hi = next_hi;
            }
            None => break,
        }
    }
}

/// Partition `surfs[lo..=hi]` around its middle element
///
/// Returns `(pivot_index, right_start)`: everything before the pivot is not
/// greater than it and everything from `right_start` on is not smaller.
fn partition(surfs: &mut [DrawSurface], lo: usize, hi: usize) -> (usize, usize) {
    let mid = lo + (hi - lo + 1) / 2;
    surfs.swap(mid, lo);
    let pivot = surfs[lo].sort;

    let mut lo_guy = lo;
    let mut hi_guy = hi + 1;
    loop {
        loop {
            lo_guy += 1;
            if lo_guy > hi || surfs[lo_guy].sort > pivot {
                break;
            }
        }
        loop {
            hi_guy -= 1;
            if hi_guy <= lo || surfs[hi_guy].sort < pivot {
                break;
            }
        }
        if hi_guy < lo_guy {
            break;
        }
        surfs.swap(lo_guy, hi_guy);
    }

    surfs.swap(lo, hi_guy);
    (hi_guy, lo_guy)
}

fn short_sort(surfs: &mut [DrawSurface]) {
    let mut end = surfs.len();
    while end > 1 {
        let mut max = 0;
        for i in 1..end {
            if surfs[i].sort > surfs[max].sort {
                max = i;
            }
        }
        surfs.swap(max, end - 1);
        end -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::draw_surface::SurfaceHandle;
    use crate::render::sort_key::SortKey;

    fn surfs_from(keys: impl IntoIterator<Item = u32>) -> Vec<DrawSurface> {
        keys.into_iter()
            .enumerate()
            .map(|(i, key)| DrawSurface {
                sort: SortKey::from_raw(key),
                surface: SurfaceHandle::World(i as u32),
            })
            .collect()
    }

    fn lcg_keys(seed: u32, count: usize, modulus: u32) -> Vec<u32> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) % modulus
            })
            .collect()
    }

    fn assert_sorted_permutation(input: &[u32]) {
        let mut surfs = surfs_from(input.iter().copied());
        sort_draw_surfaces(&mut surfs);

        assert!(surfs.windows(2).all(|w| w[0].sort <= w[1].sort), "not sorted: {input:?}");

        let mut expected = input.to_vec();
        expected.sort_unstable();
        let keys: Vec<u32> = surfs.iter().map(|s| s.sort.raw()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_trivial_lengths() {
        assert_sorted_permutation(&[]);
        assert_sorted_permutation(&[5]);
        assert_sorted_permutation(&[5, 1]);
        assert_sorted_permutation(&[3, 3, 1, 2, 9, 0, 7, 7]);
    }

    #[test]
    fn test_random_lists_are_non_decreasing() {
        for (seed, count) in [(1, 9), (7, 64), (42, 1000), (1234, 4097)] {
            assert_sorted_permutation(&lcg_keys(seed, count, u32::MAX));
        }
    }

    #[test]
    fn test_heavy_duplicates() {
        assert_sorted_permutation(&lcg_keys(3, 2000, 4));
        assert_sorted_permutation(&vec![17; 300]);
    }

    #[test]
    fn test_presorted_and_reversed() {
        let ascending: Vec<u32> = (0..500).collect();
        assert_sorted_permutation(&ascending);
        let descending: Vec<u32> = (0..500).rev().collect();
        assert_sorted_permutation(&descending);
    }

    #[test]
    fn test_shader_groups_are_contiguous() {
        let keys: Vec<u32> = lcg_keys(99, 512, 1 << 20)
            .into_iter()
            .map(|k| SortKey::encode(k % 5, k % 1000, k % 31, k % 2).raw())
            .collect();
        let mut surfs = surfs_from(keys);
        sort_draw_surfaces(&mut surfs);

        let shaders: Vec<u32> = surfs.iter().map(|s| s.sort.shader()).collect();
        assert!(shaders.windows(2).all(|w| w[0] <= w[1]));
    }
}
