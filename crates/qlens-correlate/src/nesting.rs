//! Nesting slots for overlapping message exchanges
//!
//! Each matched pair spans the rows `[start, end]`. Pairs whose spans overlap get different
//! slots; freed slots are reused lowest-first. A pair that starts and ends on the same row
//! takes the lowest free slot without occupying it.
//!
//! Same-row detection is per pair: the sweep treats a pair as same-row only when the opening
//! and closing cursors both point at that pair. A span opening on a row where a different
//! span closes is an ordinary overlap.

/// Assign a slot to every `(start, end)` span. Reversed spans are normalized.
pub fn assign_slots(spans: &[(usize, usize)]) -> Vec<usize> {
    let spans: Vec<(usize, usize)> = spans
        .iter()
        .map(|&(a, b)| (a.min(b), a.max(b)))
        .collect();
    let same_row = |i: usize| spans[i].0 == spans[i].1;

    let mut by_start: Vec<usize> = (0..spans.len()).collect();
    by_start.sort_by_key(|&i| (spans[i].0, same_row(i), spans[i].1));
    let mut by_end: Vec<usize> = (0..spans.len()).collect();
    by_end.sort_by_key(|&i| (spans[i].1, spans[i].0));

    let mut slots: Vec<Option<usize>> = vec![None; spans.len()];
    let mut occupied: Vec<bool> = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < by_start.len() && j < by_end.len() {
        let opening = by_start[i];
        let closing = by_end[j];
        let start = spans[opening].0;
        let end = spans[closing].1;

        if opening == closing && same_row(opening) {
            slots[opening] = Some(lowest_free(&mut occupied));
            i += 1;
            j += 1;
        } else if start < end || (start == end && !same_row(opening)) {
            let slot = lowest_free(&mut occupied);
            occupied[slot] = true;
            slots[opening] = Some(slot);
            i += 1;
        } else {
            if let Some(slot) = slots[closing] {
                occupied[slot] = false;
            }
            j += 1;
        }
    }

    slots.into_iter().map(|s| s.unwrap_or(0)).collect()
}

fn lowest_free(occupied: &mut Vec<bool>) -> usize {
    match occupied.iter().position(|taken| !taken) {
        Some(slot) => slot,
        None => {
            occupied.push(false);
            occupied.len() - 1
        }
    }
}
