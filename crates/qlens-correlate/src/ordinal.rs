//! Global event ordinals
//!
//! All files are merged into one timeline with a k-way merge. Every event gets an
//! `event_num` (its diagram row) and an `order_num` (its position in the merge output).
//! Simultaneous events of different files share a row; an event repeating a timestamp in
//! its own file always opens a new row.

use crate::traced::TracedEvent;

/// Assign `event_num`/`order_num` across per-file streams, each already sorted by time.
///
/// Returns the number of rows used.
pub fn assign_ordinals(streams: &mut [Vec<TracedEvent>]) -> usize {
    let mut cursors = vec![0usize; streams.len()];
    let mut group_files: Vec<usize> = Vec::new();
    let mut group_time: Option<i64> = None;
    let mut rows = 0usize;
    let mut order = 0usize;

    while let Some(file) = next_cursor(streams, &cursors, &group_files) {
        let event = &mut streams[file][cursors[file]];
        let time = event.time();

        if group_time != Some(time) || group_files.contains(&file) {
            rows += 1;
            group_files.clear();
            group_time = Some(time);
        }
        group_files.push(file);

        event.event_num = rows - 1;
        event.order_num = order;
        order += 1;
        cursors[file] += 1;
    }

    rows
}

/// Cursor with the smallest timestamp. On a tie, a later cursor wins over one already
/// used by the current row.
fn next_cursor(
    streams: &[Vec<TracedEvent>],
    cursors: &[usize],
    group_files: &[usize],
) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;

    for (file, stream) in streams.iter().enumerate() {
        let Some(event) = stream.get(cursors[file]) else {
            continue;
        };
        let time = event.time();

        best = match best {
            None => Some((file, time)),
            Some((_, min)) if time < min => Some((file, time)),
            Some((current, min)) if time == min && group_files.contains(&current) => {
                Some((file, time))
            }
            keep => keep,
        };
    }

    best.map(|(file, _)| file)
}
