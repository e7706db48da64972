//! Pairing endpoints of different files into connections

use crate::grouper::EndpointView;

/// Index pairs `(i, j)`, `i < j`, of views sharing a connection id across different files
pub fn pair_endpoints(views: &[EndpointView]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();

    for (i, first) in views.iter().enumerate() {
        for (j, second) in views.iter().enumerate().skip(i + 1) {
            if first.connection_id == second.connection_id && first.file_name != second.file_name
            {
                pairs.push((i, j));
            }
        }
    }

    pairs
}

/// Indices of views that take part in no pair
pub fn unpaired(views: &[EndpointView], pairs: &[(usize, usize)]) -> Vec<usize> {
    (0..views.len())
        .filter(|i| !pairs.iter().any(|&(a, b)| a == *i || b == *i))
        .collect()
}
