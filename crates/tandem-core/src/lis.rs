//! Longest increasing subsequence, used to keep the largest set of children in
//! place when computing moves.

/// Returns the positions (into `sequence`) of one longest strictly increasing
/// subsequence, in ascending order. Runs in `O(n log n)`.
pub fn longest_increasing_subsequence(sequence: &[usize]) -> Vec<usize> {
    if sequence.is_empty() {
        return Vec::new();
    }
    // tails[k] = position of the smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::with_capacity(sequence.len());
    let mut previous: Vec<Option<usize>> = vec![None; sequence.len()];

    for (position, &value) in sequence.iter().enumerate() {
        let slot = tails.partition_point(|&tail| sequence[tail] < value);
        if slot > 0 {
            previous[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        result.push(position);
        cursor = previous[position];
    }
    result.reverse();
    result
}
