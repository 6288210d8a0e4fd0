//! Built-in in-process targets. Each returns a work counter that grows with
//! how hard the input made it work.

pub type TargetFn = fn(&[i64]) -> u64;

pub const NAMES: &[&str] = &["bubble-sort", "insertion-sort", "sum", "crash-on-zero"];

pub fn lookup(name: &str) -> Option<TargetFn> {
    match name {
        "bubble-sort" => Some(bubble_sort),
        "insertion-sort" => Some(insertion_sort),
        "sum" => Some(sum),
        "crash-on-zero" => Some(crash_on_zero),
        _ => None,
    }
}

/// Bubble sort with early exit; counts comparisons.
pub fn bubble_sort(data: &[i64]) -> u64 {
    let mut items = data.to_vec();
    let mut comparisons = 0;
    for pass in 0..items.len() {
        let mut swapped = false;
        for i in 0..items.len() - 1 - pass {
            comparisons += 1;
            if items[i] > items[i + 1] {
                items.swap(i, i + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
    comparisons
}

/// Counts comparisons plus element shifts.
pub fn insertion_sort(data: &[i64]) -> u64 {
    let mut items = data.to_vec();
    let mut work = 0;
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 {
            work += 1;
            if items[j - 1] <= items[j] {
                break;
            }
            items.swap(j - 1, j);
            work += 1;
            j -= 1;
        }
    }
    work
}

pub fn sum(data: &[i64]) -> u64 {
    data.iter()
        .map(|v| v.unsigned_abs())
        .fold(0, u64::saturating_add)
}

/// `sum`, except that it panics on inputs starting with zero.
pub fn crash_on_zero(data: &[i64]) -> u64 {
    if data.first() == Some(&0) {
        panic!("Input starting with zero: {data:?}");
    }
    sum(data)
}
