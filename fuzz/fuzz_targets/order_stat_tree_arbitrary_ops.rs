#![no_main]

use libfuzzer_sys::fuzz_target;
use timestat::ds::OrderStatTree;
use timestat::reading::Reading;

// Fuzz arbitrary operation sequences on OrderStatTree
//
// Mirrors every operation on a sorted Vec and compares rank, rank_of and
// prefix sums against it.
fuzz_target!(|data: &[u8]| {
    let mut tree: OrderStatTree<Reading, usize> = OrderStatTree::new();
    let mut model: Vec<Reading> = Vec::new();

    for (step, chunk) in data.chunks_exact(2).enumerate() {
        let op = chunk[0] % 5;
        let value = if chunk[1] == 0xFF {
            Reading::Dnf
        } else {
            Reading::Finite(i64::from(chunk[1]))
        };

        match op {
            0 | 1 => {
                tree.insert(value, step);
                let at = model.partition_point(|v| *v <= value);
                model.insert(at, value);
            }
            2 => {
                let removed = tree.remove(&value).is_some();
                let at = model.iter().position(|v| *v == value);
                assert_eq!(removed, at.is_some());
                if let Some(at) = at {
                    model.remove(at);
                }
            }
            3 => {
                let k = usize::from(chunk[1]) % (model.len() + 1);
                assert_eq!(tree.rank(k), model.get(k));
                let expected: i128 = model[..k]
                    .iter()
                    .map(|r| i128::from(r.as_millis()))
                    .sum();
                assert_eq!(tree.cum_sum(k), expected);
            }
            4 => {
                assert_eq!(tree.rank_of(&value), model.partition_point(|v| *v < value));
                assert_eq!(tree.find(&value).is_some(), model.contains(&value));
            }
            _ => unreachable!(),
        }

        assert_eq!(tree.len(), model.len());
    }

    tree.check_invariants().unwrap();
    let walked: Vec<Reading> = tree.iter().map(|(v, _)| *v).collect();
    assert_eq!(walked, model);
});
