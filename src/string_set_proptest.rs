#![cfg(test)]

// Property tests for StringSet kept inside the crate, next to the snapshot
// internals they indirectly exercise (growth, chains, forced collisions).

use crate::hash::StringHash;
use crate::string_set::StringSet;
use hashbrown::{HashMap, HashSet};
use proptest::prelude::*;
use std::sync::Arc;

// Pool-indexed operations: indices shrink to earlier strings.
#[derive(Clone, Debug)]
enum Op {
    Add(usize),
    AddUnits(usize, usize),
    Lookup(usize),
    LookupForeign(String),
    Cursor(usize),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (usize, bool, Vec<String>, Vec<Op>)> {
    let pool = proptest::collection::vec("[a-cé\u{1F600}]{0,4}", 1..=12);

    (1usize..=4, any::<bool>(), pool).prop_flat_map(|(capacity, collide, pool)| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            idx.clone().prop_map(Op::Add),
            (idx.clone(), 0usize..3).prop_map(|(i, pad)| Op::AddUnits(i, pad)),
            idx.clone().prop_map(Op::Lookup),
            "[d-f]{1,3}".prop_map(Op::LookupForeign),
            idx.clone().prop_map(Op::Cursor),
            Just(Op::Iterate),
        ];

        proptest::collection::vec(op, 1..80).prop_map(move |ops| (capacity, collide, pool.clone(), ops))
    })
}

// With `collide`, every string is supplied the same hash.
fn forced_hash(collide: bool) -> Option<StringHash> {
    collide.then_some(StringHash::from_raw(7))
}

// Property: state-machine equivalence against a hashbrown::HashSet model.
// Invariants exercised across random operation sequences:
// - `add`/`add_units` report an insertion exactly when the model does.
// - Every inserting call returns the same canonical instance for equal text.
// - Lookups hit exactly the model's strings and return the canonical instance.
// - A cursor yields each string of its hash exactly once.
// - `iter` yields insertion order; `len <= max_size`, and `max_size` only
//   grows by doubling from the initial capacity.
// - With `collide`, every string shares one supplied hash: full comparison
//   still disambiguates and no growth happens before the set is full.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((capacity, collide, pool, ops) in arb_scenario()) {
        let set = StringSet::new(capacity);
        let mut model: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut canonical: HashMap<String, Arc<str>> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(i) => {
                    let s = &pool[i];
                    let (added, value) = set.intern(s.as_str(), forced_hash(collide)).unwrap();
                    prop_assert_eq!(added, model.insert(s.clone()));
                    if added {
                        order.push(s.clone());
                        canonical.insert(s.clone(), value.clone());
                    }
                    prop_assert!(Arc::ptr_eq(&value, &canonical[s]));
                }
                Op::AddUnits(i, pad) => {
                    let s = &pool[i];
                    let mut buffer = vec![b'#' as u16; pad];
                    buffer.extend(s.encode_utf16());
                    buffer.push(b'#' as u16);
                    let length = buffer.len() - pad - 1;

                    let (added, value) = set.add_units(&buffer, pad, length, forced_hash(collide)).unwrap();
                    prop_assert_eq!(added, model.insert(s.clone()));
                    if added {
                        order.push(s.clone());
                        canonical.insert(s.clone(), value.clone());
                    }
                    prop_assert_eq!(&*value, s.as_str());
                    prop_assert!(Arc::ptr_eq(&value, &canonical[s]));
                }
                Op::Lookup(i) => {
                    let s = &pool[i];
                    let units: Vec<u16> = s.encode_utf16().collect();
                    let by_str = set.get_existing_str(s, forced_hash(collide));
                    let by_units = set.get_existing(&units, 0, units.len(), forced_hash(collide)).unwrap();

                    match canonical.get(s) {
                        Some(expected) => {
                            prop_assert!(Arc::ptr_eq(by_str.as_ref().unwrap(), expected));
                            prop_assert!(Arc::ptr_eq(by_units.as_ref().unwrap(), expected));
                        }
                        None => {
                            prop_assert!(by_str.is_none());
                            prop_assert!(by_units.is_none());
                        }
                    }
                }
                Op::LookupForeign(s) => {
                    prop_assert!(set.get_existing_str(&s, forced_hash(collide)).is_none());
                }
                Op::Cursor(i) => {
                    let hash = forced_hash(collide).unwrap_or_else(|| StringHash::of_str(&pool[i]));
                    let found: Vec<Arc<str>> = set.get_search_cursor(hash).collect();

                    let mut expected: Vec<&str> = order
                        .iter()
                        .filter(|s| forced_hash(collide).unwrap_or_else(|| StringHash::of_str(s)) == hash)
                        .map(String::as_str)
                        .collect();
                    let mut actual: Vec<&str> = found.iter().map(|s| &**s).collect();
                    expected.sort();
                    actual.sort();

                    prop_assert_eq!(expected, actual);
                }
                Op::Iterate => {
                    let seen: Vec<String> = set.iter().map(|s| s.to_string()).collect();
                    prop_assert_eq!(&seen, &order);
                }
            }

            prop_assert_eq!(set.len(), model.len());
            prop_assert_eq!(set.is_empty(), model.is_empty());
            prop_assert!(set.len() <= set.max_size());

            let ratio = set.max_size() / capacity;
            prop_assert_eq!(set.max_size() % capacity, 0);
            prop_assert!(ratio.is_power_of_two());
            if model.len() <= capacity {
                prop_assert_eq!(set.max_size(), capacity);
            }
        }
    }
}
