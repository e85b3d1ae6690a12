use lifetime_guard::StaticLifetimeGuard;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    New,
    Clone(usize),
    Take(usize),
    Drop(usize),
    Swap(usize, usize),
    CloneFrom(usize, usize),
    AssignFrom(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::New),
        2 => any::<usize>().prop_map(Op::Clone),
        2 => any::<usize>().prop_map(Op::Take),
        3 => any::<usize>().prop_map(Op::Drop),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::CloneFrom(a, b)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AssignFrom(a, b)),
    ]
}

/// Applies `op` to `live`; indices wrap around the current length.
fn apply<T: Send + Sync + 'static>(live: &mut Vec<StaticLifetimeGuard<T>>, op: &Op) {
    let len = live.len();
    match *op {
        Op::New => live.push(StaticLifetimeGuard::new()),
        _ if len == 0 => {}
        Op::Clone(i) => {
            let copy = live[i % len].clone();
            live.push(copy);
        }
        Op::Take(i) => {
            let taken = std::mem::take(&mut live[i % len]);
            live.push(taken);
        }
        Op::Drop(i) => {
            live.swap_remove(i % len);
        }
        Op::Swap(i, j) => live.swap(i % len, j % len),
        Op::CloneFrom(i, j) => {
            let (i, j) = (i % len, j % len);
            if i != j {
                let source = live[j].clone();
                live[i].clone_from(&source);
            }
        }
        Op::AssignFrom(i, j) => {
            let (i, j) = (i % len, j % len);
            if i != j {
                let (lo, hi) = (i.min(j), i.max(j));
                let (left, right) = live.split_at_mut(hi);
                left[lo].assign_from(&mut right[0]);
            }
        }
    }
}

proptest! {
    #[test]
    fn test_count_equals_live_tokens(ops in proptest::collection::vec(op(), 0..64)) {
        struct Unbuilt;

        let mut live: Vec<StaticLifetimeGuard<Unbuilt>> = Vec::new();
        for op in &ops {
            apply(&mut live, op);
            prop_assert_eq!(StaticLifetimeGuard::<Unbuilt>::count(), live.len() as u64);
            prop_assert!(!StaticLifetimeGuard::<Unbuilt>::is_constructed());
        }
        drop(live);
        prop_assert_eq!(StaticLifetimeGuard::<Unbuilt>::count(), 0);
    }

    #[test]
    fn test_anchor_adds_exactly_one(ops in proptest::collection::vec(op(), 0..64)) {
        #[derive(Default)]
        struct Built;

        StaticLifetimeGuard::<Built>::instance();
        let mut live: Vec<StaticLifetimeGuard<Built>> = Vec::new();
        for op in &ops {
            apply(&mut live, op);
            StaticLifetimeGuard::<Built>::instance();
            prop_assert_eq!(StaticLifetimeGuard::<Built>::count(), live.len() as u64 + 1);
        }
        drop(live);
        prop_assert_eq!(StaticLifetimeGuard::<Built>::count(), 1);
        prop_assert_eq!(StaticLifetimeGuard::<Built>::generation(), 1);
    }
}
