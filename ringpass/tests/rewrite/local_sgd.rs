use ringpass::strategy::snapshot_name;
use ringpass::{AttrValue, LocalSgd, NoWait, OpRole, OpType, Transpiler};

use super::helpers::{build_programs, first_input, ops_of, ring_id, two_node};

#[test]
fn test_single_update_creates_one_snapshot() {
    let (mut startup, mut main) = build_programs(&[("w", false)]);
    Transpiler::new(LocalSgd)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &two_node(0))
        .unwrap();

    let block = main.global_block();
    let snapshots: Vec<_> = block
        .vars()
        .filter(|v| v.name == snapshot_name("w"))
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].persistable);

    let tail: Vec<&str> = block.ops()[block.len() - 3..]
        .iter()
        .map(|op| op.op_type())
        .collect();
    assert_eq!(tail, vec!["scale", "elementwise_sub", "assign"]);
    let assign = &block.ops()[block.len() - 1];
    assert_eq!(assign.output("Out"), ["w@SNAPSHOT".to_string()]);
    let sub = &block.ops()[block.len() - 2];
    assert_eq!(first_input(sub), "w@SNAPSHOT");
}

#[test]
fn test_startup_snapshot_follows_broadcast() {
    let (mut startup, mut main) = build_programs(&[("w", false), ("emb", true)]);
    Transpiler::new(LocalSgd)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &two_node(1))
        .unwrap();

    let block = startup.global_block();
    let assigns = ops_of(block, OpType::Assign);
    assert_eq!(assigns.len(), 1);
    assert_eq!(first_input(assigns[0]), "w");
    assert_eq!(assigns[0].role(), Some(OpRole::FORWARD));

    // Snapshot is taken after rank 0's values arrived.
    let last_bcast_sync = block
        .ops()
        .iter()
        .rposition(|op| op.is(OpType::SyncCommStream))
        .unwrap();
    let assign_idx = block.ops().iter().position(|op| op.is(OpType::Assign)).unwrap();
    assert!(last_bcast_sync < assign_idx);
    assert!(block.has_var("w@SNAPSHOT"));
    assert!(!block.has_var("emb@SNAPSHOT"));
}

#[test]
fn test_drift_reduced_after_each_update() {
    let (mut startup, mut main) = build_programs(&[("a", false), ("b", false), ("c", false)]);
    Transpiler::new(LocalSgd)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &two_node(0))
        .unwrap();

    let ops = main.global_block().ops();
    for (idx, op) in ops.iter().enumerate().filter(|(_, op)| op.op_type() == "sgd") {
        let param = op.input("Param")[0].as_str();
        assert!(ops[idx + 1].is(OpType::ElementwiseSub));
        assert!(ops[idx + 2].is(OpType::SyncCalcStream));
        assert!(ops[idx + 3].is(OpType::AllReduceSum));
        assert_eq!(first_input(&ops[idx + 3]), param);
        assert_eq!(ops[idx + 3].role(), Some(OpRole::OPTIMIZE));
    }

    let rings: Vec<i64> = ops_of(main.global_block(), OpType::AllReduceSum)
        .iter()
        .map(|op| ring_id(op))
        .collect();
    assert_eq!(rings, vec![0, 1, 0]);

    // No loss-gradient scaling: the only scales are the averaging ones.
    let scales = ops_of(main.global_block(), OpType::Scale);
    assert_eq!(scales.len(), 3);
    assert!(
        scales
            .iter()
            .all(|op| op.attr("scale").and_then(AttrValue::as_float) == Some(0.5))
    );
}
