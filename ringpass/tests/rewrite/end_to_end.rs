use std::time::Duration;

use ringpass::{
    AttrValue, NoWait, OpType, Program, ReadinessConfig, StrategyKind, TcpReadiness,
    TranspileConfig, TranspileError, Transpiler,
};

use super::helpers::{ENDPOINTS, build_programs, first_input, ops_of, ring_id, two_node};

const PARAMS: [(&str, bool); 3] = [("fc_0.w_0", false), ("fc_0.b_0", false), ("fc_1.w_0", false)];

#[test]
fn test_two_node_rank0_startup() {
    let (mut startup, mut main) = build_programs(&PARAMS);
    let cfg = two_node(0);

    Transpiler::from_kind(StrategyKind::GradAllReduce)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &cfg)
        .unwrap();

    let block = startup.global_block();
    let gen_ids = ops_of(block, OpType::GenNcclId);
    let inits = ops_of(block, OpType::CommInit);
    assert_eq!(gen_ids.len(), 2);
    assert_eq!(inits.len(), 2);
    assert!(
        gen_ids
            .iter()
            .chain(inits.iter())
            .all(|op| op.attr("rank").and_then(AttrValue::as_int) == Some(0))
    );
    assert_eq!(inits.iter().map(|op| ring_id(op)).collect::<Vec<_>>(), vec![0, 1]);

    let broadcasts: Vec<(&str, i64)> = ops_of(block, OpType::Broadcast)
        .into_iter()
        .map(|op| (first_input(op), ring_id(op)))
        .collect();
    assert_eq!(
        broadcasts,
        vec![("fc_0.w_0", 0), ("fc_0.b_0", 1), ("fc_1.w_0", 0)]
    );
    assert_eq!(ops_of(block, OpType::SyncCommStream).len(), 2);

    // Communicator setup precedes every broadcast.
    let last_init = block.ops().iter().rposition(|op| op.is(OpType::CommInit)).unwrap();
    let first_bcast = block.ops().iter().position(|op| op.is(OpType::Broadcast)).unwrap();
    assert!(last_init < first_bcast);
}

#[test]
fn test_single_endpoint_rejected_without_mutation() {
    let (mut startup, mut main) = build_programs(&PARAMS);
    let (startup_before, main_before) = (startup.clone(), main.clone());
    let cfg = TranspileConfig::new(0, [ENDPOINTS[0]], ENDPOINTS[0]);

    let err = Transpiler::from_kind(StrategyKind::GradAllReduce)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &cfg)
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(err, TranspileError::TooFewEndpoints { nranks: 1 }));
    assert_eq!(startup, startup_before);
    assert_eq!(main, main_before);
    assert!(startup.origin().is_none());
}

#[test]
fn test_foreign_current_endpoint_rejected() {
    let (mut startup, mut main) = build_programs(&PARAMS);
    let cfg = TranspileConfig::new(0, ENDPOINTS, "10.0.0.3:6000");
    let err = Transpiler::from_kind(StrategyKind::LocalSgd)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &cfg)
        .unwrap_err();
    assert!(matches!(err, TranspileError::UnknownEndpoint { .. }));
}

#[test]
fn test_rewriting_twice_duplicates_collectives() {
    let (mut startup, mut main) = build_programs(&PARAMS);
    let cfg = two_node(1);
    let mut transpiler = Transpiler::from_kind(StrategyKind::GradAllReduce).with_readiness(NoWait);

    transpiler.transpile(&mut startup, &mut main, &cfg).unwrap();
    let once = ops_of(main.global_block(), OpType::AllReduceSum).len();
    transpiler.transpile(&mut startup, &mut main, &cfg).unwrap();
    let twice = ops_of(main.global_block(), OpType::AllReduceSum).len();

    assert_eq!(once, 3);
    assert_eq!(twice, 6);
    // Fresh communicator ids on the second pass.
    assert_eq!(ops_of(startup.global_block(), OpType::GenNcclId).len(), 4);
    assert_eq!(
        startup
            .global_block()
            .vars()
            .filter(|v| v.name.starts_with("nccl_id_"))
            .count(),
        4
    );
}

#[test]
fn test_config_from_lookup_drives_local_sgd() {
    let env = [
        ("RINGPASS_RANK", "1"),
        ("RINGPASS_ENDPOINTS", "10.0.0.1:6000,10.0.0.2:6000"),
        ("RINGPASS_CURRENT_ENDPOINT", "10.0.0.2:6000"),
        ("RINGPASS_NRINGS", "3"),
        ("RINGPASS_STRATEGY", "local_sgd"),
    ];
    let cfg = TranspileConfig::from_lookup(|key| {
        env.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap();

    let (mut startup, mut main) = build_programs(&PARAMS);
    Transpiler::from_kind(cfg.strategy)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &cfg)
        .unwrap();

    assert_eq!(ops_of(startup.global_block(), OpType::CommInit).len(), 3);
    assert_eq!(ops_of(startup.global_block(), OpType::Assign).len(), 3);
    assert_eq!(ops_of(main.global_block(), OpType::SyncCommStream).len(), 3);
    // One averaging scale per parameter; the loss gradient is left unscaled.
    assert_eq!(ops_of(main.global_block(), OpType::Scale).len(), 3);
    assert!(
        ops_of(main.global_block(), OpType::Scale)
            .iter()
            .all(|op| op.attr("scale").and_then(AttrValue::as_float) == Some(0.5))
    );
}

#[test]
fn test_rank0_waits_for_listening_peer() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let peer = listener.local_addr().unwrap().to_string();
    let me = "127.0.0.1:1";

    let mut cfg = TranspileConfig::new(0, vec![me.to_string(), peer], me);
    cfg.wait_for_peers = true;

    let readiness = TcpReadiness::new(ReadinessConfig {
        probe_timeout: Duration::from_millis(500),
        retry_interval: Duration::from_millis(20),
        deadline: Some(Duration::from_secs(5)),
    });
    let (mut startup, mut main) = build_programs(&PARAMS);
    Transpiler::from_kind(StrategyKind::GradAllReduce)
        .with_readiness(readiness)
        .transpile(&mut startup, &mut main, &cfg)
        .unwrap();
    assert_eq!(ops_of(startup.global_block(), OpType::GenNcclId).len(), 2);
}

#[test]
fn test_unreachable_peer_aborts_before_mutation() {
    let closed = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().to_string()
    };
    let me = "127.0.0.1:1";
    let mut cfg = TranspileConfig::new(0, vec![me.to_string(), closed], me);
    cfg.wait_for_peers = true;

    let readiness = TcpReadiness::new(ReadinessConfig {
        probe_timeout: Duration::from_millis(200),
        retry_interval: Duration::from_millis(10),
        deadline: Some(Duration::from_millis(30)),
    });
    let (mut startup, mut main) = build_programs(&PARAMS);
    let before = startup.clone();
    let err = Transpiler::from_kind(StrategyKind::GradAllReduce)
        .with_readiness(readiness)
        .transpile(&mut startup, &mut main, &cfg)
        .unwrap_err();
    assert!(matches!(err, TranspileError::PeersUnreachable { .. }));
    assert_eq!(startup, before);
}

#[test]
fn test_origin_kept_for_diagnostics() {
    let (mut startup, mut main) = build_programs(&PARAMS);
    let original_main = main.global_block().clone();
    Transpiler::from_kind(StrategyKind::GradAllReduce)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &two_node(0))
        .unwrap();
    let origin: &Program = main.origin().unwrap();
    assert_eq!(origin.global_block(), &original_main);
    assert!(main.global_block().to_string().contains("c_allreduce_sum"));
}
