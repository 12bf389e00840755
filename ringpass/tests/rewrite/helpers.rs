use ringpass::{AttrValue, Block, OpRole, OpType, Operation, Program, TranspileConfig, Variable};

pub const ENDPOINTS: [&str; 2] = ["10.0.0.1:6000", "10.0.0.2:6000"];

/// Two-node cluster config for `rank`, default rings and strategy.
pub fn two_node(rank: u32) -> TranspileConfig {
    TranspileConfig::new(rank, ENDPOINTS, ENDPOINTS[rank as usize])
}

/// A small training step: one forward op per parameter, the loss and its
/// gradient, one backward op per parameter (reverse order), then one `sgd`
/// per parameter.
///
/// `params` is `(name, is_distributed)`. Both programs declare every
/// parameter; the startup program only initializes them.
pub fn build_programs(params: &[(&str, bool)]) -> (Program, Program) {
    let mut startup = Block::new();
    let mut main = Block::new();

    for (name, distributed) in params {
        let param = Variable::parameter(*name, &[16, 16]).distributed(*distributed);
        startup.create_var(param.clone());
        main.create_var(param);
        main.create_var(Variable::tensor(format!("{name}@GRAD"), &[16, 16]));
        startup.append_op(
            Operation::new("uniform_random")
                .with_output("Out", [*name])
                .with_role(OpRole::FORWARD),
        );
    }
    for name in ["x", "loss", "loss@GRAD", "learning_rate"] {
        main.create_var(Variable::tensor(name, &[1]));
    }

    for (name, _) in params {
        main.append_op(
            Operation::new("mul")
                .with_input("X", ["x"])
                .with_input("Y", [*name])
                .with_output("Out", ["x"])
                .with_role(OpRole::FORWARD),
        );
    }
    main.append_op(
        Operation::new("mean")
            .with_input("X", ["x"])
            .with_output("Out", ["loss"])
            .with_role(OpRole::FORWARD | OpRole::LOSS),
    );
    main.append_op(
        Operation::new("fill_constant")
            .with_output("Out", ["loss@GRAD"])
            .with_attr("value", 1.0f32)
            .with_role(OpRole::BACKWARD | OpRole::LOSS),
    );
    for (name, _) in params.iter().rev() {
        let grad = format!("{name}@GRAD");
        main.append_op(
            Operation::new("mul_grad")
                .with_input("Out@GRAD", ["loss@GRAD"])
                .with_output("Y@GRAD", [grad.as_str()])
                .with_role(OpRole::BACKWARD)
                .with_role_vars([(*name, grad.as_str())]),
        );
    }
    for (name, _) in params {
        let grad = format!("{name}@GRAD");
        main.append_op(
            Operation::new("sgd")
                .with_input("Param", [*name])
                .with_input("Grad", [grad.as_str()])
                .with_input("LearningRate", ["learning_rate"])
                .with_output("ParamOut", [*name])
                .with_role(OpRole::OPTIMIZE),
        );
    }

    (Program::from_block(startup), Program::from_block(main))
}

/// Operations of one emitted type, in block order.
pub fn ops_of(block: &Block, op_type: OpType) -> Vec<&Operation> {
    block.ops().iter().filter(|op| op.is(op_type)).collect()
}

pub fn ring_id(op: &Operation) -> i64 {
    op.attr("ring_id")
        .and_then(AttrValue::as_int)
        .expect("op has no ring_id")
}

pub fn first_input(op: &Operation) -> &str {
    op.input("X")[0].as_str()
}
