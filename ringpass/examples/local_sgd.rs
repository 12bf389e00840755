//! Rewrite a single-parameter training step for local SGD, driven by
//! environment variables.
//!
//! ```bash
//! RINGPASS_RANK=1 \
//! RINGPASS_ENDPOINTS=127.0.0.1:6170,127.0.0.1:6171 \
//! RINGPASS_CURRENT_ENDPOINT=127.0.0.1:6171 \
//! RINGPASS_STRATEGY=local_sgd \
//! cargo run --example local_sgd
//! ```

use ringpass::{Block, NoWait, OpRole, Operation, Program, TranspileConfig, Transpiler, Variable};

fn main() -> ringpass::Result<()> {
    let cfg = TranspileConfig::from_env()?;

    let mut startup = Block::new();
    startup.create_var(Variable::parameter("w", &[64, 10]));
    startup.append_op(Operation::new("gaussian_random").with_output("Out", ["w"]));

    let mut main = Block::new();
    main.create_var(Variable::parameter("w", &[64, 10]));
    main.create_var(Variable::tensor("w@GRAD", &[64, 10]));
    main.create_var(Variable::tensor("lr", &[1]));
    main.append_op(
        Operation::new("mul_grad")
            .with_output("Y@GRAD", ["w@GRAD"])
            .with_role(OpRole::BACKWARD)
            .with_role_vars([("w", "w@GRAD")]),
    );
    main.append_op(
        Operation::new("sgd")
            .with_input("Param", ["w"])
            .with_input("Grad", ["w@GRAD"])
            .with_input("LearningRate", ["lr"])
            .with_output("ParamOut", ["w"])
            .with_role(OpRole::OPTIMIZE),
    );

    let (mut startup, mut main) = (Program::from_block(startup), Program::from_block(main));
    Transpiler::from_kind(cfg.strategy)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &cfg)?;

    println!("== startup ==\n{}", startup.global_block());
    println!("== main ==\n{}", main.global_block());
    Ok(())
}
