//! Rewrite a toy two-layer training step for gradient allreduce.
//!
//! Both programs are printed after the rewrite: the startup program gains
//! communicator setup and a parameter broadcast, the main program gains a
//! loss-gradient scale and one allreduce per gradient.
//!
//! ```bash
//! cargo run --example grad_allreduce
//! ```

use ringpass::{
    Block, NoWait, OpRole, Operation, Program, StrategyKind, TranspileConfig, Transpiler,
    Variable,
};

fn main() -> ringpass::Result<()> {
    let params = ["fc_0.w_0", "fc_1.w_0"];

    let mut startup = Block::new();
    let mut main = Block::new();
    for name in ["x", "loss", "loss@GRAD", "lr"] {
        main.create_var(Variable::tensor(name, &[1]));
    }
    for name in params {
        let grad = format!("{name}@GRAD");
        startup.create_var(Variable::parameter(name, &[32, 32]));
        main.create_var(Variable::parameter(name, &[32, 32]));
        main.create_var(Variable::tensor(grad, &[32, 32]));
        startup.append_op(Operation::new("uniform_random").with_output("Out", [name]));
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
            .with_role(OpRole::BACKWARD | OpRole::LOSS),
    );
    for name in params.iter().rev() {
        let grad = format!("{name}@GRAD");
        main.append_op(
            Operation::new("mul_grad")
                .with_output("Y@GRAD", [grad.as_str()])
                .with_role(OpRole::BACKWARD)
                .with_role_vars([(*name, grad.as_str())]),
        );
    }
    for name in params {
        let grad = format!("{name}@GRAD");
        main.append_op(
            Operation::new("sgd")
                .with_input("Param", [name])
                .with_input("Grad", [grad.as_str()])
                .with_input("LearningRate", ["lr"])
                .with_output("ParamOut", [name])
                .with_role(OpRole::OPTIMIZE),
        );
    }

    let cfg = TranspileConfig::new(
        0,
        "127.0.0.1:6170,127.0.0.1:6171,127.0.0.1:6172",
        "127.0.0.1:6170",
    );
    let (mut startup, mut main) = (Program::from_block(startup), Program::from_block(main));

    // Peers are not running here, so skip the readiness wait.
    Transpiler::from_kind(StrategyKind::GradAllReduce)
        .with_readiness(NoWait)
        .transpile(&mut startup, &mut main, &cfg)?;

    println!("== startup ==\n{}", startup.global_block());
    println!("== main ==\n{}", main.global_block());
    Ok(())
}
