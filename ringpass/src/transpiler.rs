use crate::config::TranspileConfig;
use crate::error::Result;
use crate::graph::{NameGenerator, Program, UniqueNames};
use crate::readiness::{PeerReadiness, TcpReadiness};
use crate::startup::transpile_startup;
use crate::strategy::{RewriteContext, Strategy, StrategyKind};

/// Rewrites a startup/main program pair for synchronous multi-worker training.
///
/// ```no_run
/// use ringpass::{Program, TranspileConfig, Transpiler};
///
/// let cfg = TranspileConfig::new(0, "10.0.0.1:6000,10.0.0.2:6000", "10.0.0.1:6000");
/// let (mut startup, mut main) = (Program::new(), Program::new());
/// Transpiler::from_kind(cfg.strategy).transpile(&mut startup, &mut main, &cfg)?;
/// # Ok::<(), ringpass::TranspileError>(())
/// ```
pub struct Transpiler {
    strategy: Box<dyn Strategy>,
    readiness: Box<dyn PeerReadiness>,
    names: Box<dyn ForkNames>,
}

/// A name generator whose state can be copied, so a failed rewrite can drop
/// the names it drew.
trait ForkNames: NameGenerator {
    fn fork(&self) -> Box<dyn ForkNames>;
    fn as_generator(&mut self) -> &mut dyn NameGenerator;
}

impl<T: NameGenerator + Clone + 'static> ForkNames for T {
    fn fork(&self) -> Box<dyn ForkNames> {
        Box::new(self.clone())
    }

    fn as_generator(&mut self) -> &mut dyn NameGenerator {
        self
    }
}

impl Transpiler {
    pub fn new(strategy: impl Strategy + 'static) -> Self {
        Self::from_boxed(Box::new(strategy))
    }

    pub fn from_kind(kind: StrategyKind) -> Self {
        Self::from_boxed(kind.build())
    }

    fn from_boxed(strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy,
            readiness: Box::new(TcpReadiness::from_env()),
            names: Box::new(UniqueNames::new()),
        }
    }

    pub fn with_readiness(mut self, readiness: impl PeerReadiness + 'static) -> Self {
        self.readiness = Box::new(readiness);
        self
    }

    pub fn with_names(mut self, names: impl NameGenerator + Clone + 'static) -> Self {
        self.names = Box::new(names);
        self
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    /// Rewrite both programs in place.
    ///
    /// The configuration is validated first. Rewriting runs on copies that
    /// replace the originals only if every step succeeds, so on error both
    /// programs and the name generator are left exactly as they were. On
    /// success each program keeps its pre-rewrite state in
    /// [`Program::origin`].
    ///
    /// With `wait_for_peers` set on rank 0 this blocks until the peers
    /// answer. The default [`TcpReadiness`] is safe to call from inside a
    /// tokio runtime, but it still parks the calling thread; async callers
    /// should run this on a blocking task.
    pub fn transpile(
        &mut self,
        startup: &mut Program,
        main: &mut Program,
        cfg: &TranspileConfig,
    ) -> Result<()> {
        cfg.validate()?;
        let ctx = RewriteContext::from_config(cfg);

        tracing::info!(
            strategy = self.strategy.name(),
            rank = cfg.rank,
            nranks = ctx.nranks,
            nrings = ctx.nrings,
            "transpiling programs"
        );

        let mut names = self.names.fork();
        let mut startup_block = startup.global_block().clone();
        transpile_startup(
            &mut startup_block,
            names.as_generator(),
            self.readiness.as_ref(),
            cfg,
        )?;
        self.strategy.extend_startup(&mut startup_block, &ctx)?;

        let mut main_block = main.global_block().clone();
        self.strategy.rewrite_main(&mut main_block, &ctx)?;

        startup.snapshot_origin();
        *startup.global_block_mut() = startup_block;
        main.snapshot_origin();
        *main.global_block_mut() = main_block;
        self.names = names;

        tracing::info!(
            startup_ops = startup.global_block().len(),
            main_ops = main.global_block().len(),
            "transpile finished"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Transpiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transpiler")
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}
