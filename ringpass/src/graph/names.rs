use std::collections::HashMap;

/// Source of fresh variable names.
pub trait NameGenerator {
    /// Return a name starting with `prefix` that this generator has never
    /// returned before.
    fn generate(&mut self, prefix: &str) -> String;
}

/// Per-prefix counters: `nccl_id_0`, `nccl_id_1`, ...
#[derive(Debug, Default, Clone)]
pub struct UniqueNames {
    counters: HashMap<String, u64>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameGenerator for UniqueNames {
    fn generate(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{prefix}_{counter}");
        *counter += 1;
        name
    }
}
