/// Storage type of a variable as seen by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VarType {
    #[default]
    LodTensor,
    /// Opaque bytes, used for communicator identifiers.
    Raw,
}

/// A named variable declared in a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub shape: Vec<i64>,
    pub var_type: VarType,
    pub persistable: bool,
    /// Trainable parameter (the set visited by `Block::iter_parameters`).
    pub is_parameter: bool,
    /// Partitioned across ranks; never broadcast or reduced as a whole tensor.
    pub is_distributed: bool,
    pub stop_gradient: bool,
}

impl Variable {
    /// A plain, non-persistable tensor.
    pub fn tensor(name: impl Into<String>, shape: &[i64]) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            var_type: VarType::LodTensor,
            persistable: false,
            is_parameter: false,
            is_distributed: false,
            stop_gradient: false,
        }
    }

    /// A persistable trainable parameter.
    pub fn parameter(name: impl Into<String>, shape: &[i64]) -> Self {
        Self {
            persistable: true,
            is_parameter: true,
            ..Self::tensor(name, shape)
        }
    }

    /// A persistable raw-bytes variable.
    pub fn raw(name: impl Into<String>) -> Self {
        Self {
            var_type: VarType::Raw,
            persistable: true,
            ..Self::tensor(name, &[])
        }
    }

    pub fn distributed(mut self, is_distributed: bool) -> Self {
        self.is_distributed = is_distributed;
        self
    }

    pub fn persistable(mut self, persistable: bool) -> Self {
        self.persistable = persistable;
        self
    }

    pub fn stop_gradient(mut self, stop_gradient: bool) -> Self {
        self.stop_gradient = stop_gradient;
        self
    }
}
