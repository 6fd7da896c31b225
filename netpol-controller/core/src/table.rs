use crate::RuleSpec;

/// The only table pod firewall rules are installed in.
pub const FILTER_TABLE: &str = "filter";

/// Mutates the host packet filter.
///
/// Calls are synchronous and are expected to be serialized by the caller: insertion at a position
/// is order-sensitive, so two writers must never interleave.
pub trait Table {
    /// Creates an empty chain. Fails with [`TableError::AlreadyExists`] if it exists.
    fn new_chain(&self, table: &str, chain: &str) -> Result<(), TableError>;

    fn exists(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<bool, TableError>;

    /// Inserts a rule at a 1-based position.
    fn insert(
        &self,
        table: &str,
        chain: &str,
        position: u32,
        rule: &RuleSpec,
    ) -> Result<(), TableError>;

    fn append(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<(), TableError>;

    /// Appends a rule unless an identical rule is already present in the chain.
    fn append_unique(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<(), TableError> {
        if self.exists(table, chain, rule)? {
            return Ok(());
        }
        self.append(table, chain, rule)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("chain {table}/{chain} already exists")]
    AlreadyExists { table: String, chain: String },

    #[error("`{}` exited with {code:?}: {stderr}", .args.join(" "))]
    Command {
        args: Vec<String>,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TableError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

impl<T: Table + ?Sized> Table for std::sync::Arc<T> {
    fn new_chain(&self, table: &str, chain: &str) -> Result<(), TableError> {
        (**self).new_chain(table, chain)
    }

    fn exists(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<bool, TableError> {
        (**self).exists(table, chain, rule)
    }

    fn insert(
        &self,
        table: &str,
        chain: &str,
        position: u32,
        rule: &RuleSpec,
    ) -> Result<(), TableError> {
        (**self).insert(table, chain, position, rule)
    }

    fn append(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<(), TableError> {
        (**self).append(table, chain, rule)
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<(), TableError> {
        (**self).append_unique(table, chain, rule)
    }
}
