//! An in-memory [`Table`] for tests.

use crate::{RuleSpec, Table, TableError};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Records chains and rules the way the kernel would hold them.
///
/// Rules are held per `(table, chain)` in evaluation order. Operations on a chain that has not
/// been created fail, as they do against iptables.
#[derive(Debug, Default)]
pub struct MockTable {
    state: Mutex<State>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    NewChain,
    Exists,
    Insert,
    Append,
}

#[derive(Debug, Default)]
struct State {
    chains: BTreeMap<(String, String), Vec<RuleSpec>>,
    calls: Vec<(Op, String)>,
    fail: Option<(Op, String)>,
}

// === impl MockTable ===

impl MockTable {
    /// Creates a table holding the given empty chains.
    pub fn with_chains<'a>(table: &str, chains: impl IntoIterator<Item = &'a str>) -> Self {
        let mock = Self::default();
        {
            let mut state = mock.state.lock();
            for chain in chains {
                state
                    .chains
                    .insert((table.to_string(), chain.to_string()), Vec::new());
            }
        }
        mock
    }

    /// Makes every subsequent `op` against `chain` fail.
    pub fn fail_on(&self, op: Op, chain: impl Into<String>) {
        self.state.lock().fail = Some((op, chain.into()));
    }

    pub fn clear_failure(&self) {
        self.state.lock().fail = None;
    }

    /// Returns the rules of a chain, or `None` if the chain does not exist.
    pub fn rules(&self, table: &str, chain: &str) -> Option<Vec<RuleSpec>> {
        self.state
            .lock()
            .chains
            .get(&(table.to_string(), chain.to_string()))
            .cloned()
    }

    /// Returns the names of all chains in a table.
    pub fn chains(&self, table: &str) -> Vec<String> {
        self.state
            .lock()
            .chains
            .keys()
            .filter(|(t, _)| t == table)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Returns the number of mutating calls made so far.
    pub fn mutations(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(op, _)| *op != Op::Exists)
            .count()
    }

    /// Returns a copy of every rule in every chain of a table.
    pub fn snapshot(&self, table: &str) -> BTreeMap<String, Vec<RuleSpec>> {
        self.state
            .lock()
            .chains
            .iter()
            .filter(|((t, _), _)| t == table)
            .map(|((_, c), rules)| (c.clone(), rules.clone()))
            .collect()
    }
}

impl State {
    fn record(&mut self, op: Op, chain: &str) -> Result<(), TableError> {
        self.calls.push((op.clone(), chain.to_string()));
        match &self.fail {
            Some((fail_op, fail_chain)) if *fail_op == op && fail_chain == chain => {
                Err(TableError::Command {
                    args: vec![format!("{op:?}"), chain.to_string()],
                    code: Some(4),
                    stderr: "injected failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn chain_mut(&mut self, table: &str, chain: &str) -> Result<&mut Vec<RuleSpec>, TableError> {
        self.chains
            .get_mut(&(table.to_string(), chain.to_string()))
            .ok_or_else(|| no_such_chain(chain))
    }
}

fn no_such_chain(chain: &str) -> TableError {
    TableError::Command {
        args: vec![chain.to_string()],
        code: Some(1),
        stderr: "No chain/target/match by that name.".to_string(),
    }
}

impl Table for MockTable {
    fn new_chain(&self, table: &str, chain: &str) -> Result<(), TableError> {
        let mut state = self.state.lock();
        state.record(Op::NewChain, chain)?;
        let key = (table.to_string(), chain.to_string());
        if state.chains.contains_key(&key) {
            return Err(TableError::AlreadyExists {
                table: table.to_string(),
                chain: chain.to_string(),
            });
        }
        state.chains.insert(key, Vec::new());
        Ok(())
    }

    fn exists(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<bool, TableError> {
        let mut state = self.state.lock();
        state.record(Op::Exists, chain)?;
        Ok(state.chain_mut(table, chain)?.contains(rule))
    }

    fn insert(
        &self,
        table: &str,
        chain: &str,
        position: u32,
        rule: &RuleSpec,
    ) -> Result<(), TableError> {
        let mut state = self.state.lock();
        state.record(Op::Insert, chain)?;
        let rules = state.chain_mut(table, chain)?;
        let idx = (position as usize).saturating_sub(1);
        if idx > rules.len() {
            return Err(TableError::Command {
                args: vec![chain.to_string(), position.to_string()],
                code: Some(1),
                stderr: "Index of insertion too big.".to_string(),
            });
        }
        rules.insert(idx, rule.clone());
        Ok(())
    }

    fn append(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<(), TableError> {
        let mut state = self.state.lock();
        state.record(Op::Append, chain)?;
        state.chain_mut(table, chain)?.push(rule.clone());
        Ok(())
    }
}
