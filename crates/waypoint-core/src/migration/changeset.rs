/// An ordered run of statements that share one transaction setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementGroup {
    pub statements: Vec<String>,
    /// Execute the whole group as one atomic unit.
    pub use_transaction: bool,
}

impl StatementGroup {
    pub fn new(statements: Vec<String>, use_transaction: bool) -> Self {
        Self {
            statements,
            use_transaction,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Parsed form of one direction of a migration.
///
/// Groups run in order. Transactionality is decided per group, so a change-set
/// can mix statements that must run outside a transaction (e.g.
/// `CREATE INDEX CONCURRENTLY`) with ones that must not leave partial effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub groups: Vec<StatementGroup>,
}

impl ChangeSet {
    /// Single-group change-set built from a plain statement list.
    pub fn new<S: Into<String>>(
        statements: impl IntoIterator<Item = S>,
        use_transaction: bool,
    ) -> Self {
        let group = StatementGroup::new(
            statements.into_iter().map(Into::into).collect(),
            use_transaction,
        );
        Self::from_groups(vec![group])
    }

    /// Build from groups, dropping empty ones.
    pub fn from_groups(groups: Vec<StatementGroup>) -> Self {
        Self {
            groups: groups.into_iter().filter(|g| !g.is_empty()).collect(),
        }
    }

    /// All statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.statements.iter().map(|s| s.as_str()))
    }

    pub fn statement_count(&self) -> usize {
        self.groups.iter().map(|g| g.statements.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
