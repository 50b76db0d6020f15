use std::collections::HashSet;

use orion_error::prelude::*;

use super::key::KeySelector;
use crate::error::{CoreReason, CoreResult};
use crate::row::RowSchema;
use crate::state::{StateDecl, StateDecls};

/// Name of the reserved side channel that receives late elements.
pub const LATE_DATA_TAG: &str = "late-data";

/// How a table argument is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// Each row is independent; no partitioning, no state.
    Row,
    /// Rows are grouped by PARTITION BY columns into virtual processors.
    /// With `optional_partition`, an absent PARTITION BY collapses the whole
    /// input into one global processor.
    Set { optional_partition: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableArgument {
    pub name: String,
    pub kind: ArgumentKind,
    pub schema: RowSchema,
}

/// Tagged side channel with its own schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTag {
    pub name: String,
    pub schema: RowSchema,
}

impl OutputTag {
    pub fn new(name: impl Into<String>, schema: RowSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Partition metadata of a bound table argument.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSemantics {
    argument: String,
    partition_by: Vec<usize>,
    data_type: RowSchema,
}

impl TableSemantics {
    pub fn argument(&self) -> &str {
        &self.argument
    }

    /// Column positions that define a partition, in declaration order.
    pub fn partition_by_columns(&self) -> &[usize] {
        &self.partition_by
    }

    pub fn data_type(&self) -> &RowSchema {
        &self.data_type
    }

    pub fn key_selector(&self) -> KeySelector {
        KeySelector::new(self.partition_by.clone())
    }
}

/// Declarative registration of a function: inputs, state, and outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub table_args: Vec<TableArgument>,
    pub states: Vec<StateDecl>,
    pub output: RowSchema,
    pub side_outputs: Vec<OutputTag>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, output: RowSchema) -> Self {
        Self {
            name: name.into(),
            table_args: Vec::new(),
            states: Vec::new(),
            output,
            side_outputs: Vec::new(),
        }
    }

    pub fn with_table_arg(
        mut self,
        name: impl Into<String>,
        kind: ArgumentKind,
        schema: RowSchema,
    ) -> Self {
        self.table_args.push(TableArgument {
            name: name.into(),
            kind,
            schema,
        });
        self
    }

    pub fn with_state(mut self, decl: StateDecl) -> Self {
        self.states.push(decl);
        self
    }

    pub fn with_side_output(mut self, tag: OutputTag) -> Self {
        self.side_outputs.push(tag);
        self
    }

    pub fn table_arg(&self, name: &str) -> Option<&TableArgument> {
        self.table_args.iter().find(|a| a.name == name)
    }

    pub fn side_output(&self, name: &str) -> Option<&OutputTag> {
        self.side_outputs.iter().find(|t| t.name == name)
    }

    /// Validate the declared states into a lookup table.
    pub fn state_decls(&self) -> CoreResult<StateDecls> {
        StateDecls::new(self.states.clone())
    }

    /// Bind a call of this function: resolve `partition_by` column names of
    /// table argument `arg` to positions, rejecting invalid combinations.
    pub fn bind(&self, arg: &str, partition_by: &[&str]) -> CoreResult<TableSemantics> {
        self.validate()?;
        let Some(table) = self.table_arg(arg) else {
            return partition_err(format!("function {:?} has no table argument {arg:?}", self.name));
        };

        match table.kind {
            ArgumentKind::Row if !partition_by.is_empty() => {
                return partition_err(format!(
                    "argument {arg:?} has row semantics and does not accept PARTITION BY"
                ));
            }
            ArgumentKind::Set {
                optional_partition: false,
            } if partition_by.is_empty() => {
                return partition_err(format!("argument {arg:?} requires PARTITION BY"));
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        let mut positions = Vec::with_capacity(partition_by.len());
        for col in partition_by {
            let Some(idx) = table.schema.index_of(col) else {
                return partition_err(format!(
                    "PARTITION BY column {col:?} not in argument {arg:?}"
                ));
            };
            if !seen.insert(idx) {
                return partition_err(format!("PARTITION BY column {col:?} listed twice"));
            }
            positions.push(idx);
        }

        Ok(TableSemantics {
            argument: table.name.clone(),
            partition_by: positions,
            data_type: table.schema.clone(),
        })
    }

    fn validate(&self) -> CoreResult<()> {
        self.state_decls()?;
        if !self.states.is_empty()
            && self.table_args.iter().any(|a| a.kind == ArgumentKind::Row)
        {
            return partition_err(format!(
                "function {:?} declares state but has a row-semantics argument",
                self.name
            ));
        }
        let mut tags = HashSet::new();
        for tag in &self.side_outputs {
            if tag.name == LATE_DATA_TAG || !tags.insert(tag.name.as_str()) {
                return partition_err(format!(
                    "side output tag {:?} is reserved or duplicated",
                    tag.name
                ));
            }
        }
        Ok(())
    }
}

fn partition_err<T>(detail: String) -> CoreResult<T> {
    StructError::from(CoreReason::Partition)
        .with_detail(detail)
        .err()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RowSchema {
        RowSchema::parse_decl("region:str, user:str, amount:float").unwrap()
    }

    fn output() -> RowSchema {
        RowSchema::parse_decl("count:int").unwrap()
    }

    fn set_fn(optional: bool) -> FunctionDescriptor {
        FunctionDescriptor::new("f", output()).with_table_arg(
            "input",
            ArgumentKind::Set {
                optional_partition: optional,
            },
            input(),
        )
    }

    #[test]
    fn bind_resolves_columns_in_order() {
        let sem = set_fn(false).bind("input", &["user", "region"]).unwrap();
        assert_eq!(sem.partition_by_columns(), &[1, 0]);
        assert_eq!(sem.data_type(), &input());
        assert_eq!(sem.argument(), "input");
    }

    #[test]
    fn set_semantics_requires_partition_unless_optional() {
        assert!(set_fn(false).bind("input", &[]).is_err());
        let sem = set_fn(true).bind("input", &[]).unwrap();
        assert!(sem.partition_by_columns().is_empty());
    }

    #[test]
    fn row_semantics_rejects_partition_and_state() {
        let f = FunctionDescriptor::new("f", output()).with_table_arg(
            "input",
            ArgumentKind::Row,
            input(),
        );
        assert!(f.bind("input", &["region"]).is_err());
        assert!(f.bind("input", &[]).is_ok());

        let with_state = f.with_state(StateDecl::new("count", output()));
        assert!(with_state.bind("input", &[]).is_err());
    }

    #[test]
    fn unknown_or_duplicate_columns_rejected() {
        assert!(set_fn(false).bind("input", &["nope"]).is_err());
        assert!(set_fn(false).bind("input", &["region", "region"]).is_err());
        assert!(set_fn(false).bind("other", &["region"]).is_err());
    }

    #[test]
    fn duplicate_states_and_reserved_tags_rejected() {
        let f = set_fn(false)
            .with_state(StateDecl::new("count", output()))
            .with_state(StateDecl::new("count", output()));
        assert!(f.bind("input", &["region"]).is_err());

        let f = set_fn(false).with_side_output(OutputTag::new(LATE_DATA_TAG, input()));
        assert!(f.bind("input", &["region"]).is_err());
    }
}
