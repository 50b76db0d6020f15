use std::collections::HashMap;

use orion_error::prelude::*;
use orion_error::ErrorOweBase;
use vp_config::HumanDuration;

use crate::error::{CoreReason, CoreResult};
use crate::row::RowSchema;

/// Registration-time declaration of a named state entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDecl {
    pub name: String,
    pub schema: RowSchema,
    /// Time-to-live in milliseconds since the last write.
    pub ttl_ms: Option<i64>,
}

impl StateDecl {
    pub fn new(name: impl Into<String>, schema: RowSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            ttl_ms: None,
        }
    }

    /// Attach a TTL given as a duration literal such as `"1 day"` or `"30s"`.
    pub fn with_ttl(mut self, ttl: &str) -> CoreResult<Self> {
        let parsed = ttl
            .parse::<HumanDuration>()
            .owe(CoreReason::Partition)
            .map_err(|e| e.with_detail(format!("state {:?}: invalid ttl {ttl:?}", self.name)))?;
        if parsed.is_zero() {
            return StructError::from(CoreReason::Partition)
                .with_detail(format!("state {:?}: ttl must be positive", self.name))
                .err();
        }
        self.ttl_ms = Some(parsed.as_millis_i64());
        Ok(self)
    }
}

/// The validated set of state declarations of one function.
#[derive(Debug, Clone, Default)]
pub struct StateDecls {
    decls: HashMap<String, StateDecl>,
}

impl StateDecls {
    pub fn new(decls: Vec<StateDecl>) -> CoreResult<Self> {
        let mut map = HashMap::with_capacity(decls.len());
        for decl in decls {
            if decl.name.is_empty() || decl.name.starts_with("__") {
                return StructError::from(CoreReason::Partition)
                    .with_detail(format!("invalid state name {:?}", decl.name))
                    .err();
            }
            if decl.ttl_ms.is_some_and(|ttl| ttl <= 0) {
                return StructError::from(CoreReason::Partition)
                    .with_detail(format!("state {:?}: ttl must be positive", decl.name))
                    .err();
            }
            let name = decl.name.clone();
            if map.insert(name.clone(), decl).is_some() {
                return StructError::from(CoreReason::Partition)
                    .with_detail(format!("duplicate state name {name:?}"))
                    .err();
            }
        }
        Ok(Self { decls: map })
    }

    pub fn get(&self, name: &str) -> Option<&StateDecl> {
        self.decls.get(name)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
