//! @acp:module "Attribute Registry"
//! @acp:summary "Owned attribute declarations and non-owning emitter defaults"
//! @acp:domain core
//! @acp:layer service
//!
//! Ownership is checked at registration time. A second owner for the same
//! attribute name is a hard error, never resolved by load order.

use indexmap::IndexMap;
use serde_json::Value;

use super::normalisers;
use super::types::{AttributeDeclaration, AttributeOwner, AttributeSpec};
use crate::error::{Result, TexsmithError};

/// @acp:summary "Default contributed by a fragment that does not own the attribute"
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEmitter {
    pub fragment: String,
    pub value: Value,
}

/// @acp:summary "Union of declarations from the template and candidate fragments"
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    declarations: IndexMap<String, AttributeDeclaration>,
    emitters: IndexMap<String, AttributeEmitter>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// @acp:summary "Register one declaration, enforcing single ownership"
    pub fn declare(&mut self, declaration: AttributeDeclaration) -> Result<()> {
        if let Some(name) = &declaration.normaliser {
            if normalisers::lookup(name).is_none() {
                return Err(TexsmithError::manifest(
                    declaration.owner.to_string(),
                    format!(
                        "attribute '{}' uses unknown normaliser '{}' (known: {})",
                        declaration.name,
                        name,
                        normalisers::names().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
        }

        if let Some(existing) = self.declarations.get(&declaration.name) {
            if existing.owner != declaration.owner {
                return Err(TexsmithError::OwnerConflict {
                    name: declaration.name.clone(),
                    first: existing.owner.to_string(),
                    second: declaration.owner.to_string(),
                });
            }
            tracing::debug!(
                attribute = %declaration.name,
                owner = %declaration.owner,
                "attribute redeclared by its owner, keeping the latest"
            );
        }

        self.declarations.insert(declaration.name.clone(), declaration);
        Ok(())
    }

    /// Register a non-owning default. The first emitter for a name wins.
    pub fn emit(&mut self, fragment: &str, name: &str, value: Value) {
        if let Some(existing) = self.emitters.get(name) {
            tracing::debug!(
                attribute = %name,
                kept = %existing.fragment,
                ignored = %fragment,
                "emitter default already registered"
            );
            return;
        }
        self.emitters.insert(
            name.to_string(),
            AttributeEmitter {
                fragment: fragment.to_string(),
                value,
            },
        );
    }

    /// @acp:summary "Register every declaration and emitter of one template or fragment"
    pub fn register_component(
        &mut self,
        owner: &AttributeOwner,
        specs: &IndexMap<String, AttributeSpec>,
        emitters: &IndexMap<String, Value>,
    ) -> Result<()> {
        for (name, spec) in specs {
            self.declare(spec.clone().into_declaration(name.clone(), owner.clone()))?;
        }
        for (name, value) in emitters {
            self.emit(owner.name(), name, value.clone());
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDeclaration> {
        self.declarations.get(name)
    }

    pub fn emitter(&self, name: &str) -> Option<&AttributeEmitter> {
        self.emitters.get(name)
    }

    pub fn declarations(&self) -> impl Iterator<Item = &AttributeDeclaration> {
        self.declarations.values()
    }

    pub fn emitters(&self) -> impl Iterator<Item = (&String, &AttributeEmitter)> {
        self.emitters.iter()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
