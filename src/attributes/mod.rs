//! @acp:module "Attributes"
//! @acp:summary "Attribute schema registry, normalisers and the precedence resolver"
//! @acp:domain core
//! @acp:layer service

pub mod normalisers;
pub mod registry;
pub mod resolver;
pub mod types;

pub use registry::{AttributeEmitter, AttributeRegistry};
pub use resolver::{
    core_defaults, AttributeResolver, ResolvedAttribute, ResolvedAttributeSet, ValueOrigin,
};
pub use types::{AttributeDeclaration, AttributeOwner, AttributeSpec, AttributeType, EscapeMode};
