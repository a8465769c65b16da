//! Named code blocks.

use crate::block::{referenced_names, Stmt};
use crate::foundation::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a code block slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodeBlockId {
    /// Time derivatives of the state variables (mandatory)
    ComputeDerivative,
    /// Thermodynamic forces at the current stage estimate
    ComputeThermodynamicForces,
    /// Thermodynamic forces at the end of the time step
    ComputeFinalThermodynamicForces,
    /// Explicit update of auxiliary state variables after an accepted sub-step
    UpdateAuxiliaryStateVariables,
    /// Generated initialization of integration buffers
    BeforeInitializeLocalVariables,
    /// User initialization of local variables
    AfterInitializeLocalVariables,
}

impl CodeBlockId {
    /// Name of the function the block becomes in generated code.
    pub fn function_name(self) -> &'static str {
        match self {
            Self::ComputeDerivative => "computeDerivative",
            Self::ComputeThermodynamicForces => "computeThermodynamicForces",
            Self::ComputeFinalThermodynamicForces => "computeFinalThermodynamicForces",
            Self::UpdateAuxiliaryStateVariables => "updateAuxiliaryStateVariables",
            Self::BeforeInitializeLocalVariables => "initializeIntegrationBuffers",
            Self::AfterInitializeLocalVariables => "initializeLocalVariables",
        }
    }

    /// True for blocks evaluated at intermediate stages, whose references to
    /// integration and driving variables point at current-value buffers.
    pub fn uses_current_values(self) -> bool {
        matches!(
            self,
            Self::ComputeDerivative
                | Self::ComputeThermodynamicForces
                | Self::UpdateAuxiliaryStateVariables
        )
    }
}

impl fmt::Display for CodeBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A registered code block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub id: CodeBlockId,
    /// Body as written, without the enclosing braces
    pub body_text: String,
    pub stmts: Vec<Stmt>,
    /// Names referenced by the body as originally written
    pub members: BTreeSet<String>,
    pub span: Span,
}

impl CodeBlock {
    /// Creates a block; members are computed here, once.
    pub fn new(id: CodeBlockId, body_text: impl Into<String>, stmts: Vec<Stmt>, span: Span) -> Self {
        let members = referenced_names(&stmts);
        Self {
            id,
            body_text: body_text.into(),
            stmts,
            members,
            span,
        }
    }

    pub fn references(&self, name: &str) -> bool {
        self.members.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Expr;

    #[test]
    fn test_members_computed_at_creation() {
        let sp = Span::zero(0);
        let block = CodeBlock::new(
            CodeBlockId::ComputeDerivative,
            "dp = A;",
            vec![Stmt::assign("dp", Expr::name("A", sp), sp)],
            sp,
        );
        assert!(block.references("A"));
        assert!(block.references("dp"));
        assert!(!block.references("sig"));
    }

    #[test]
    fn test_current_value_blocks() {
        assert!(CodeBlockId::ComputeDerivative.uses_current_values());
        assert!(!CodeBlockId::ComputeFinalThermodynamicForces.uses_current_values());
        assert!(!CodeBlockId::AfterInitializeLocalVariables.uses_current_values());
    }
}
