//! Plain-data resolution results cached by Salsa.
//!
//! Resolution contexts live only for the duration of one query; what
//! survives is this snapshot, with names and types already rendered.

use kestrel_diagnostic::Diagnostic;
use kestrel_ir::NodeId;
use kestrel_resolve::{AssociatedAction, Context};
use std::fmt;

/// One diagnostic, rendered.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ReportedDiagnostic {
    /// Stable symbolic name, e.g. `NoMatchingCandidates`.
    pub name: &'static str,
    pub code: &'static str,
    pub message: String,
    pub node: Option<NodeId>,
    pub is_error: bool,
}

impl ReportedDiagnostic {
    pub fn from_diagnostic(diag: &Diagnostic) -> Self {
        ReportedDiagnostic {
            name: diag.code_name(),
            code: diag.code.as_str(),
            message: diag.message.clone(),
            node: diag.node,
            is_error: diag.is_error(),
        }
    }
}

impl fmt::Display for ReportedDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.name, self.code, self.message)
    }
}

/// One lifecycle action, rendered as `KIND at #node [on #node]`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ReportedAction {
    pub kind: &'static str,
    pub at: NodeId,
    pub acted_on: Option<NodeId>,
    pub erroneous: bool,
}

impl From<&AssociatedAction> for ReportedAction {
    fn from(action: &AssociatedAction) -> Self {
        ReportedAction {
            kind: action.kind.as_str(),
            at: action.at,
            acted_on: action.acted_on,
            erroneous: action.erroneous,
        }
    }
}

/// Resolution of one non-generic function.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FunctionReport {
    pub name: String,
    pub decl: NodeId,
    pub actions: Vec<ReportedAction>,
}

/// Everything the driver keeps about one module.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ResolutionReport {
    pub diagnostics: Vec<ReportedDiagnostic>,
    pub functions: Vec<FunctionReport>,
    /// Module-level variables and their rendered types.
    pub variables: Vec<(String, String)>,
}

impl ResolutionReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionReport> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty.as_str())
    }

    pub(crate) fn collect_diagnostics(&mut self, cx: &Context) {
        self.diagnostics = cx
            .diagnostics()
            .iter()
            .map(ReportedDiagnostic::from_diagnostic)
            .collect();
    }
}
