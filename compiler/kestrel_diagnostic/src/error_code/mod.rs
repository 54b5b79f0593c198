//! Error codes for resolver diagnostics.

use std::fmt;

/// Error codes, `E####` with the first digit naming the phase:
/// - E2xxx: name and type resolution
/// - E3xxx: call and overload resolution
/// - E4xxx: lifecycle analysis
/// - E9xxx: internal errors
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ErrorCode {
    // Name and type resolution (E2xxx)
    /// Identifier not visible at this point
    E2001,
    /// Value does not convert to the expected type
    E2002,
    /// Expression used as a type is not a type
    E2003,
    /// Generic type or signature used where a concrete one is required
    E2004,
    /// Field access on a type with no such field
    E2005,
    /// Variable declared without a type or initializer
    E2006,
    /// Return statements disagree on the returned type
    E2007,
    /// `use` names a module that is not part of the session
    E2008,
    /// Compile-time arithmetic overflows its type or divides by zero
    E2009,

    // Call resolution (E3xxx)
    /// No candidate accepts the call's actuals
    E3001,
    /// Several candidates are applicable and none is most specific
    E3002,
    /// `where` clause is not a compile-time boolean
    E3003,
    /// Callee expression is not callable
    E3004,

    // Lifecycle analysis (E4xxx)
    /// Required init, init=, assignment or deinit did not resolve
    E4001,

    // Internal (E9xxx)
    /// A query re-entered itself
    E9001,
    /// The syntax tree is missing a required child
    E9002,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E2001,
        ErrorCode::E2002,
        ErrorCode::E2003,
        ErrorCode::E2004,
        ErrorCode::E2005,
        ErrorCode::E2006,
        ErrorCode::E2007,
        ErrorCode::E2008,
        ErrorCode::E2009,
        ErrorCode::E3001,
        ErrorCode::E3002,
        ErrorCode::E3003,
        ErrorCode::E3004,
        ErrorCode::E4001,
        ErrorCode::E9001,
        ErrorCode::E9002,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }

    /// Stable symbolic name used by drivers and tests.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "UnknownIdentifier",
            ErrorCode::E2002 => "TypeMismatch",
            ErrorCode::E2003 => "NotAType",
            ErrorCode::E2004 => "UnresolvedGeneric",
            ErrorCode::E2005 => "UnknownField",
            ErrorCode::E2006 => "MissingInitializer",
            ErrorCode::E2007 => "IncompatibleReturnTypes",
            ErrorCode::E2008 => "UnknownModule",
            ErrorCode::E2009 => "InvalidConstant",
            ErrorCode::E3001 => "NoMatchingCandidates",
            ErrorCode::E3002 => "AmbiguousCall",
            ErrorCode::E3003 => "NonParamWhereClause",
            ErrorCode::E3004 => "NotCallable",
            ErrorCode::E4001 => "MissingLifecycleFunction",
            ErrorCode::E9001 => "RecursionDetected",
            ErrorCode::E9002 => "MalformedTree",
        }
    }

    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E2001
                | ErrorCode::E2002
                | ErrorCode::E2003
                | ErrorCode::E2004
                | ErrorCode::E2005
                | ErrorCode::E2006
                | ErrorCode::E2007
                | ErrorCode::E2008
                | ErrorCode::E2009
        )
    }

    pub fn is_call_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E3001 | ErrorCode::E3002 | ErrorCode::E3003 | ErrorCode::E3004
        )
    }

    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self, ErrorCode::E4001)
    }

    /// Internal errors abort the enclosing query instead of producing an
    /// erroneous result.
    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorCode::E9001 | ErrorCode::E9002)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse `"E3002"` or `"AmbiguousCall"`.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(s) || code.name() == s)
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_parses_back_from_both_spellings() {
        for code in ErrorCode::ALL {
            assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(*code));
            assert_eq!(code.name().parse::<ErrorCode>(), Ok(*code));
        }
        assert_eq!("e3001".parse::<ErrorCode>(), Ok(ErrorCode::E3001));
        assert!("E0000".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn phase_predicates_partition_the_codes() {
        for code in ErrorCode::ALL {
            let hits = [
                code.is_resolution_error(),
                code.is_call_error(),
                code.is_lifecycle_error(),
                code.is_internal(),
            ]
            .iter()
            .filter(|b| **b)
            .count();
            assert_eq!(hits, 1, "{code}");
        }
    }
}
