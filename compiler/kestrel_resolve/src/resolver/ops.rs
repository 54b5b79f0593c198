//! Operator expressions.
//!
//! Operators on primitives are built in and fold when every operand is a
//! compile-time value. Operators with a record operand resolve to user
//! `operator` declarations like any other call. Assignment is typed here;
//! which `=` runs for records is decided with the lifecycle actions.

use super::{CallActual, CallSite, Resolver};
use crate::methods::MethodCandidatesKey;
use crate::results::ResolvedExpression;
use crate::scope;
use crate::QueryResult;
use kestrel_diagnostic::{Diagnostic, ErrorCode};
use kestrel_ir::{NodeId, Op};
use kestrel_types::{ParamValue, QualKind, QualifiedType, TypeId, TypeInterner};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::num::FpCategory;

impl Resolver<'_> {
    pub(super) fn resolve_op(
        &mut self,
        node: NodeId,
        op: Op,
        operands: &[NodeId],
    ) -> QueryResult<ResolvedExpression> {
        let mut qts: SmallVec<[QualifiedType; 2]> = SmallVec::with_capacity(operands.len());
        for &operand in operands {
            qts.push(self.resolve_expr(operand)?);
        }
        if qts.iter().any(QualifiedType::is_erroneous) {
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }

        match (op, qts.as_slice()) {
            (Op::Assign, [lhs, rhs]) => return Ok(self.assign(node, operands, *lhs, *rhs)),
            (Op::Eq | Op::Ne, [a, b]) if a.is_type() && b.is_type() => {
                let same = a.ty == b.ty;
                return Ok(ResolvedExpression::new(QualifiedType::param_bool(
                    same == (op == Op::Eq),
                )));
            }
            _ => {}
        }

        let builtin = qts
            .iter()
            .all(|qt| qt.kind.is_value() && self.cx.types.composite(qt.ty).is_none());
        if builtin {
            let qt = match builtin_op(&self.cx.types, op, &qts) {
                Some(qt) if unfoldable(op, &qts, &qt) => {
                    self.invalid_constant(node, op, &qts, qt.ty);
                    QualifiedType::ERRONEOUS
                }
                Some(qt) => qt,
                None => {
                    self.invalid_operands(node, op, &qts);
                    QualifiedType::ERRONEOUS
                }
            };
            return Ok(ResolvedExpression::new(qt));
        }
        self.user_operator(node, op, operands, &qts)
    }

    fn assign(
        &mut self,
        node: NodeId,
        operands: &[NodeId],
        lhs: QualifiedType,
        rhs: QualifiedType,
    ) -> ResolvedExpression {
        let target = operands.first().copied().unwrap_or(node);
        if !lhs.kind.is_mutable_lvalue() {
            self.report(
                target,
                Diagnostic::error(ErrorCode::E2002).with_message("cannot assign to an immutable value"),
            );
            return ResolvedExpression::new(QualifiedType::ERRONEOUS);
        }
        let types = &self.cx.types;
        let record_involved = types.composite(lhs.ty).is_some() || types.composite(rhs.ty).is_some();
        if !record_involved && types.pass_kind(&rhs, lhs.ty).is_none() {
            let value = operands.get(1).copied().unwrap_or(node);
            self.mismatch(value, lhs.ty, rhs.ty);
            return ResolvedExpression::new(QualifiedType::ERRONEOUS);
        }
        ResolvedExpression::new(QualifiedType::VOID)
    }

    /// Resolve `op` against `operator` declarations: methods of the
    /// record operands' types first, then free operators in scope.
    fn user_operator(
        &mut self,
        node: NodeId,
        op: Op,
        operands: &[NodeId],
        qts: &[QualifiedType],
    ) -> QueryResult<ResolvedExpression> {
        let name = self.cx.interner().intern(op.symbol());
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        let mut seen = SmallVec::<[TypeId; 2]>::new();
        for qt in qts {
            if self.cx.types.composite(qt.ty).is_none() || seen.contains(&qt.ty) {
                continue;
            }
            seen.push(qt.ty);
            let key = MethodCandidatesKey {
                target: self.cx.receiver_target(qt.ty),
                name,
                site: node.module,
            };
            levels.extend(self.cx.method_candidates(key)?.iter().cloned());
        }
        for level in scope::lookup_levels(self.cx, node, name)? {
            if level.via_receiver {
                continue;
            }
            let functions = self.free_functions(&level)?;
            if !functions.is_empty() {
                levels.push(functions);
            }
        }

        if levels.is_empty() {
            self.invalid_operands(node, op, qts);
            return Ok(ResolvedExpression::new(QualifiedType::ERRONEOUS));
        }
        let site = CallSite {
            node,
            receiver: None,
            implicit_receiver: None,
            actuals: operands
                .iter()
                .zip(qts)
                .map(|(&operand, &qt)| CallActual {
                    name: None,
                    qt,
                    node: Some(operand),
                })
                .collect(),
            parenless: false,
        };
        self.select(&site, &levels, name)
    }

    fn invalid_constant(&self, node: NodeId, op: Op, qts: &[QualifiedType], ty: TypeId) {
        let divisor_is_zero =
            op == Op::Div && qts.get(1).and_then(|qt| qt.param).is_some_and(is_zero);
        let message = if divisor_is_zero {
            "division by zero in a constant expression".to_owned()
        } else {
            format!(
                "constant expression with `{}` overflows `{}`",
                op.symbol(),
                self.cx.display_type(ty)
            )
        };
        self.report(node, Diagnostic::error(ErrorCode::E2009).with_message(message));
    }

    fn invalid_operands(&self, node: NodeId, op: Op, qts: &[QualifiedType]) {
        let operands: Vec<String> = qts
            .iter()
            .map(|qt| format!("`{}`", self.cx.display_type(qt.ty)))
            .collect();
        self.report(
            node,
            Diagnostic::error(ErrorCode::E2002).with_message(format!(
                "operator `{}` cannot be applied to {}",
                op.symbol(),
                operands.join(" and ")
            )),
        );
    }
}

/// Result of a builtin operator, folded when every operand is a param.
fn builtin_op(types: &TypeInterner, op: Op, qts: &[QualifiedType]) -> Option<QualifiedType> {
    match (op, qts) {
        (Op::Not, [a]) => {
            if a.ty != TypeId::BOOL {
                return None;
            }
            Some(match a.as_param_bool() {
                Some(b) => QualifiedType::param_bool(!b),
                None => QualifiedType::new(QualKind::ConstVar, TypeId::BOOL),
            })
        }
        (Op::And | Op::Or, [a, b]) => {
            if a.ty != TypeId::BOOL || b.ty != TypeId::BOOL {
                return None;
            }
            Some(match (a.as_param_bool(), b.as_param_bool()) {
                (Some(x), Some(y)) => QualifiedType::param_bool(if op == Op::And {
                    x && y
                } else {
                    x || y
                }),
                _ => QualifiedType::new(QualKind::ConstVar, TypeId::BOOL),
            })
        }
        (_, [a, b]) if op.is_comparison() => {
            let common = common_type(types, a, b)?;
            let ordered = common.is_numeric() || common == TypeId::STRING;
            if !ordered && !matches!(op, Op::Eq | Op::Ne) {
                return None;
            }
            let folded = match (a.param, b.param) {
                (Some(x), Some(y)) => match compare(x, y) {
                    Some(ordering) => Some(holds(op, ordering)),
                    // Strings are only compared for equality.
                    None if matches!(op, Op::Eq | Op::Ne) => Some((x == y) == (op == Op::Eq)),
                    None => None,
                },
                _ => None,
            };
            Some(match folded {
                Some(b) => QualifiedType::param_bool(b),
                None => QualifiedType::new(QualKind::ConstVar, TypeId::BOOL),
            })
        }
        (_, [a, b]) if op.is_arithmetic() => {
            let common = common_type(types, a, b)?;
            if common == TypeId::STRING {
                return (op == Op::Add).then_some(QualifiedType::new(QualKind::ConstVar, common));
            }
            if !common.is_numeric() {
                return None;
            }
            let folded = match (a.param, b.param) {
                (Some(x), Some(y)) => fold_arith(op, common, x, y),
                _ => None,
            };
            Some(match folded {
                Some(value) => QualifiedType::param(common, value),
                None => QualifiedType::new(QualKind::ConstVar, common),
            })
        }
        _ => None,
    }
}

/// Numeric arithmetic on compile-time operands whose value could not be
/// folded.
fn unfoldable(op: Op, qts: &[QualifiedType], result: &QualifiedType) -> bool {
    op.is_arithmetic()
        && result.ty.is_numeric()
        && result.param.is_none()
        && qts.iter().all(|qt| qt.param.is_some())
}

fn is_zero(value: ParamValue) -> bool {
    match value.as_integer() {
        Some(i) => i == 0,
        None => value
            .as_real()
            .is_some_and(|r| r.classify() == FpCategory::Zero),
    }
}

/// Type both operands of a binary operator convert to.
fn common_type(types: &TypeInterner, a: &QualifiedType, b: &QualifiedType) -> Option<TypeId> {
    if a.ty == b.ty {
        return Some(a.ty);
    }
    // An integer constant adopts the other operand's type when it fits.
    if a.param.is_some() && b.param.is_none() && types.pass_kind(a, b.ty).is_some() {
        return Some(b.ty);
    }
    if b.param.is_some() && a.param.is_none() && types.pass_kind(b, a.ty).is_some() {
        return Some(a.ty);
    }
    if TypeInterner::widens(a.ty, b.ty) {
        return Some(b.ty);
    }
    if TypeInterner::widens(b.ty, a.ty) {
        return Some(a.ty);
    }
    if a.ty.is_numeric() && b.ty.is_numeric() && (a.ty.is_real() || b.ty.is_real()) {
        return Some(TypeId::REAL64);
    }
    None
}

fn compare(x: ParamValue, y: ParamValue) -> Option<Ordering> {
    match (x, y) {
        (ParamValue::Bool(a), ParamValue::Bool(b)) => Some(a.cmp(&b)),
        (ParamValue::Str(_) | ParamValue::CStr(_), _) | (_, ParamValue::Str(_) | ParamValue::CStr(_)) => {
            None
        }
        _ => match (x.as_integer(), y.as_integer()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => x.as_real()?.partial_cmp(&y.as_real()?),
        },
    }
}

fn holds(op: Op, ordering: Ordering) -> bool {
    match op {
        Op::Eq => ordering == Ordering::Equal,
        Op::Ne => ordering != Ordering::Equal,
        Op::Lt => ordering == Ordering::Less,
        Op::Le => ordering != Ordering::Greater,
        Op::Gt => ordering == Ordering::Greater,
        Op::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

/// Fold `x op y` in type `ty`; `None` when the result is not representable.
fn fold_arith(op: Op, ty: TypeId, x: ParamValue, y: ParamValue) -> Option<ParamValue> {
    if ty.is_real() {
        let (a, b) = (x.as_real()?, y.as_real()?);
        let value = match op {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
            _ => return None,
        };
        return value.is_finite().then(|| ParamValue::Real(value.to_bits()));
    }
    let (a, b) = (x.as_integer()?, y.as_integer()?);
    let value = match op {
        Op::Add => a.checked_add(b),
        Op::Sub => a.checked_sub(b),
        Op::Mul => a.checked_mul(b),
        Op::Div => a.checked_div(b),
        _ => None,
    }?;
    int_param(ty, value)
}

/// `value` as a param of integral type `ty`, if it fits.
fn int_param(ty: TypeId, value: i128) -> Option<ParamValue> {
    let fits = match ty {
        TypeId::INT8 => i8::try_from(value).is_ok(),
        TypeId::INT16 => i16::try_from(value).is_ok(),
        TypeId::INT32 => i32::try_from(value).is_ok(),
        TypeId::INT64 => i64::try_from(value).is_ok(),
        TypeId::UINT8 => u8::try_from(value).is_ok(),
        TypeId::UINT16 => u16::try_from(value).is_ok(),
        TypeId::UINT32 => u32::try_from(value).is_ok(),
        TypeId::UINT64 => u64::try_from(value).is_ok(),
        _ => false,
    };
    if !fits {
        return None;
    }
    if ty.is_int() {
        i64::try_from(value).ok().map(ParamValue::Int)
    } else {
        u64::try_from(value).ok().map(ParamValue::Uint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_folding_checks_the_target_width() {
        assert_eq!(
            fold_arith(Op::Add, TypeId::INT8, ParamValue::Int(100), ParamValue::Int(27)),
            Some(ParamValue::Int(127))
        );
        assert_eq!(
            fold_arith(Op::Add, TypeId::INT8, ParamValue::Int(100), ParamValue::Int(28)),
            None
        );
        assert_eq!(
            fold_arith(Op::Sub, TypeId::UINT64, ParamValue::Uint(1), ParamValue::Uint(2)),
            None
        );
        assert_eq!(
            fold_arith(Op::Div, TypeId::INT64, ParamValue::Int(1), ParamValue::Int(0)),
            None
        );
    }

    #[test]
    fn real_folding_mixes_integer_operands() {
        assert_eq!(
            fold_arith(Op::Mul, TypeId::REAL64, ParamValue::Real(2.5f64.to_bits()), ParamValue::Int(2)),
            Some(ParamValue::Real(5.0f64.to_bits()))
        );
    }

    #[test]
    fn comparisons_fold_on_params() {
        let types = TypeInterner::new();
        let one = QualifiedType::param(TypeId::INT, ParamValue::Int(1));
        let two = QualifiedType::param(TypeId::INT, ParamValue::Int(2));
        assert_eq!(
            builtin_op(&types, Op::Lt, &[one, two]),
            Some(QualifiedType::param_bool(true))
        );
        assert_eq!(
            builtin_op(&types, Op::Ge, &[one, two]),
            Some(QualifiedType::param_bool(false))
        );
        let var = QualifiedType::new(QualKind::Var, TypeId::INT);
        assert_eq!(
            builtin_op(&types, Op::Eq, &[var, two]),
            Some(QualifiedType::new(QualKind::ConstVar, TypeId::BOOL))
        );
    }

    #[test]
    fn a_constant_adopts_the_narrower_operand_type() {
        let types = TypeInterner::new();
        let small = QualifiedType::new(QualKind::Var, TypeId::INT8);
        let lit = QualifiedType::param(TypeId::INT, ParamValue::Int(3));
        assert_eq!(common_type(&types, &small, &lit), Some(TypeId::INT8));
        let wide = QualifiedType::new(QualKind::Var, TypeId::REAL32);
        assert_eq!(
            builtin_op(&types, Op::Add, &[small, wide]),
            Some(QualifiedType::new(QualKind::ConstVar, TypeId::REAL32))
        );
    }

    #[test]
    fn logical_operators_require_bool() {
        let types = TypeInterner::new();
        let t = QualifiedType::param_bool(true);
        let i = QualifiedType::param(TypeId::INT, ParamValue::Int(0));
        assert_eq!(builtin_op(&types, Op::Not, &[t]), Some(QualifiedType::param_bool(false)));
        assert_eq!(builtin_op(&types, Op::And, &[t, i]), None);
        assert_eq!(
            builtin_op(&types, Op::Or, &[QualifiedType::param_bool(false), t]),
            Some(QualifiedType::param_bool(true))
        );
    }

    #[test]
    fn string_concatenation_only_adds() {
        let types = TypeInterner::new();
        let s = QualifiedType::new(QualKind::Var, TypeId::STRING);
        assert_eq!(
            builtin_op(&types, Op::Add, &[s, s]),
            Some(QualifiedType::new(QualKind::ConstVar, TypeId::STRING))
        );
        assert_eq!(builtin_op(&types, Op::Sub, &[s, s]), None);
    }
}
