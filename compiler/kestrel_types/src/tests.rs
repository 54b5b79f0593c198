use super::*;
use kestrel_ir::{NodeId, RecordKind, StringInterner};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

struct Fixture {
    names: StringInterner,
    types: TypeInterner,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            names: StringInterner::new(),
            types: TypeInterner::new(),
        }
    }

    fn node(&self, index: u32) -> NodeId {
        NodeId::new(self.names.intern("M"), index)
    }

    /// `record name { type T; param p = ...; }` style composite.
    fn composite(
        &self,
        name: &str,
        kind: RecordKind,
        formals: &[(&str, GenericKind, bool)],
        parent: Option<TypeId>,
    ) -> TypeId {
        let decl = self.node(1000 + u32::from(name.as_bytes()[0]));
        let formals: Vec<GenericFormal> = formals
            .iter()
            .zip(0u32..)
            .map(|(&(n, kind, has_default), i)| GenericFormal {
                name: self.names.intern(n),
                decl: self.node(i),
                kind,
                has_default,
            })
            .collect();
        let subs = vec![None; formals.len()];
        self.types.intern(TypeData::Composite(CompositeType {
            decl,
            name: self.names.intern(name),
            kind,
            parent,
            formals,
            subs,
        }))
    }
}

#[test]
fn primitives_intern_to_fixed_ids() {
    let types = TypeInterner::new();
    assert_eq!(types.intern(TypeData::Bool), TypeId::BOOL);
    assert_eq!(types.int(IntWidth::W64), TypeId::INT);
    assert_eq!(types.uint(IntWidth::W8), TypeId::UINT8);
    assert_eq!(types.real(RealWidth::W32), TypeId::REAL32);
    assert_eq!(types.intern(TypeData::CString), TypeId::CSTRING);
    assert!(matches!(*types.lookup(TypeId::STRING), TypeData::String));
}

#[test]
fn structurally_equal_composites_share_an_id() {
    let fx = Fixture::new();
    let r = fx.composite("R", RecordKind::Record, &[("T", GenericKind::Type, false)], None);
    let again = fx.composite("R", RecordKind::Record, &[("T", GenericKind::Type, false)], None);
    assert_eq!(r, again);
    assert!(!r.is_primitive());

    let r_int = fx.types.instantiate(r, vec![Some(QualifiedType::type_(TypeId::INT))]);
    let r_int2 = fx.types.instantiate(r, vec![Some(QualifiedType::type_(TypeId::INT))]);
    let r_real = fx.types.instantiate(r, vec![Some(QualifiedType::type_(TypeId::REAL))]);
    assert_eq!(r_int, r_int2);
    assert_ne!(r_int, r_real);
    assert_eq!(fx.types.generic_root(r_int), r);
}

#[test]
fn genericity_follows_substitutions_and_defaults() {
    let fx = Fixture::new();
    let plain = fx.composite("P", RecordKind::Record, &[], None);
    let generic = fx.composite("G", RecordKind::Record, &[("T", GenericKind::Type, false)], None);
    let defaulted = fx.composite(
        "D",
        RecordKind::Record,
        &[("T", GenericKind::Type, true), ("n", GenericKind::Param, true)],
        None,
    );

    assert_eq!(fx.types.genericity(plain), Genericity::Concrete);
    assert_eq!(fx.types.genericity(generic), Genericity::Generic);
    assert_eq!(fx.types.genericity(defaulted), Genericity::GenericWithDefaults);
    assert_eq!(fx.types.genericity(TypeId::ANY), Genericity::Generic);
    assert_eq!(fx.types.genericity(TypeId::INT), Genericity::Concrete);

    let half = fx.types.instantiate(
        defaulted,
        vec![Some(QualifiedType::type_(TypeId::INT)), None],
    );
    assert_eq!(fx.types.genericity(half), Genericity::GenericWithDefaults);

    let nested = fx.types.instantiate(
        defaulted,
        vec![
            Some(QualifiedType::type_(generic)),
            Some(QualifiedType::param(TypeId::INT, ParamValue::Int(3))),
        ],
    );
    assert_eq!(fx.types.genericity(nested), Genericity::Generic);
}

#[test]
fn display_spells_types_as_source() {
    let fx = Fixture::new();
    let r = fx.composite(
        "R",
        RecordKind::Record,
        &[("T", GenericKind::Type, false), ("flag", GenericKind::Param, false)],
        None,
    );
    let inst = fx.types.instantiate(
        r,
        vec![
            Some(QualifiedType::type_(TypeId::INT8)),
            Some(QualifiedType::param_bool(false)),
        ],
    );
    assert_eq!(fx.types.display(inst, &fx.names), "R(int(8), false)");
    assert_eq!(fx.types.display(r, &fx.names), "R(?, ?)");
    assert_eq!(fx.types.display(TypeId::REAL, &fx.names), "real");
}

#[test]
fn conversions_rank_from_exact_to_instantiation() {
    let types = TypeInterner::new();
    let int_var = QualifiedType::new(QualKind::Var, TypeId::INT);
    let small_param = QualifiedType::param(TypeId::INT, ParamValue::Int(100));
    let big_param = QualifiedType::param(TypeId::INT, ParamValue::Int(1000));

    assert_eq!(types.pass_kind(&int_var, TypeId::INT), Some(PassKind::Exact));
    assert_eq!(types.pass_kind(&int_var, TypeId::ANY), Some(PassKind::Instantiates));
    assert_eq!(types.pass_kind(&int_var, TypeId::INT8), None);
    assert_eq!(
        types.pass_kind(&small_param, TypeId::INT8),
        Some(PassKind::ParamNarrowing)
    );
    assert_eq!(types.pass_kind(&big_param, TypeId::INT8), None);
    assert_eq!(types.pass_kind(&int_var, TypeId::REAL), Some(PassKind::Numeric));
    assert_eq!(
        types.pass_kind(&QualifiedType::new(QualKind::Var, TypeId::UINT32), TypeId::INT),
        Some(PassKind::Numeric)
    );
    assert_eq!(
        types.pass_kind(&QualifiedType::new(QualKind::Var, TypeId::INT), TypeId::UINT),
        None
    );
    assert_eq!(types.pass_kind(&int_var, TypeId::BOOL), None);
    assert!(PassKind::Exact < PassKind::Numeric);
}

#[test]
fn string_params_convert_to_c_strings() {
    let names = StringInterner::new();
    let types = TypeInterner::new();
    let lit = QualifiedType::param(TypeId::STRING, ParamValue::Str(names.intern("hi")));
    let runtime = QualifiedType::new(QualKind::Var, TypeId::STRING);
    assert_eq!(
        types.pass_kind(&lit, TypeId::CSTRING),
        Some(PassKind::StringToCString)
    );
    assert_eq!(types.pass_kind(&runtime, TypeId::CSTRING), None);
}

#[test]
fn subclasses_pass_to_parent_formals() {
    let fx = Fixture::new();
    let parent = fx.composite("A", RecordKind::Class, &[], None);
    let child = fx.composite("B", RecordKind::Class, &[], Some(parent));
    let child_qt = QualifiedType::new(QualKind::Var, child);

    assert_eq!(fx.types.ancestors(child), vec![parent]);
    assert_eq!(fx.types.pass_kind(&child_qt, parent), Some(PassKind::Subtype));
    assert_eq!(
        fx.types
            .pass_kind(&QualifiedType::new(QualKind::Var, parent), child),
        None
    );
    assert!(fx.types.is_narrower(child, parent));
    assert!(!fx.types.is_narrower(parent, child));
    assert!(fx.types.is_class(child));
}

#[test]
fn narrower_orders_numeric_and_generic_formals() {
    let types = TypeInterner::new();
    assert!(types.is_narrower(TypeId::INT32, TypeId::INT64));
    assert!(types.is_narrower(TypeId::INT, TypeId::ANY));
    assert!(!types.is_narrower(TypeId::INT, TypeId::INT));
    assert!(!types.is_narrower(TypeId::INT, TypeId::STRING));
    assert!(!types.is_narrower(TypeId::STRING, TypeId::INT));
}

proptest! {
    #[test]
    fn instantiation_is_idempotent(a in 0usize..4, b in 0usize..4) {
        let fx = Fixture::new();
        let prims = [TypeId::INT, TypeId::BOOL, TypeId::REAL32, TypeId::STRING];
        let r = fx.composite(
            "R",
            RecordKind::Record,
            &[("T", GenericKind::Type, false), ("U", GenericKind::Type, false)],
            None,
        );
        let subs = vec![
            Some(QualifiedType::type_(prims[a])),
            Some(QualifiedType::type_(prims[b])),
        ];
        let first = fx.types.instantiate(r, subs.clone());
        let second = fx.types.instantiate(r, subs);
        prop_assert_eq!(first, second);
        prop_assert!(fx.types.instantiates(first, r));
        prop_assert_eq!(fx.types.genericity(first), Genericity::Concrete);
    }
}
