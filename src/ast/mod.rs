//! The CHR program data model: expressions, bodies, rules, declarations.
//!
//! Modeled as tagged `enum`/`struct` sum types rather than a class
//! hierarchy — every node carries its own [`Position`] and arenas
//! (`ChrProgram::decls`, `ChrProgram::rules`) are indexed by lightweight
//! handles (`DeclId`, `RuleId`) instead of owning or cyclic references.

pub mod builders;

use std::collections::BTreeSet;
use std::fmt;

use crate::position::Position;

/// Index into `ChrProgram::decls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// Index into `ChrProgram::rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

/// Bracket style used by a builtin call's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Paren,
    Square,
    Angle,
}

impl Delimiter {
    pub fn open(self) -> char {
        match self {
            Delimiter::Paren => '(',
            Delimiter::Square => '[',
            Delimiter::Angle => '<',
        }
    }

    pub fn close(self) -> char {
        match self {
            Delimiter::Paren => ')',
            Delimiter::Square => ']',
            Delimiter::Angle => '>',
        }
    }
}

/// A single call to a CHR constraint: `name(args...)`.
///
/// Shared between head atoms (in `Rule`/`OccRule`) and body atoms
/// (`Body::ChrConstraintCall`, `Expression::ChrConstraint`). `decl_ref` is
/// resolved once the declaration it refers to is known; it is `None` for
/// freshly built nodes until a resolution step fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct ChrConstraintCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub decl_ref: Option<DeclId>,
    pub position: Position,
}

impl ChrConstraintCall {
    pub fn new(name: impl Into<String>, args: Vec<Expression>, position: Position) -> Self {
        ChrConstraintCall { name: name.into(), args, decl_ref: None, position }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Union of logical-variable names occurring anywhere in the argument
    /// list, recursively.
    pub fn free_logical_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for a in &self.args {
            out.extend(a.free_logical_variables());
        }
        out
    }
}

impl fmt::Display for ChrConstraintCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, ")")
    }
}

/// Host-language expression tree, shared by guards, builtin arguments and
/// host-expression statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A raw host identifier (function name, already-bound host symbol).
    Identifier { name: String, position: Position },
    /// A CHR logical variable; `"_"` denotes an anonymous/don't-care slot.
    LogicalVariable { name: String, position: Position },
    /// A host-level local variable, introduced by a `LocalDecl`/assignment.
    LocalVariable { name: String, position: Position },
    /// A literal token (number, string, ...), kept as source text.
    Literal { text: String, position: Position },
    Prefix { op: String, operand: Box<Expression>, position: Position },
    Postfix { op: String, operand: Box<Expression>, position: Position },
    Infix { op: String, left: Box<Expression>, right: Box<Expression>, position: Position },
    /// A two-operator ternary, e.g. `a ? b : c`, with three genuinely
    /// distinct children (no aliasing between the second and third).
    Ternary {
        op1: String,
        op2: String,
        a: Box<Expression>,
        b: Box<Expression>,
        c: Box<Expression>,
        position: Position,
    },
    /// A call into the host language using one of the three bracket styles.
    BuiltinCall {
        name: String,
        left_delim: Delimiter,
        right_delim: Delimiter,
        args: Vec<Expression>,
        position: Position,
    },
    /// A CHR constraint used as a term (e.g. as an argument to `ChrCount`).
    ChrConstraint(ChrConstraintCall),
    /// `count` over a constraint, optionally restricted to one stored index.
    ChrCount { use_index: Option<usize>, constraint: Box<Expression>, position: Position },
}

impl Expression {
    pub fn position(&self) -> Position {
        match self {
            Expression::Identifier { position, .. }
            | Expression::LogicalVariable { position, .. }
            | Expression::LocalVariable { position, .. }
            | Expression::Literal { position, .. }
            | Expression::Prefix { position, .. }
            | Expression::Postfix { position, .. }
            | Expression::Infix { position, .. }
            | Expression::Ternary { position, .. }
            | Expression::BuiltinCall { position, .. }
            | Expression::ChrCount { position, .. } => *position,
            Expression::ChrConstraint(call) => call.position,
        }
    }

    pub fn is_logical_variable(&self) -> bool {
        matches!(self, Expression::LogicalVariable { .. })
    }

    pub fn logical_variable_name(&self) -> Option<&str> {
        match self {
            Expression::LogicalVariable { name, .. } if name != "_" => Some(name.as_str()),
            _ => None,
        }
    }

    /// Recursively collects logical- and local-variable names into the two
    /// accumulators. `Identifier`s are host-level and never counted.
    pub fn collect_vars(&self, logical: &mut BTreeSet<String>, local: &mut BTreeSet<String>) {
        match self {
            Expression::LogicalVariable { name, .. } => {
                if name != "_" {
                    logical.insert(name.clone());
                }
            }
            Expression::LocalVariable { name, .. } => {
                local.insert(name.clone());
            }
            Expression::Identifier { .. } | Expression::Literal { .. } => {}
            Expression::Prefix { operand, .. } | Expression::Postfix { operand, .. } => {
                operand.collect_vars(logical, local);
            }
            Expression::Infix { left, right, .. } => {
                left.collect_vars(logical, local);
                right.collect_vars(logical, local);
            }
            Expression::Ternary { a, b, c, .. } => {
                a.collect_vars(logical, local);
                b.collect_vars(logical, local);
                c.collect_vars(logical, local);
            }
            Expression::BuiltinCall { args, .. } => {
                for a in args {
                    a.collect_vars(logical, local);
                }
            }
            Expression::ChrConstraint(call) => {
                for a in &call.args {
                    a.collect_vars(logical, local);
                }
            }
            Expression::ChrCount { constraint, .. } => constraint.collect_vars(logical, local),
        }
    }

    pub fn free_logical_variables(&self) -> BTreeSet<String> {
        let (mut l, mut lo) = (BTreeSet::new(), BTreeSet::new());
        self.collect_vars(&mut l, &mut lo);
        l
    }

    pub fn free_local_variables(&self) -> BTreeSet<String> {
        let (mut l, mut lo) = (BTreeSet::new(), BTreeSet::new());
        self.collect_vars(&mut l, &mut lo);
        lo
    }

    /// Shallow classification used by the head-reorder and index-synthesis
    /// passes, which only look at the immediate shape of a head-atom
    /// argument (CHR head terms are not expected to be deeply nested).
    pub fn is_literal_or_host_var(&self) -> bool {
        matches!(
            self,
            Expression::Literal { .. } | Expression::Identifier { .. } | Expression::LocalVariable { .. }
        )
    }

    /// Multi-line pretty form, grounded in the teacher's
    /// `IRNode::pretty_print(indent)` recursive-string-building style.
    pub fn pretty(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        match self {
            Expression::Identifier { name, .. } => format!("{pad}{name}"),
            Expression::LogicalVariable { name, .. } => format!("{pad}{name}"),
            Expression::LocalVariable { name, .. } => format!("{pad}{name}"),
            Expression::Literal { text, .. } => format!("{pad}{text}"),
            Expression::Prefix { op, operand, .. } => {
                format!("{pad}{op}\n{}", operand.pretty(indent + 1))
            }
            Expression::Postfix { op, operand, .. } => {
                format!("{}\n{pad}{op}", operand.pretty(indent + 1))
            }
            Expression::Infix { op, left, right, .. } => {
                format!("{pad}{op}\n{}\n{}", left.pretty(indent + 1), right.pretty(indent + 1))
            }
            Expression::Ternary { op1, op2, a, b, c, .. } => format!(
                "{pad}{op1}{op2}\n{}\n{}\n{}",
                a.pretty(indent + 1),
                b.pretty(indent + 1),
                c.pretty(indent + 1)
            ),
            Expression::BuiltinCall { name, args, .. } => {
                let mut s = format!("{pad}{name}");
                for a in args {
                    s.push('\n');
                    s.push_str(&a.pretty(indent + 1));
                }
                s
            }
            Expression::ChrConstraint(call) => format!("{pad}{call}"),
            Expression::ChrCount { constraint, .. } => {
                format!("{pad}count\n{}", constraint.pretty(indent + 1))
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier { name, .. }
            | Expression::LogicalVariable { name, .. }
            | Expression::LocalVariable { name, .. } => write!(f, "{name}"),
            Expression::Literal { text, .. } => write!(f, "{text}"),
            Expression::Prefix { op, operand, .. } => write!(f, "({op}{operand})"),
            Expression::Postfix { op, operand, .. } => write!(f, "({operand}{op})"),
            Expression::Infix { op, left, right, .. } => write!(f, "({left} {op} {right})"),
            Expression::Ternary { op1, op2, a, b, c, .. } => {
                write!(f, "({a} {op1} {b} {op2} {c})")
            }
            Expression::BuiltinCall { name, left_delim, right_delim, args, .. } => {
                write!(f, "{name}{}", left_delim.open())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, "{}", right_delim.close())
            }
            Expression::ChrConstraint(call) => write!(f, "{call}"),
            Expression::ChrCount { constraint, .. } => write!(f, "count({constraint})"),
        }
    }
}

/// Per-atom pragma annotations, attached at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pragma {
    Passive,
    NoHistory,
    NoReactivate,
    Bang,
    Persistent,
    CatchFailure,
}

impl Pragma {
    pub fn name(self) -> &'static str {
        match self {
            Pragma::Passive => "passive",
            Pragma::NoHistory => "no_history",
            Pragma::NoReactivate => "no_reactivate",
            Pragma::Bang => "bang",
            Pragma::Persistent => "persistent",
            Pragma::CatchFailure => "catch_failure",
        }
    }
}

/// An ordered, deduplicated set of pragmas. Kept ordered so that emitted
/// text is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PragmaSet(BTreeSet<Pragma>);

impl PragmaSet {
    pub fn new() -> Self {
        PragmaSet(BTreeSet::new())
    }

    pub fn insert(&mut self, p: Pragma) -> bool {
        self.0.insert(p)
    }

    pub fn contains(&self, p: Pragma) -> bool {
        self.0.contains(&p)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pragma> {
        self.0.iter()
    }
}

impl FromIterator<Pragma> for PragmaSet {
    fn from_iter<T: IntoIterator<Item = Pragma>>(iter: T) -> Self {
        PragmaSet(iter.into_iter().collect())
    }
}

impl fmt::Display for PragmaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|p| p.name()).collect();
        match names.len() {
            0 => Ok(()),
            1 => write!(f, "# {}", names[0]),
            _ => write!(f, "# {{ {} }}", names.join(", ")),
        }
    }
}

/// Terminal keyword forms a rule body can reduce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Success,
    Failure,
    Stop,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Success => "success",
            Keyword::Failure => "failure",
            Keyword::Stop => "stop",
        }
    }
}

/// `,` (conjunction) or `;` (disjunction) joining a body's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOp {
    Conjunction,
    Disjunction,
}

/// A rule body. Every variant carries a `Position`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Keyword { keyword: Keyword, position: Position },
    HostExpression { expr: Expression, pragmas: PragmaSet, position: Position },
    LocalDecl { var: String, expr: Expression, pragmas: PragmaSet, position: Position },
    Unification { logical_var: Expression, expr: Expression, pragmas: PragmaSet, position: Position },
    ChrConstraintCall { atom: ChrConstraintCall, pragmas: PragmaSet, position: Position },
    Sequence { op: SequenceOp, children: Vec<Body>, position: Position },
    Try { backtrack_flag: bool, var: Option<String>, body: Box<Body>, position: Position },
    Behavior {
        stop_cond: Option<Expression>,
        final_status: Option<Expression>,
        on_ok_alt: Option<Box<Body>>,
        on_fail_alt: Option<Box<Body>>,
        on_ok_final: Option<Box<Body>>,
        on_fail_final: Option<Box<Body>>,
        body: Box<Body>,
        position: Position,
    },
}

impl Body {
    pub fn position(&self) -> Position {
        match self {
            Body::Keyword { position, .. }
            | Body::HostExpression { position, .. }
            | Body::LocalDecl { position, .. }
            | Body::Unification { position, .. }
            | Body::ChrConstraintCall { position, .. }
            | Body::Sequence { position, .. }
            | Body::Try { position, .. }
            | Body::Behavior { position, .. } => *position,
        }
    }

    /// `true` when this node, or anything nested beneath it, introduces a
    /// disjunction, `try`, or `behavior` construct — used by auto-persistent
    /// inference (pass E) to veto itself on any backtracking control flow.
    pub fn contains_backtracking_construct(&self) -> bool {
        match self {
            Body::Sequence { op: SequenceOp::Disjunction, .. } | Body::Try { .. } | Body::Behavior { .. } => true,
            Body::Sequence { children, .. } => children.iter().any(Body::contains_backtracking_construct),
            _ => false,
        }
    }

    /// Recursively collects every `ChrConstraintCall` appearing as a body
    /// atom (not nested inside host expressions) together with whether it
    /// is reached unconditionally on this path — used by the dependency
    /// graph builder. Host expressions and local decls are reported via
    /// `has_host_effect`.
    pub fn collect_chr_calls<'a>(&'a self, out: &mut Vec<&'a ChrConstraintCall>) {
        match self {
            Body::ChrConstraintCall { atom, .. } => out.push(atom),
            Body::Sequence { children, .. } => {
                for c in children {
                    c.collect_chr_calls(out);
                }
            }
            Body::Try { body, .. } => body.collect_chr_calls(out),
            Body::Behavior { body, on_ok_alt, on_fail_alt, on_ok_final, on_fail_final, .. } => {
                body.collect_chr_calls(out);
                for alt in [on_ok_alt, on_fail_alt, on_ok_final, on_fail_final].into_iter().flatten() {
                    alt.collect_chr_calls(out);
                }
            }
            _ => {}
        }
    }

    /// `true` if any reachable node performs a host-level effect (a host
    /// expression, local declaration, or unification) — these are what
    /// make a constraint's outgoing dependency edge land on `BUILTIN`.
    pub fn has_host_effect(&self) -> bool {
        match self {
            Body::HostExpression { .. } | Body::LocalDecl { .. } | Body::Unification { .. } => true,
            Body::Sequence { children, .. } => children.iter().any(Body::has_host_effect),
            Body::Try { body, .. } => body.has_host_effect(),
            Body::Behavior { body, on_ok_alt, on_fail_alt, on_ok_final, on_fail_final, .. } => {
                body.has_host_effect()
                    || [on_ok_alt, on_fail_alt, on_ok_final, on_fail_final]
                        .into_iter()
                        .flatten()
                        .any(|b| b.has_host_effect())
            }
            _ => false,
        }
    }
}

/// How a rule's two operators (`<=>`, `==>`, `=>>`) are represented once
/// head atoms have been split into keep/delete lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `<=>` with an empty keep list, or simpagation's delete side.
    Simplification,
    /// `<=>` with both keep and delete atoms present (`H1 \ H2 <=> ...`).
    Simpagation,
    /// `==>`, with history tracking.
    Propagation,
    /// `=>>`, propagation without history (forces `Pragma::NoHistory` onto
    /// every keep-side head atom).
    PropagationNoHistory,
}

/// A single declared head atom, with its per-atom pragmas.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadAtomDecl {
    pub call: ChrConstraintCall,
    pub pragmas: PragmaSet,
}

/// A source-level CHR rule, before occurrence-rule expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: RuleId,
    pub name: Option<String>,
    pub kind: RuleKind,
    pub head_keep: Vec<HeadAtomDecl>,
    pub head_del: Vec<HeadAtomDecl>,
    pub guard: Option<Expression>,
    pub body: Body,
    pub position: Position,
}

impl Rule {
    /// All head atoms in keep-then-delete order (or delete-then-keep, if
    /// `del_first` — used by the occurrence-reorder configuration flag).
    pub fn head_atoms(&self, del_first: bool) -> Vec<(bool, &HeadAtomDecl)> {
        let keep = self.head_keep.iter().map(|d| (true, d));
        let del = self.head_del.iter().map(|d| (false, d));
        if del_first {
            del.chain(keep).collect()
        } else {
            keep.chain(del).collect()
        }
    }
}

/// A declared CHR constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChrConstraintDecl {
    pub id: DeclId,
    pub name: String,
    pub arity: usize,
    /// Store-level pragmas (e.g. `persistent`, set by pass E).
    pub pragmas: PragmaSet,
    /// Set by pass I when every occurrence of this constraint as an
    /// active, passively-matched, guardless, partner-less, variable-only
    /// head atom is eliminated.
    pub never_stored: bool,
    /// Argument-position tuples synthesized by pass H, in creation order;
    /// a `HeadAtom::use_index` is an index into this vector.
    pub indexes: Vec<Vec<usize>>,
    pub position: Position,
}

impl ChrConstraintDecl {
    pub fn new(id: DeclId, name: impl Into<String>, arity: usize, position: Position) -> Self {
        ChrConstraintDecl {
            id,
            name: name.into(),
            arity,
            pragmas: PragmaSet::new(),
            never_stored: false,
            indexes: Vec::new(),
            position,
        }
    }
}

/// A head atom as it appears in an occurrence rule (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct HeadAtom {
    pub keep: bool,
    pub use_index: i32,
    pub call: ChrConstraintCall,
}

/// One scheduling unit produced by occurrence-rule expansion: a single
/// rule, viewed from the perspective of one of its head atoms becoming
/// active.
#[derive(Debug, Clone, PartialEq)]
pub struct OccRule {
    pub rule_ref: RuleId,
    pub occurrence_index: usize,
    pub active: HeadAtom,
    pub partners: Vec<HeadAtom>,
    /// `partners.len() + 1` buckets: `guard_parts[i]` holds conjuncts
    /// executable once the first `i` partners have been matched;
    /// `guard_parts[partners.len()]` is the catch-all bucket.
    pub guard_parts: Vec<Vec<Expression>>,
    pub store_active: bool,
}

impl OccRule {
    pub fn guard_is_empty(&self) -> bool {
        self.guard_parts.iter().all(Vec::is_empty)
    }
}

/// The whole compilation unit: declarations, source rules, and (once pass
/// C has run) occurrence rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ChrProgram {
    pub name: String,
    pub parameters: Vec<String>,
    pub template_parameters: Vec<String>,
    pub include_file: Option<String>,
    pub auto_persistent: bool,
    pub auto_catch_failure: bool,
    pub decls: Vec<ChrConstraintDecl>,
    pub rules: Vec<Rule>,
    pub occurrences: Vec<OccRule>,
}

impl ChrProgram {
    pub fn new(name: impl Into<String>) -> Self {
        ChrProgram {
            name: name.into(),
            parameters: Vec::new(),
            template_parameters: Vec::new(),
            include_file: None,
            auto_persistent: false,
            auto_catch_failure: false,
            decls: Vec::new(),
            rules: Vec::new(),
            occurrences: Vec::new(),
        }
    }

    pub fn decl(&self, id: DeclId) -> &ChrConstraintDecl {
        &self.decls[id.0]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut ChrConstraintDecl {
        &mut self.decls[id.0]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn find_decl_by_name(&self, name: &str) -> Option<DeclId> {
        self.decls.iter().find(|d| d.name == name).map(|d| d.id)
    }

    /// Resolves every `decl_ref` in every head atom and every
    /// `ChrConstraint` expression against `self.decls`, by name. Returns
    /// the names that could not be resolved (used-but-undeclared
    /// constraints).
    pub fn resolve_decl_refs(&mut self) -> Vec<String> {
        let by_name: std::collections::HashMap<String, DeclId> =
            self.decls.iter().map(|d| (d.name.clone(), d.id)).collect();
        let mut unresolved = BTreeSet::new();

        fn resolve_call(call: &mut ChrConstraintCall, by_name: &std::collections::HashMap<String, DeclId>, unresolved: &mut BTreeSet<String>) {
            match by_name.get(&call.name) {
                Some(id) => call.decl_ref = Some(*id),
                None => {
                    unresolved.insert(call.name.clone());
                }
            }
            for a in &mut call.args {
                resolve_expr(a, by_name, unresolved);
            }
        }

        fn resolve_expr(expr: &mut Expression, by_name: &std::collections::HashMap<String, DeclId>, unresolved: &mut BTreeSet<String>) {
            match expr {
                Expression::ChrConstraint(call) => resolve_call(call, by_name, unresolved),
                Expression::ChrCount { constraint, .. } => resolve_expr(constraint, by_name, unresolved),
                Expression::Prefix { operand, .. } | Expression::Postfix { operand, .. } => {
                    resolve_expr(operand, by_name, unresolved);
                }
                Expression::Infix { left, right, .. } => {
                    resolve_expr(left, by_name, unresolved);
                    resolve_expr(right, by_name, unresolved);
                }
                Expression::Ternary { a, b, c, .. } => {
                    resolve_expr(a, by_name, unresolved);
                    resolve_expr(b, by_name, unresolved);
                    resolve_expr(c, by_name, unresolved);
                }
                Expression::BuiltinCall { args, .. } => {
                    for a in args {
                        resolve_expr(a, by_name, unresolved);
                    }
                }
                _ => {}
            }
        }

        fn resolve_body(body: &mut Body, by_name: &std::collections::HashMap<String, DeclId>, unresolved: &mut BTreeSet<String>) {
            match body {
                Body::ChrConstraintCall { atom, .. } => resolve_call(atom, by_name, unresolved),
                Body::HostExpression { expr, .. } | Body::LocalDecl { expr, .. } | Body::Unification { expr, .. } => {
                    resolve_expr(expr, by_name, unresolved);
                }
                Body::Sequence { children, .. } => {
                    for c in children {
                        resolve_body(c, by_name, unresolved);
                    }
                }
                Body::Try { body, .. } => resolve_body(body, by_name, unresolved),
                Body::Behavior { body, on_ok_alt, on_fail_alt, on_ok_final, on_fail_final, stop_cond, .. } => {
                    resolve_body(body, by_name, unresolved);
                    if let Some(sc) = stop_cond {
                        resolve_expr(sc, by_name, unresolved);
                    }
                    for alt in [on_ok_alt, on_fail_alt, on_ok_final, on_fail_final].into_iter().flatten() {
                        resolve_body(alt, by_name, unresolved);
                    }
                }
                _ => {}
            }
        }

        for rule in &mut self.rules {
            for h in rule.head_keep.iter_mut().chain(rule.head_del.iter_mut()) {
                resolve_call(&mut h.call, &by_name, &mut unresolved);
            }
            if let Some(g) = &mut rule.guard {
                resolve_expr(g, &by_name, &mut unresolved);
            }
            resolve_body(&mut rule.body, &by_name, &mut unresolved);
        }

        unresolved.into_iter().collect()
    }
}

/// Top-level-conjunction split of a guard expression (operators `&&` and
/// `and`); used by occurrence expansion (pass C) and guard reordering
/// (pass G).
pub fn split_conjunction(expr: &Expression) -> Vec<Expression> {
    match expr {
        Expression::Infix { op, left, right, .. } if op == "&&" || op == "and" => {
            let mut parts = split_conjunction(left);
            parts.extend(split_conjunction(right));
            parts
        }
        other => vec![other.clone()],
    }
}

/// `true` if `g` is a host-local assignment (`lhs = rhs` where `lhs` is a
/// local variable), in which case only `rhs`'s free variables are real
/// dependencies for scheduling purposes.
pub fn assignment_lhs(g: &Expression) -> Option<String> {
    match g {
        Expression::Infix { op, left, .. } if op == "=" => match left.as_ref() {
            Expression::LocalVariable { name, .. } => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// The dependency set of a guard conjunct for the purposes of pass G:
/// `rhs`'s free variables if `g` is an assignment, else `g`'s own free
/// variables. Returns `(logical_deps, local_deps)`.
pub fn guard_conjunct_deps(g: &Expression) -> (BTreeSet<String>, BTreeSet<String>) {
    match g {
        Expression::Infix { op, left, right, .. } if op == "=" && matches!(left.as_ref(), Expression::LocalVariable { .. }) => {
            (right.free_logical_variables(), right.free_local_variables())
        }
        other => (other.free_logical_variables(), other.free_local_variables()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lv(name: &str) -> Expression {
        Expression::LogicalVariable { name: name.to_string(), position: Position::synthetic() }
    }

    fn infix(op: &str, left: Expression, right: Expression) -> Expression {
        Expression::Infix { op: op.to_string(), left: Box::new(left), right: Box::new(right), position: Position::synthetic() }
    }

    #[test]
    fn split_conjunction_flattens_nested_and() {
        let expr = infix("&&", infix("&&", lv("a"), lv("b")), lv("c"));
        let parts = split_conjunction(&expr);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn split_conjunction_leaves_non_and_whole() {
        let expr = infix(">", lv("x"), lv("y"));
        let parts = split_conjunction(&expr);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], expr);
    }

    #[test]
    fn pragma_set_display_single_vs_multi() {
        let mut single = PragmaSet::new();
        single.insert(Pragma::Passive);
        assert_eq!(single.to_string(), "# passive");

        let mut multi = PragmaSet::new();
        multi.insert(Pragma::Passive);
        multi.insert(Pragma::NoHistory);
        assert_eq!(multi.to_string(), "# { passive, no_history }");
    }

    #[test]
    fn anonymous_logical_variable_excluded_from_free_vars() {
        let call = ChrConstraintCall::new("p", vec![lv("_"), lv("X")], Position::synthetic());
        let vars = call.free_logical_variables();
        assert_eq!(vars.len(), 1);
        assert!(vars.contains("X"));
    }

    #[test]
    fn resolve_decl_refs_reports_unknown_constraint() {
        let mut program = ChrProgram::new("t");
        let decl_id = DeclId(0);
        program.decls.push(ChrConstraintDecl::new(decl_id, "p", 1, Position::synthetic()));
        let rule = Rule {
            id: RuleId(0),
            name: None,
            kind: RuleKind::Simplification,
            head_keep: vec![],
            head_del: vec![HeadAtomDecl {
                call: ChrConstraintCall::new("q", vec![lv("X")], Position::synthetic()),
                pragmas: PragmaSet::new(),
            }],
            guard: None,
            body: Body::Keyword { keyword: Keyword::Success, position: Position::synthetic() },
            position: Position::synthetic(),
        };
        program.rules.push(rule);
        let unresolved = program.resolve_decl_refs();
        assert_eq!(unresolved, vec!["q".to_string()]);
        assert_eq!(program.rules[0].head_del[0].call.decl_ref, None);
    }

    #[test]
    fn contains_backtracking_construct_detects_nested_try() {
        let inner = Body::Try {
            backtrack_flag: true,
            var: None,
            body: Box::new(Body::Keyword { keyword: Keyword::Success, position: Position::synthetic() }),
            position: Position::synthetic(),
        };
        let outer = Body::Sequence { op: SequenceOp::Conjunction, children: vec![inner], position: Position::synthetic() };
        assert!(outer.contains_backtracking_construct());
    }
}
