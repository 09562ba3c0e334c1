//! Contains the BASIC language AST and the BASIC09 text each node emits.
//!
//! Every node knows how to render itself via `basic09_text`. Rendering is
//! infallible; constructs without a BASIC09 counterpart are rewritten away
//! before rendering (see [crate::codegen]).
use itertools::Itertools;

/// A literal value appearing in source or synthesized by a rewrite.
///
/// `Number` always came from source text and always renders with a decimal
/// point, since BASIC09 treats bare integers as a separate type. `Integer`
/// is only ever synthesized (default CLS argument, array fill values,
/// oversized hex literals) and renders bare.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Integer(i64),
    Str(String),
}

impl Literal {
    pub fn basic09_text(&self) -> String {
        match self {
            Literal::Number(v) => {
                if v.fract() == 0.0 {
                    format!("{:.1}", v)
                } else {
                    format!("{}", v)
                }
            }
            Literal::Integer(i) => i.to_string(),
            Literal::Str(s) => format!("\"{}\"", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexLiteral {
    /// The digits as they appeared in source, without the `&H` prefix.
    pub digits: String,
    pub value: i64,
}

impl HexLiteral {
    /// BASIC09 hex literals are 16-bit. Anything wider goes decimal.
    pub fn basic09_text(&self) -> String {
        if self.value < 0x8000 {
            format!("${}", self.digits)
        } else {
            self.value.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub name: String,
}

impl Var {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn is_str(&self) -> bool {
        self.name.ends_with('$')
    }
}

/// An array element reference. The variable already carries the `arr_`
/// prefix that keeps array names out of the scalar namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRef {
    pub var: Var,
    pub indices: Vec<Expression>,
}

impl ArrayRef {
    pub fn basic09_text(&self) -> String {
        format!(
            "{}({})",
            self.var.name,
            self.indices.iter().map(|e| e.basic09_text()).join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExp {
    pub lhs: Box<Expression>,
    pub op: &'static str,
    pub rhs: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpExp {
    pub op: &'static str,
    pub exp: Box<Expression>,
}

/// A call to a function that BASIC09 also has (possibly under the same
/// name), e.g. `ABS`, `MID$`, `VAL`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: &'static str,
    pub args: Vec<Expression>,
}

/// A use of a builtin that only exists as a runtime procedure on the
/// BASIC09 side (`JOYSTK`, `BUTTON`, `POINT`, `HEX$`, `INKEY$`).
///
/// These cannot stay expressions: a rewrite lifts each one into a
/// preceding `RUN` statement that stores its result in a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Functional {
    pub proc: &'static str,
    pub args: Vec<Expression>,
    pub is_str: bool,
}

/// The target of an assignment or of a lifted builtin result.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Var(Var),
    Array(ArrayRef),
}

impl LValue {
    pub fn is_str(&self) -> bool {
        match self {
            LValue::Var(v) => v.is_str(),
            LValue::Array(a) => a.var.is_str(),
        }
    }

    pub fn basic09_text(&self) -> String {
        match self {
            LValue::Var(v) => v.name.clone(),
            LValue::Array(a) => a.basic09_text(),
        }
    }
}

/// Boolean variants exist because BASIC09 splits the operator space in two:
/// inside `IF` conditions `AND`/`OR`/`NOT` are boolean keywords, everywhere
/// else the logical operations are the `LAND`/`LOR`/`LNOT` intrinsics.
/// Which variant a node gets is decided by the grammar production that
/// built it, never during rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Hex(HexLiteral),
    Var(Var),
    Array(ArrayRef),
    Binary(BinaryExp),
    BooleanBinary(BinaryExp),
    Unary(OpExp),
    BooleanUnary(OpExp),
    Paren(Box<Expression>),
    BooleanParen(Box<Expression>),
    Call(FunctionCall),
    Functional(Functional),
}

impl Expression {
    pub fn is_str(&self) -> bool {
        match self {
            Expression::Literal(Literal::Str(_)) => true,
            Expression::Var(v) => v.is_str(),
            Expression::Array(a) => a.var.is_str(),
            Expression::Binary(b) => b.lhs.is_str(),
            Expression::Call(c) => c.name.ends_with('$'),
            Expression::Functional(f) => f.is_str,
            _ => false,
        }
    }

    pub fn basic09_text(&self) -> String {
        match self {
            Expression::Literal(l) => l.basic09_text(),
            Expression::Hex(h) => h.basic09_text(),
            Expression::Var(v) => v.name.clone(),
            Expression::Array(a) => a.basic09_text(),
            Expression::Binary(b) => match b.op {
                "AND" | "OR" => format!(
                    "L{}({}, {})",
                    b.op,
                    b.lhs.basic09_text(),
                    b.rhs.basic09_text()
                ),
                _ => format!(
                    "{} {} {}",
                    b.lhs.basic09_text(),
                    b.op,
                    b.rhs.basic09_text()
                ),
            },
            Expression::BooleanBinary(b) => format!(
                "{} {} {}",
                b.lhs.basic09_text(),
                b.op,
                b.rhs.basic09_text()
            ),
            Expression::Unary(o) => match o.op {
                "NOT" => format!("LNOT({})", parenthesized_body(&o.exp)),
                _ => format!("{}{}", o.op, o.exp.basic09_text()),
            },
            Expression::BooleanUnary(o) => match o.op {
                "NOT" => format!("NOT({})", parenthesized_body(&o.exp)),
                _ => format!("{}{}", o.op, o.exp.basic09_text()),
            },
            Expression::Paren(e) | Expression::BooleanParen(e) => {
                format!("({})", e.basic09_text())
            }
            Expression::Call(c) => format!(
                "{}({})",
                c.name,
                c.args.iter().map(|a| a.basic09_text()).join(", ")
            ),
            Expression::Functional(f) => {
                panic!("builtin {} was not lifted to a RUN statement", f.proc)
            }
        }
    }
}

/// `NOT (X)` should render as `NOT(X)`, not `NOT((X))`.
fn parenthesized_body(exp: &Expression) -> String {
    match exp {
        Expression::Paren(inner) | Expression::BooleanParen(inner) => inner.basic09_text(),
        other => other.basic09_text(),
    }
}

/// One `PRINT` argument: either an expression or a `;`/`,` separator.
#[derive(Debug, Clone, PartialEq)]
pub enum PrintArg {
    Control(char),
    Expr(Expression),
}

/// A declared array dimension. Kept symbolic so the rendered bound can stay
/// in the base the source used.
#[derive(Debug, Clone, PartialEq)]
pub enum DimSize {
    Int(i64),
    Hex(HexLiteral),
}

impl DimSize {
    /// BASIC09 subscripts start at 1, so an array that must hold index `n`
    /// is dimensioned one past the source bound.
    fn bound_text(&self) -> String {
        match self {
            DimSize::Int(n) => (n + 1).to_string(),
            DimSize::Hex(h) => {
                let v = h.value + 1;
                if v < 0x8000 {
                    format!("${:X}", v)
                } else {
                    v.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: LValue,
        value: Expression,
    },
    /// An invocation of a runtime procedure, e.g. `RUN ecb_cls(1)`.
    RunCall {
        proc: &'static str,
        args: Vec<Expression>,
    },
    /// `implicit` marks the bare line number of an `IF ... THEN 100`,
    /// which renders without the `GOTO` keyword.
    Goto {
        target: u32,
        is_gosub: bool,
        implicit: bool,
    },
    OnGo {
        var: Var,
        is_gosub: bool,
        targets: Vec<u32>,
    },
    If {
        cond: Expression,
        then_branch: Statements,
        else_branch: Option<Statements>,
    },
    Print {
        args: Vec<PrintArg>,
    },
    Poke {
        address: Expression,
        value: Expression,
    },
    /// `CLEAR` manages string space on the 6809 interpreter and has no
    /// BASIC09 counterpart; the raw argument text survives as a comment.
    Clear(String),
    For {
        var: Var,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
    },
    Next {
        vars: Vec<Var>,
    },
    Dim {
        var: Var,
        sizes: Vec<DimSize>,
    },
    Data(Vec<Literal>),
    Keyword(&'static str),
    Comment(String),
    /// Raw BASIC09 text emitted verbatim, e.g. the joystick work-variable
    /// declaration.
    Code(String),
    /// A nested statement list, used for desugarings that expand one
    /// source statement into several (`PRINT@`, lifted builtins).
    Group(Statements),
}

fn indent_spaces(indent: usize) -> String {
    "  ".repeat(indent)
}

impl Statement {
    pub fn basic09_text(&self, indent: usize) -> String {
        let pad = indent_spaces(indent);
        match self {
            Statement::Assignment { target, value } => format!(
                "{}{} = {}",
                pad,
                target.basic09_text(),
                value.basic09_text()
            ),
            Statement::RunCall { proc, args } => format!(
                "{}RUN {}({})",
                pad,
                proc,
                args.iter().map(|a| a.basic09_text()).join(", ")
            ),
            Statement::Goto {
                target,
                is_gosub,
                implicit,
            } => {
                if *implicit {
                    target.to_string()
                } else if *is_gosub {
                    format!("{}GOSUB {}", pad, target)
                } else {
                    format!("{}GOTO {}", pad, target)
                }
            }
            Statement::OnGo {
                var,
                is_gosub,
                targets,
            } => format!(
                "{}ON {} {} {}",
                pad,
                var.name,
                if *is_gosub { "GOSUB" } else { "GOTO" },
                targets.iter().map(|t| t.to_string()).join(", ")
            ),
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => render_if(cond, then_branch, else_branch.as_ref(), indent),
            Statement::Print { args } => {
                let text = print_args_text(args);
                if text.is_empty() {
                    format!("{}PRINT", pad)
                } else {
                    format!("{}PRINT {}", pad, text)
                }
            }
            Statement::Poke { address, value } => format!(
                "{}POKE {}, {}",
                pad,
                address.basic09_text(),
                value.basic09_text()
            ),
            Statement::Clear(text) => {
                if text.is_empty() {
                    format!("{}(* CLEAR *)", pad)
                } else {
                    format!("{}(* CLEAR {} *)", pad, text)
                }
            }
            Statement::For {
                var,
                start,
                end,
                step,
            } => {
                // FOR sits one level left of its body.
                let pad = indent_spaces(indent.saturating_sub(1));
                let mut text = format!(
                    "{}FOR {} = {} TO {}",
                    pad,
                    var.name,
                    start.basic09_text(),
                    end.basic09_text()
                );
                if let Some(step) = step {
                    text += &format!(" STEP {}", step.basic09_text());
                }
                text
            }
            Statement::Next { vars } => format!(
                "{}{}",
                pad,
                vars.iter().map(|v| format!("NEXT {}", v.name)).join(" \\ ")
            ),
            Statement::Dim { var, sizes } => {
                let arr = format!("arr_{}", var.name);
                let bounds = sizes.iter().map(|s| s.bound_text()).join(", ");
                let mut parts = vec![format!("DIM {}({})", arr, bounds)];
                for (i, size) in sizes.iter().enumerate() {
                    parts.push(format!("FOR tmp_{} = 1 TO {}", i + 1, size.bound_text()));
                }
                let subscript = (1..=sizes.len()).map(|i| format!("tmp_{}", i)).join(", ");
                let fill = if var.is_str() { "\"\"" } else { "0" };
                parts.push(format!("{}({}) = {}", arr, subscript, fill));
                for i in (1..=sizes.len()).rev() {
                    parts.push(format!("NEXT tmp_{}", i));
                }
                format!("{}{}", pad, parts.join(" \\ "))
            }
            Statement::Data(elements) => format!(
                "{}DATA {}",
                pad,
                elements.iter().map(|e| e.basic09_text()).join(", ")
            ),
            Statement::Keyword(kw) => format!("{}{}", pad, kw),
            Statement::Comment(text) => format!("{}(*{} *)", pad, text),
            Statement::Code(text) => format!("{}{}", pad, text),
            Statement::Group(stmts) => stmts.basic09_text(indent),
        }
    }
}

/// The single implicit goto of an `IF A THEN 100` branch, if that is all
/// the branch contains.
fn implicit_target(stmts: &Statements) -> Option<u32> {
    match stmts.statements.as_slice() {
        [Statement::Goto {
            target,
            is_gosub: false,
            implicit: true,
        }] => Some(*target),
        _ => None,
    }
}

fn render_if(
    cond: &Expression,
    then_branch: &Statements,
    else_branch: Option<&Statements>,
    indent: usize,
) -> String {
    let pad = indent_spaces(indent);
    let cond = cond.basic09_text();
    match (implicit_target(then_branch), else_branch) {
        (Some(target), None) => format!("{}IF {} THEN {}", pad, cond, target),
        (Some(target), Some(els)) => {
            if let Some(else_target) = implicit_target(els) {
                return format!("{}IF {} THEN {} ELSE {}", pad, cond, target, else_target);
            }
            let mut text = format!("{}IF {} THEN\n", pad, cond);
            text += &format!("{}GOTO {}\n", indent_spaces(indent + 1), target);
            text += &format!("{}ELSE\n{}\n{}ENDIF", pad, render_branch(els, indent), pad);
            text
        }
        (None, None) => format!(
            "{}IF {} THEN\n{}\n{}ENDIF",
            pad,
            cond,
            render_branch(then_branch, indent),
            pad
        ),
        (None, Some(els)) => format!(
            "{}IF {} THEN\n{}\n{}ELSE\n{}\n{}ENDIF",
            pad,
            cond,
            render_branch(then_branch, indent),
            pad,
            render_branch(els, indent),
            pad
        ),
    }
}

fn render_branch(stmts: &Statements, indent: usize) -> String {
    match implicit_target(stmts) {
        Some(target) => format!("{}GOTO {}", indent_spaces(indent + 1), target),
        None => stmts.basic09_text(indent + 1),
    }
}

/// `PRINT` argument rendering. Adjacent expressions get an implicit `;`
/// separator, control characters between them pass through, and a control
/// character without a preceding expression prints the empty string.
fn print_args_text(args: &[PrintArg]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        let prev_is_control = i == 0 || matches!(args[i - 1], PrintArg::Control(_));
        match arg {
            PrintArg::Control(c) => {
                if prev_is_control {
                    parts.push("\"\"".to_string());
                }
                parts.push(c.to_string());
                if i + 1 < args.len() {
                    parts.push(" ".to_string());
                }
            }
            PrintArg::Expr(e) => {
                if i > 0 && !prev_is_control {
                    parts.push("; ".to_string());
                }
                parts.push(e.basic09_text());
            }
        }
    }
    parts.concat()
}

/// A statement list. Lists built by the parser put each statement on its
/// own output line; lists built by desugarings join their statements with
/// backslashes so they stay on the line of the statement they replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Statements {
    pub statements: Vec<Statement>,
    pub multi_line: bool,
}

impl Statements {
    pub fn basic09_text(&self, indent: usize) -> String {
        if self.multi_line {
            self.statements
                .iter()
                .map(|s| s.basic09_text(indent))
                .join("\n")
        } else {
            format!(
                "{}{}",
                indent_spaces(indent),
                self.statements
                    .iter()
                    .map(|s| s.basic09_text(0))
                    .join(" \\ ")
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Synthesized lines (variable initializers, joystick declarations)
    /// carry no number.
    pub num: Option<u32>,
    pub statements: Statements,
    /// Cleared by the line-number filter when nothing jumps here.
    pub is_referenced: bool,
}

impl Line {
    pub fn basic09_text(&self, indent: usize) -> String {
        let text = self.statements.basic09_text(indent);
        match self.num {
            Some(num) if self.is_referenced => format!("{} {}", num, text),
            _ => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Unnumbered lines emitted ahead of the translated program.
    pub prefix_lines: Vec<Line>,
    pub lines: Vec<Line>,
    /// Rendered as a `procedure` header when non-empty.
    pub procname: String,
}

impl Program {
    pub fn basic09_text(&self) -> String {
        let mut depth: i32 = 0;
        let mut out: Vec<String> = Vec::new();
        if !self.procname.is_empty() {
            out.push(format!("procedure {}", self.procname));
        }
        for line in self.prefix_lines.iter().chain(self.lines.iter()) {
            depth += indent_delta(&line.statements);
            out.push(line.basic09_text(depth.max(0) as usize));
        }
        out.join("\n")
    }
}

/// How much a line changes the FOR/NEXT nesting depth. The depth is
/// updated before a line renders, so the line containing a FOR already
/// renders inside the loop (FOR itself compensates by one level).
fn indent_delta(stmts: &Statements) -> i32 {
    stmts
        .statements
        .iter()
        .map(|s| match s {
            Statement::For { .. } => 1,
            Statement::Next { vars } => -(vars.len() as i32),
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                indent_delta(then_branch)
                    + else_branch.as_ref().map(indent_delta).unwrap_or(0)
            }
            Statement::Group(inner) => indent_delta(inner),
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_always_carry_a_decimal_point() {
        assert_eq!(Literal::Number(123.0).basic09_text(), "123.0");
        assert_eq!(Literal::Number(123.4).basic09_text(), "123.4");
        assert_eq!(Literal::Integer(1).basic09_text(), "1");
    }

    #[test]
    fn wide_hex_literals_fall_back_to_decimal() {
        let narrow = HexLiteral {
            digits: "1F".to_string(),
            value: 0x1f,
        };
        assert_eq!(narrow.basic09_text(), "$1F");
        let wide = HexLiteral {
            digits: "FFFFFF".to_string(),
            value: 0xffffff,
        };
        assert_eq!(wide.basic09_text(), "16777215");
    }

    #[test]
    fn print_separators() {
        let args = vec![
            PrintArg::Expr(Expression::Var(Var::new("A$"))),
            PrintArg::Control(','),
            PrintArg::Control(','),
            PrintArg::Expr(Expression::Var(Var::new("B$"))),
        ];
        assert_eq!(print_args_text(&args), "A$, \"\", B$");
    }

    #[test]
    fn adjacent_print_expressions_get_a_semicolon() {
        let args = vec![
            PrintArg::Expr(Expression::Literal(Literal::Str("A".to_string()))),
            PrintArg::Expr(Expression::Literal(Literal::Str("B".to_string()))),
        ];
        assert_eq!(print_args_text(&args), "\"A\"; \"B\"");
    }

    #[test]
    fn dim_dimensions_one_past_the_source_bound() {
        let stmt = Statement::Dim {
            var: Var::new("A"),
            sizes: vec![DimSize::Int(12)],
        };
        assert_eq!(
            stmt.basic09_text(0),
            "DIM arr_A(13) \\ FOR tmp_1 = 1 TO 13 \\ arr_A(tmp_1) = 0 \\ NEXT tmp_1"
        );
    }
}
