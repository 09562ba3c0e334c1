//! Parses Color BASIC source text into the [ast] types.
//!
//! One combinator function per grammar production. Binary operator chains
//! fold left-associatively via [fold_expressions]. Keywords take priority
//! over variable names by a lookahead in [variable], which is what lets
//! crunched source like `FORI=1TO10` tokenize correctly.
pub mod ast;

use crate::errors::{B09Error, CoreResult};
use crate::parser::ast::*;
use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while, take_while1};
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value, verify};
use nom::multi::{many0, many1, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use once_cell::sync::Lazy;

pub type LocatedSpan<'a> = nom_locate::LocatedSpan<&'a str>;
pub type IResult<'a, T> = nom::IResult<LocatedSpan<'a>, T>;

/// Functions that BASIC09 provides under the same name and signature.
static FUNCTIONS: &[&str] = &[
    "ABS", "ASC", "ATN", "COS", "EXP", "INT", "LEN", "LOG", "PEEK", "RND", "SGN", "SIN", "SQR",
    "TAN",
];
/// String functions of a string and a count.
static STR2_FUNCTIONS: &[&str] = &["LEFT$", "RIGHT$"];
/// String functions of a string and two counts.
static STR3_FUNCTIONS: &[&str] = &["MID$"];
/// Numeric functions of a string.
static STR_NUM_FUNCTIONS: &[&str] = &["VAL"];
/// String functions of a number.
static NUM_STR_FUNCTIONS: &[&str] = &["CHR$", "TAB"];

/// Statements that become runtime procedure calls, by arity.
static STATEMENTS2: &[(&str, &str)] = &[("RESET", "ecb_reset")];
static STATEMENTS3: &[(&str, &str)] = &[("SET", "ecb_set")];

/// Builtins that only exist as runtime procedures; these parse into
/// [Functional] nodes and are lifted into RUN statements later.
static NUM_FUNCTIONAL: &[(&str, &str)] = &[("BUTTON", "ecb_button"), ("JOYSTK", "ecb_joystk")];
static NUM2_FUNCTIONAL: &[(&str, &str)] = &[("POINT", "ecb_point")];
static STR_ARG_FUNCTIONAL: &[(&str, &str)] = &[("HEX$", "ecb_hex")];
static BARE_STR_FUNCTIONAL: &[(&str, &str)] = &[("INKEY$", "ecb_inkey")];

static KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut keywords: Vec<&'static str> = vec![
        "AND", "CLS", "DIM", "ELSE", "FOR", "GOSUB", "GOTO", "IF", "NOT", "OR", "PRINT", "REM",
        "SOUND", "STEP",
    ];
    keywords.extend(FUNCTIONS);
    keywords.extend(STR2_FUNCTIONS);
    keywords.extend(STR3_FUNCTIONS);
    keywords.extend(STR_NUM_FUNCTIONS);
    keywords.extend(NUM_STR_FUNCTIONS);
    let tables = [
        STATEMENTS2,
        STATEMENTS3,
        NUM_FUNCTIONAL,
        NUM2_FUNCTIONAL,
        STR_ARG_FUNCTIONAL,
        BARE_STR_FUNCTIONAL,
    ];
    for table in &tables {
        keywords.extend(table.iter().map(|(name, _)| *name));
    }
    keywords
});

/// Parses a full program. The first line that cannot be recognized aborts
/// the parse with its location.
pub fn parse(source: &str) -> CoreResult<Program> {
    let input = LocatedSpan::new(source);
    match all_consuming(program)(input) {
        Ok((_, program)) => Ok(program),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let near: String = e
                .input
                .fragment()
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(24)
                .collect();
            Err(B09Error::Parser {
                line: e.input.location_line(),
                column: e.input.get_utf8_column(),
                message: format!("unexpected input near '{}'", near),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(B09Error::Parser {
            line: 0,
            column: 0,
            message: "incomplete input".to_string(),
        }),
    }
}

fn error(input: LocatedSpan) -> nom::Err<nom::error::Error<LocatedSpan>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

fn sp(input: LocatedSpan) -> IResult<()> {
    value((), take_while(|c| c == ' '))(input)
}

fn eol(input: LocatedSpan) -> IResult<()> {
    value((), many1(one_of("\r\n")))(input)
}

fn program(input: LocatedSpan) -> IResult<Program> {
    map(
        delimited(opt(eol), separated_list0(eol, line), opt(eol)),
        |lines| Program {
            prefix_lines: Vec::new(),
            lines,
            procname: String::new(),
        },
    )(input)
}

fn line(input: LocatedSpan) -> IResult<Line> {
    map(
        pair(terminated(line_number, sp), statements),
        |(num, statements)| Line {
            num: Some(num),
            statements,
            is_referenced: true,
        },
    )(input)
}

fn line_number(input: LocatedSpan) -> IResult<u32> {
    map_res(digit1, |s: LocatedSpan| s.fragment().parse::<u32>())(input)
}

/// Colon- or space-separated statements, with comments allowed anywhere.
fn statements(input: LocatedSpan) -> IResult<Statements> {
    map(
        pair(
            opt(statement),
            many0(alt((
                map(comment, Some),
                preceded(
                    take_while1(|c| c == ':' || c == ' '),
                    opt(alt((comment, statement))),
                ),
            ))),
        ),
        |(first, rest)| {
            let mut statements: Vec<Statement> = Vec::new();
            statements.extend(first);
            statements.extend(rest.into_iter().flatten());
            Statements {
                statements,
                multi_line: true,
            }
        },
    )(input)
}

fn statement(input: LocatedSpan) -> IResult<Statement> {
    alt((
        if_statement,
        print_at_statement,
        print_statement,
        assignment,
        sound_statement,
        cls_statement,
        go_statement,
        on_go_statement,
        poke_statement,
        clear_statement,
        reset_statement,
        set_statement,
        data_statement,
        keyword_statement,
        for_statement,
        next_statement,
        dim_statement,
    ))(input)
}

fn comment(input: LocatedSpan) -> IResult<Statement> {
    map(
        preceded(
            alt((tag("REM"), tag("'"))),
            take_while(|c| !matches!(c, ':' | '\r' | '\n')),
        ),
        |text: LocatedSpan| Statement::Comment(text.fragment().to_string()),
    )(input)
}

// --- identifiers and literals ---

fn starts_with_keyword(s: &str) -> bool {
    KEYWORDS.iter().any(|k| s.starts_with(k))
}

/// Would the input tokenize as a string variable name (`[A-Z][A-Z0-9]*$`)?
fn is_str_var_shape(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    for c in chars {
        if c == '$' {
            return true;
        }
        if !c.is_ascii_uppercase() && !c.is_ascii_digit() {
            return false;
        }
    }
    false
}

/// A numeric variable: one uppercase letter plus an optional letter or
/// digit, as long as the input does not continue as a keyword or a string
/// variable.
fn variable(input: LocatedSpan) -> IResult<Var> {
    let frag = *input.fragment();
    if starts_with_keyword(frag) || is_str_var_shape(frag) {
        return Err(error(input));
    }
    let bytes = frag.as_bytes();
    let mut len: usize = 0;
    if !bytes.is_empty() && bytes[0].is_ascii_uppercase() {
        len = 1;
    }
    if len == 1 && bytes.len() > 1 && (bytes[1].is_ascii_uppercase() || bytes[1].is_ascii_digit())
    {
        len = 2;
    }
    if len == 0 {
        return Err(error(input));
    }
    let (rest, name) = take(len)(input)?;
    Ok((rest, Var::new(*name.fragment())))
}

fn str_variable(input: LocatedSpan) -> IResult<Var> {
    let frag = *input.fragment();
    if starts_with_keyword(frag) {
        return Err(error(input));
    }
    let bytes = frag.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_uppercase() {
        return Err(error(input));
    }
    let mut len = 1;
    if bytes.len() > len && (bytes[len].is_ascii_uppercase() || bytes[len].is_ascii_digit()) {
        len += 1;
    }
    if bytes.len() > len && bytes[len] == b'$' {
        len += 1;
    } else {
        return Err(error(input));
    }
    let (rest, name) = take(len)(input)?;
    Ok((rest, Var::new(*name.fragment())))
}

/// Digit run. The interpreter's tokenizer discarded spaces, so digits may
/// carry embedded spaces; trailing spaces stay unconsumed.
fn scan_digits(bytes: &[u8], i: &mut usize, buf: &mut String) -> usize {
    let mut count = 0;
    while *i < bytes.len() {
        if bytes[*i].is_ascii_digit() {
            buf.push(bytes[*i] as char);
            *i += 1;
            count += 1;
        } else if bytes[*i] == b' ' {
            let mut j = *i;
            while j < bytes.len() && bytes[j] == b' ' {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                *i = j;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    count
}

/// A numeric literal, with the interpreter's quirks: sign runs, embedded
/// spaces, and an exponent `E` that must not start the keyword `ELSE`
/// (`IF A THEN 1ELSE2` ends the literal at the `1`).
fn number_literal(input: LocatedSpan) -> IResult<f64> {
    let frag = *input.fragment();
    let bytes = frag.as_bytes();
    let mut i = 0;
    let mut negative = false;
    while i < bytes.len() && matches!(bytes[i], b'+' | b'-' | b' ') {
        if bytes[i] == b'-' {
            negative = !negative;
        }
        i += 1;
    }
    let mut buf = String::new();
    if negative {
        buf.push('-');
    }
    let int_digits = scan_digits(bytes, &mut i, &mut buf);
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        buf.push('.');
        i += 1;
        frac_digits = scan_digits(bytes, &mut i, &mut buf);
    }
    if int_digits + frac_digits == 0 {
        return Err(error(input));
    }
    let mut j = i;
    while j < bytes.len() && bytes[j] == b' ' {
        j += 1;
    }
    if j < bytes.len() && bytes[j] == b'E' && !frag[j..].starts_with("ELSE") {
        j += 1;
        let mut exp_negative = false;
        while j < bytes.len() && matches!(bytes[j], b'+' | b'-' | b' ') {
            if bytes[j] == b'-' {
                exp_negative = !exp_negative;
            }
            j += 1;
        }
        let mut exp_buf = String::new();
        if scan_digits(bytes, &mut j, &mut exp_buf) > 0 {
            buf.push('E');
            if exp_negative {
                buf.push('-');
            }
            buf.push_str(&exp_buf);
            i = j;
        }
    }
    let value = match buf.parse::<f64>() {
        Ok(v) => v,
        Err(_) => return Err(error(input)),
    };
    let (rest, _) = take(i)(input)?;
    Ok((rest, value))
}

/// `&H` plus up to six hex digits, spaces tolerated after `&` and `H`.
fn hex_literal(input: LocatedSpan) -> IResult<HexLiteral> {
    let frag = *input.fragment();
    let bytes = frag.as_bytes();
    let mut i = 0;
    if bytes.is_empty() || bytes[0] != b'&' {
        return Err(error(input));
    }
    i += 1;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'H' {
        return Err(error(input));
    }
    i += 1;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    let start = i;
    while i < bytes.len() && i - start < 6 && matches!(bytes[i], b'0'..=b'9' | b'A'..=b'F') {
        i += 1;
    }
    if i == start {
        return Err(error(input));
    }
    let digits = &frag[start..i];
    let value = match i64::from_str_radix(digits, 16) {
        Ok(v) => v,
        Err(_) => return Err(error(input)),
    };
    let (rest, _) = take(i)(input)?;
    Ok((
        rest,
        HexLiteral {
            digits: digits.to_string(),
            value,
        },
    ))
}

fn str_literal(input: LocatedSpan) -> IResult<Literal> {
    map(
        delimited(
            char('"'),
            take_while(|c| !matches!(c, '"' | '\r' | '\n')),
            char('"'),
        ),
        |s: LocatedSpan| Literal::Str(s.fragment().to_string()),
    )(input)
}

// --- builtin lookup ---

fn builtin_name(
    names: &'static [&'static str],
) -> impl Fn(LocatedSpan) -> IResult<&'static str> {
    move |input| {
        for name in names {
            if input.fragment().starts_with(name) {
                let (rest, _) = take(name.len())(input)?;
                return Ok((rest, *name));
            }
        }
        Err(error(input))
    }
}

/// Matches a builtin name and yields the runtime procedure it maps to.
fn runtime_builtin(
    table: &'static [(&'static str, &'static str)],
) -> impl Fn(LocatedSpan) -> IResult<&'static str> {
    move |input| {
        for (name, proc) in table {
            if input.fragment().starts_with(name) {
                let (rest, _) = take(name.len())(input)?;
                return Ok((rest, *proc));
            }
        }
        Err(error(input))
    }
}

// --- expressions ---

fn fold_expressions(
    initial: Expression,
    remainder: Vec<(&'static str, Expression)>,
    boolean: bool,
) -> Expression {
    remainder.into_iter().fold(initial, |lhs, (op, rhs)| {
        let exp = BinaryExp {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        };
        if boolean {
            Expression::BooleanBinary(exp)
        } else {
            Expression::Binary(exp)
        }
    })
}

fn logical_op(input: LocatedSpan) -> IResult<&'static str> {
    alt((value("AND", tag("AND")), value("OR", tag("OR"))))(input)
}

fn relational_op(input: LocatedSpan) -> IResult<&'static str> {
    alt((
        value("<=", tag("<=")),
        value(">=", tag(">=")),
        value("<>", tag("<>")),
        value("=<", tag("=<")),
        value("=>", tag("=>")),
        value("<", tag("<")),
        value(">", tag(">")),
        value("=", tag("=")),
    ))(input)
}

fn expression(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(opt(terminated(tag("NOT"), sp)), num_exp),
        |(not, exp)| match not {
            Some(_) => Expression::Unary(OpExp {
                op: "NOT",
                exp: Box::new(exp),
            }),
            None => exp,
        },
    )(input)
}

fn num_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(
            num_gtle_exp,
            many0(pair(delimited(sp, logical_op, sp), num_gtle_exp)),
        ),
        |(initial, remainder)| fold_expressions(initial, remainder, false),
    )(input)
}

fn num_gtle_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(
            num_sum_exp,
            many0(pair(delimited(sp, relational_op, sp), num_sum_exp)),
        ),
        |(initial, remainder)| fold_expressions(initial, remainder, false),
    )(input)
}

fn num_sum_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(
            num_prod_exp,
            many0(pair(
                delimited(sp, alt((value("+", tag("+")), value("-", tag("-")))), sp),
                num_prod_exp,
            )),
        ),
        |(initial, remainder)| fold_expressions(initial, remainder, false),
    )(input)
}

fn num_prod_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(
            val_exp,
            many0(pair(
                delimited(sp, alt((value("*", tag("*")), value("/", tag("/")))), sp),
                val_exp,
            )),
        ),
        |(initial, remainder)| fold_expressions(initial, remainder, false),
    )(input)
}

fn val_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((
        map(number_literal, |v| Expression::Literal(Literal::Number(v))),
        map(hex_literal, Expression::Hex),
        paren_exp,
        unop_exp,
        map(array_ref, Expression::Array),
        map(variable, Expression::Var),
        func_exp,
        val_func_exp,
        num_functional_exp,
    ))(input)
}

fn paren_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        delimited(
            tuple((char('('), sp)),
            terminated(expression, sp),
            char(')'),
        ),
        |e| Expression::Paren(Box::new(e)),
    )(input)
}

fn unop_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(
            alt((value("-", tag("-")), value("+", tag("+")))),
            preceded(sp, expression),
        ),
        |(op, e)| {
            Expression::Unary(OpExp {
                op,
                exp: Box::new(e),
            })
        },
    )(input)
}

fn array_ref(input: LocatedSpan) -> IResult<ArrayRef> {
    map(
        pair(alt((str_variable, variable)), preceded(sp, exp_list)),
        |(var, indices)| ArrayRef {
            var: Var::new(format!("arr_{}", var.name)),
            indices,
        },
    )(input)
}

fn exp_list(input: LocatedSpan) -> IResult<Vec<Expression>> {
    delimited(
        tuple((char('('), sp)),
        separated_list1(tuple((char(','), sp)), terminated(expression, sp)),
        char(')'),
    )(input)
}

fn single_arg(input: LocatedSpan) -> IResult<Expression> {
    delimited(
        tuple((sp, char('('), sp)),
        terminated(alt((expression, str_exp)), sp),
        char(')'),
    )(input)
}

fn two_num_args(input: LocatedSpan) -> IResult<(Expression, Expression)> {
    delimited(
        tuple((sp, char('('), sp)),
        pair(
            terminated(expression, tuple((sp, char(','), sp))),
            terminated(expression, sp),
        ),
        char(')'),
    )(input)
}

fn func_exp(input: LocatedSpan) -> IResult<Expression> {
    let (input, name) = builtin_name(FUNCTIONS)(input)?;
    let (input, arg) = single_arg(input)?;
    Ok((
        input,
        Expression::Call(FunctionCall {
            name,
            args: vec![arg],
        }),
    ))
}

fn val_func_exp(input: LocatedSpan) -> IResult<Expression> {
    let (input, name) = builtin_name(STR_NUM_FUNCTIONS)(input)?;
    let (input, arg) = delimited(
        tuple((sp, char('('), sp)),
        terminated(str_exp, sp),
        char(')'),
    )(input)?;
    Ok((
        input,
        Expression::Call(FunctionCall {
            name,
            args: vec![arg],
        }),
    ))
}

fn num_functional_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((
        |input| {
            let (input, proc) = runtime_builtin(NUM_FUNCTIONAL)(input)?;
            let (input, arg) = single_arg(input)?;
            Ok((
                input,
                Expression::Functional(Functional {
                    proc,
                    args: vec![arg],
                    is_str: false,
                }),
            ))
        },
        |input| {
            let (input, proc) = runtime_builtin(NUM2_FUNCTIONAL)(input)?;
            let (input, (a, b)) = two_num_args(input)?;
            Ok((
                input,
                Expression::Functional(Functional {
                    proc,
                    args: vec![a, b],
                    is_str: false,
                }),
            ))
        },
    ))(input)
}

fn str_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        pair(
            str_simple_exp,
            many0(pair(
                delimited(sp, value("+", tag("+")), sp),
                str_simple_exp,
            )),
        ),
        |(initial, remainder)| fold_expressions(initial, remainder, false),
    )(input)
}

fn str_simple_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((
        map(str_literal, Expression::Literal),
        map(
            verify(array_ref, |a: &ArrayRef| a.var.is_str()),
            Expression::Array,
        ),
        map(str_variable, Expression::Var),
        str2_func_exp,
        str3_func_exp,
        num_str_func_exp,
        str_functional_exp,
    ))(input)
}

fn str2_func_exp(input: LocatedSpan) -> IResult<Expression> {
    let (input, name) = builtin_name(STR2_FUNCTIONS)(input)?;
    let (input, _) = tuple((sp, char('('), sp))(input)?;
    let (input, s) = terminated(str_exp, tuple((sp, char(','), sp)))(input)?;
    let (input, n) = terminated(expression, sp)(input)?;
    let (input, _) = char(')')(input)?;
    Ok((
        input,
        Expression::Call(FunctionCall {
            name,
            args: vec![s, n],
        }),
    ))
}

fn str3_func_exp(input: LocatedSpan) -> IResult<Expression> {
    let (input, name) = builtin_name(STR3_FUNCTIONS)(input)?;
    let (input, _) = tuple((sp, char('('), sp))(input)?;
    let (input, s) = terminated(str_exp, tuple((sp, char(','), sp)))(input)?;
    let (input, a) = terminated(expression, tuple((sp, char(','), sp)))(input)?;
    let (input, b) = terminated(expression, sp)(input)?;
    let (input, _) = char(')')(input)?;
    Ok((
        input,
        Expression::Call(FunctionCall {
            name,
            args: vec![s, a, b],
        }),
    ))
}

fn num_str_func_exp(input: LocatedSpan) -> IResult<Expression> {
    let (input, name) = builtin_name(NUM_STR_FUNCTIONS)(input)?;
    let (input, arg) = single_arg(input)?;
    Ok((
        input,
        Expression::Call(FunctionCall {
            name,
            args: vec![arg],
        }),
    ))
}

fn str_functional_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((
        |input| {
            let (input, proc) = runtime_builtin(STR_ARG_FUNCTIONAL)(input)?;
            let (input, arg) = single_arg(input)?;
            Ok((
                input,
                Expression::Functional(Functional {
                    proc,
                    args: vec![arg],
                    is_str: true,
                }),
            ))
        },
        map(runtime_builtin(BARE_STR_FUNCTIONAL), |proc| {
            Expression::Functional(Functional {
                proc,
                args: Vec::new(),
                is_str: true,
            })
        }),
    ))(input)
}

// --- boolean expressions (IF conditions) ---

fn bool_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        tuple((
            opt(terminated(tag("NOT"), sp)),
            bool_val_exp,
            many0(pair(delimited(sp, logical_op, sp), bool_val_exp)),
        )),
        |(not, initial, remainder)| {
            let folded = fold_expressions(initial, remainder, true);
            match not {
                Some(_) => Expression::BooleanUnary(OpExp {
                    op: "NOT",
                    exp: Box::new(folded),
                }),
                None => folded,
            }
        },
    )(input)
}

fn bool_val_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((bool_paren_exp, bool_bin_exp))(input)
}

fn bool_paren_exp(input: LocatedSpan) -> IResult<Expression> {
    map(
        delimited(tuple((char('('), sp)), terminated(bool_exp, sp), char(')')),
        |e| Expression::BooleanParen(Box::new(e)),
    )(input)
}

/// A single comparison; numeric operands tried first, then string ones.
fn bool_bin_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((
        map(
            tuple((num_sum_exp, delimited(sp, relational_op, sp), num_sum_exp)),
            |(lhs, op, rhs)| {
                Expression::BooleanBinary(BinaryExp {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                })
            },
        ),
        map(
            tuple((str_exp, delimited(sp, relational_op, sp), str_exp)),
            |(lhs, op, rhs)| {
                Expression::BooleanBinary(BinaryExp {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                })
            },
        ),
    ))(input)
}

// --- statements ---

fn if_exp(input: LocatedSpan) -> IResult<Expression> {
    alt((bool_exp, expression))(input)
}

fn line_or_statements(input: LocatedSpan) -> IResult<Statements> {
    alt((
        map(line_number, |target| Statements {
            statements: vec![Statement::Goto {
                target,
                is_gosub: false,
                implicit: true,
            }],
            multi_line: true,
        }),
        statements,
    ))(input)
}

fn if_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("IF")(input)?;
    let (input, cond) = delimited(sp, if_exp, sp)(input)?;
    let (input, _) = tag("THEN")(input)?;
    let (input, then_branch) = preceded(sp, line_or_statements)(input)?;
    let (input, else_branch) = opt(preceded(
        tuple((sp, tag("ELSE"), sp)),
        line_or_statements,
    ))(input)?;
    Ok((
        input,
        Statement::If {
            cond,
            then_branch,
            else_branch,
        },
    ))
}

fn print_at_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = alt((tag("PRINT"), tag("?")))(input)?;
    let (input, _) = tuple((sp, char('@'), sp))(input)?;
    let (input, location) = terminated(expression, tuple((sp, char(','), sp)))(input)?;
    let (input, args) = print_args(input)?;
    Ok((
        input,
        Statement::Group(Statements {
            statements: vec![
                Statement::RunCall {
                    proc: "ecb_at",
                    args: vec![location],
                },
                Statement::Print { args },
            ],
            multi_line: false,
        }),
    ))
}

fn print_statement(input: LocatedSpan) -> IResult<Statement> {
    map(
        preceded(pair(alt((tag("PRINT"), tag("?"))), sp), print_args),
        |args| Statement::Print { args },
    )(input)
}

fn print_args(input: LocatedSpan) -> IResult<Vec<PrintArg>> {
    many0(terminated(
        alt((
            map(one_of(";,"), PrintArg::Control),
            map(expression, PrintArg::Expr),
            map(str_exp, PrintArg::Expr),
        )),
        sp,
    ))(input)
}

fn assignment(input: LocatedSpan) -> IResult<Statement> {
    let (input, target) = lvalue(input)?;
    let (input, _) = tuple((sp, char('='), sp))(input)?;
    if target.is_str() {
        let (input, value) = str_exp(input)?;
        Ok((input, Statement::Assignment { target, value }))
    } else {
        let (input, value) = expression(input)?;
        Ok((input, Statement::Assignment { target, value }))
    }
}

fn lvalue(input: LocatedSpan) -> IResult<LValue> {
    alt((
        map(array_ref, LValue::Array),
        map(str_variable, LValue::Var),
        map(variable, LValue::Var),
    ))(input)
}

fn sound_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("SOUND")(input)?;
    let (input, pitch) = preceded(sp, expression)(input)?;
    let (input, duration) = preceded(tuple((sp, char(','), sp)), expression)(input)?;
    Ok((
        input,
        Statement::RunCall {
            proc: "ecb_sound",
            args: vec![
                pitch,
                duration,
                Expression::Literal(Literal::Number(31.0)),
            ],
        },
    ))
}

fn cls_statement(input: LocatedSpan) -> IResult<Statement> {
    map(preceded(tag("CLS"), opt(preceded(sp, expression))), |arg| {
        Statement::RunCall {
            proc: "ecb_cls",
            args: vec![arg.unwrap_or(Expression::Literal(Literal::Integer(1)))],
        }
    })(input)
}

fn go_statement(input: LocatedSpan) -> IResult<Statement> {
    map(
        pair(
            alt((value(true, tag("GOSUB")), value(false, tag("GOTO")))),
            preceded(sp, line_number),
        ),
        |(is_gosub, target)| Statement::Goto {
            target,
            is_gosub,
            implicit: false,
        },
    )(input)
}

fn on_go_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("ON")(input)?;
    let (input, var) = delimited(sp, variable, sp)(input)?;
    let (input, is_gosub) = alt((value(true, tag("GOSUB")), value(false, tag("GOTO"))))(input)?;
    let (input, targets) = preceded(
        sp,
        separated_list1(delimited(sp, char(','), sp), line_number),
    )(input)?;
    Ok((
        input,
        Statement::OnGo {
            var,
            is_gosub,
            targets,
        },
    ))
}

fn poke_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("POKE")(input)?;
    let (input, address) = preceded(sp, expression)(input)?;
    let (input, value) = preceded(tuple((sp, char(','), sp)), expression)(input)?;
    Ok((input, Statement::Poke { address, value }))
}

fn clear_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("CLEAR")(input)?;
    let (input, raw) = recognize(opt(preceded(sp, expression)))(input)?;
    Ok((input, Statement::Clear(raw.fragment().trim().to_string())))
}

fn reset_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, proc) = runtime_builtin(STATEMENTS2)(input)?;
    let (input, (a, b)) = two_num_args(input)?;
    Ok((
        input,
        Statement::RunCall {
            proc,
            args: vec![a, b],
        },
    ))
}

fn set_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, proc) = runtime_builtin(STATEMENTS3)(input)?;
    let (input, _) = tuple((sp, char('('), sp))(input)?;
    let (input, a) = terminated(expression, tuple((sp, char(','), sp)))(input)?;
    let (input, b) = terminated(expression, tuple((sp, char(','), sp)))(input)?;
    let (input, c) = terminated(expression, sp)(input)?;
    let (input, _) = char(')')(input)?;
    Ok((
        input,
        Statement::RunCall {
            proc,
            args: vec![a, b, c],
        },
    ))
}

fn data_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("DATA")(input)?;
    let (input, elements) = separated_list1(char(','), data_element)(input)?;
    Ok((input, Statement::Data(elements)))
}

fn at_element_end(input: &LocatedSpan) -> bool {
    matches!(
        input.fragment().chars().next(),
        None | Some(',') | Some(':') | Some('\r') | Some('\n')
    )
}

/// One DATA slot: a quoted string, a number, or (the fallback) a bare
/// run of text that becomes a string with its trailing spaces intact.
/// A bare run may contain colons; only a quoted or numeric element
/// yields the rest of the line to further statements.
fn data_element(input: LocatedSpan) -> IResult<Literal> {
    if let Ok((rest, lit)) = delimited(sp, str_literal, sp)(input) {
        if at_element_end(&rest) {
            return Ok((rest, lit));
        }
    }
    if let Ok((rest, v)) = delimited(sp, number_literal, sp)(input) {
        if at_element_end(&rest) {
            return Ok((rest, Literal::Number(v)));
        }
    }
    map(
        preceded(sp, take_while(|c| !matches!(c, '"' | ',' | '\r' | '\n'))),
        |s: LocatedSpan| Literal::Str(s.fragment().to_string()),
    )(input)
}

fn keyword_statement(input: LocatedSpan) -> IResult<Statement> {
    alt((
        value(Statement::Keyword("RETURN"), tag("RETURN")),
        value(Statement::Keyword("RESTORE"), tag("RESTORE")),
    ))(input)
}

fn for_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("FOR")(input)?;
    let (input, var) = delimited(sp, variable, sp)(input)?;
    let (input, _) = char('=')(input)?;
    let (input, start) = delimited(sp, expression, sp)(input)?;
    let (input, _) = tag("TO")(input)?;
    let (input, end) = preceded(sp, expression)(input)?;
    let (input, step) = opt(preceded(tuple((sp, tag("STEP"), sp)), expression))(input)?;
    Ok((
        input,
        Statement::For {
            var,
            start,
            end,
            step,
        },
    ))
}

fn next_statement(input: LocatedSpan) -> IResult<Statement> {
    map(
        preceded(
            pair(tag("NEXT"), sp),
            separated_list1(delimited(sp, char(','), sp), variable),
        ),
        |vars| Statement::Next { vars },
    )(input)
}

fn dim_size(input: LocatedSpan) -> IResult<DimSize> {
    alt((
        map(hex_literal, DimSize::Hex),
        map(number_literal, |v| DimSize::Int(v as i64)),
    ))(input)
}

fn dim_statement(input: LocatedSpan) -> IResult<Statement> {
    let (input, _) = tag("DIM")(input)?;
    let (input, var) = delimited(sp, alt((str_variable, variable)), sp)(input)?;
    let (input, sizes) = delimited(
        tuple((char('('), sp)),
        verify(
            separated_list1(tuple((char(','), sp)), terminated(dim_size, sp)),
            |sizes: &Vec<DimSize>| sizes.len() <= 3,
        ),
        char(')'),
    )(input)?;
    Ok((input, Statement::Dim { var, sizes }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_single_line(source: &str) -> Line {
        let program = parse(source).unwrap();
        assert_eq!(program.lines.len(), 1);
        program.lines.into_iter().next().unwrap()
    }

    #[test]
    fn parses_crunched_source() {
        let line = parse_single_line("10 FORI=1TO10STEP2");
        match &line.statements.statements[0] {
            Statement::For { var, step, .. } => {
                assert_eq!(var.name, "I");
                assert!(step.is_some());
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn keywords_are_not_variables() {
        assert!(variable(LocatedSpan::new("IF")).is_err());
        assert!(variable(LocatedSpan::new("INT(")).is_err());
        assert!(variable(LocatedSpan::new("INX")).is_ok());
    }

    #[test]
    fn string_variables_do_not_parse_as_numeric() {
        assert!(variable(LocatedSpan::new("A$")).is_err());
        assert!(str_variable(LocatedSpan::new("A$")).is_ok());
        assert!(str_variable(LocatedSpan::new("AB$")).is_ok());
        assert!(str_variable(LocatedSpan::new("ABC$")).is_err());
    }

    #[test]
    fn number_literal_tolerates_spaces_and_signs() {
        let check = |src: &str, expected: f64| {
            let (_, v) = number_literal(LocatedSpan::new(src)).unwrap();
            assert_eq!(v, expected);
        };
        check("123", 123.0);
        check("1 2 3", 123.0);
        check("-.5", -0.5);
        check("12.", 12.0);
        check("1E3", 1000.0);
        check("1E-2", 0.01);
    }

    #[test]
    fn exponent_does_not_swallow_else() {
        // `1ELSE` is the literal 1 followed by the keyword ELSE
        let (rest, v) = number_literal(LocatedSpan::new("1ELSE2")).unwrap();
        assert_eq!(v, 1.0);
        assert_eq!(*rest.fragment(), "ELSE2");
    }

    #[test]
    fn hex_literal_allows_interior_spaces() {
        let (_, h) = hex_literal(LocatedSpan::new("& H 1F")).unwrap();
        assert_eq!(h.digits, "1F");
        assert_eq!(h.value, 0x1f);
    }

    #[test]
    fn reports_position_of_first_unrecognized_input() {
        let err = parse("10 PRINT \"OK\"\n20 WAT 1\n").unwrap_err();
        match err {
            B09Error::Parser { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 4);
            }
        }
    }

    #[test]
    fn duplicate_separators_and_trailing_spaces_are_tolerated() {
        let line = parse_single_line("10 A=1 : :  B=2  ");
        assert_eq!(line.statements.statements.len(), 2);
    }
}
