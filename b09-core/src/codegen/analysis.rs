//! Whole-program walks that feed the rewriting passes: joystick usage,
//! variable collection and line-number liveness.
use crate::parser::ast::*;
use std::collections::BTreeSet;

pub(crate) fn uses_joystick(program: &Program) -> bool {
    program
        .lines
        .iter()
        .any(|line| statements_use_joystick(&line.statements))
}

fn statements_use_joystick(stmts: &Statements) -> bool {
    stmts.statements.iter().any(|stmt| match stmt {
        Statement::RunCall { proc, .. } => *proc == "ecb_joystk",
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            statements_use_joystick(then_branch)
                || else_branch
                    .as_ref()
                    .map(statements_use_joystick)
                    .unwrap_or(false)
        }
        Statement::Group(inner) => statements_use_joystick(inner),
        _ => false,
    })
}

/// A line of assignments that zeroes every variable the program touches,
/// or None when there are none. Array references contribute their
/// `arr_`-prefixed name, which therefore gets a scalar initializer.
pub(crate) fn initializer_line(program: &Program) -> Option<Line> {
    let names = collect_variables(program);
    if names.is_empty() {
        return None;
    }
    let statements = names
        .into_iter()
        .map(|name| {
            let value = if name.ends_with('$') {
                Expression::Literal(Literal::Str(String::new()))
            } else {
                Expression::Literal(Literal::Number(0.0))
            };
            Statement::Assignment {
                target: LValue::Var(Var::new(name)),
                value,
            }
        })
        .collect();
    Some(Line {
        num: None,
        statements: Statements {
            statements,
            multi_line: true,
        },
        is_referenced: true,
    })
}

pub(crate) fn collect_variables(program: &Program) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for line in &program.lines {
        collect_statements_vars(&line.statements, &mut names);
    }
    names
}

fn collect_statements_vars(stmts: &Statements, names: &mut BTreeSet<String>) {
    for stmt in &stmts.statements {
        collect_statement_vars(stmt, names);
    }
}

fn collect_statement_vars(stmt: &Statement, names: &mut BTreeSet<String>) {
    match stmt {
        Statement::Assignment { target, value } => {
            match target {
                LValue::Var(v) => {
                    names.insert(v.name.clone());
                }
                LValue::Array(a) => {
                    names.insert(a.var.name.clone());
                    for index in &a.indices {
                        collect_exp_vars(index, names);
                    }
                }
            }
            collect_exp_vars(value, names);
        }
        Statement::RunCall { args, .. } => {
            for arg in args {
                collect_exp_vars(arg, names);
            }
        }
        Statement::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_exp_vars(cond, names);
            collect_statements_vars(then_branch, names);
            if let Some(els) = else_branch {
                collect_statements_vars(els, names);
            }
        }
        Statement::Print { args } => {
            for arg in args {
                if let PrintArg::Expr(e) = arg {
                    collect_exp_vars(e, names);
                }
            }
        }
        Statement::Poke { address, value } => {
            collect_exp_vars(address, names);
            collect_exp_vars(value, names);
        }
        Statement::For {
            var,
            start,
            end,
            step,
        } => {
            names.insert(var.name.clone());
            collect_exp_vars(start, names);
            collect_exp_vars(end, names);
            if let Some(step) = step {
                collect_exp_vars(step, names);
            }
        }
        Statement::Next { vars } => {
            for var in vars {
                names.insert(var.name.clone());
            }
        }
        Statement::OnGo { var, .. } => {
            names.insert(var.name.clone());
        }
        Statement::Group(inner) => collect_statements_vars(inner, names),
        _ => {}
    }
}

fn collect_exp_vars(exp: &Expression, names: &mut BTreeSet<String>) {
    match exp {
        Expression::Var(v) => {
            names.insert(v.name.clone());
        }
        Expression::Array(a) => {
            names.insert(a.var.name.clone());
            for index in &a.indices {
                collect_exp_vars(index, names);
            }
        }
        Expression::Binary(b) | Expression::BooleanBinary(b) => {
            collect_exp_vars(&b.lhs, names);
            collect_exp_vars(&b.rhs, names);
        }
        Expression::Unary(o) | Expression::BooleanUnary(o) => collect_exp_vars(&o.exp, names),
        Expression::Paren(e) | Expression::BooleanParen(e) => collect_exp_vars(e, names),
        Expression::Call(c) => {
            for arg in &c.args {
                collect_exp_vars(arg, names);
            }
        }
        Expression::Functional(f) => {
            for arg in &f.args {
                collect_exp_vars(arg, names);
            }
        }
        _ => {}
    }
}

/// Drops the number from every line nothing jumps to. A jump to a number
/// keeps every line bearing that number, duplicates included.
pub(crate) fn filter_line_numbers(program: &mut Program) {
    let referenced = referenced_line_numbers(program);
    for line in &mut program.lines {
        if let Some(num) = line.num {
            line.is_referenced = referenced.contains(&num);
        }
    }
}

pub(crate) fn referenced_line_numbers(program: &Program) -> BTreeSet<u32> {
    let mut targets = BTreeSet::new();
    for line in &program.lines {
        collect_targets(&line.statements, &mut targets);
    }
    targets
}

fn collect_targets(stmts: &Statements, targets: &mut BTreeSet<u32>) {
    for stmt in &stmts.statements {
        match stmt {
            Statement::Goto { target, .. } => {
                targets.insert(*target);
            }
            Statement::OnGo {
                targets: numbers, ..
            } => {
                targets.extend(numbers);
            }
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_targets(then_branch, targets);
                if let Some(els) = else_branch {
                    collect_targets(els, targets);
                }
            }
            Statement::Group(inner) => collect_targets(inner, targets),
            _ => {}
        }
    }
}
