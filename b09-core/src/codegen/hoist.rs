//! Lifts [Functional] builtins out of expressions.
//!
//! BASIC09 has no JOYSTK/BUTTON/POINT/HEX$/INKEY$ functions; each use
//! becomes a `RUN` of the matching runtime procedure, which returns its
//! result through an extra out-parameter. A use nested inside a larger
//! expression gets a fresh temporary; the direct assignment form
//! `X = BUTTON(1)` passes the assignment target itself instead.
//!
//! Temporaries number from 1 per statement, numeric (`tmp1`) and string
//! (`tmp1$`) independently, in discovery order. A statement that needed
//! lifts is replaced by a single-line group of the lifted RUNs followed
//! by the rewritten statement.
use crate::parser::ast::*;

pub(crate) fn patch_program(program: &mut Program) {
    for line in &mut program.lines {
        patch_statements(&mut line.statements);
    }
}

pub(crate) fn patch_statements(stmts: &mut Statements) {
    let statements = std::mem::take(&mut stmts.statements);
    stmts.statements = statements.into_iter().map(patch_statement).collect();
}

fn patch_statement(mut stmt: Statement) -> Statement {
    match &mut stmt {
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            patch_statements(then_branch);
            if let Some(els) = else_branch {
                patch_statements(els);
            }
        }
        Statement::Group(inner) => patch_statements(inner),
        _ => {}
    }
    let mut hoister = Hoister::default();
    let stmt = hoister.rewrite(stmt);
    if hoister.pending.is_empty() {
        stmt
    } else {
        let mut statements = hoister.pending;
        statements.push(stmt);
        Statement::Group(Statements {
            statements,
            multi_line: false,
        })
    }
}

#[derive(Default)]
struct Hoister {
    pending: Vec<Statement>,
    num_count: u32,
    str_count: u32,
}

impl Hoister {
    fn rewrite(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::Assignment { mut target, value } => {
                if let LValue::Array(a) = &mut target {
                    for index in &mut a.indices {
                        self.lift(index);
                    }
                }
                match value {
                    // The assignment target doubles as the out-parameter.
                    Expression::Functional(mut f) => {
                        for arg in &mut f.args {
                            self.lift(arg);
                        }
                        let mut args = f.args;
                        args.push(match target {
                            LValue::Var(v) => Expression::Var(v),
                            LValue::Array(a) => Expression::Array(a),
                        });
                        Statement::RunCall { proc: f.proc, args }
                    }
                    mut value => {
                        self.lift(&mut value);
                        Statement::Assignment { target, value }
                    }
                }
            }
            Statement::RunCall { proc, mut args } => {
                for arg in &mut args {
                    self.lift(arg);
                }
                Statement::RunCall { proc, args }
            }
            Statement::If {
                mut cond,
                then_branch,
                else_branch,
            } => {
                self.lift(&mut cond);
                Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            Statement::Print { mut args } => {
                for arg in &mut args {
                    if let PrintArg::Expr(e) = arg {
                        self.lift(e);
                    }
                }
                Statement::Print { args }
            }
            Statement::Poke {
                mut address,
                mut value,
            } => {
                self.lift(&mut address);
                self.lift(&mut value);
                Statement::Poke { address, value }
            }
            Statement::For {
                var,
                mut start,
                mut end,
                mut step,
            } => {
                self.lift(&mut start);
                self.lift(&mut end);
                if let Some(step) = &mut step {
                    self.lift(step);
                }
                Statement::For {
                    var,
                    start,
                    end,
                    step,
                }
            }
            other => other,
        }
    }

    /// Replaces every functional in the tree with a temporary, innermost
    /// first so an outer builtin can consume an inner one's result.
    fn lift(&mut self, exp: &mut Expression) {
        match exp {
            Expression::Binary(b) | Expression::BooleanBinary(b) => {
                self.lift(&mut b.lhs);
                self.lift(&mut b.rhs);
            }
            Expression::Unary(o) | Expression::BooleanUnary(o) => self.lift(&mut o.exp),
            Expression::Paren(e) | Expression::BooleanParen(e) => self.lift(e),
            Expression::Call(c) => {
                for arg in &mut c.args {
                    self.lift(arg);
                }
            }
            Expression::Array(a) => {
                for index in &mut a.indices {
                    self.lift(index);
                }
            }
            Expression::Functional(f) => {
                let is_str = f.is_str;
                for arg in &mut f.args {
                    self.lift(arg);
                }
                let var = self.fresh_var(is_str);
                if let Expression::Functional(f) =
                    std::mem::replace(exp, Expression::Var(var.clone()))
                {
                    let mut args = f.args;
                    args.push(Expression::Var(var));
                    self.pending.push(Statement::RunCall { proc: f.proc, args });
                }
            }
            _ => {}
        }
    }

    fn fresh_var(&mut self, is_str: bool) -> Var {
        if is_str {
            self.str_count += 1;
            Var::new(format!("tmp{}$", self.str_count))
        } else {
            self.num_count += 1;
            Var::new(format!("tmp{}", self.num_count))
        }
    }
}
