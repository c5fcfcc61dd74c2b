use std::io::Write;

use crate::{ast::*, util::intern::Interner};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(idents: &Interner, program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, idents, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(idents: &Interner, expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, idents, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(
    w: &mut impl Write,
    idents: &Interner,
    program: &Program,
) -> std::io::Result<()> {
    for stmt in &program.stmts {
        print_stmt(w, idents, 0, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, idents: &Interner, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Exit(expr) => {
            sp(w, i)?;
            writeln!(w, "exit ({span})")?;
            print_expr(w, idents, i + 1, expr)?;
        }
        StmtKind::Let { name, initializer } => {
            sp(w, i)?;
            writeln!(w, "let {} ({span})", idents.get(name))?;
            print_expr(w, idents, i + 1, initializer)?;
        }
        StmtKind::Assign { target, value } => {
            sp(w, i)?;
            writeln!(w, "assign {} ({span})", idents.get(target))?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::Scope(scope) => print_scope(w, idents, i, scope)?,
        StmtKind::If { branches, else_arm } => {
            sp(w, i)?;
            writeln!(w, "if ({span})")?;
            for branch in branches {
                sp(w, i + 1)?;
                writeln!(w, "branch")?;
                print_expr(w, idents, i + 2, &branch.predicate)?;
                print_scope(w, idents, i + 2, &branch.body)?;
            }
            if let Some(else_arm) = else_arm {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_scope(w, idents, i + 2, else_arm)?;
            }
        }
    }
    Ok(())
}

fn print_scope(
    w: &mut impl Write,
    idents: &Interner,
    i: usize,
    scope: &Scope,
) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "scope ({})", scope.span)?;
    for stmt in &scope.stmts {
        print_stmt(w, idents, i + 1, stmt)?;
    }
    Ok(())
}

pub fn print_expr(
    w: &mut impl Write,
    idents: &Interner,
    i: usize,
    expr: &Expr,
) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, idents, i + 1, lhs)?;
            print_expr(w, idents, i + 1, rhs)?;
        }
        ExprKind::Paren(inner_expr) => {
            writeln!(w, "paren ({span})")?;
            print_expr(w, idents, i + 1, inner_expr)?;
        }
        ExprKind::Id(ident) => {
            writeln!(w, "ident {} ({span})", idents.get(ident))?;
        }
        ExprKind::Int(val) => {
            writeln!(w, "int {val} ({span})")?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
