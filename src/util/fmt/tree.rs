use std::io::Write;

use crate::{ast::*, util::intern::Interner};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(idents: &Interner<str>, program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, idents, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(
    w: &mut impl Write,
    idents: &Interner<str>,
    program: &Program,
) -> std::io::Result<()> {
    print_block(w, idents, 0, &program.block)
}

fn print_block(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    block: &Block,
) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "block")?;
    for ConstDecl { name, value } in &block.consts {
        sp(w, i + 1)?;
        writeln!(w, "const {} = {value} (line {})", idents.get(name), name.span.line)?;
    }
    for name in &block.vars {
        sp(w, i + 1)?;
        writeln!(w, "var {} (line {})", idents.get(name), name.span.line)?;
    }
    for Procedure { name, body } in &block.procedures {
        sp(w, i + 1)?;
        writeln!(w, "procedure {} (line {})", idents.get(name), name.span.line)?;
        print_block(w, idents, i + 2, body)?;
    }
    print_stmt(w, idents, i + 1, &block.body)
}

pub fn print_stmt(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    stmt: &Stmt,
) -> std::io::Result<()> {
    sp(w, i)?;
    let line = stmt.span.line;
    match &stmt.kind {
        StmtKind::Assign { target, value } => {
            writeln!(w, "assign {} (line {line})", idents.get(target))?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::Call(callee) => {
            writeln!(w, "call {} (line {line})", idents.get(callee))?;
        }
        StmtKind::Input(destination) => {
            writeln!(w, "input {} (line {line})", idents.get(destination))?;
        }
        StmtKind::Print(argument) => {
            writeln!(w, "print (line {line})")?;
            print_expr(w, idents, i + 1, argument)?;
        }
        StmtKind::Begin(body) => {
            writeln!(w, "begin (line {line})")?;
            for stmt in body {
                print_stmt(w, idents, i + 1, stmt)?;
            }
        }
        StmtKind::If { condition, body } => {
            writeln!(w, "if (line {line})")?;
            print_expr(w, idents, i + 1, condition)?;
            print_stmt(w, idents, i + 1, body)?;
        }
        StmtKind::While { condition, body } => {
            writeln!(w, "while (line {line})")?;
            print_expr(w, idents, i + 1, condition)?;
            print_stmt(w, idents, i + 1, body)?;
        }
    }
    Ok(())
}

pub fn print_expr(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    expr: &Expr,
) -> std::io::Result<()> {
    sp(w, i)?;
    let line = expr.span.line;
    match &expr.kind {
        ExprKind::Odd(operand) => {
            writeln!(w, "odd (line {line})")?;
            print_expr(w, idents, i + 1, operand)?;
        }
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} (line {line})")?;
            print_expr(w, idents, i + 1, lhs)?;
            print_expr(w, idents, i + 1, rhs)?;
        }
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?} (line {line})")?;
            print_expr(w, idents, i + 1, inner_expr)?;
        }
        ExprKind::Id(ident) => {
            writeln!(w, "ident {} (line {line})", idents.get(ident))?;
        }
        ExprKind::Int(val) => {
            writeln!(w, "int {val} (line {line})")?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
