use crate::{
    ast::{self, BinaryOperator, Block, Expr, ExprKind, Ident, Program, Stmt, StmtKind, UnaryOperator},
    codegen::ir::{
        BinOp, BlockId, CmpOp, FuncId, Inst, Operand, Storage, Terminator, Unit, Value,
        INPUT_FORMAT, OUTPUT_FORMAT, PRINTF, SCANF,
    },
    scope::{Entry, Scopes},
    token::{Span, Spanned},
    util::intern::{Interned, Interner},
};

pub mod ir;

/// The name of the generated unit. Also the prefix of every global and
/// procedure symbol.
pub const UNIT_NAME: &str = "pl0";

/// Lowers a parsed program into an IR unit.
///
/// Semantic errors don't stop generation: the offending expression becomes
/// [`Value::Poison`] and generation carries on, so that independent errors in
/// the rest of the program are still found. The unit is only returned if no
/// error was recorded.
pub fn generate(
    program: &Program,
    ident_interner: &Interner<str>,
) -> Result<Unit, Vec<Spanned<Error>>> {
    let mut g = Generator::new(ident_interner);
    g.g_block(&program.block);
    g.terminate(Terminator::Ret);

    if !g.errors.is_empty() {
        return Err(g.errors);
    }
    debug_assert_eq!(g.unit.verify(), Ok(()));
    Ok(g.unit)
}

struct Generator<'ident> {
    ident_interner: &'ident Interner<str>,
    unit: Unit,
    scopes: Scopes,
    /// The current insertion point.
    func: FuncId,
    block: BlockId,
    /// Lexical path of the procedure being generated, used to mangle nested
    /// procedure symbols.
    path: String,
    errors: Vec<Spanned<Error>>,
}

impl Generator<'_> {
    fn new(ident_interner: &Interner<str>) -> Generator<'_> {
        let unit = Unit::new(UNIT_NAME);
        let func = unit.entry;
        let block = unit.function(func).entry();
        Generator {
            ident_interner,
            unit,
            scopes: Scopes::with_capacity(8),
            func,
            block,
            path: String::from(UNIT_NAME),
            errors: Vec::with_capacity(8),
        }
    }

    fn g_block(&mut self, block: &Block) {
        self.scopes.push();

        for decl in &block.consts {
            self.declare(decl.name, Entry::Constant(decl.value));
        }
        for &name in &block.vars {
            self.g_var_decl(name);
        }
        for procedure in &block.procedures {
            self.g_procedure(procedure);
        }
        self.g_stmt(&block.body);

        self.scopes.pop();
    }

    /// Variables of the outermost block are process-wide, all others live in
    /// the activation of the procedure that declares them. Both start at zero.
    /// Global symbols share the procedures' prefix, so they never clash with
    /// `main` or the I/O externs.
    fn g_var_decl(&mut self, name: Ident) {
        if let Some(other_definition_span) = self.scopes.lookup_here(name.name) {
            self.duplicate(name, other_definition_span);
            return;
        }
        let text = self.ident_interner.get(name);
        let storage = if self.scopes.is_root() {
            Storage::Global(self.unit.add_global(&format!("{UNIT_NAME}.{text}")))
        } else {
            let slot = self.unit.function_mut(self.func).add_local(text);
            Storage::Local {
                owner: self.func,
                slot,
            }
        };
        self.declare(name, Entry::Variable(storage));
        self.emit(Inst::Store {
            dst: storage,
            value: Value::Const(0),
        });
    }

    /// The procedure is declared before its body is generated, so that it may
    /// call itself.
    fn g_procedure(&mut self, procedure: &ast::Procedure) {
        let name = self.ident_interner.get(procedure.name);
        let parent_path_len = self.path.len();
        self.path.push('.');
        self.path.push_str(name);

        let func = self.unit.add_function(self.path.as_str().into());
        self.declare(procedure.name, Entry::Procedure(func));

        let saved = (self.func, self.block);
        self.func = func;
        self.block = self.unit.function(func).entry();
        self.g_block(&procedure.body);
        self.terminate(Terminator::Ret);
        (self.func, self.block) = saved;

        self.path.truncate(parent_path_len);
    }

    fn g_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let dst = match self.resolve(*target) {
                    Some(Entry::Variable(storage)) => Some(storage),
                    Some(other) => {
                        self.error(target.span, Error::CannotAssign {
                            name: target.name,
                            kind: other.describe(),
                        });
                        None
                    }
                    None => None,
                };
                let value = self.g_expr(value);
                if let Some(dst) = dst {
                    if !value.is_poison() {
                        self.emit(Inst::Store { dst, value });
                    }
                }
            }
            StmtKind::Call(callee) => match self.resolve(*callee) {
                Some(Entry::Procedure(func)) => self.emit(Inst::Call { callee: func }),
                Some(other) => self.error(callee.span, Error::NotCallable {
                    name: callee.name,
                    kind: other.describe(),
                }),
                None => {}
            },
            StmtKind::Input(destination) => match self.resolve(*destination) {
                Some(Entry::Variable(storage)) => self.emit(Inst::CallExtern {
                    callee: SCANF,
                    format: INPUT_FORMAT,
                    args: vec![Operand::Address(storage)],
                }),
                Some(other) => self.error(destination.span, Error::CannotRead {
                    name: destination.name,
                    kind: other.describe(),
                }),
                None => {}
            },
            StmtKind::Print(argument) => {
                let value = self.g_expr(argument);
                if !value.is_poison() {
                    self.emit(Inst::CallExtern {
                        callee: PRINTF,
                        format: OUTPUT_FORMAT,
                        args: vec![Operand::Value(value)],
                    });
                }
            }
            StmtKind::Begin(body) => {
                for stmt in body {
                    self.g_stmt(stmt);
                }
            }
            StmtKind::If { condition, body } => {
                let cond = self.g_expr(condition);
                let then = self.append_block("if.then");
                let end = self.create_block("if.end");
                self.terminate(Terminator::CondBr {
                    cond,
                    then,
                    otherwise: end,
                });

                self.block = then;
                self.g_stmt(body);
                self.terminate(Terminator::Br(end));

                self.place_block(end);
                self.block = end;
            }
            StmtKind::While { condition, body } => {
                let header = self.append_block("while.cond");
                self.terminate(Terminator::Br(header));

                self.block = header;
                let cond = self.g_expr(condition);
                let body_block = self.append_block("while.body");
                let end = self.create_block("while.end");
                self.terminate(Terminator::CondBr {
                    cond,
                    then: body_block,
                    otherwise: end,
                });

                self.block = body_block;
                self.g_stmt(body);
                self.terminate(Terminator::Br(header));

                self.place_block(end);
                self.block = end;
            }
        }
    }

    fn g_expr(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            // odd(x) is `x % 2 != 0`; the remainder takes the sign of `x`.
            ExprKind::Odd(operand) => {
                let operand = self.g_expr(operand);
                let rem = self.binary(BinOp::SRem, operand, Value::Const(2));
                self.cmp(CmpOp::Ne, rem, Value::Const(0))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.g_expr(lhs);
                let rhs = self.g_expr(rhs);
                match op {
                    BinaryOperator::Add => self.binary(BinOp::Add, lhs, rhs),
                    BinaryOperator::Sub => self.binary(BinOp::Sub, lhs, rhs),
                    BinaryOperator::Mul => self.binary(BinOp::Mul, lhs, rhs),
                    BinaryOperator::Div => self.binary(BinOp::SDiv, lhs, rhs),
                    BinaryOperator::Eq => self.cmp(CmpOp::Eq, lhs, rhs),
                    BinaryOperator::Ne => self.cmp(CmpOp::Ne, lhs, rhs),
                    BinaryOperator::Lt => self.cmp(CmpOp::Slt, lhs, rhs),
                    BinaryOperator::Le => self.cmp(CmpOp::Sle, lhs, rhs),
                    BinaryOperator::Gt => self.cmp(CmpOp::Sgt, lhs, rhs),
                    BinaryOperator::Ge => self.cmp(CmpOp::Sge, lhs, rhs),
                }
            }
            ExprKind::Unary { op, expr } => {
                let operand = self.g_expr(expr);
                match op {
                    UnaryOperator::Plus => operand,
                    UnaryOperator::Minus => self.binary(BinOp::Sub, Value::Const(0), operand),
                }
            }
            ExprKind::Id(ident) => match self.resolve(*ident) {
                Some(Entry::Constant(value)) => Value::Const(value),
                Some(Entry::Variable(src)) => {
                    let dst = self.unit.function_mut(self.func).fresh_temp();
                    self.emit(Inst::Load { dst, src });
                    Value::Temp(dst)
                }
                Some(Entry::Procedure(_)) => {
                    self.error(ident.span, Error::ProcedureAsValue(ident.name));
                    Value::Poison
                }
                None => Value::Poison,
            },
            ExprKind::Int(value) => Value::Const(*value),
        }
    }
}

/// Utility functions.
impl Generator<'_> {
    fn error(&mut self, span: Span, error: Error) {
        self.errors.push(span.wrap(error));
    }

    fn duplicate(&mut self, name: Ident, other_definition_span: Span) {
        self.error(name.span, Error::DuplicateDeclaration {
            name: name.name,
            other_definition_span,
        });
    }

    /// Declares `name` in the current scope, reporting a redeclaration.
    fn declare(&mut self, name: Ident, entry: Entry) {
        if let Err(other_definition_span) = self.scopes.insert(name.name, name.span, entry) {
            self.duplicate(name, other_definition_span);
        }
    }

    /// Looks `name` up, reporting it if undeclared.
    fn resolve(&mut self, name: Ident) -> Option<Entry> {
        let entry = self.scopes.lookup(name.name);
        if entry.is_none() {
            self.error(name.span, Error::UndeclaredIdentifier(name.name));
        }
        entry
    }

    fn emit(&mut self, inst: Inst) {
        let block = self.unit.function_mut(self.func).block_mut(self.block);
        debug_assert!(block.terminator.is_none(), "emit into terminated block");
        block.insts.push(inst);
    }

    fn terminate(&mut self, terminator: Terminator) {
        let block = self.unit.function_mut(self.func).block_mut(self.block);
        debug_assert!(block.terminator.is_none(), "block terminated twice");
        block.terminator = Some(terminator);
    }

    /// Creates a block without placing it in the current function's layout.
    fn create_block(&mut self, label: &'static str) -> BlockId {
        self.unit.function_mut(self.func).create_block(label)
    }

    /// Creates a block and immediately places it.
    fn append_block(&mut self, label: &'static str) -> BlockId {
        let id = self.create_block(label);
        self.place_block(id);
        id
    }

    fn place_block(&mut self, id: BlockId) {
        self.unit.function_mut(self.func).append_block(id);
    }

    fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        if lhs.is_poison() || rhs.is_poison() {
            return Value::Poison;
        }
        let dst = self.unit.function_mut(self.func).fresh_temp();
        self.emit(Inst::Binary { dst, op, lhs, rhs });
        Value::Temp(dst)
    }

    fn cmp(&mut self, op: CmpOp, lhs: Value, rhs: Value) -> Value {
        if lhs.is_poison() || rhs.is_poison() {
            return Value::Poison;
        }
        let dst = self.unit.function_mut(self.func).fresh_temp();
        self.emit(Inst::Cmp { dst, op, lhs, rhs });
        Value::Temp(dst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UndeclaredIdentifier(Interned<str>),
    DuplicateDeclaration {
        name: Interned<str>,
        other_definition_span: Span,
    },
    CannotAssign {
        name: Interned<str>,
        kind: &'static str,
    },
    CannotRead {
        name: Interned<str>,
        kind: &'static str,
    },
    NotCallable {
        name: Interned<str>,
        kind: &'static str,
    },
    ProcedureAsValue(Interned<str>),
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::parser;

    pub fn generate(src: &str) -> Unit {
        let (i, program) = parser::test_utils::parse_program(src);
        super::generate(&program, &i).expect("failed to generate")
    }
}
