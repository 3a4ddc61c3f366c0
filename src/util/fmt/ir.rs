use std::io::Write;

use crate::codegen::ir::*;

const INDENT: &str = "  ";

pub fn print_unit_string(unit: &Unit) -> String {
    let mut buf = Vec::with_capacity(2048);
    print_unit(&mut buf, unit).unwrap();
    String::from_utf8(buf).unwrap()
}

/// Prints the unit in an LLVM-like syntax.
pub fn print_unit(w: &mut impl Write, unit: &Unit) -> std::io::Result<()> {
    writeln!(w, "; unit {}", unit.name)?;
    for ext in &unit.externs {
        let params = if ext.variadic { "ptr, ..." } else { "ptr" };
        writeln!(w, "declare i32 @{}({params})", ext.name)?;
    }
    writeln!(w)?;
    for (id, format) in unit.formats.iter().enumerate() {
        writeln!(w, "@fmt.{id} = private constant {format:?}")?;
    }
    for global in &unit.globals {
        writeln!(w, "@{} = global i32 {}", global.name, global.init)?;
    }
    for (id, _) in unit.functions.iter().enumerate() {
        writeln!(w)?;
        print_function(w, unit, FuncId::from_index(id))?;
    }
    Ok(())
}

fn print_function(w: &mut impl Write, unit: &Unit, id: FuncId) -> std::io::Result<()> {
    let f = unit.function(id);
    writeln!(w, "define void @{}() {{", f.symbol)?;
    for local in &f.locals {
        writeln!(w, "{INDENT}%{local} = local i32")?;
    }
    for &block_id in &f.layout {
        let block = f.block(block_id);
        writeln!(w, "{}:", BlockName(f, block_id))?;
        for inst in &block.insts {
            write!(w, "{INDENT}")?;
            print_inst(w, unit, id, inst)?;
            writeln!(w)?;
        }
        write!(w, "{INDENT}")?;
        match block.terminator {
            Some(Terminator::Br(target)) => {
                writeln!(w, "br label %{}", BlockName(f, target))?;
            }
            Some(Terminator::CondBr {
                cond,
                then,
                otherwise,
            }) => {
                writeln!(
                    w,
                    "br i1 {}, label %{}, label %{}",
                    ValueName(cond),
                    BlockName(f, then),
                    BlockName(f, otherwise),
                )?;
            }
            Some(Terminator::Ret) => writeln!(w, "ret void")?,
            None => writeln!(w, "; missing terminator")?,
        }
    }
    writeln!(w, "}}")
}

fn print_inst(w: &mut impl Write, unit: &Unit, func: FuncId, inst: &Inst) -> std::io::Result<()> {
    let storage = |s: Storage| StorageName(unit, func, s);
    match inst {
        Inst::Binary { dst, op, lhs, rhs } => {
            let op = match op {
                BinOp::Add => "add",
                BinOp::Sub => "sub",
                BinOp::Mul => "mul",
                BinOp::SDiv => "sdiv",
                BinOp::SRem => "srem",
            };
            let (lhs, rhs) = (ValueName(*lhs), ValueName(*rhs));
            write!(w, "%{} = {op} i32 {lhs}, {rhs}", dst.0)
        }
        Inst::Cmp { dst, op, lhs, rhs } => {
            let op = match op {
                CmpOp::Eq => "eq",
                CmpOp::Ne => "ne",
                CmpOp::Slt => "slt",
                CmpOp::Sle => "sle",
                CmpOp::Sgt => "sgt",
                CmpOp::Sge => "sge",
            };
            let (lhs, rhs) = (ValueName(*lhs), ValueName(*rhs));
            write!(w, "%{} = icmp {op} i32 {lhs}, {rhs}", dst.0)
        }
        Inst::Load { dst, src } => write!(w, "%{} = load i32, {}", dst.0, storage(*src)),
        Inst::Store { dst, value } => {
            write!(w, "store i32 {}, {}", ValueName(*value), storage(*dst))
        }
        Inst::Call { callee } => write!(w, "call void @{}()", unit.function(*callee).symbol),
        Inst::CallExtern {
            callee,
            format,
            args,
        } => {
            let name = unit.externs[callee.index()].name;
            write!(w, "call i32 (ptr, ...) @{name}(@fmt.{}", format.0)?;
            for arg in args {
                match *arg {
                    Operand::Value(value) => write!(w, ", i32 {}", ValueName(value))?,
                    Operand::Address(s) => write!(w, ", ptr {}", storage(s))?,
                }
            }
            write!(w, ")")
        }
    }
}

struct BlockName<'f>(&'f Function, BlockId);

impl std::fmt::Display for BlockName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let BlockName(func, id) = *self;
        let label = func.block(id).label;
        if id == func.entry() {
            write!(f, "{label}")
        } else {
            write!(f, "{label}{}", id.0)
        }
    }
}

struct ValueName(Value);

impl std::fmt::Display for ValueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Value::Const(n) => write!(f, "{n}"),
            Value::Temp(t) => write!(f, "%{}", t.0),
            Value::Poison => write!(f, "poison"),
        }
    }
}

/// Locals of the function being printed are named plainly; locals of an
/// enclosing procedure are qualified by its symbol.
struct StorageName<'u>(&'u Unit, FuncId, Storage);

impl std::fmt::Display for StorageName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let StorageName(unit, current, storage) = *self;
        match storage {
            Storage::Global(g) => write!(f, "@{}", unit.globals[g.index()].name),
            Storage::Local { owner, slot } => {
                let owner_fn = unit.function(owner);
                let name = &owner_fn.locals[slot.index()];
                if owner == current {
                    write!(f, "%{name}")
                } else {
                    write!(f, "%{}:{name}", owner_fn.symbol)
                }
            }
        }
    }
}
