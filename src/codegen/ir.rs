//! A small control-flow-graph IR.
//!
//! A [`Unit`] holds every function of a program. Each [`Function`] owns an
//! arena of basic blocks plus a separate layout order, so a block may be
//! created before it is placed. Values are 32-bit signed integers; comparisons
//! produce booleans which are only ever consumed by conditional branches.

use std::{collections::HashSet, fmt};

macro_rules! id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }

                pub fn from_index(index: usize) -> $name {
                    $name(u32::try_from(index).expect(concat!("too many ", stringify!($name))))
                }
            }
        )*
    };
}

id!(FuncId, GlobalId, LocalId, BlockId, Temp, ExternId, FormatId);

/// Where a variable lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Process-wide storage, declared in the outermost block.
    Global(GlobalId),
    /// Per-invocation storage of the function `owner`. Resolved against the
    /// innermost live activation of `owner`.
    Local { owner: FuncId, slot: LocalId },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Const(i32),
    Temp(Temp),
    /// Stands in for the result of an erroneous expression, which has already
    /// been reported.
    Poison,
}

impl Value {
    pub fn is_poison(self) -> bool {
        self == Value::Poison
    }
}

/// An argument of an external call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Value(Value),
    Address(Storage),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inst {
    Binary {
        dst: Temp,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Cmp {
        dst: Temp,
        op: CmpOp,
        lhs: Value,
        rhs: Value,
    },
    Load {
        dst: Temp,
        src: Storage,
    },
    Store {
        dst: Storage,
        value: Value,
    },
    Call {
        callee: FuncId,
    },
    /// A call to a variadic external function, with a format string as its
    /// first argument.
    CallExtern {
        callee: ExternId,
        format: FormatId,
        args: Vec<Operand>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Value,
        then: BlockId,
        otherwise: BlockId,
    },
    Ret,
}

impl Terminator {
    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        let (a, b) = match *self {
            Terminator::Br(target) => (Some(target), None),
            Terminator::CondBr {
                then, otherwise, ..
            } => (Some(then), Some(otherwise)),
            Terminator::Ret => (None, None),
        };
        a.into_iter().chain(b)
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pub label: &'static str,
    pub insts: Vec<Inst>,
    /// `None` while the block is still being built.
    pub terminator: Option<Terminator>,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub symbol: Box<str>,
    /// Names of the local slots, indexed by [`LocalId`].
    pub locals: Vec<Box<str>>,
    pub blocks: Vec<Block>,
    /// The order in which blocks are placed. The first one is the entry.
    pub layout: Vec<BlockId>,
    temps: u32,
}

impl Function {
    fn new(symbol: Box<str>) -> Function {
        let mut f = Function {
            symbol,
            locals: Vec::new(),
            blocks: Vec::with_capacity(8),
            layout: Vec::with_capacity(8),
            temps: 0,
        };
        let entry = f.create_block("entry");
        f.append_block(entry);
        f
    }

    pub fn entry(&self) -> BlockId {
        self.layout[0]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Creates a detached block. It must be appended with
    /// [`Function::append_block`] before the unit is complete.
    pub fn create_block(&mut self, label: &'static str) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push(Block {
            label,
            insts: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn append_block(&mut self, id: BlockId) {
        debug_assert!(!self.layout.contains(&id), "block placed twice");
        self.layout.push(id);
    }

    pub fn add_local(&mut self, name: &str) -> LocalId {
        let id = LocalId::from_index(self.locals.len());
        self.locals.push(name.into());
        id
    }

    pub fn fresh_temp(&mut self) -> Temp {
        let temp = Temp(self.temps);
        self.temps += 1;
        temp
    }

    /// The number of temporaries defined in this function.
    pub fn temp_count(&self) -> usize {
        self.temps as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    pub name: Box<str>,
    pub init: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extern {
    pub name: &'static str,
    pub variadic: bool,
}

pub const SCANF: ExternId = ExternId(0);
pub const PRINTF: ExternId = ExternId(1);
pub const INPUT_FORMAT: FormatId = FormatId(0);
pub const OUTPUT_FORMAT: FormatId = FormatId(1);

#[derive(Clone, Debug)]
pub struct Unit {
    pub name: Box<str>,
    pub externs: Vec<Extern>,
    pub formats: Vec<&'static str>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    pub entry: FuncId,
}

impl Unit {
    /// Creates a unit with the I/O externs, their format strings, and an empty
    /// entry function named `main`.
    pub fn new(name: &str) -> Unit {
        let mut unit = Unit {
            name: name.into(),
            externs: vec![
                Extern {
                    name: "scanf",
                    variadic: true,
                },
                Extern {
                    name: "printf",
                    variadic: true,
                },
            ],
            formats: vec!["%d", "%d\n"],
            globals: Vec::new(),
            functions: Vec::with_capacity(8),
            entry: FuncId(0),
        };
        unit.entry = unit.add_function("main".into());
        unit
    }

    pub fn add_function(&mut self, symbol: Box<str>) -> FuncId {
        let id = FuncId::from_index(self.functions.len());
        self.functions.push(Function::new(symbol));
        id
    }

    pub fn add_global(&mut self, name: &str) -> GlobalId {
        let id = GlobalId::from_index(self.globals.len());
        self.globals.push(Global {
            name: name.into(),
            init: 0,
        });
        id
    }

    fn symbol_count(&self) -> usize {
        self.externs.len() + self.globals.len() + self.functions.len()
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    /// Checks the structural well-formedness of the unit: every block is
    /// placed exactly once and terminated, every branch target and call
    /// target exists, no symbol is defined twice, and no poison value is left
    /// behind.
    pub fn verify(&self) -> Result<(), VerifyError> {
        if self.entry.index() >= self.functions.len() {
            return Err(VerifyError::new(&self.name, "entry function does not exist"));
        }
        let mut symbols = HashSet::with_capacity(self.symbol_count());
        let all = (self.externs.iter().map(|e| &*e.name))
            .chain(self.globals.iter().map(|g| &*g.name))
            .chain(self.functions.iter().map(|f| &*f.symbol));
        for symbol in all {
            if !symbols.insert(symbol) {
                return Err(VerifyError::new(symbol, "symbol defined twice"));
            }
        }
        for f in &self.functions {
            let err = |msg: &'static str| VerifyError::new(&f.symbol, msg);

            let mut placed = vec![false; f.blocks.len()];
            for &id in &f.layout {
                let seen = placed
                    .get_mut(id.index())
                    .ok_or_else(|| err("layout refers to a missing block"))?;
                if *seen {
                    return Err(err("block placed twice"));
                }
                *seen = true;
            }
            if placed.iter().any(|placed| !placed) {
                return Err(err("block created but never placed"));
            }

            for block in &f.blocks {
                let terminator = block
                    .terminator
                    .ok_or_else(|| err("block without terminator"))?;
                if terminator.successors().any(|s| s.index() >= f.blocks.len()) {
                    return Err(err("branch to a missing block"));
                }
                if let Terminator::CondBr { cond, .. } = terminator {
                    if cond.is_poison() {
                        return Err(err("poison branch condition"));
                    }
                }
                for inst in &block.insts {
                    self.verify_inst(f, inst).map_err(err)?;
                }
            }
        }
        Ok(())
    }

    fn verify_inst(&self, f: &Function, inst: &Inst) -> Result<(), &'static str> {
        let storage_ok = |s: Storage| match s {
            Storage::Global(g) => g.index() < self.globals.len(),
            Storage::Local { owner, slot } => self
                .functions
                .get(owner.index())
                .is_some_and(|owner| slot.index() < owner.locals.len()),
        };
        let value_ok = |v: Value| match v {
            Value::Temp(t) => t.index() < f.temp_count(),
            Value::Poison => false,
            Value::Const(_) => true,
        };
        let ok = match inst {
            Inst::Binary { lhs, rhs, .. } | Inst::Cmp { lhs, rhs, .. } => {
                value_ok(*lhs) && value_ok(*rhs)
            }
            Inst::Load { src, .. } => storage_ok(*src),
            Inst::Store { dst, value } => storage_ok(*dst) && value_ok(*value),
            Inst::Call { callee } => callee.index() < self.functions.len(),
            Inst::CallExtern {
                callee,
                format,
                args,
            } => {
                callee.index() < self.externs.len()
                    && format.index() < self.formats.len()
                    && args.iter().all(|arg| match *arg {
                        Operand::Value(v) => value_ok(v),
                        Operand::Address(s) => storage_ok(s),
                    })
            }
        };
        if ok {
            Ok(())
        } else {
            Err("instruction refers to an invalid operand")
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyError {
    pub function: Box<str>,
    pub message: &'static str,
}

impl VerifyError {
    fn new(function: &str, message: &'static str) -> VerifyError {
        VerifyError {
            function: function.into(),
            message,
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in @{}: {}", self.function, self.message)
    }
}

impl std::error::Error for VerifyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_is_valid() {
        let mut unit = Unit::new("test");
        let main = unit.entry;
        let entry = unit.function(main).entry();
        unit.function_mut(main).block_mut(entry).terminator = Some(Terminator::Ret);
        assert_eq!(unit.verify(), Ok(()));
        assert_eq!(&*unit.function(main).symbol, "main");
        assert_eq!(unit.externs[SCANF.index()].name, "scanf");
        assert_eq!(unit.formats[OUTPUT_FORMAT.index()], "%d\n");
    }

    #[test]
    fn test_detached_blocks_must_be_placed() {
        let mut unit = Unit::new("test");
        let f = unit.function_mut(FuncId(0));
        let entry = f.entry();
        let end = f.create_block("if.end");
        f.block_mut(entry).terminator = Some(Terminator::Br(end));
        f.block_mut(end).terminator = Some(Terminator::Ret);

        let error = unit.verify().unwrap_err();
        assert_eq!(error.message, "block created but never placed");

        unit.function_mut(FuncId(0)).append_block(end);
        assert_eq!(unit.verify(), Ok(()));
    }

    #[test]
    fn test_unterminated_and_dangling_blocks_are_rejected() {
        let mut unit = Unit::new("test");
        assert_eq!(
            unit.verify().unwrap_err().message,
            "block without terminator"
        );

        let f = unit.function_mut(FuncId(0));
        let entry = f.entry();
        f.block_mut(entry).terminator = Some(Terminator::Br(BlockId(7)));
        assert_eq!(
            unit.verify().unwrap_err().message,
            "branch to a missing block"
        );
    }

    #[test]
    fn test_poison_is_rejected() {
        let mut unit = Unit::new("test");
        let f = unit.function_mut(FuncId(0));
        let entry = f.entry();
        let block = f.block_mut(entry);
        block.insts.push(Inst::Call { callee: FuncId(0) });
        block.terminator = Some(Terminator::Ret);
        assert_eq!(unit.verify(), Ok(()));

        let g = unit.add_global("x");
        let f = unit.function_mut(FuncId(0));
        f.block_mut(entry).insts.push(Inst::Store {
            dst: Storage::Global(g),
            value: Value::Poison,
        });
        assert_eq!(
            unit.verify().unwrap_err().message,
            "instruction refers to an invalid operand"
        );
    }

    #[test]
    fn test_symbols_are_unique() {
        let mut unit = Unit::new("test");
        let main = unit.entry;
        let entry = unit.function(main).entry();
        unit.function_mut(main).block_mut(entry).terminator = Some(Terminator::Ret);
        unit.add_global("printf");
        let err = unit.verify().unwrap_err();
        assert_eq!(&*err.function, "printf");
        assert_eq!(err.message, "symbol defined twice");
    }

    #[test]
    fn test_successors() {
        let cond = Terminator::CondBr {
            cond: Value::Temp(Temp(0)),
            then: BlockId(1),
            otherwise: BlockId(2),
        };
        assert_eq!(cond.successors().collect::<Vec<_>>(), [BlockId(1), BlockId(2)]);
        assert_eq!(Terminator::Br(BlockId(3)).successors().count(), 1);
        assert_eq!(Terminator::Ret.successors().count(), 0);
    }
}
