use std::{
    collections::VecDeque,
    io::{BufRead, Write},
};

use crate::{
    backend::{Backend, Error},
    codegen::ir::{
        BinOp, BlockId, CmpOp, FuncId, Inst, Operand, Storage, Terminator, Unit, Value,
    },
};

#[derive(Clone, Debug)]
pub struct Config {
    /// Calls nested deeper than this fail with [`Error::StackOverflow`].
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_call_depth: 10_000,
        }
    }
}

/// Executes units directly, reading integers from `input` and printing them
/// to `output`.
///
/// Procedure calls don't recurse on the host stack: activations live in an
/// explicit stack, bounded by [`Config::max_call_depth`].
pub struct Interpreter<R, W> {
    input: R,
    output: W,
    config: Config,
    /// Input words read but not consumed yet.
    pending: VecDeque<String>,
}

struct Activation {
    func: FuncId,
    locals: Vec<i32>,
    temps: Vec<i32>,
    block: BlockId,
    ip: usize,
}

impl Activation {
    fn new(unit: &Unit, func: FuncId) -> Activation {
        let f = unit.function(func);
        Activation {
            func,
            locals: vec![0; f.locals.len()],
            temps: vec![0; f.temp_count()],
            block: f.entry(),
            ip: 0,
        }
    }

    fn value(&self, value: Value) -> i32 {
        match value {
            Value::Const(n) => n,
            Value::Temp(t) => self.temps[t.index()],
            Value::Poison => unreachable!("poison in a verified unit"),
        }
    }

    fn jump(&mut self, block: BlockId) {
        self.block = block;
        self.ip = 0;
    }
}

impl<R: BufRead, W: Write> Interpreter<R, W> {
    pub fn new(input: R, output: W) -> Interpreter<R, W> {
        Self::with_config(input, output, Config::default())
    }

    pub fn with_config(input: R, output: W, config: Config) -> Interpreter<R, W> {
        Interpreter {
            input,
            output,
            config,
            pending: VecDeque::new(),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the unit's entry function to completion.
    pub fn run(&mut self, unit: &Unit) -> Result<(), Error> {
        unit.verify()?;

        let mut globals: Vec<i32> = unit.globals.iter().map(|g| g.init).collect();
        let mut stack = Vec::with_capacity(64);
        stack.push(Activation::new(unit, unit.entry));

        while let Some(top) = stack.last_mut() {
            let f = unit.function(top.func);
            let block = f.block(top.block);

            let Some(inst) = block.insts.get(top.ip) else {
                match block.terminator {
                    Some(Terminator::Br(target)) => top.jump(target),
                    Some(Terminator::CondBr {
                        cond,
                        then,
                        otherwise,
                    }) => {
                        let target = if top.value(cond) != 0 { then } else { otherwise };
                        top.jump(target);
                    }
                    Some(Terminator::Ret) => {
                        stack.pop();
                    }
                    None => unreachable!("unterminated block in a verified unit"),
                }
                continue;
            };
            top.ip += 1;

            match inst {
                Inst::Binary { dst, op, lhs, rhs } => {
                    let result = binary(*op, top.value(*lhs), top.value(*rhs))?;
                    top.temps[dst.index()] = result;
                }
                Inst::Cmp { dst, op, lhs, rhs } => {
                    let result = cmp(*op, top.value(*lhs), top.value(*rhs));
                    top.temps[dst.index()] = i32::from(result);
                }
                Inst::Load { dst, src } => {
                    let value = *slot(unit, &mut stack, &mut globals, *src)?;
                    let depth = stack.len();
                    stack[depth - 1].temps[dst.index()] = value;
                }
                Inst::Store { dst, value } => {
                    let value = top.value(*value);
                    *slot(unit, &mut stack, &mut globals, *dst)? = value;
                }
                Inst::Call { callee } => {
                    if stack.len() >= self.config.max_call_depth {
                        return Err(Error::StackOverflow {
                            depth: self.config.max_call_depth,
                        });
                    }
                    stack.push(Activation::new(unit, *callee));
                }
                Inst::CallExtern {
                    callee,
                    format,
                    args,
                } => {
                    let name = unit.externs[callee.index()].name;
                    let format = unit.formats[format.index()];
                    match name {
                        "printf" => self.printf(format, args, top)?,
                        "scanf" => {
                            for &arg in args {
                                let Operand::Address(dst) = arg else {
                                    return Err(Error::UnsupportedExtern(name));
                                };
                                let value = self.read_int()?;
                                *slot(unit, &mut stack, &mut globals, dst)? = value;
                            }
                        }
                        _ => return Err(Error::UnsupportedExtern(name)),
                    }
                }
            }
        }

        self.output.flush()?;
        Ok(())
    }

    /// Each `%d` of the format consumes one value argument. Everything else is
    /// printed as is.
    fn printf(&mut self, format: &str, args: &[Operand], frame: &Activation) -> Result<(), Error> {
        let mut args = args.iter();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '%' && chars.peek() == Some(&'d') {
                chars.next();
                let Some(&Operand::Value(value)) = args.next() else {
                    return Err(Error::UnsupportedExtern("printf"));
                };
                write!(self.output, "{}", frame.value(value))?;
            } else {
                write!(self.output, "{c}")?;
            }
        }
        Ok(())
    }

    /// Reads the next whitespace separated integer.
    fn read_int(&mut self) -> Result<i32, Error> {
        loop {
            if let Some(word) = self.pending.pop_front() {
                return word.parse().map_err(|_| Error::InvalidInput(word));
            }
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(Error::UnexpectedEndOfInput);
            }
            self.pending
                .extend(line.split_whitespace().map(String::from));
        }
    }
}

impl<R: BufRead, W: Write> Backend for Interpreter<R, W> {
    fn name(&self) -> &'static str {
        "interp"
    }

    fn consume(&mut self, unit: &Unit) -> Result<(), Error> {
        self.run(unit)
    }
}

/// Resolves a storage location. Locals are found in the innermost live
/// activation of their owner.
fn slot<'a>(
    unit: &Unit,
    stack: &'a mut [Activation],
    globals: &'a mut [i32],
    storage: Storage,
) -> Result<&'a mut i32, Error> {
    match storage {
        Storage::Global(g) => Ok(&mut globals[g.index()]),
        Storage::Local { owner, slot } => stack
            .iter_mut()
            .rev()
            .find(|a| a.func == owner)
            .map(|a| &mut a.locals[slot.index()])
            .ok_or_else(|| Error::NoActivation(unit.function(owner).symbol.clone())),
    }
}

/// Arithmetic wraps around on overflow.
fn binary(op: BinOp, lhs: i32, rhs: i32) -> Result<i32, Error> {
    Ok(match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::SDiv | BinOp::SRem if rhs == 0 => return Err(Error::DivisionByZero),
        BinOp::SDiv => lhs.wrapping_div(rhs),
        BinOp::SRem => lhs.wrapping_rem(rhs),
    })
}

fn cmp(op: CmpOp, lhs: i32, rhs: i32) -> bool {
    match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::Ne => lhs != rhs,
        CmpOp::Slt => lhs < rhs,
        CmpOp::Sle => lhs <= rhs,
        CmpOp::Sgt => lhs > rhs,
        CmpOp::Sge => lhs >= rhs,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codegen::test_utils::generate;

    fn run_with(src: &str, input: &str, config: Config) -> Result<String, Error> {
        let unit = generate(src);
        let mut interp = Interpreter::with_config(input.as_bytes(), Vec::new(), config);
        interp.run(&unit)?;
        Ok(String::from_utf8(interp.into_output()).unwrap())
    }

    fn run(src: &str, input: &str) -> Result<String, Error> {
        run_with(src, input, Config::default())
    }

    #[test]
    fn test_odd() {
        let src = "
            begin
                if odd -3 then !1;
                if odd 4 then !2;
                if odd 0 then !3;
                if odd 7 then !4
            end.
        ";
        assert_eq!(run(src, "").unwrap(), "1\n4\n");
    }

    #[test]
    fn test_false_loop_never_runs() {
        let src = "var x; begin x := 0; while x < 0 do x := x + 1; !x end.";
        assert_eq!(run(src, "").unwrap(), "0\n");
    }

    #[test]
    fn test_loop_and_input() {
        let src = "
            var n, sum;
            begin
                ?n;
                while n > 0 do
                    begin
                        sum := sum + n;
                        n := n - 1
                    end;
                !sum
            end.
        ";
        assert_eq!(run(src, "  10\n").unwrap(), "55\n");
    }

    #[test]
    fn test_arithmetic() {
        let src = "
            begin
                !7 / 2;
                !(0 - 7) / 2;
                !-2 + 5;
                !2147483647 + 1;
                !+3 * (1 + 1)
            end.
        ";
        assert_eq!(run(src, "").unwrap(), "3\n-3\n-7\n-2147483648\n6\n");
    }

    #[test]
    fn test_nested_procedure_reaches_enclosing_local() {
        let src = "
            var r;
            procedure outer;
                var x;
                procedure inner;
                    x := x + 1;
                begin
                    x := 41;
                    call inner;
                    r := x
                end;
            begin
                call outer;
                !r
            end.
        ";
        assert_eq!(run(src, "").unwrap(), "42\n");
    }

    #[test]
    fn test_locals_are_per_activation() {
        let src = "
            var depth;
            procedure p;
                var mine;
                begin
                    mine := depth;
                    depth := depth - 1;
                    if depth > 0 then call p;
                    !mine
                end;
            begin
                depth := 3;
                call p
            end.
        ";
        assert_eq!(run(src, "").unwrap(), "1\n2\n3\n");
    }

    #[test]
    fn test_input_errors() {
        let src = "var x; begin ?x; !x end.";
        assert_eq!(run(src, "-12").unwrap(), "-12\n");
        assert!(matches!(run(src, ""), Err(Error::UnexpectedEndOfInput)));
        assert!(matches!(
            run(src, "twelve"),
            Err(Error::InvalidInput(word)) if word == "twelve"
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let src = "var x; x := 1 / x.";
        assert!(matches!(run(src, ""), Err(Error::DivisionByZero)));
    }

    #[test]
    fn test_call_depth_is_bounded() {
        let src = "procedure p; call p; call p.";
        let config = Config { max_call_depth: 100 };
        assert!(matches!(
            run_with(src, "", config),
            Err(Error::StackOverflow { depth: 100 })
        ));
    }
}
