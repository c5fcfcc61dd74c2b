//! A tiny interpreter for the subset of x86-64 the code generator emits, so
//! the runtime behavior of compiled programs can be tested without an
//! assembler or linker. Only the Linux environment is understood.

use std::collections::HashMap;

const STEP_LIMIT: usize = 100_000;
const LINUX_EXIT_SYSCALL: i64 = 60;

#[derive(Debug, PartialEq, Eq)]
pub enum Fault {
    UnknownInstruction(String),
    UnknownLabel(String),
    StackUnderflow,
    DivideError,
    UnsupportedSyscall(i64),
    FellOffEnd,
    StepLimit,
}

type Result<T, E = Fault> = std::result::Result<T, E>;

/// Executes the program, returning the status passed to the exit syscall.
pub fn run(asm: &str) -> Result<i64> {
    let program = Program::load(asm)?;
    Machine::default().execute(&program)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Reg {
    Rax,
    Rbx,
    Rdx,
    Rdi,
    Rsp,
}

#[derive(Copy, Clone, Debug)]
enum Operand {
    Reg(Reg),
    Imm(i64),
    /// `[rsp + offset]`, offset in bytes.
    Stack(usize),
}

#[derive(Debug)]
enum Instr<'a> {
    Mov(Operand, Operand),
    Push(Operand),
    Pop(Reg),
    Add(Reg, Operand),
    Sub(Reg, Reg),
    Imul(Reg, Reg),
    Cqo,
    Idiv(Reg),
    Test(Reg, Reg),
    Jz(&'a str),
    Jmp(&'a str),
    Syscall,
}

struct Program<'a> {
    instrs: Vec<Instr<'a>>,
    labels: HashMap<&'a str, usize>,
}

impl<'a> Program<'a> {
    fn load(asm: &'a str) -> Result<Program<'a>> {
        let mut instrs = Vec::new();
        let mut labels = HashMap::new();
        for line in asm.lines().map(str::trim) {
            if line.is_empty() || line.starts_with("global ") {
                continue;
            }
            if let Some(label) = line.strip_suffix(':') {
                labels.insert(label, instrs.len());
                continue;
            }
            instrs.push(Self::decode(line)?);
        }
        Ok(Program { instrs, labels })
    }

    fn decode(line: &'a str) -> Result<Instr<'a>> {
        let unknown = || Fault::UnknownInstruction(line.to_owned());
        let (mnemonic, rest) = line.split_once(' ').unwrap_or((line, ""));
        let args: Vec<&str> = rest.split(", ").map(str::trim).collect();
        let reg = |i: usize| args.get(i).and_then(|a| parse_reg(a)).ok_or_else(unknown);
        let operand = |i: usize| args.get(i).and_then(|a| parse_operand(a)).ok_or_else(unknown);

        let instr = match mnemonic {
            "mov" => Instr::Mov(operand(0)?, operand(1)?),
            "push" => Instr::Push(operand(0)?),
            "pop" => Instr::Pop(reg(0)?),
            "add" => Instr::Add(reg(0)?, operand(1)?),
            "sub" => Instr::Sub(reg(0)?, reg(1)?),
            "imul" => Instr::Imul(reg(0)?, reg(1)?),
            "cqo" => Instr::Cqo,
            "idiv" => Instr::Idiv(reg(0)?),
            "test" => Instr::Test(reg(0)?, reg(1)?),
            "jz" => Instr::Jz(rest),
            "jmp" => Instr::Jmp(rest),
            "syscall" => Instr::Syscall,
            _ => return Err(unknown()),
        };
        Ok(instr)
    }

    fn target(&self, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Fault::UnknownLabel(label.to_owned()))
    }
}

fn parse_reg(s: &str) -> Option<Reg> {
    let reg = match s {
        "rax" => Reg::Rax,
        "rbx" => Reg::Rbx,
        "rdx" => Reg::Rdx,
        "rdi" => Reg::Rdi,
        "rsp" => Reg::Rsp,
        _ => return None,
    };
    Some(reg)
}

fn parse_operand(s: &str) -> Option<Operand> {
    if let Some(reg) = parse_reg(s) {
        return Some(Operand::Reg(reg));
    }
    if let Ok(imm) = s.parse() {
        return Some(Operand::Imm(imm));
    }
    let offset = s
        .strip_prefix("QWORD ")
        .unwrap_or(s)
        .strip_prefix("[rsp + ")?
        .strip_suffix(']')?
        .parse()
        .ok()?;
    Some(Operand::Stack(offset))
}

#[derive(Default)]
struct Machine {
    /// General purpose registers, indexed by [`Reg`]. `rsp` is modeled by
    /// the length of `stack` instead.
    regs: [i64; 4],
    /// Top of the stack is the last element.
    stack: Vec<i64>,
    zero_flag: bool,
}

impl Machine {
    fn execute(&mut self, program: &Program<'_>) -> Result<i64> {
        let mut pc = 0;
        for _ in 0..STEP_LIMIT {
            let instr = program.instrs.get(pc).ok_or(Fault::FellOffEnd)?;
            pc += 1;
            match *instr {
                Instr::Mov(Operand::Stack(offset), src) => {
                    let value = self.read(src)?;
                    *self.slot(offset)? = value;
                }
                Instr::Mov(Operand::Reg(dst), src) => {
                    let value = self.read(src)?;
                    *self.reg(dst) = value;
                }
                Instr::Mov(Operand::Imm(_), _) => {
                    return Err(Fault::UnknownInstruction(format!("{instr:?}")))
                }
                Instr::Push(src) => {
                    let value = self.read(src)?;
                    self.stack.push(value);
                }
                Instr::Pop(dst) => {
                    let value = self.stack.pop().ok_or(Fault::StackUnderflow)?;
                    *self.reg(dst) = value;
                }
                Instr::Add(Reg::Rsp, Operand::Imm(bytes)) => {
                    let words = usize::try_from(bytes / 8).map_err(|_| Fault::StackUnderflow)?;
                    let len = self.stack.len().checked_sub(words).ok_or(Fault::StackUnderflow)?;
                    self.stack.truncate(len);
                }
                Instr::Add(dst, src) => {
                    let value = self.read(src)?;
                    let dst = self.reg(dst);
                    *dst = dst.wrapping_add(value);
                }
                Instr::Sub(dst, src) => {
                    let value = *self.reg(src);
                    let dst = self.reg(dst);
                    *dst = dst.wrapping_sub(value);
                }
                Instr::Imul(dst, src) => {
                    let value = *self.reg(src);
                    let dst = self.reg(dst);
                    *dst = dst.wrapping_mul(value);
                }
                Instr::Cqo => {
                    let rax = *self.reg(Reg::Rax);
                    *self.reg(Reg::Rdx) = if rax < 0 { -1 } else { 0 };
                }
                Instr::Idiv(src) => {
                    // The generator always sign-extends with `cqo` first, so
                    // rdx:rax fits in rax alone.
                    let divisor = *self.reg(src);
                    let dividend = *self.reg(Reg::Rax);
                    let quotient = dividend.checked_div(divisor).ok_or(Fault::DivideError)?;
                    let remainder = dividend.checked_rem(divisor).ok_or(Fault::DivideError)?;
                    *self.reg(Reg::Rax) = quotient;
                    *self.reg(Reg::Rdx) = remainder;
                }
                Instr::Test(a, b) => {
                    self.zero_flag = (*self.reg(a) & *self.reg(b)) == 0;
                }
                Instr::Jz(label) => {
                    if self.zero_flag {
                        pc = program.target(label)?;
                    }
                }
                Instr::Jmp(label) => pc = program.target(label)?,
                Instr::Syscall => {
                    let number = *self.reg(Reg::Rax);
                    if number != LINUX_EXIT_SYSCALL {
                        return Err(Fault::UnsupportedSyscall(number));
                    }
                    return Ok(*self.reg(Reg::Rdi));
                }
            }
        }
        Err(Fault::StepLimit)
    }

    fn read(&mut self, operand: Operand) -> Result<i64> {
        match operand {
            Operand::Reg(reg) => Ok(*self.reg(reg)),
            Operand::Imm(imm) => Ok(imm),
            Operand::Stack(offset) => self.slot(offset).map(|slot| *slot),
        }
    }

    fn reg(&mut self, reg: Reg) -> &mut i64 {
        let index = match reg {
            Reg::Rax => 0,
            Reg::Rbx => 1,
            Reg::Rdx => 2,
            Reg::Rdi => 3,
            Reg::Rsp => unreachable!("rsp is only adjusted through `add`"),
        };
        &mut self.regs[index]
    }

    fn slot(&mut self, offset: usize) -> Result<&mut i64> {
        let depth = offset / 8;
        let index = self
            .stack
            .len()
            .checked_sub(depth + 1)
            .ok_or(Fault::StackUnderflow)?;
        Ok(&mut self.stack[index])
    }
}
