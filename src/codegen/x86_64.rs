use std::{fmt::Write, format_args as f, marker::PhantomData};

use crate::{
    ast::{BinaryOperator, Branch, Expr, ExprKind, Ident, Program, Scope, Stmt, StmtKind},
    codegen::{x86_64_env, Error},
    token::Spanned,
    util::intern::Symbol,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB
const WORD_SIZE: usize = 8;

/// Stack-machine code generator.
///
/// Every expression leaves exactly one word on the native stack. Variables
/// are the words left behind by `let` initializers; the generator mirrors
/// the runtime stack to know at which `rsp` offset each one lives.
pub struct Generator<E> {
    code: String,
    indent: bool,
    /// Number of words currently pushed onto the runtime stack.
    stack_size: usize,
    /// Visible variables, from the outermost to the most recently declared.
    vars: Vec<Var>,
    /// Length of `vars` at the entry of each open scope.
    scopes: Vec<usize>,
    label_count: usize,
    _env: PhantomData<E>,
}

#[derive(Copy, Clone)]
struct Var {
    name: Symbol,
    stack_loc: usize,
}

impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    pub fn new() -> Generator<E> {
        Generator {
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            indent: false,
            stack_size: 0,
            vars: Vec::with_capacity(16),
            scopes: Vec::with_capacity(8),
            label_count: 0,
            _env: PhantomData,
        }
    }

    pub fn generate(mut self, program: &Program) -> Result<String> {
        self.out(f!("global {}", E::ENTRY_POINT));
        self.out(f!("{}:", E::ENTRY_POINT));
        self.indent = true;

        for stmt in &program.stmts {
            self.g_stmt(stmt)?;
        }

        // Falling off the end of the program exits successfully.
        self.out(f!("mov rax, {}", E::EXIT_SYSCALL));
        self.out("mov rdi, 0");
        self.out("syscall");

        debug_assert!(self.scopes.is_empty());
        Ok(self.code)
    }

    fn g_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Exit(expr) => {
                self.g_expr(expr)?;
                self.out(f!("mov rax, {}", E::EXIT_SYSCALL));
                self.pop("rdi");
                self.out("syscall");
            }
            StmtKind::Let { name, initializer } => {
                if self.vars.iter().any(|var| var.name == name.name) {
                    return Err(name.span.wrap(Error::IdentifierAlreadyUsed(name.name)));
                }
                // The initializer is evaluated before the name is bound, so it
                // can't refer to the variable being declared.
                self.g_expr(initializer)?;
                let var = Var {
                    name: name.name,
                    stack_loc: self.stack_size - 1,
                };
                log::trace!("bound {:?} to stack slot {}", var.name, var.stack_loc);
                self.vars.push(var);
            }
            StmtKind::Assign { target, value } => {
                let var = self.lookup(target)?;
                self.g_expr(value)?;
                self.pop("rax");
                let offset = self.offset_of(var);
                self.out(f!("mov [rsp + {offset}], rax"));
            }
            StmtKind::Scope(scope) => self.g_scope(scope)?,
            StmtKind::If { branches, else_arm } => self.g_if(branches, else_arm.as_ref())?,
        }
        Ok(())
    }

    fn g_scope(&mut self, scope: &Scope) -> Result<()> {
        self.begin_scope();
        for stmt in &scope.stmts {
            self.g_stmt(stmt)?;
        }
        self.end_scope();
        Ok(())
    }

    fn g_if(&mut self, branches: &[Branch], else_arm: Option<&Scope>) -> Result<()> {
        let end = self.create_label();
        for branch in branches {
            let next = self.create_label();
            self.g_expr(&branch.predicate)?;
            self.pop("rax");
            self.out("test rax, rax");
            self.out(f!("jz {next}"));
            self.g_scope(&branch.body)?;
            self.out(f!("jmp {end}"));
            self.label(next);
        }
        if let Some(else_arm) = else_arm {
            self.g_scope(else_arm)?;
        }
        self.label(end);
        Ok(())
    }

    fn g_expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Int(int) => {
                self.out(f!("mov rax, {int}"));
                self.push("rax");
            }
            ExprKind::Id(ident) => {
                let var = self.lookup(ident)?;
                let offset = self.offset_of(var);
                self.push(f!("QWORD [rsp + {offset}]"));
            }
            ExprKind::Paren(inner) => self.g_expr(inner)?,
            ExprKind::Binary { op, lhs, rhs } => {
                self.g_expr(rhs)?;
                self.g_expr(lhs)?;
                self.pop("rax");
                self.pop("rbx");
                match op {
                    BinaryOperator::Add => self.out("add rax, rbx"),
                    BinaryOperator::Sub => self.out("sub rax, rbx"),
                    BinaryOperator::Mul => self.out("imul rax, rbx"),
                    BinaryOperator::Div => {
                        // Sign-extend rax into rdx:rax for the signed division.
                        self.out("cqo");
                        self.out("idiv rbx");
                    }
                }
                self.push("rax");
            }
        }
        Ok(())
    }
}

impl<E> Default for Generator<E>
where
    E: x86_64_env::Env,
{
    fn default() -> Self {
        Generator::new()
    }
}

/// Stack and scope bookkeeping.
impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    fn push(&mut self, operand: impl std::fmt::Display) {
        self.out(f!("push {operand}"));
        self.stack_size += 1;
    }

    fn pop(&mut self, register: &str) {
        self.out(f!("pop {register}"));
        self.stack_size -= 1;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(self.vars.len());
    }

    /// Drops the variables declared since the matching `begin_scope`, both
    /// from the mirror and from the runtime stack.
    fn end_scope(&mut self) {
        let mark = self.scopes.pop().expect("unbalanced scope");
        let pop_count = self.vars.len() - mark;
        if pop_count > 0 {
            self.out(f!("add rsp, {}", pop_count * WORD_SIZE));
        }
        self.stack_size -= pop_count;
        self.vars.truncate(mark);
        log::trace!("closed scope, dropped {pop_count} variable(s)");
    }

    /// Resolves an identifier, searching from the innermost declaration.
    fn lookup(&self, ident: &Ident) -> Result<Var> {
        self.vars
            .iter()
            .rev()
            .find(|var| var.name == ident.name)
            .copied()
            .ok_or_else(|| ident.span.wrap(Error::UnknownIdentifier(ident.name)))
    }

    /// Byte offset of the variable's slot relative to the current `rsp`.
    fn offset_of(&self, var: Var) -> usize {
        (self.stack_size - var.stack_loc - 1) * WORD_SIZE
    }

    fn create_label(&mut self) -> Label {
        let label = Label(self.label_count);
        self.label_count += 1;
        label
    }
}

/// Utility functions.
impl<E> Generator<E> {
    /// Prints a line.
    fn out(&mut self, f: impl std::fmt::Display) {
        let indent = if self.indent { "    " } else { "" };
        writeln!(self.code, "{indent}{f}").expect("code emit should be infallible");
    }

    /// Prints a label definition, never indented.
    fn label(&mut self, label: Label) {
        writeln!(self.code, "{label}:").expect("code emit should be infallible");
    }
}

#[derive(Copy, Clone)]
struct Label(usize);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label{}", self.0)
    }
}
