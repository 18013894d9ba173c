use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::function::{LoxFunction, NativeFunction};
use crate::resolver::Locals;
use crate::stack::ensure_sufficient_stack;
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Nested Lox calls allowed before a call fails with "Stack overflow.".  The
/// host stack grows on demand, so this only bounds runaway recursion.
pub const MAX_CALL_DEPTH: usize = 5_000;

/// How a statement finished.  `return` travels up through blocks and loops as
/// `Flow::Return` until the enclosing call consumes it; runtime errors take
/// the separate `Err` path.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    out: Box<dyn Write>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates a new Interpreter whose `print` output goes to `out`.
    /// Defines native functions such as `clock`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let millis: i64 = chrono::Utc::now().timestamp_millis();
                    Ok(Value::Number(millis as f64 / 1000.0))
                },
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
            depth: 0,
        }
    }

    /// Merge a resolver's distance table into this interpreter's.
    pub fn add_locals(&mut self, locals: Locals) {
        debug!("Adding {} resolved local(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// error stops execution and is returned; output already written stays.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Err(e) = self.execute(stmt) {
                debug!("Runtime error aborts program: {}", e);
                self.out.flush()?;
                return Err(e);
            }
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| self.execute_inner(stmt))
    }

    fn execute_inner(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, env.into_ref())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Defining class '{}'", name.lexeme);

                let superclass: Option<Rc<LoxClass>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let token: &Token = match expr {
                                Expr::Variable {
                                    name: super_name, ..
                                } => super_name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                // Pre‑declare so methods can refer to the class by name.
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Nil);

                let enclosing: EnvRef = Rc::clone(&self.environment);

                if let Some(superclass) = &superclass {
                    let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                    env.define("super", Value::Class(Rc::clone(superclass)));
                    self.environment = env.into_ref();
                }

                let methods: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|declaration| {
                        let function = LoxFunction::new(
                            Rc::clone(declaration),
                            Rc::clone(&self.environment),
                            declaration.name.lexeme == INITIALIZER,
                        );
                        (declaration.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme.clone(), superclass, methods);

                self.environment = enclosing;

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` with `env` as the current frame, then restore the
    /// previous frame whether they finished, returned or failed.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, env);

        let result: Result<Flow> = self.execute_all(statements);

        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_inner(expr))
    }

    fn evaluate_inner(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                // The operand itself is the result, not a coerced boolean.
                let short_circuit = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        if !Environment::assign_at(
                            &self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        ) {
                            return Err(undefined_variable(name));
                        }
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.call_value(callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value> {
        let right_val: Value = self.evaluate(right)?;

        match op.token_type {
            TokenType::MINUS => Ok(Value::Number(-number_operand(op, &right_val)?)),
            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),
            _ => Err(LoxError::runtime(op, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        debug!(
            "Binary '{}' on {} and {}",
            op.lexeme,
            left_val.type_name(),
            right_val.type_name()
        );

        match op.token_type {
            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => {
                    let mut joined: String = String::with_capacity(a.len() + b.len());
                    joined.push_str(a);
                    joined.push_str(b);
                    Ok(Value::from(joined))
                }
                _ => Err(LoxError::runtime(
                    op,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            // IEEE: x / 0 is ±inf or NaN, not an error.
            TokenType::SLASH => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::runtime(op, "Invalid binary operator.")),
        }
    }

    /// Locals are read from the exact frame the resolver computed; anything
    /// unresolved is a global.
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| undefined_variable(name)),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: find `method` starting at the superclass bound in the
    /// `super` frame, and bind it to the current `this`, one frame below.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = *self
            .locals
            .get(&id)
            .ok_or_else(|| LoxError::runtime(keyword, "Unresolved 'super'."))?;

        let Some(Value::Class(superclass)) =
            Environment::get_at(&self.environment, distance, "super")
        else {
            return Err(LoxError::runtime(keyword, "Unresolved 'super'."));
        };

        let this: Option<Value> = distance
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"));

        let Some(Value::Instance(object)) = this else {
            return Err(LoxError::runtime(keyword, "Unresolved 'this'."));
        };

        let function: Rc<LoxFunction> =
            superclass.find_method(&method.lexeme).ok_or_else(|| {
                LoxError::runtime(
                    method,
                    format!("Undefined property '{}'.", method.lexeme),
                )
            })?;

        Ok(Value::Function(Rc::new(function.bind(object))))
    }

    /// Arity check, then dispatch on the callee kind.
    fn call_value(&mut self, callee: Value, paren: &Token, arguments: Vec<Value>) -> Result<Value> {
        let arity: usize = match &callee {
            Value::NativeFunction(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            _ => {
                return Err(LoxError::runtime(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        };

        if arguments.len() != arity {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments, but got {}.",
                    arity,
                    arguments.len()
                ),
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        self.depth += 1;

        let result: Result<Value> = match callee {
            Value::NativeFunction(native) => native
                .call(&arguments)
                .map_err(|msg| LoxError::runtime(paren, msg)),
            Value::Function(function) => function.call(self, arguments),
            Value::Class(class) => LoxClass::instantiate(&class, self, arguments),
            _ => Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        };

        self.depth -= 1;

        result
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

fn number_operand(op: &Token, operand: &Value) -> Result<f64> {
    match operand {
        Value::Number(n) => Ok(*n),
        _ => Err(LoxError::runtime(op, "Operand must be a number.")),
    }
}

fn number_operands(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(op, "Operands must be numbers.")),
    }
}
