//! Routine interpreter
//!
//! Walks the routine body over a [`Frame`]. Code blocks run with their own
//! locals on top of the frame and evaluate to their success flag.

use crate::error::{IntegrationError, Result, VmError};
use crate::frame::Frame;
use crate::value::{self, Value};
use indexmap::IndexMap;
use tensile_model::block::{self, AssignOp, BinaryOp, ExprKind};
use tensile_model::CodeBlockId;
use tensile_rk::error_norm::{accumulate_max, max_abs, sum_abs};
use tensile_rk::interpolate::interpolate;
use tensile_rk::ir::{
    names, Builtin, Expr, FailureKind, IntegrationRoutine, LocalType, MachineConstant, Stmt,
};
use tracing::{debug, trace, warn};

/// Upper bound on controller loop iterations.
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Integrates one time step: runs the body of `routine` over `frame`.
///
/// On success the frame holds the end-of-step state and thermodynamic
/// forces.
pub fn integrate(
    routine: &IntegrationRoutine,
    frame: &mut Frame,
) -> std::result::Result<(), IntegrationError> {
    let mut interpreter = Interpreter {
        routine,
        frame,
        attempts: 0,
    };
    let outcome = interpreter.run(&routine.body);
    match &outcome {
        Ok(()) => debug!(
            behaviour = %routine.behaviour,
            attempts = interpreter.attempts,
            "time step integrated"
        ),
        Err(IntegrationError::Divergence(message)) => warn!(
            behaviour = %routine.behaviour,
            attempts = interpreter.attempts,
            %message,
            "integration diverged"
        ),
        Err(error) => debug!(behaviour = %routine.behaviour, %error, "integration failed"),
    }
    outcome
}

struct Interpreter<'r, 'f> {
    routine: &'r IntegrationRoutine,
    frame: &'f mut Frame,
    /// Controller loop iterations so far
    attempts: usize,
}

impl Interpreter<'_, '_> {
    fn run(&mut self, stmts: &[Stmt]) -> std::result::Result<(), IntegrationError> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> std::result::Result<(), IntegrationError> {
        match stmt {
            Stmt::Comment(_) => {}
            Stmt::Declare { name, ty, init, .. } => {
                let value = self.eval(init)?;
                let value = match ty {
                    LocalType::Bool => Value::Bool(value.as_bool()?),
                    LocalType::Real => Value::Scalar(value.as_scalar()?),
                };
                self.frame.declare(name, value);
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                self.frame.store(target, value)?;
            }
            Stmt::Update { target, op, value } => {
                let rhs = self.eval(value)?;
                let current = self
                    .frame
                    .get(target)
                    .cloned()
                    .ok_or_else(|| VmError::UnknownName(target.clone()))?;
                self.frame.store(target, value::binary(*op, current, rhs)?)?;
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.run(then_block)?;
                } else {
                    self.run(else_block)?;
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.as_bool()? {
                    self.attempts += 1;
                    if self.attempts > MAX_ITERATIONS {
                        return Err(VmError::IterationLimit(MAX_ITERATIONS).into());
                    }
                    trace!(
                        attempt = self.attempts,
                        t = self.frame.scalar(names::TIME).unwrap_or(f64::NAN),
                        substep = self.frame.scalar(names::SUBSTEP).unwrap_or(f64::NAN),
                        "sub-step attempt"
                    );
                    self.run(body)?;
                }
            }
            Stmt::Fail { kind, message } => {
                return Err(match kind {
                    FailureKind::Divergence => IntegrationError::Divergence(message.clone()),
                    FailureKind::Integration => IntegrationError::Failure(message.clone()),
                });
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(value) => Ok(Value::Scalar(*value)),
            Expr::Ratio(ratio) => Ok(Value::Scalar(ratio.value())),
            Expr::Bool(value) => Ok(Value::Bool(*value)),
            Expr::Var(name) => self
                .frame
                .get(name)
                .cloned()
                .ok_or_else(|| VmError::UnknownName(name.clone())),
            Expr::Constant(MachineConstant::Epsilon) => Ok(Value::Scalar(f64::EPSILON)),
            Expr::Constant(MachineConstant::MinPositive) => Ok(Value::Scalar(f64::MIN_POSITIVE)),
            Expr::Unary { op, operand } => value::unary(*op, self.eval(operand)?),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                value::binary(*op, left, right)
            }
            Expr::Call { builtin, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call(*builtin, args)
            }
            Expr::Interpolate {
                evolution,
                begin,
                second,
                fraction,
            } => {
                let p = self.eval(fraction)?.as_scalar()?;
                let mut current = self
                    .frame
                    .get(begin)
                    .cloned()
                    .ok_or_else(|| VmError::UnknownName(begin.clone()))?;
                let second = self
                    .frame
                    .components(second)
                    .ok_or_else(|| VmError::UnknownName(second.clone()))?;
                for (component, second) in current.components_mut().iter_mut().zip(second) {
                    *component = interpolate(*evolution, p, *component, *second);
                }
                Ok(current)
            }
            Expr::Select {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Invoke(id) => self.invoke(*id).map(Value::Bool),
        }
    }

    fn call(&self, builtin: Builtin, args: Vec<Value>) -> Result<Value> {
        let name = builtin.name();
        match builtin {
            Builtin::Abs => unary_arg(name, args)?.elementwise(name, f64::abs),
            Builtin::Sqrt => unary_arg(name, args)?.elementwise(name, f64::sqrt),
            Builtin::Pow => {
                let (base, exponent) = binary_args(name, args)?;
                let exponent = exponent.as_scalar()?;
                base.elementwise(name, |value| value.powf(exponent))
            }
            Builtin::Min | Builtin::Max => {
                let (a, b) = binary_args(name, args)?;
                let (a, b) = (a.as_scalar()?, b.as_scalar()?);
                Ok(Value::Scalar(if builtin == Builtin::Min {
                    a.min(b)
                } else {
                    a.max(b)
                }))
            }
            Builtin::IsFinite => Ok(Value::Bool(unary_arg(name, args)?.is_finite())),
            Builtin::AllFinite => Ok(Value::Bool(args.iter().all(Value::is_finite))),
            Builtin::SumAbs => Ok(Value::Scalar(sum_abs(unary_arg(name, args)?.components()))),
            Builtin::MaxAbs => Ok(Value::Scalar(max_abs(unary_arg(name, args)?.components()))),
            Builtin::AccumulateMax => {
                let (running, candidate) = binary_args(name, args)?;
                Ok(Value::Scalar(accumulate_max(
                    running.as_scalar()?,
                    candidate.as_scalar()?,
                )))
            }
            Builtin::SigmaEq => Ok(Value::Scalar(value::sigmaeq(&unary_arg(name, args)?)?)),
            Builtin::IsotropicStiffness => {
                let (young, nu) = binary_args(name, args)?;
                Ok(value::isotropic_stiffness(
                    self.frame.hypothesis().stensor_size(),
                    young.as_scalar()?,
                    nu.as_scalar()?,
                ))
            }
        }
    }

    /// Runs a code block; `Ok(false)` when it reports failure.
    fn invoke(&mut self, id: CodeBlockId) -> Result<bool> {
        let routine = self.routine;
        let function = routine
            .function(id)
            .ok_or(VmError::MissingBlock(id.function_name()))?;
        let mut block = BlockScope {
            frame: self.frame,
            locals: IndexMap::new(),
        };
        let succeeded = match block.run(&function.stmts)? {
            Flow::Continue => true,
            Flow::Return(success) => success,
        };
        trace!(block = id.function_name(), succeeded, "code block invoked");
        Ok(succeeded)
    }
}

fn unary_arg(function: &str, args: Vec<Value>) -> Result<Value> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), count) {
        (Some(arg), 1) => Ok(arg),
        _ => Err(arity(function, 1, count)),
    }
}

fn binary_args(function: &str, args: Vec<Value>) -> Result<(Value, Value)> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next(), count) {
        (Some(a), Some(b), 2) => Ok((a, b)),
        _ => Err(arity(function, 2, count)),
    }
}

fn arity(function: &str, expected: usize, actual: usize) -> VmError {
    VmError::BadCall {
        function: function.to_string(),
        message: format!("expected {} arguments, got {}", expected, actual),
    }
}

enum Flow {
    Continue,
    Return(bool),
}

/// Execution of one code block: block locals shadow the frame.
struct BlockScope<'f> {
    frame: &'f mut Frame,
    locals: IndexMap<String, Value>,
}

impl BlockScope<'_> {
    fn run(&mut self, stmts: &[block::Stmt]) -> Result<Flow> {
        for stmt in stmts {
            if let Flow::Return(success) = self.exec(stmt)? {
                return Ok(Flow::Return(success));
            }
        }
        Ok(Flow::Continue)
    }

    fn exec(&mut self, stmt: &block::Stmt) -> Result<Flow> {
        match stmt {
            block::Stmt::Local { name, value, .. } => {
                let value = self.eval(value)?;
                self.locals.insert(name.clone(), value);
            }
            block::Stmt::Assign {
                target, op, value, ..
            } => {
                let rhs = self.eval(value)?;
                let index = match &target.index {
                    Some(index) => Some(self.index(index)?),
                    None => None,
                };
                let new_value = match compound_op(*op) {
                    None => rhs,
                    Some(op) => {
                        let current = match index {
                            Some(index) => self.element(&target.name, index)?,
                            None => self.read(&target.name)?,
                        };
                        value::binary(op, current, rhs)?
                    }
                };
                self.write(&target.name, index, new_value)?;
            }
            block::Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let branch = if self.eval(cond)?.as_bool()? {
                    then_branch
                } else {
                    else_branch
                };
                return self.run(branch);
            }
            block::Stmt::Return { value, .. } => {
                let success = match value {
                    Some(value) => self.eval(value)?.as_bool()?,
                    None => true,
                };
                return Ok(Flow::Return(success));
            }
        }
        Ok(Flow::Continue)
    }

    fn read(&self, name: &str) -> Result<Value> {
        self.locals
            .get(name)
            .or_else(|| self.frame.get(name))
            .cloned()
            .ok_or_else(|| VmError::UnknownName(name.to_string()))
    }

    fn element(&self, name: &str, index: usize) -> Result<Value> {
        match self.locals.get(name) {
            Some(local) => local
                .components()
                .get(index)
                .map(|component| Value::Scalar(*component))
                .ok_or_else(|| VmError::IndexOutOfRange {
                    name: name.to_string(),
                    index,
                }),
            None => self.frame.element(name, index),
        }
    }

    fn write(&mut self, name: &str, index: Option<usize>, value: Value) -> Result<()> {
        if let Some(local) = self.locals.get_mut(name) {
            match index {
                None => *local = value,
                Some(index) => {
                    let component = value.as_scalar()?;
                    let slot = local.components_mut().get_mut(index).ok_or_else(|| {
                        VmError::IndexOutOfRange {
                            name: name.to_string(),
                            index,
                        }
                    })?;
                    *slot = component;
                }
            }
            return Ok(());
        }
        match index {
            None => self.frame.store(name, value),
            Some(index) => self.frame.store_element(name, index, value),
        }
    }

    fn index(&mut self, expr: &block::Expr) -> Result<usize> {
        let value = self.eval(expr)?.as_scalar()?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(VmError::TypeMismatch {
                expected: "index",
                actual: value.to_string(),
            });
        }
        Ok(value as usize)
    }

    fn eval(&mut self, expr: &block::Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Number(value) => Ok(Value::Scalar(*value)),
            ExprKind::Bool(value) => Ok(Value::Bool(*value)),
            ExprKind::Name(name) => self.read(name),
            ExprKind::Index { base, index } => {
                let index = self.index(index)?;
                match &base.kind {
                    ExprKind::Name(name) => self.element(name, index),
                    _ => {
                        let base = self.eval(base)?;
                        base.components()
                            .get(index)
                            .map(|component| Value::Scalar(*component))
                            .ok_or_else(|| VmError::IndexOutOfRange {
                                name: base.kind(),
                                index,
                            })
                    }
                }
            }
            ExprKind::Unary { op, operand } => value::unary(*op, self.eval(operand)?),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left)?;
                // short-circuit like the generated code would
                match (op, left.as_bool()) {
                    (BinaryOp::And, Ok(false)) if matches!(left, Value::Bool(_)) => {
                        return Ok(Value::Bool(false))
                    }
                    (BinaryOp::Or, Ok(true)) if matches!(left, Value::Bool(_)) => {
                        return Ok(Value::Bool(true))
                    }
                    _ => {}
                }
                let right = self.eval(right)?;
                value::binary(*op, left, right)
            }
            ExprKind::Call { path, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                let function = path.last().map(String::as_str).unwrap_or_default();
                self.call(function, args)
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
        }
    }

    fn call(&self, function: &str, args: Vec<Value>) -> Result<Value> {
        let unary = |f: fn(f64) -> f64, args: Vec<Value>| -> Result<Value> {
            unary_arg(function, args)?.elementwise(function, f)
        };
        match function {
            "abs" => unary(f64::abs, args),
            "sqrt" => unary(f64::sqrt, args),
            "exp" => unary(f64::exp, args),
            "log" => unary(f64::ln, args),
            "sin" => unary(f64::sin, args),
            "cos" => unary(f64::cos, args),
            "tan" => unary(f64::tan, args),
            "tanh" => unary(f64::tanh, args),
            "pow" => {
                let (base, exponent) = binary_args(function, args)?;
                let exponent = exponent.as_scalar()?;
                base.elementwise(function, |value| value.powf(exponent))
            }
            "min" | "max" => {
                let (a, b) = binary_args(function, args)?;
                let (a, b) = (a.as_scalar()?, b.as_scalar()?);
                Ok(Value::Scalar(if function == "min" { a.min(b) } else { a.max(b) }))
            }
            "trace" => Ok(Value::Scalar(value::trace(&unary_arg(function, args)?))),
            "deviator" => value::deviator(unary_arg(function, args)?),
            "sigmaeq" => Ok(Value::Scalar(value::sigmaeq(&unary_arg(function, args)?)?)),
            "norm" => Ok(Value::Scalar(value::norm(&unary_arg(function, args)?))),
            "Id" if args.is_empty() => Ok(value::identity(self.frame.hypothesis().stensor_size())),
            _ => Err(VmError::BadCall {
                function: function.to_string(),
                message: format!("unknown function with {} arguments", args.len()),
            }),
        }
    }
}

/// Operator of a compound assignment; `None` for a plain one.
fn compound_op(op: AssignOp) -> Option<BinaryOp> {
    match op {
        AssignOp::Set => None,
        AssignOp::Add => Some(BinaryOp::Add),
        AssignOp::Sub => Some(BinaryOp::Sub),
        AssignOp::Mul => Some(BinaryOp::Mul),
        AssignOp::Div => Some(BinaryOp::Div),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensile_model::{ModellingHypothesis, Span, VariableCategory, VariableType};
    use tensile_rk::ir::{BlockFunction, Slot, SlotRole};
    use tensile_rk::Algorithm;

    fn sp() -> Span {
        Span::zero(0)
    }

    fn num(value: f64) -> block::Expr {
        block::Expr::number(value, sp())
    }

    fn name(n: &str) -> block::Expr {
        block::Expr::name(n, sp())
    }

    fn scalar_slot(name: &str) -> Slot {
        Slot {
            name: name.into(),
            type_name: "real".into(),
            var_type: VariableType::Scalar,
            role: SlotRole::State,
            category: Some(VariableCategory::IntegrationVariable),
            array_size: 1,
            element_size: 1,
            default_value: None,
        }
    }

    fn routine(functions: Vec<BlockFunction>, body: Vec<Stmt>) -> IntegrationRoutine {
        IntegrationRoutine {
            behaviour: "Test".into(),
            hypothesis: ModellingHypothesis::Tridimensional,
            algorithm: Algorithm::Euler,
            slots: vec![scalar_slot("x"), scalar_slot("dx")],
            functions,
            body,
        }
    }

    #[test]
    fn test_block_locals_and_compound_assignment() {
        // const real k = 2; dx = k * x; dx += 1;
        let derivative = BlockFunction {
            id: CodeBlockId::ComputeDerivative,
            stmts: vec![
                block::Stmt::Local {
                    name: "k".into(),
                    type_name: "real".into(),
                    is_const: true,
                    value: num(2.0),
                    span: sp(),
                },
                block::Stmt::assign(
                    "dx",
                    block::Expr::binary(BinaryOp::Mul, name("k"), name("x"), sp()),
                    sp(),
                ),
                block::Stmt::Assign {
                    target: block::Place {
                        name: "dx".into(),
                        index: None,
                        span: sp(),
                    },
                    op: AssignOp::Add,
                    value: num(1.0),
                    span: sp(),
                },
            ],
        };
        let routine = routine(
            vec![derivative],
            vec![Stmt::when(
                !Expr::invoke(CodeBlockId::ComputeDerivative),
                vec![Stmt::fail(FailureKind::Integration, "derivative")],
            )],
        );
        let mut frame = Frame::new(&routine);
        frame.set_scalar("x", 3.0).unwrap();
        integrate(&routine, &mut frame).unwrap();
        assert_eq!(frame.scalar("dx").unwrap(), 7.0);
        assert!(frame.get("k").is_none());
    }

    #[test]
    fn test_block_failure_is_reported() {
        let derivative = BlockFunction {
            id: CodeBlockId::ComputeDerivative,
            stmts: vec![block::Stmt::If {
                cond: block::Expr::binary(BinaryOp::Lt, name("x"), num(0.0), sp()),
                then_branch: vec![block::Stmt::Return {
                    value: Some(block::Expr::new(ExprKind::Bool(false), sp())),
                    span: sp(),
                }],
                else_branch: vec![],
                span: sp(),
            }],
        };
        let routine = routine(
            vec![derivative],
            vec![Stmt::when(
                !Expr::invoke(CodeBlockId::ComputeDerivative),
                vec![Stmt::fail(FailureKind::Integration, "computeDerivative failed")],
            )],
        );
        let mut frame = Frame::new(&routine);
        frame.set_scalar("x", -1.0).unwrap();
        assert_eq!(
            integrate(&routine, &mut frame),
            Err(IntegrationError::Failure("computeDerivative failed".into()))
        );
        frame.set_scalar("x", 1.0).unwrap();
        assert_eq!(integrate(&routine, &mut frame), Ok(()));
    }

    #[test]
    fn test_missing_block() {
        let routine = routine(
            vec![],
            vec![Stmt::when(Expr::invoke(CodeBlockId::ComputeDerivative), vec![])],
        );
        let mut frame = Frame::new(&routine);
        assert_eq!(
            integrate(&routine, &mut frame),
            Err(IntegrationError::Vm(VmError::MissingBlock("computeDerivative")))
        );
    }

    #[test]
    fn test_loop_and_divergence() {
        // while (!converged) { x += 1; if (x > 2) throw; }
        let body = vec![
            Stmt::declare(names::CONVERGED, LocalType::Bool, Expr::Bool(false)),
            Stmt::While {
                cond: !Expr::var(names::CONVERGED),
                body: vec![
                    Stmt::update("x", BinaryOp::Add, Expr::number(1.0)),
                    Stmt::when(
                        Expr::var("x").gt(Expr::number(2.0)),
                        vec![Stmt::fail(FailureKind::Divergence, "too large")],
                    ),
                ],
            },
        ];
        let routine = routine(vec![], body);
        let mut frame = Frame::new(&routine);
        let err = integrate(&routine, &mut frame).unwrap_err();
        assert!(err.is_divergence());
        assert_eq!(frame.scalar("x").unwrap(), 3.0);
    }
}
