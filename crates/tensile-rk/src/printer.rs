//! Text rendering of integration routines.
//!
//! Routines are printed as C++-flavoured source: one function per code block
//! followed by the integration function itself.

use crate::ir::{
    BlockFunction, Expr, FailureKind, IntegrationRoutine, LocalType, MachineConstant, Slot,
    SlotRole, Stmt,
};
use std::fmt;
use tensile_model::block::{self, format_number, BinaryOp, UnaryOp};
use tensile_model::Evolution;

struct RenderContext<'a> {
    output: &'a mut String,
    indent: usize,
}

impl<'a> RenderContext<'a> {
    fn new(output: &'a mut String) -> Self {
        Self { output, indent: 0 }
    }

    fn indent(&mut self) {
        self.indent += 1;
    }

    fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn blank_line(&mut self) {
        self.output.push('\n');
    }
}

/// Renders a complete routine.
pub fn render(routine: &IntegrationRoutine) -> String {
    let mut output = String::new();
    let mut ctx = RenderContext::new(&mut output);
    ctx.line(&format!(
        "// {} integrated with {} ({})",
        routine.behaviour, routine.algorithm, routine.algorithm.descriptor().title
    ));
    ctx.line(&format!("// modelling hypothesis: {}", routine.hypothesis));
    render_slots(&mut ctx, &routine.slots);
    for function in &routine.functions {
        ctx.blank_line();
        render_function(&mut ctx, function);
    }
    ctx.blank_line();
    ctx.line("IntegrationResult integrate() {");
    ctx.indent();
    render_stmts(&mut ctx, &routine.body);
    ctx.line("return IntegrationResult::SUCCESS;");
    ctx.dedent();
    ctx.line("}");
    output
}

fn role_heading(role: SlotRole) -> &'static str {
    match role {
        SlotRole::Input => "inputs",
        SlotRole::State => "state",
        SlotRole::Output => "outputs",
        SlotRole::Constant => "constants",
        SlotRole::Local => "locals",
    }
}

fn render_slots(ctx: &mut RenderContext<'_>, slots: &[Slot]) {
    for role in [
        SlotRole::Input,
        SlotRole::State,
        SlotRole::Output,
        SlotRole::Constant,
        SlotRole::Local,
    ] {
        let mut group = slots.iter().filter(|slot| slot.role == role).peekable();
        if group.peek().is_none() {
            continue;
        }
        ctx.blank_line();
        ctx.line(&format!("// {}", role_heading(role)));
        for slot in group {
            let array = if slot.array_size > 1 {
                format!("[{}]", slot.array_size)
            } else {
                String::new()
            };
            let default = match &slot.default_value {
                Some(values) if values.len() == 1 => format!(" = {}", format_number(values[0])),
                Some(values) => format!(
                    " = {{{}}}",
                    values
                        .iter()
                        .map(|value| format_number(*value))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                None => String::new(),
            };
            ctx.line(&format!("{} {}{}{};", slot.type_name, slot.name, array, default));
        }
    }
}

fn render_function(ctx: &mut RenderContext<'_>, function: &BlockFunction) {
    ctx.line(&format!("bool {}() {{", function.id.function_name()));
    ctx.indent();
    render_block_stmts(ctx, &function.stmts);
    ctx.line("return true;");
    ctx.dedent();
    ctx.line("}");
}

fn render_block_stmts(ctx: &mut RenderContext<'_>, stmts: &[block::Stmt]) {
    for stmt in stmts {
        match stmt {
            block::Stmt::Local {
                name,
                type_name,
                is_const,
                value,
                ..
            } => {
                let qualifier = if *is_const { "const " } else { "" };
                ctx.line(&format!("{}{} {} = {};", qualifier, type_name, name, value));
            }
            block::Stmt::Assign {
                target, op, value, ..
            } => {
                let place = match &target.index {
                    Some(index) => format!("{}[{}]", target.name, index),
                    None => target.name.clone(),
                };
                ctx.line(&format!("{} {} {};", place, op.symbol(), value));
            }
            block::Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                ctx.line(&format!("if ({}) {{", cond));
                ctx.indent();
                render_block_stmts(ctx, then_branch);
                ctx.dedent();
                if !else_branch.is_empty() {
                    ctx.line("} else {");
                    ctx.indent();
                    render_block_stmts(ctx, else_branch);
                    ctx.dedent();
                }
                ctx.line("}");
            }
            block::Stmt::Return { value, .. } => match value {
                Some(value) => ctx.line(&format!("return {};", value)),
                None => ctx.line("return true;"),
            },
        }
    }
}

fn render_stmts(ctx: &mut RenderContext<'_>, stmts: &[Stmt]) {
    for stmt in stmts {
        render_stmt(ctx, stmt);
    }
}

fn render_stmt(ctx: &mut RenderContext<'_>, stmt: &Stmt) {
    match stmt {
        Stmt::Comment(text) => ctx.line(&format!("// {}", text)),
        Stmt::Declare {
            name,
            ty,
            constant,
            init,
        } => {
            let ty = match ty {
                LocalType::Real => "real",
                LocalType::Bool => "bool",
            };
            let qualifier = if *constant { "const " } else { "" };
            ctx.line(&format!("{}{} {} = {};", qualifier, ty, name, init));
        }
        Stmt::Assign { target, value } => ctx.line(&format!("{} = {};", target, value)),
        Stmt::Update { target, op, value } => {
            ctx.line(&format!("{} {}= {};", target, op.symbol(), value))
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            ctx.line(&format!("if ({}) {{", cond));
            ctx.indent();
            render_stmts(ctx, then_block);
            ctx.dedent();
            if !else_block.is_empty() {
                ctx.line("} else {");
                ctx.indent();
                render_stmts(ctx, else_block);
                ctx.dedent();
            }
            ctx.line("}");
        }
        Stmt::While { cond, body } => {
            ctx.line(&format!("while ({}) {{", cond));
            ctx.indent();
            render_stmts(ctx, body);
            ctx.dedent();
            ctx.line("}");
        }
        Stmt::Fail { kind, message } => match kind {
            FailureKind::Divergence => {
                ctx.line(&format!("throw(DivergenceException(\"{}\"));", message))
            }
            FailureKind::Integration => {
                ctx.line(&format!("return IntegrationResult::FAILURE; // {}", message))
            }
        },
    }
}

const SELECT_PRECEDENCE: u8 = 0;
const UNARY_PRECEDENCE: u8 = 7;
const ATOM_PRECEDENCE: u8 = u8::MAX;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Ratio(_) => BinaryOp::Div.precedence(),
        Expr::Unary { .. } => UNARY_PRECEDENCE,
        Expr::Interpolate { .. } => BinaryOp::Add.precedence(),
        Expr::Select { .. } => SELECT_PRECEDENCE,
        Expr::Number(value) if *value < 0.0 => UNARY_PRECEDENCE,
        _ => ATOM_PRECEDENCE,
    }
}

/// Algebraic form of an interpolation, for display.
fn interpolation_formula(evolution: Evolution, begin: &str, second: &str, fraction: &Expr) -> Expr {
    let increment = match evolution {
        Evolution::IncrementKnown => Expr::var(second),
        Evolution::BeginEnd => Expr::var(second) - Expr::var(begin),
    };
    Expr::var(begin) + fraction.clone() * increment
}

fn render_operand(expr: &Expr, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => f.write_str(&format_number(*value)),
            Expr::Ratio(ratio) => write!(f, "real({})/real({})", ratio.num, ratio.den),
            Expr::Bool(value) => write!(f, "{}", value),
            Expr::Var(name) => f.write_str(name),
            Expr::Constant(MachineConstant::Epsilon) => {
                f.write_str("std::numeric_limits<real>::epsilon()")
            }
            Expr::Constant(MachineConstant::MinPositive) => {
                f.write_str("std::numeric_limits<real>::min()")
            }
            Expr::Unary { op, operand } => {
                f.write_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                })?;
                render_operand(operand, f, UNARY_PRECEDENCE)
            }
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                render_operand(left, f, prec)?;
                write!(f, " {} ", op.symbol())?;
                render_operand(right, f, prec + 1)
            }
            Expr::Call { builtin, args } => {
                write!(f, "{}(", builtin.name())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Interpolate {
                evolution,
                begin,
                second,
                fraction,
            } => write!(
                f,
                "{}",
                interpolation_formula(*evolution, begin, second, fraction)
            ),
            Expr::Select {
                cond,
                then,
                otherwise,
            } => {
                render_operand(cond, f, BinaryOp::Or.precedence())?;
                f.write_str(" ? ")?;
                render_operand(then, f, BinaryOp::Or.precedence())?;
                f.write_str(" : ")?;
                render_operand(otherwise, f, SELECT_PRECEDENCE)
            }
            Expr::Invoke(id) => write!(f, "this->{}()", id.function_name()),
        }
    }
}
