//! Integration routine generation.
//!
//! [`generate`] assembles the routine of one (behaviour, hypothesis) pair
//! from the algorithm descriptor: the prologue, one block per stage, the
//! final combination and, for embedded schemes, the sub-step controller
//! loop around them. Fixed-step schemes integrate the whole step at once
//! and give up on the first failure.

use crate::algorithm::{AlgorithmDescriptor, ErrorEstimate, Rational, Stage};
use crate::context::{normalization_expr, IntegrationContext};
use crate::controller::{self, CorrectorLaw};
use crate::error_norm::{error_stmts, ErrorContribution};
use crate::interpolate::{
    end_of_step, interpolation_stmts, stage_fraction, storage_names, substep_end_fraction,
};
use crate::ir::{
    names, BlockFunction, Builtin, Expr, FailureKind, IntegrationRoutine, LocalType, Slot,
    SlotRole, Stmt,
};
use crate::printer::render;
use tensile_model::block::BinaryOp;
use tensile_model::variable::{current_value_name, increment_name, stage_buffer_name};
use tensile_model::{
    CodeBlockId, CompileError, CompileResult, ErrorKind, Span, Variable, VariableCategory,
    VariableType,
};
use tracing::debug;

/// Generates the routine of `ctx`.
pub fn generate(ctx: &IntegrationContext<'_>) -> CompileResult<IntegrationRoutine> {
    if !ctx.data.has_code_block(CodeBlockId::ComputeDerivative) {
        return Err(CompileError::new(
            ErrorKind::MissingCodeBlock,
            Span::zero(0),
            "no @Derivative block defined",
        ));
    }
    let emitter = Emitter::new(ctx);
    let mut body = emitter.prologue();
    if ctx.descriptor.is_embedded() {
        body.extend(emitter.adaptive_loop()?);
    } else {
        body.extend(emitter.fixed_step());
    }
    body.extend(emitter.final_forces());

    debug!(
        hypothesis = %ctx.hypothesis,
        algorithm = %ctx.algorithm(),
        statements = body.len(),
        "integration routine generated"
    );
    Ok(IntegrationRoutine {
        behaviour: ctx.model.class_name(),
        hypothesis: ctx.hypothesis,
        algorithm: ctx.algorithm(),
        slots: slots(ctx),
        functions: ctx
            .data
            .code_blocks()
            .map(|block| BlockFunction {
                id: block.id,
                stmts: block.stmts.clone(),
            })
            .collect(),
        body,
    })
}

/// Generates the routine of `ctx` as text.
pub fn generate_source(ctx: &IntegrationContext<'_>) -> CompileResult<String> {
    Ok(render(&generate(ctx)?))
}

fn slot(variable: &Variable, name: String, role: SlotRole, ctx: &IntegrationContext<'_>) -> Slot {
    Slot {
        name,
        type_name: variable.type_name.clone(),
        var_type: variable.var_type,
        role,
        category: Some(variable.category),
        array_size: variable.array_size,
        element_size: variable.element_size(ctx.hypothesis),
        default_value: variable.default_value.clone(),
    }
}

/// Storage of the routine: `dt`, then every variable in declaration order.
pub fn slots(ctx: &IntegrationContext<'_>) -> Vec<Slot> {
    let mut slots = vec![Slot {
        name: names::TIME_INCREMENT.to_string(),
        type_name: "time".to_string(),
        var_type: VariableType::Scalar,
        role: SlotRole::Input,
        category: None,
        array_size: 1,
        element_size: 1,
        default_value: None,
    }];
    for variable in ctx.data.variables() {
        match variable.category {
            VariableCategory::Gradient | VariableCategory::ExternalStateVariable => {
                let (begin, second) = storage_names(variable);
                slots.push(slot(variable, begin, SlotRole::Input, ctx));
                slots.push(slot(variable, second, SlotRole::Input, ctx));
            }
            VariableCategory::ThermodynamicForce => {
                slots.push(slot(variable, variable.name.clone(), SlotRole::Output, ctx))
            }
            VariableCategory::IntegrationVariable | VariableCategory::AuxiliaryStateVariable => {
                slots.push(slot(variable, variable.name.clone(), SlotRole::State, ctx))
            }
            VariableCategory::MaterialProperty => {
                slots.push(slot(variable, variable.name.clone(), SlotRole::Input, ctx))
            }
            VariableCategory::Parameter | VariableCategory::StaticVariable => {
                slots.push(slot(variable, variable.name.clone(), SlotRole::Constant, ctx))
            }
            VariableCategory::LocalVariable => {
                slots.push(slot(variable, variable.name.clone(), SlotRole::Local, ctx))
            }
        }
    }
    slots
}

fn var(name: &str) -> Expr {
    Expr::var(name)
}

/// `!this->block()`
fn fails(id: CodeBlockId) -> Expr {
    !Expr::invoke(id)
}

fn block_failed(id: CodeBlockId) -> String {
    format!("{} failed", id.function_name())
}

struct Emitter<'c, 'm> {
    ctx: &'c IntegrationContext<'m>,
    descriptor: &'static AlgorithmDescriptor,
    states: Vec<&'m Variable>,
    drivers: Vec<&'m Variable>,
}

impl<'c, 'm> Emitter<'c, 'm> {
    fn new(ctx: &'c IntegrationContext<'m>) -> Self {
        Self {
            ctx,
            descriptor: ctx.descriptor,
            states: ctx.state_variables(),
            drivers: ctx.interpolated_variables(),
        }
    }

    fn comment(&self, stmts: &mut Vec<Stmt>, text: impl Into<String>) {
        if self.ctx.options.emit_comments {
            stmts.push(Stmt::comment(text));
        }
    }

    fn has_block(&self, id: CodeBlockId) -> bool {
        self.ctx.data.has_code_block(id)
    }

    /// `K_j` of `name`: the stored buffer, or `dt_ * dX` for the unstored
    /// last stage.
    fn stage_term(&self, name: &str, index: usize) -> Expr {
        if self.descriptor.stores_stage(index) {
            var(&stage_buffer_name(name, index + 1))
        } else {
            var(names::SUBSTEP) * var(&increment_name(name))
        }
    }

    /// `Σ w_j K_j`, equal weights factored in order of first appearance.
    fn combination(&self, name: &str, weights: &[Rational]) -> Option<Expr> {
        let mut groups: Vec<(Rational, Vec<Expr>)> = Vec::new();
        for (index, weight) in weights.iter().enumerate() {
            if weight.is_zero() {
                continue;
            }
            let term = self.stage_term(name, index);
            match groups.iter_mut().find(|(w, _)| w == weight) {
                Some((_, terms)) => terms.push(term),
                None => groups.push((*weight, vec![term])),
            }
        }

        let mut total: Option<Expr> = None;
        for (weight, terms) in groups {
            let sum = terms
                .into_iter()
                .reduce(|acc, term| acc + term)
                .unwrap_or(Expr::number(0.0));
            let negative = weight.value() < 0.0;
            total = Some(match total {
                Some(acc) if negative => acc - sum.scaled(Rational::ZERO - weight),
                Some(acc) => acc + sum.scaled(weight),
                None => sum.scaled(weight),
            });
        }
        total
    }

    /// `X_ = X + Σ w_j K_j` for every state variable.
    fn estimates(&self, weights: &[Rational]) -> Vec<Stmt> {
        self.states
            .iter()
            .map(|state| {
                let value = match self.combination(&state.name, weights) {
                    Some(increment) => var(&state.name) + increment,
                    None => var(&state.name),
                };
                Stmt::assign(current_value_name(&state.name), value)
            })
            .collect()
    }

    fn store_stage(&self, index: usize) -> Vec<Stmt> {
        if !self.descriptor.stores_stage(index) {
            return Vec::new();
        }
        self.states
            .iter()
            .map(|state| {
                Stmt::assign(
                    stage_buffer_name(&state.name, index + 1),
                    var(names::SUBSTEP) * var(&increment_name(&state.name)),
                )
            })
            .collect()
    }

    fn derivatives_finite(&self) -> Option<Expr> {
        if self.states.is_empty() {
            return None;
        }
        Some(Expr::call(
            Builtin::AllFinite,
            self.states
                .iter()
                .map(|state| var(&increment_name(&state.name)))
                .collect(),
        ))
    }

    /// Interpolation, state estimates and stiffness refresh of a stage.
    fn stage_inputs(&self, stage: &Stage) -> Vec<Stmt> {
        let mut stmts = interpolation_stmts(&self.drivers, &stage_fraction(stage.fraction));
        stmts.extend(self.estimates(stage.weights));
        stmts.extend(self.ctx.stiffness_refresh());
        stmts
    }

    /// Buffers at the end of the accepted sub-step.
    fn end_of_substep(&self) -> Vec<Stmt> {
        let mut stmts = interpolation_stmts(&self.drivers, &substep_end_fraction());
        stmts.extend(
            self.states
                .iter()
                .map(|state| Stmt::assign(current_value_name(&state.name), var(&state.name))),
        );
        stmts.extend(self.ctx.stiffness_refresh());
        stmts
    }

    /// `X += Σ b_j K_j` for every state variable.
    fn commit(&self) -> Vec<Stmt> {
        self.states
            .iter()
            .filter_map(|state| {
                self.combination(&state.name, self.descriptor.final_weights)
                    .map(|increment| Stmt::update(state.name.clone(), BinaryOp::Add, increment))
            })
            .collect()
    }

    fn prologue(&self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        self.comment(
            &mut stmts,
            format!("{} ({})", self.descriptor.name, self.descriptor.title),
        );
        stmts.push(Stmt::constant(names::EPSILON, Expr::number(self.ctx.epsilon())));
        stmts.push(Stmt::declare(
            names::TIME,
            LocalType::Real,
            Expr::number(0.0),
        ));
        stmts.push(Stmt::declare(
            names::SUBSTEP,
            LocalType::Real,
            var(names::TIME_INCREMENT),
        ));
        stmts.push(Stmt::constant(
            names::PRECISION,
            controller::precision_init(self.ctx.minimal_time_step()),
        ));
        if self.descriptor.is_embedded() {
            stmts.extend(controller::controller_locals());
        }
        if self.has_block(CodeBlockId::BeforeInitializeLocalVariables) {
            stmts.push(self.required(CodeBlockId::BeforeInitializeLocalVariables));
        }
        stmts.extend(self.ctx.stiffness_update());
        if self.has_block(CodeBlockId::AfterInitializeLocalVariables) {
            stmts.push(self.required(CodeBlockId::AfterInitializeLocalVariables));
        }
        stmts
    }

    /// Calls a block whose failure ends the integration.
    fn required(&self, id: CodeBlockId) -> Stmt {
        Stmt::when(
            fails(id),
            vec![Stmt::fail(FailureKind::Integration, block_failed(id))],
        )
    }

    fn fixed_step(&self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for (index, stage) in self.descriptor.stages.iter().enumerate() {
            self.comment(&mut stmts, format!("stage {}", index + 1));
            stmts.extend(self.stage_inputs(stage));
            if self.has_block(CodeBlockId::ComputeThermodynamicForces) {
                stmts.push(self.required(CodeBlockId::ComputeThermodynamicForces));
            }
            stmts.push(self.required(CodeBlockId::ComputeDerivative));
            if let Some(finite) = self.derivatives_finite() {
                stmts.push(Stmt::when(
                    !finite,
                    vec![Stmt::fail(FailureKind::Divergence, "non-finite derivative")],
                ));
            }
            stmts.extend(self.store_stage(index));
        }
        self.comment(&mut stmts, "final combination");
        stmts.extend(self.commit());
        stmts.extend(self.end_of_substep());
        if self.has_block(CodeBlockId::UpdateAuxiliaryStateVariables) {
            stmts.push(self.required(CodeBlockId::UpdateAuxiliaryStateVariables));
        }
        stmts
    }

    /// `failed = !check; if (!failed) { rest }`
    fn guarded(check: Expr, rest: Vec<Stmt>) -> Vec<Stmt> {
        let mut stmts = vec![Stmt::assign(names::FAILED, !check)];
        if !rest.is_empty() {
            stmts.push(Stmt::when(!var(names::FAILED), rest));
        }
        stmts
    }

    /// One stage of an attempt; failures set `failed` instead of ending
    /// the integration.
    fn attempt_stage(&self, index: usize, stage: &Stage) -> Vec<Stmt> {
        let mut tail = self.store_stage(index);
        if let Some(finite) = self.derivatives_finite() {
            tail = Self::guarded(finite, tail);
        }
        tail = Self::guarded(Expr::invoke(CodeBlockId::ComputeDerivative), tail);
        if self.has_block(CodeBlockId::ComputeThermodynamicForces) {
            tail = Self::guarded(Expr::invoke(CodeBlockId::ComputeThermodynamicForces), tail);
        }
        let mut body = Vec::new();
        self.comment(&mut body, format!("stage {}", index + 1));
        body.extend(self.stage_inputs(stage));
        body.extend(tail);
        body
    }

    /// Forces at the final combination; the last-stage forces are kept
    /// for the residual.
    fn castem_second_estimate(&self) -> CompileResult<Vec<Stmt>> {
        let (force, saved) = self.castem_force()?;
        let mut stmts = Vec::new();
        self.comment(&mut stmts, "forces at the final combination");
        stmts.push(Stmt::assign(saved, var(&force.name)));
        stmts.extend(self.estimates(self.descriptor.final_weights));
        // drivers of the last stage
        stmts.extend(interpolation_stmts(&self.drivers, &stage_fraction(Rational::ONE)));
        stmts.extend(self.ctx.stiffness_refresh());
        stmts.push(Stmt::assign(
            names::FAILED,
            fails(CodeBlockId::ComputeThermodynamicForces),
        ));
        Ok(stmts)
    }

    fn castem_force(&self) -> CompileResult<(&'m Variable, String)> {
        self.ctx.castem_force().ok_or_else(|| {
            CompileError::internal(Span::zero(0), "rkCastem without a thermodynamic force")
        })
    }

    fn error_evaluation(&self) -> CompileResult<Vec<Stmt>> {
        match self.descriptor.error {
            ErrorEstimate::None => Ok(Vec::new()),
            ErrorEstimate::StateVector { weights, .. } => {
                let contributions: Vec<ErrorContribution> = self
                    .states
                    .iter()
                    .filter_map(|state| {
                        self.combination(&state.name, weights)
                            .map(|combination| ErrorContribution {
                                combination,
                                normalization: state
                                    .error_normalization_factor
                                    .as_ref()
                                    .map(normalization_expr),
                            })
                    })
                    .collect();
                Ok(error_stmts(
                    self.ctx.strategy,
                    &contributions,
                    self.ctx.state_dimension(),
                ))
            }
            ErrorEstimate::ThermodynamicForces => {
                let (force, saved) = self.castem_force()?;
                let normalization = self.ctx.stress_normalization().ok_or_else(|| {
                    CompileError::internal(Span::zero(0), "no stress normalization factor")
                })?;
                let residual =
                    Expr::call(Builtin::SigmaEq, vec![var(&saved) - var(&force.name)]);
                Ok(vec![Stmt::assign(names::ERROR, residual / normalization)])
            }
        }
    }

    fn adaptive_loop(&self) -> CompileResult<Vec<Stmt>> {
        let law = CorrectorLaw::for_estimate(&self.descriptor.error).ok_or_else(|| {
            CompileError::internal(Span::zero(0), "adaptive loop for a fixed-step scheme")
        })?;

        let mut attempt = vec![Stmt::assign(names::FAILED, Expr::Bool(false))];
        for (index, stage) in self.descriptor.stages.iter().enumerate() {
            let stage_stmts = self.attempt_stage(index, stage);
            if index == 0 {
                attempt.extend(stage_stmts);
            } else {
                attempt.push(Stmt::when(!var(names::FAILED), stage_stmts));
            }
        }
        if self.ctx.castem_force().is_some() {
            attempt.push(Stmt::when(
                !var(names::FAILED),
                self.castem_second_estimate()?,
            ));
        }

        let mut accepted = Vec::new();
        self.comment(&mut accepted, "sub-step accepted");
        accepted.extend(self.commit());
        accepted.extend(self.end_of_substep());
        if self.has_block(CodeBlockId::UpdateAuxiliaryStateVariables) {
            accepted.push(self.required(CodeBlockId::UpdateAuxiliaryStateVariables));
        }
        accepted.extend(controller::advance_stmts());

        let mut evaluated = self.error_evaluation()?;
        evaluated.push(Stmt::when(
            !Expr::call(Builtin::IsFinite, vec![var(names::ERROR)]),
            vec![Stmt::fail(
                FailureKind::Divergence,
                "non-finite error estimate",
            )],
        ));
        evaluated.push(Stmt::when(
            var(names::ERROR).lt(var(names::EPSILON)),
            accepted,
        ));
        evaluated.push(Stmt::when(
            !var(names::CONVERGED),
            controller::rescale_stmts(law),
        ));

        attempt.push(Stmt::If {
            cond: var(names::FAILED),
            then_block: controller::stage_failure_stmts(),
            else_block: evaluated,
        });

        Ok(vec![Stmt::While {
            cond: !var(names::CONVERGED),
            body: attempt,
        }])
    }

    /// Thermodynamic forces at the end of the step.
    fn final_forces(&self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        if self.has_block(CodeBlockId::ComputeFinalThermodynamicForces) {
            self.comment(&mut stmts, "final thermodynamic forces");
            stmts.push(self.required(CodeBlockId::ComputeFinalThermodynamicForces));
        } else if self.has_block(CodeBlockId::ComputeThermodynamicForces) {
            self.comment(&mut stmts, "final thermodynamic forces");
            stmts.extend(interpolation_stmts(&self.drivers, &end_of_step()));
            stmts.extend(
                self.states
                    .iter()
                    .map(|state| Stmt::assign(current_value_name(&state.name), var(&state.name))),
            );
            stmts.extend(self.ctx.stiffness_refresh());
            stmts.push(self.required(CodeBlockId::ComputeThermodynamicForces));
        }
        stmts
    }
}
