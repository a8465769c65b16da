//! Declaration completion.
//!
//! After reading, every selected hypothesis receives a specialised copy of
//! the behaviour data holding the locals the generated routine works on:
//!
//! - `dX`, `X_` and the stage buffers `dX_K1..n` of each state variable
//! - `v_` for driving variables the stage blocks read
//! - `{force}_rk` for the rkCastem residual, `D` for `@ComputeStiffnessTensor`
//!
//! References of the stage blocks are redirected to the current-value
//! buffers, and a generated block initialises those buffers.

use crate::algorithm::Algorithm;
use crate::interpolate::storage_names;
use crate::ir::names;
use crate::options::CompilerOptions;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tensile_model::block::{self, rename_references};
use tensile_model::variable::{current_value_name, increment_name, stage_buffer_name};
use tensile_model::{
    BehaviourData, BehaviourModel, CodeBlock, CodeBlockId, CompileError, CompileResult, ErrorKind,
    ModellingHypothesis, Span, Variable, VariableCategory, VariableType,
};
use tracing::info;

/// Suffix of the saved last-stage thermodynamic force of rkCastem.
pub const CASTEM_FORCE_SUFFIX: &str = "_rk";

/// Blocks whose references point at current-value buffers.
const STAGE_BLOCKS: [CodeBlockId; 3] = [
    CodeBlockId::ComputeDerivative,
    CodeBlockId::ComputeThermodynamicForces,
    CodeBlockId::UpdateAuxiliaryStateVariables,
];

/// Name of the saved rkCastem force of `force`.
pub fn castem_force_name(force: &str) -> String {
    format!("{}{}", force, CASTEM_FORCE_SUFFIX)
}

/// Hypotheses a compilation generates routines for.
pub fn selected_hypotheses(
    model: &BehaviourModel,
    options: &CompilerOptions,
) -> Vec<ModellingHypothesis> {
    model
        .hypotheses()
        .into_iter()
        .filter(|hypothesis| options.selects(*hypothesis))
        .collect()
}

pub fn resolved_algorithm(model: &BehaviourModel, span: Span) -> CompileResult<Algorithm> {
    let name = model
        .attributes
        .algorithm()
        .ok_or_else(|| CompileError::internal(span, "no algorithm selected"))?;
    Algorithm::from_name(name)
        .ok_or_else(|| CompileError::internal(span, format!("unregistered algorithm '{}'", name)))
}

/// Driving variables the stage blocks or the stiffness definition read.
fn interpolated_drivers<'m>(model: &'m BehaviourModel) -> Vec<&'m Variable> {
    let data = model.data();
    let mut used: BTreeSet<&str> = BTreeSet::new();
    for id in STAGE_BLOCKS {
        if let Some(block) = data.code_block(id) {
            used.extend(block.members.iter().map(String::as_str));
        }
    }
    if let Some(stiffness) = &model.stiffness {
        used.insert(stiffness.young_modulus.as_str());
        used.insert(stiffness.poisson_ratio.as_str());
    }
    data.variables()
        .filter(|v| v.category.is_driving() && used.contains(v.name.as_str()))
        .collect()
}

fn local(name: String, like: &Variable) -> Variable {
    Variable::new(
        name,
        like.type_name.clone(),
        like.var_type,
        VariableCategory::LocalVariable,
        like.span,
    )
    .with_array_size(like.array_size)
}

/// Every local the generated routine adds, in declaration order.
fn generated_locals(
    model: &BehaviourModel,
    algorithm: Algorithm,
    drivers: &[&Variable],
) -> Vec<Variable> {
    let data = model.data();
    let descriptor = algorithm.descriptor();
    let mut locals = Vec::new();
    for variable in data.integration_variables() {
        locals.push(local(increment_name(&variable.name), variable));
        locals.push(local(current_value_name(&variable.name), variable));
        for stage in 1..=descriptor.derivative_buffers {
            locals.push(local(stage_buffer_name(&variable.name, stage), variable));
        }
    }
    for driver in drivers {
        locals.push(local(current_value_name(&driver.name), driver));
    }
    if algorithm == Algorithm::RungeKuttaCastem {
        if let Some(force) = data.thermodynamic_forces().next() {
            locals.push(local(castem_force_name(&force.name), force));
        }
    }
    if let Some(stiffness) = &model.stiffness {
        locals.push(Variable::new(
            names::STIFFNESS,
            "StiffnessTensor",
            VariableType::StiffnessTensor,
            VariableCategory::LocalVariable,
            stiffness.span,
        ));
    }
    locals
}

fn check_clashes(data: &BehaviourData, generated: &[String]) -> CompileResult<()> {
    for name in generated {
        if let Some(variable) = data.variable(name) {
            return Err(CompileError::new(
                ErrorKind::ReservedName,
                variable.span,
                format!(
                    "'{}' clashes with a variable of the generated integration routine",
                    name
                ),
            ));
        }
    }
    Ok(())
}

/// `X_ = X` for state variables and `v_ = v` (or `v0`) for drivers.
fn buffer_initialization(model: &BehaviourModel, drivers: &[&Variable]) -> CodeBlock {
    let span = Span::zero(0);
    let pairs: Vec<(String, String)> = model
        .data()
        .integration_variables()
        .map(|v| (current_value_name(&v.name), v.name.clone()))
        .chain(
            drivers
                .iter()
                .map(|v| (current_value_name(&v.name), storage_names(v).0)),
        )
        .collect();
    let text = pairs
        .iter()
        .map(|(target, source)| format!("{} = {};", target, source))
        .collect::<Vec<_>>()
        .join("\n");
    let stmts = pairs
        .into_iter()
        .map(|(target, source)| block::Stmt::assign(target, block::Expr::name(source, span), span))
        .collect();
    CodeBlock::new(CodeBlockId::BeforeInitializeLocalVariables, text, stmts, span)
}

/// Specialises the model for every selected hypothesis.
pub fn complete_declarations(
    model: &mut BehaviourModel,
    options: &CompilerOptions,
) -> CompileResult<()> {
    let span = Span::zero(0);
    let algorithm = resolved_algorithm(model, span)?;
    let hypotheses = selected_hypotheses(model, options);
    if hypotheses.is_empty() {
        return Err(CompileError::new(
            ErrorKind::UnsupportedHypothesis,
            span,
            "none of the behaviour's modelling hypotheses is selected",
        ));
    }

    let drivers = interpolated_drivers(model);
    let locals = generated_locals(model, algorithm, &drivers);

    let mut generated: Vec<String> = locals.iter().map(|v| v.name.clone()).collect();
    for variable in model.data().variables().filter(|v| v.category.is_driving()) {
        let (begin, second) = storage_names(variable);
        if begin != variable.name {
            generated.push(begin);
        }
        generated.push(second);
    }
    check_clashes(model.data(), &generated)?;

    // state variables and interpolated drivers, by their current-value name
    let redirected: IndexMap<String, String> = model
        .data()
        .integration_variables()
        .chain(drivers.iter().copied())
        .map(|v| (v.name.clone(), current_value_name(&v.name)))
        .collect();
    let initialization = buffer_initialization(model, &drivers);
    let driver_count = drivers.len();

    for hypothesis in hypotheses {
        let mut data = model.data().clone();
        for variable in &locals {
            data.add_variable(variable.clone())?;
        }
        for id in STAGE_BLOCKS {
            if let Some(block) = data.code_block_mut(id) {
                rename_references(&mut block.stmts, &|name: &str| redirected.get(name).cloned());
            }
        }
        data.add_code_block(initialization.clone())?;
        info!(
            %hypothesis,
            %algorithm,
            locals = locals.len(),
            interpolated = driver_count,
            "declarations completed"
        );
        model.specialise(hypothesis, data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::BehaviourReader;
    use crate::keywords::KeywordTable;
    use tensile_model::block::{ExprKind, Stmt};
    use tensile_parser::tokenize;

    fn finalize(source: &str, options: &CompilerOptions) -> CompileResult<BehaviourModel> {
        let table = KeywordTable::new();
        let tokens = tokenize(source, 0)?;
        let mut model = BehaviourReader::new(options, &table, source, 0)?.read(&tokens)?;
        complete_declarations(&mut model, options)?;
        Ok(model)
    }

    const NORTON: &str = "@Algorithm rk42;\n\
        @ModellingHypothesis Tridimensional;\n\
        @MaterialProperty stress young;\n\
        @MaterialProperty real nu;\n\
        @StateVariable real p;\n\
        @StateVariable StrainStensor evp;\n\
        @ComputeStiffnessTensor {young, nu};\n\
        @ComputeStress { sig = D * (eto - evp); }\n\
        @Derivative { const real seq = sigmaeq(sig); dp = seq; devp = 1.5 * deviator(sig); }\n";

    #[test]
    fn test_generated_locals() {
        let options = CompilerOptions::default();
        let model = finalize(NORTON, &options).unwrap();
        let h = ModellingHypothesis::Tridimensional;
        assert!(model.is_specialised(h));
        let data = model.data_for(h);
        for name in ["dp", "p_", "dp_K1", "dp_K4", "devp_K4", "evp_", "eto_", "D"] {
            assert!(data.has_variable(name), "missing {}", name);
        }
        assert!(!data.has_variable("dp_K5"));
        // temperature is never read
        assert!(!data.has_variable("T_"));
        assert!(!model.data().has_variable("dp"));
    }

    #[test]
    fn test_stage_blocks_read_current_values() {
        let options = CompilerOptions::default();
        let model = finalize(NORTON, &options).unwrap();
        let data = model.data_for(ModellingHypothesis::Tridimensional);
        let forces = data.code_block(CodeBlockId::ComputeThermodynamicForces).unwrap();
        let names = block::referenced_names(&forces.stmts);
        assert!(names.contains("eto_"));
        assert!(names.contains("evp_"));
        assert!(!names.contains("eto"));
        // members keep the names as written
        assert!(forces.references("eto"));

        let derivative = data.code_block(CodeBlockId::ComputeDerivative).unwrap();
        match &derivative.stmts[1] {
            Stmt::Assign { target, value, .. } => {
                assert_eq!(target.name, "dp");
                assert!(matches!(&value.kind, ExprKind::Name(name) if name == "seq"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_buffer_initialization_block() {
        let options = CompilerOptions::default();
        let model = finalize(NORTON, &options).unwrap();
        let data = model.data_for(ModellingHypothesis::Tridimensional);
        let init = data
            .code_block(CodeBlockId::BeforeInitializeLocalVariables)
            .unwrap();
        assert_eq!(init.stmts.len(), 3);
        assert!(init.body_text.contains("p_ = p;"));
        assert!(init.body_text.contains("eto_ = eto;"));
    }

    #[test]
    fn test_generated_name_clash() {
        let options = CompilerOptions::default();
        let err = finalize(
            "@StateVariable real p;\n@LocalVariable real dp_K2;\n@Derivative { dp = 1; }",
            &options,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReservedName);

        let err = finalize(
            "@LocalVariable real deto;\n@StateVariable real p;\n@Derivative { dp = 1; }",
            &options,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReservedName);
    }

    #[test]
    fn test_castem_force_buffer() {
        let options = CompilerOptions::default();
        let source = NORTON.replace("rk42", "rkCastem");
        let model = finalize(&source, &options).unwrap();
        let data = model.data_for(ModellingHypothesis::Tridimensional);
        assert!(data.has_variable("sig_rk"));
        assert!(data.has_variable("dp_K5"));
    }

    #[test]
    fn test_hypothesis_filter() {
        let options =
            CompilerOptions::default().with_hypotheses(vec![ModellingHypothesis::PlaneStrain]);
        let err = finalize(NORTON, &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedHypothesis);

        let model = finalize("@StateVariable real p;\n@Derivative { dp = 1; }", &options).unwrap();
        assert!(model.is_specialised(ModellingHypothesis::PlaneStrain));
        assert!(!model.is_specialised(ModellingHypothesis::Tridimensional));
    }
}
