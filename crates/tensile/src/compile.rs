use crate::model::{
    BehaviourModel, CompileError, CompileResult, DiagnosticFormatter, ModellingHypothesis,
    SourceMap,
};
use crate::rk::{
    generate_routine, read_behaviour, render, selected_hypotheses, CompilerOptions,
    IntegrationRoutine, KeywordTable,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

/// A behaviour with its integration routine for every selected hypothesis.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledBehaviour {
    pub model: BehaviourModel,
    pub routines: IndexMap<ModellingHypothesis, IntegrationRoutine>,
}

impl CompiledBehaviour {
    pub fn name(&self) -> String {
        self.model.class_name()
    }

    pub fn routine(&self, hypothesis: ModellingHypothesis) -> Option<&IntegrationRoutine> {
        self.routines.get(&hypothesis)
    }

    /// Generated source of every routine.
    pub fn sources(&self) -> IndexMap<ModellingHypothesis, String> {
        self.routines
            .iter()
            .map(|(hypothesis, routine)| (*hypothesis, render(routine)))
            .collect()
    }

    /// Routines as pretty-printed JSON.
    pub fn routines_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.routines)
    }
}

/// Compiles the behaviour held by file `file_id` of `sources`.
///
/// The first configuration error stops the compilation of the behaviour.
pub fn compile_source(
    sources: &SourceMap,
    file_id: u16,
    options: &CompilerOptions,
    table: &KeywordTable,
) -> CompileResult<CompiledBehaviour> {
    let file = sources.file_by_id(file_id).ok_or_else(|| {
        CompileError::internal(
            crate::model::Span::zero(file_id),
            format!("no source file with id {}", file_id),
        )
    })?;
    let model = read_behaviour(&file.source, file_id, options, table)?;
    let mut routines = IndexMap::new();
    for hypothesis in selected_hypotheses(&model, options) {
        routines.insert(hypothesis, generate_routine(&model, hypothesis, options)?);
    }
    info!(
        behaviour = %model.class_name(),
        path = %file.path.display(),
        routines = routines.len(),
        "behaviour compiled"
    );
    Ok(CompiledBehaviour { model, routines })
}

/// Compiles every file of `sources`, one behaviour per file.
///
/// Behaviours are compiled independently: a failing file does not stop the
/// others, and every failure is reported.
///
/// # Errors
/// Returns the first error of every failing file, in file order.
pub fn compile(
    sources: &SourceMap,
    options: &CompilerOptions,
) -> Result<Vec<CompiledBehaviour>, Vec<CompileError>> {
    let table = KeywordTable::new();
    let mut compiled = Vec::new();
    let mut errors = Vec::new();
    for (file_id, _) in sources.files() {
        match compile_source(sources, file_id, options, &table) {
            Ok(behaviour) => compiled.push(behaviour),
            Err(error) => errors.push(error),
        }
    }
    if errors.is_empty() {
        Ok(compiled)
    } else {
        Err(errors)
    }
}

/// Formats compilation errors with source context.
pub fn format_errors(errors: &[CompileError], sources: &SourceMap) -> String {
    let formatter = DiagnosticFormatter::new(sources);
    formatter.format_all(errors)
}

#[cfg(test)]
mod tests;
