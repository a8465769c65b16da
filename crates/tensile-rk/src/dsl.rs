//! Behaviour description reader.
//!
//! [`BehaviourReader`] walks the token stream statement by statement. A
//! statement is either an `@Keyword`, looked up in the [`KeywordTable`], or a
//! method call on a declared variable (`p.setErrorNormalisationFactor(1e-3);`).
//! The first configuration error stops reading. Once every statement has been
//! read, [`BehaviourReader::read`] checks the cross-statement constraints and
//! applies the defaults.

use crate::algorithm::Algorithm;
use crate::ir::names;
use crate::keywords::{KeywordHandler, KeywordTable};
use crate::options::CompilerOptions;
use std::ops::Range;
use tensile_lexer::Token;
use tensile_model::foundation::Span;
use tensile_model::{
    BehaviourModel, BehaviourType, CodeBlock, CodeBlockId, CompileError, CompileResult, ErrorKind,
    Evolution, ModellingHypothesis, NormalizationFactor, StiffnessDefinition, Variable,
    VariableCategory, VariableType,
};
use tensile_parser::stmt::parse_block_body;
use tensile_parser::values::{
    read_identifier, read_real, read_text_until_semicolon, read_variable_declaration, read_word,
    read_word_list,
};
use tensile_parser::TokenStream;
use tracing::{debug, info, warn};

/// Values accepted by `@DSL`.
pub const DSL_NAMES: [&str; 3] = ["RungeKutta", "RungeKuttaFiniteStrain", "RungeKuttaGeneric"];

/// Methods setting the error normalization factor of a state variable.
const NORMALIZATION_METHODS: [&str; 2] =
    ["setErrorNormalisationFactor", "setErrorNormalizationFactor"];

const CASTEM: Algorithm = Algorithm::RungeKuttaCastem;

/// Reads one behaviour description into a [`BehaviourModel`].
pub struct BehaviourReader<'a> {
    options: &'a CompilerOptions,
    table: &'a KeywordTable,
    source: &'a str,
    file_id: u16,
    model: BehaviourModel,
    /// Statements read so far
    statements: usize,
}

impl<'a> BehaviourReader<'a> {
    /// Creates a reader for a strain-based behaviour; `@DSL` may change the
    /// behaviour type on the first statement.
    pub fn new(
        options: &'a CompilerOptions,
        table: &'a KeywordTable,
        source: &'a str,
        file_id: u16,
    ) -> CompileResult<Self> {
        Ok(Self {
            options,
            table,
            source,
            file_id,
            model: predeclared_model(BehaviourType::StrainBased, file_id)?,
            statements: 0,
        })
    }

    /// Reads every statement, then validates the behaviour as a whole.
    pub fn read(mut self, tokens: &[(Token, Range<usize>)]) -> CompileResult<BehaviourModel> {
        let mut stream = TokenStream::new(tokens, self.file_id);
        while !stream.at_end() {
            self.read_statement(&mut stream)?;
            self.statements += 1;
        }
        self.end_of_parsing()?;
        Ok(self.model)
    }

    /// The model as read so far.
    pub fn model(&self) -> &BehaviourModel {
        &self.model
    }

    fn read_statement(&mut self, stream: &mut TokenStream) -> CompileResult<()> {
        let span = stream.current_span();
        match stream.peek() {
            Some(Token::Keyword(keyword)) => {
                stream.advance();
                let Some(handler) = self.table.get(keyword) else {
                    return Err(CompileError::new(
                        ErrorKind::UnknownKeyword,
                        span,
                        format!("unknown keyword '@{}'", keyword),
                    ));
                };
                debug!(keyword = %keyword, handler = ?handler, "reading keyword");
                match handler {
                    KeywordHandler::Statement(handler) => handler(self, stream, span),
                    KeywordHandler::Declaration(category) => {
                        self.read_declaration(category, stream, span)
                    }
                    KeywordHandler::CodeBlock(id) => self.read_code_block(id, stream, span),
                    KeywordHandler::Disabled(reason) => Err(CompileError::new(
                        ErrorKind::DisabledKeyword,
                        span,
                        format!("keyword '@{}' is not available: {}", keyword, reason),
                    )),
                }
            }
            Some(Token::Ident(_)) => self.read_method_call(stream),
            other => Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                match other {
                    Some(token) => format!("unexpected '{}' where a keyword was expected", token),
                    None => "unexpected end of input where a keyword was expected".to_string(),
                },
            )),
        }
    }

    fn read_declaration(
        &mut self,
        category: VariableCategory,
        stream: &mut TokenStream,
        span: Span,
    ) -> CompileResult<()> {
        if matches!(
            category,
            VariableCategory::Gradient | VariableCategory::ThermodynamicForce
        ) && self.model.behaviour_type != BehaviourType::General
        {
            return Err(CompileError::new(
                ErrorKind::DisabledKeyword,
                span,
                format!(
                    "{}s are predeclared by {} behaviours",
                    category.description(),
                    self.model.behaviour_type.description()
                ),
            )
            .with_note("use '@DSL RungeKuttaGeneric;' to declare them"));
        }

        let declaration = read_variable_declaration(stream)?;
        let var_type = VariableType::from_type_name(&declaration.type_name).ok_or_else(|| {
            CompileError::new(
                ErrorKind::UnknownType,
                declaration.span,
                format!("unknown type '{}'", declaration.type_name),
            )
        })?;

        let needs_value = matches!(
            category,
            VariableCategory::Parameter | VariableCategory::StaticVariable
        );
        match (&declaration.initial_value, needs_value) {
            (Some(_), false) => {
                return Err(CompileError::new(
                    ErrorKind::InvalidValue,
                    declaration.span,
                    format!(
                        "a {} cannot be given a value in its declaration",
                        category.description()
                    ),
                ))
            }
            (None, true) => {
                return Err(CompileError::new(
                    ErrorKind::InvalidValue,
                    declaration.span,
                    format!("a {} needs a value", category.description()),
                ))
            }
            _ => {}
        }
        if needs_value && !var_type.is_scalar() {
            return Err(CompileError::new(
                ErrorKind::InvalidValue,
                declaration.span,
                format!("a {} must be scalar", category.description()),
            ));
        }

        for declared in &declaration.names {
            check_not_reserved(&declared.name, declared.span)?;
            let mut variable = Variable::new(
                declared.name.clone(),
                declaration.type_name.clone(),
                var_type,
                category,
                declared.span,
            )
            .with_array_size(declared.array_size);
            if let Some(values) = &declaration.initial_value {
                let values = match values.len() {
                    1 => vec![values[0]; declared.array_size],
                    n if n == declared.array_size => values.clone(),
                    n => {
                        return Err(CompileError::new(
                            ErrorKind::InvalidValue,
                            declared.span,
                            format!(
                                "'{}' has {} elements but {} values were given",
                                declared.name, declared.array_size, n
                            ),
                        ))
                    }
                };
                variable = variable.with_default(values);
            }
            self.model.data_mut().add_variable(variable)?;
        }
        Ok(())
    }

    fn read_code_block(
        &mut self,
        id: CodeBlockId,
        stream: &mut TokenStream,
        span: Span,
    ) -> CompileResult<()> {
        let body = parse_block_body(stream)?;
        let range = stream.byte_range(body.tokens.start, body.tokens.end);
        let text = self.source.get(range).unwrap_or_default().trim();
        let block = CodeBlock::new(id, text, body.stmts, span.merge(&body.span));
        self.model.data_mut().add_code_block(block)
    }

    /// `name.method(value);`
    fn read_method_call(&mut self, stream: &mut TokenStream) -> CompileResult<()> {
        let start = stream.current_pos();
        let mut path = vec![read_identifier(stream, "a variable name")?];
        while stream.eat(&Token::Dot) {
            path.push(read_identifier(stream, "a member name")?);
        }
        let span = stream.span_from(start);
        let dotted = path
            .iter()
            .map(|(segment, _)| segment.as_str())
            .collect::<Vec<_>>()
            .join(".");

        if path.len() > 2 {
            return Err(CompileError::new(
                ErrorKind::UnsupportedNesting,
                span,
                format!("'{}': only one level of member access is supported", dotted),
            ));
        }
        let [(target, target_span), (method, method_span)] = path.as_slice() else {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                span,
                format!("unexpected '{}' where a keyword was expected", dotted),
            ));
        };
        if !NORMALIZATION_METHODS.contains(&method.as_str()) {
            return Err(CompileError::new(
                ErrorKind::Syntax,
                *method_span,
                format!("unknown method '{}'", method),
            )
            .with_note("state variables support 'setErrorNormalisationFactor'"));
        }

        stream.expect(Token::LParen)?;
        let factor = self.read_normalization_factor(stream)?;
        stream.expect(Token::RParen)?;
        stream.expect(Token::Semicolon)?;

        let variable = self
            .model
            .data_mut()
            .variable_mut(target)
            .ok_or_else(|| undefined(target, *target_span))?;
        if variable.category != VariableCategory::IntegrationVariable {
            return Err(CompileError::new(
                ErrorKind::InvalidNormalizationFactor,
                *target_span,
                format!(
                    "'{}' is a {}; error normalization factors apply to state variables only",
                    target,
                    variable.category.description()
                ),
            ));
        }
        if variable.error_normalization_factor.is_some() {
            return Err(CompileError::new(
                ErrorKind::DuplicateAttribute,
                span,
                format!("the error normalization factor of '{}' is already set", target),
            ));
        }
        variable.error_normalization_factor = Some(factor);
        Ok(())
    }

    /// A non-negative literal, or the name of a scalar material property,
    /// parameter or static variable.
    fn read_normalization_factor(
        &self,
        stream: &mut TokenStream,
    ) -> CompileResult<NormalizationFactor> {
        if let Some(Token::Ident(_)) = stream.peek() {
            let (name, span) = read_identifier(stream, "a normalization factor")?;
            let variable = self
                .model
                .data()
                .variable(&name)
                .ok_or_else(|| undefined(&name, span))?;
            let admissible = matches!(
                variable.category,
                VariableCategory::MaterialProperty
                    | VariableCategory::Parameter
                    | VariableCategory::StaticVariable
            );
            if !admissible || !variable.is_scalar() {
                return Err(CompileError::new(
                    ErrorKind::InvalidNormalizationFactor,
                    span,
                    format!(
                        "'{}' must be a scalar material property, parameter or static variable",
                        name
                    ),
                ));
            }
            return Ok(NormalizationFactor::Variable(name));
        }
        let (value, span) = read_real(stream)?;
        if value < 0.0 {
            return Err(CompileError::new(
                ErrorKind::InvalidNormalizationFactor,
                span,
                "normalization factor must be positive",
            ));
        }
        Ok(NormalizationFactor::Literal(value))
    }

    fn end_span(&self) -> Span {
        let end = self.source.len() as u32;
        Span::new(self.file_id, end, end, 0)
    }

    fn end_of_parsing(&mut self) -> CompileResult<()> {
        let end = self.end_span();
        let algorithm = match self.model.attributes.algorithm() {
            Some(name) => Algorithm::from_name(name).ok_or_else(|| {
                CompileError::internal(end, format!("unregistered algorithm '{}'", name))
            })?,
            None => {
                let algorithm = self.options.default_algorithm;
                info!(algorithm = %algorithm, "no @Algorithm given, using the default");
                self.model.attributes.set_algorithm(algorithm.name());
                algorithm
            }
        };

        if algorithm == CASTEM && self.model.behaviour_type == BehaviourType::General {
            return Err(CompileError::new(
                ErrorKind::AlgorithmMismatch,
                end,
                "the rkCastem algorithm requires a strain-based or finite-strain behaviour",
            ));
        }
        if algorithm != CASTEM
            && self
                .model
                .attributes
                .stress_error_normalization_factor()
                .is_some()
        {
            return Err(CompileError::new(
                ErrorKind::AlgorithmMismatch,
                end,
                "a stress error normalization factor is only meaningful for the rkCastem algorithm",
            ));
        }

        let data = self.model.data();
        if algorithm == CASTEM {
            if !data.has_code_block(CodeBlockId::ComputeThermodynamicForces) {
                return Err(CompileError::new(
                    ErrorKind::MissingCodeBlock,
                    end,
                    "the rkCastem algorithm requires a @ComputeStress block",
                ));
            }
            let stress_like = data
                .thermodynamic_forces()
                .next()
                .is_some_and(|force| force.var_type == VariableType::Stensor);
            if !stress_like {
                return Err(CompileError::new(
                    ErrorKind::AlgorithmMismatch,
                    end,
                    "the rkCastem algorithm requires a symmetric tensor thermodynamic force",
                ));
            }
            if self
                .model
                .attributes
                .stress_error_normalization_factor()
                .is_none()
                && self.model.stiffness.is_none()
            {
                return Err(CompileError::new(
                    ErrorKind::InvalidNormalizationFactor,
                    end,
                    "the rkCastem algorithm needs a stress error normalization factor",
                )
                .with_note(
                    "use @StressErrorNormalizationFactor or define @ComputeStiffnessTensor",
                ));
            }
        }

        if !data.has_code_block(CodeBlockId::ComputeDerivative) {
            return Err(CompileError::new(
                ErrorKind::MissingCodeBlock,
                end,
                "no @Derivative block defined",
            ));
        }

        if self.model.behaviour_type == BehaviourType::General {
            let gradients: Vec<&Variable> = data.gradients().collect();
            let forces: Vec<&Variable> = data.thermodynamic_forces().collect();
            if gradients.len() != forces.len() {
                return Err(CompileError::new(
                    ErrorKind::GradientForceMismatch,
                    end,
                    format!(
                        "{} gradients but {} thermodynamic forces are declared",
                        gradients.len(),
                        forces.len()
                    ),
                ));
            }
            for (gradient, force) in gradients.iter().zip(&forces) {
                if gradient.array_size != force.array_size {
                    return Err(CompileError::new(
                        ErrorKind::GradientForceMismatch,
                        force.span,
                        format!(
                            "'{}' has {} elements but its gradient '{}' has {}",
                            force.name, force.array_size, gradient.name, gradient.array_size
                        ),
                    )
                    .with_label(gradient.span, "gradient declared here"));
                }
            }
        }

        if data.integration_variables().next().is_none() {
            warn!(behaviour = %self.model.class_name(), "behaviour declares no state variable");
        }
        Ok(())
    }

    fn hypothesis(name: &str, span: Span) -> CompileResult<ModellingHypothesis> {
        let hypothesis: ModellingHypothesis = name
            .parse()
            .map_err(|message: String| {
                CompileError::new(ErrorKind::UnsupportedHypothesis, span, message)
            })?;
        if !hypothesis.is_supported() {
            return Err(CompileError::new(
                ErrorKind::UnsupportedHypothesis,
                span,
                format!(
                    "modelling hypothesis '{}' is not supported by explicit schemes",
                    hypothesis
                ),
            )
            .with_note("plane stress needs the axial strain as an additional unknown"));
        }
        Ok(hypothesis)
    }

    fn request_hypotheses(
        &mut self,
        words: Vec<(String, Span)>,
        span: Span,
    ) -> CompileResult<()> {
        if self.model.has_requested_hypotheses() {
            return Err(CompileError::new(
                ErrorKind::DuplicateAttribute,
                span,
                "the modelling hypotheses have already been specified",
            ));
        }
        for (word, word_span) in words {
            if word == ".+" {
                for hypothesis in ModellingHypothesis::SUPPORTED {
                    self.model.request_hypothesis(hypothesis);
                }
                continue;
            }
            let hypothesis = Self::hypothesis(&word, word_span)?;
            if !self.model.request_hypothesis(hypothesis) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateAttribute,
                    word_span,
                    format!("modelling hypothesis '{}' is listed twice", hypothesis),
                ));
            }
        }
        Ok(())
    }
}

/// Model with the variables every behaviour of `behaviour_type` declares.
fn predeclared_model(behaviour_type: BehaviourType, file_id: u16) -> CompileResult<BehaviourModel> {
    let span = Span::zero(file_id);
    let mut model = BehaviourModel::new(behaviour_type);
    let data = model.data_mut();
    let stress = || {
        Variable::new(
            "sig",
            "StressStensor",
            VariableType::Stensor,
            VariableCategory::ThermodynamicForce,
            span,
        )
    };
    match behaviour_type {
        BehaviourType::StrainBased => {
            data.add_variable(Variable::new(
                "eto",
                "StrainStensor",
                VariableType::Stensor,
                VariableCategory::Gradient,
                span,
            ))?;
            data.add_variable(stress())?;
        }
        BehaviourType::FiniteStrain => {
            data.add_variable(
                Variable::new(
                    "F",
                    "DeformationGradientTensor",
                    VariableType::Tensor,
                    VariableCategory::Gradient,
                    span,
                )
                .with_evolution(Evolution::BeginEnd),
            )?;
            data.add_variable(stress())?;
        }
        BehaviourType::General => {}
    }
    data.add_variable(Variable::new(
        "T",
        "temperature",
        VariableType::Scalar,
        VariableCategory::ExternalStateVariable,
        span,
    ))?;
    Ok(model)
}

fn check_not_reserved(name: &str, span: Span) -> CompileResult<()> {
    if names::RESERVED.contains(&name) {
        return Err(CompileError::new(
            ErrorKind::ReservedName,
            span,
            format!("'{}' is reserved by the generated integration routine", name),
        ));
    }
    Ok(())
}

fn undefined(name: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorKind::UndefinedName,
        span,
        format!("'{}' is not declared", name),
    )
}

fn duplicate(what: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorKind::DuplicateAttribute,
        span,
        format!("{} has already been specified", what),
    )
}

/// Reads a value which must be present, parsable and non-negative.
fn read_positive_value(stream: &mut TokenStream, what: &str) -> CompileResult<f64> {
    let (value, span) = read_real(stream).map_err(|err| {
        CompileError::new(
            ErrorKind::InvalidValue,
            err.span,
            format!("could not read the {} value", what),
        )
    })?;
    stream.expect(Token::Semicolon)?;
    if value < 0.0 {
        return Err(CompileError::new(
            ErrorKind::InvalidValue,
            span,
            format!("{} value must be positive", what),
        ));
    }
    Ok(value)
}

fn set_text(slot: &mut Option<String>, value: String, what: &str, span: Span) -> CompileResult<()> {
    if slot.is_some() {
        return Err(duplicate(what, span));
    }
    *slot = Some(value);
    Ok(())
}

pub(crate) fn read_dsl(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    if reader.statements != 0 {
        return Err(CompileError::new(
            ErrorKind::Syntax,
            span,
            "'@DSL' must be the first statement",
        ));
    }
    let (name, name_span) = read_identifier(stream, "a DSL name")?;
    stream.expect(Token::Semicolon)?;
    let behaviour_type = match name.as_str() {
        "RungeKutta" => BehaviourType::StrainBased,
        "RungeKuttaFiniteStrain" => BehaviourType::FiniteStrain,
        "RungeKuttaGeneric" => BehaviourType::General,
        _ => {
            return Err(CompileError::new(
                ErrorKind::InvalidValue,
                name_span,
                format!(
                    "unknown DSL '{}'; valid DSLs are: {}",
                    name,
                    DSL_NAMES.join(", ")
                ),
            ))
        }
    };
    reader.model = predeclared_model(behaviour_type, reader.file_id)?;
    Ok(())
}

pub(crate) fn read_behaviour_name(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    let (name, _) = read_identifier(stream, "a behaviour name")?;
    stream.expect(Token::Semicolon)?;
    set_text(&mut reader.model.name, name, "the behaviour name", span)
}

pub(crate) fn read_material(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    let (name, _) = read_identifier(stream, "a material name")?;
    stream.expect(Token::Semicolon)?;
    set_text(&mut reader.model.material, name, "the material name", span)
}

pub(crate) fn read_author(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    let author = read_text_until_semicolon(stream)?;
    set_text(&mut reader.model.author, author, "the author", span)
}

pub(crate) fn read_date(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    let date = read_text_until_semicolon(stream)?;
    set_text(&mut reader.model.date, date, "the date", span)
}

/// `@Description { free text }`: the text is kept as written.
pub(crate) fn read_description(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    stream.expect(Token::LBrace)?;
    let start = stream.current_pos();
    let mut depth = 1usize;
    loop {
        match stream.peek() {
            Some(Token::LBrace) => depth += 1,
            Some(Token::RBrace) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Some(_) => {}
            None => {
                stream.expect(Token::RBrace)?;
            }
        }
        stream.advance();
    }
    let range = stream.byte_range(start, stream.current_pos());
    stream.expect(Token::RBrace)?;
    let text = reader.source.get(range).unwrap_or_default().trim().to_string();
    set_text(&mut reader.model.description, text, "the description", span)
}

pub(crate) fn read_hypothesis(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    let word = read_word(stream, "a modelling hypothesis")?;
    stream.expect(Token::Semicolon)?;
    reader.request_hypotheses(vec![word], span)
}

pub(crate) fn read_hypotheses(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    let words = read_word_list(stream, "a modelling hypothesis")?;
    stream.expect(Token::Semicolon)?;
    reader.request_hypotheses(words, span)
}

pub(crate) fn read_algorithm(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    if reader.model.attributes.algorithm().is_some() {
        return Err(duplicate("the algorithm", span));
    }
    let (name, name_span) = read_identifier(stream, "an algorithm name")?;
    stream.expect(Token::Semicolon)?;
    let algorithm = Algorithm::from_name(&name).ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnknownAlgorithm,
            name_span,
            format!(
                "unknown algorithm '{}'; valid algorithms are: {}",
                name,
                crate::algorithm::VALID_ALGORITHMS.join(", ")
            ),
        )
    })?;
    if algorithm == CASTEM && reader.model.behaviour_type == BehaviourType::General {
        return Err(CompileError::new(
            ErrorKind::AlgorithmMismatch,
            name_span,
            format!(
                "the rkCastem algorithm is not available for {} behaviours",
                reader.model.behaviour_type.description()
            ),
        )
        .with_note("rkCastem requires a strain-based or finite-strain behaviour"));
    }
    if algorithm != CASTEM
        && reader
            .model
            .attributes
            .stress_error_normalization_factor()
            .is_some()
    {
        return Err(CompileError::new(
            ErrorKind::AlgorithmMismatch,
            name_span,
            "a stress error normalization factor is only meaningful for the rkCastem algorithm",
        ));
    }
    reader.model.attributes.set_algorithm(algorithm.name());
    Ok(())
}

pub(crate) fn read_epsilon(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    if reader.model.attributes.epsilon().is_some() {
        return Err(duplicate("the epsilon value", span));
    }
    let value = read_positive_value(stream, "epsilon")?;
    reader.model.attributes.set_epsilon(value);
    Ok(())
}

pub(crate) fn read_minimal_time_step(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    if reader.model.attributes.minimal_time_step().is_some() {
        return Err(duplicate("the minimal time step", span));
    }
    let value = read_positive_value(stream, "minimal time step")?;
    reader.model.attributes.set_minimal_time_step(value);
    Ok(())
}

pub(crate) fn read_stress_normalization(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    if reader
        .model
        .attributes
        .stress_error_normalization_factor()
        .is_some()
    {
        return Err(duplicate("the stress error normalization factor", span));
    }
    if let Some(name) = reader.model.attributes.algorithm() {
        if name != CASTEM.name() {
            return Err(CompileError::new(
                ErrorKind::AlgorithmMismatch,
                span,
                format!(
                    "a stress error normalization factor is only meaningful for the rkCastem \
                     algorithm, not '{}'",
                    name
                ),
            ));
        }
    }
    let factor = reader.read_normalization_factor(stream)?;
    stream.expect(Token::Semicolon)?;
    reader
        .model
        .attributes
        .set_stress_error_normalization_factor(factor);
    Ok(())
}

/// `@ComputeStiffnessTensor {E, nu};`
pub(crate) fn read_stiffness_tensor(
    reader: &mut BehaviourReader<'_>,
    stream: &mut TokenStream<'_>,
    span: Span,
) -> CompileResult<()> {
    if reader.model.stiffness.is_some() {
        return Err(duplicate("the stiffness tensor", span));
    }
    let words = read_word_list(stream, "a material coefficient")?;
    stream.expect(Token::Semicolon)?;
    let [(young, young_span), (poisson, poisson_span)] = words.as_slice() else {
        return Err(CompileError::new(
            ErrorKind::InvalidValue,
            span,
            format!(
                "'@ComputeStiffnessTensor' expects the Young modulus and the Poisson ratio, \
                 {} names given",
                words.len()
            ),
        ));
    };
    for (name, name_span) in [(young, *young_span), (poisson, *poisson_span)] {
        let variable = reader
            .model
            .data()
            .variable(name)
            .ok_or_else(|| undefined(name, name_span))?;
        let admissible = matches!(
            variable.category,
            VariableCategory::MaterialProperty
                | VariableCategory::Parameter
                | VariableCategory::StaticVariable
                | VariableCategory::ExternalStateVariable
        );
        if !admissible || !variable.is_scalar() {
            return Err(CompileError::new(
                ErrorKind::InvalidValue,
                name_span,
                format!(
                    "'{}' must be a scalar material property, parameter, static variable \
                     or external state variable",
                    name
                ),
            ));
        }
    }
    reader.model.stiffness = Some(StiffnessDefinition {
        young_modulus: young.clone(),
        poisson_ratio: poisson.clone(),
        span,
    });
    Ok(())
}
