use super::*;
use crate::model::ErrorKind;
use std::path::PathBuf;

const NORTON: &str = r#"@DSL RungeKutta;
@Behaviour Norton;
@Author Jane Doe;
@Algorithm rk42;
@ModellingHypotheses {Tridimensional, PlaneStrain};
@MaterialProperty stress young;
@MaterialProperty real nu;
@Parameter A = 8.e-67;
@Parameter E = 8.2;
@StateVariable strain p;
@StateVariable StrainStensor evp;
p.setErrorNormalisationFactor(1.e-3);
@ComputeStiffnessTensor {young, nu};
@ComputeStress { sig = D * (eto - evp); }
@Derivative {
    const real seq = sigmaeq(sig);
    dp = A * pow(seq, E);
    devp = 1.5 * dp * deviator(sig) / max(seq, 1.e-12);
}
"#;

fn sources(files: &[(&str, &str)]) -> SourceMap {
    let mut sources = SourceMap::new();
    for (path, source) in files {
        sources.add_file(PathBuf::from(path), source.to_string());
    }
    sources
}

#[test]
fn test_compile_generates_every_hypothesis() {
    let sources = sources(&[("norton.mfront", NORTON)]);
    let compiled = compile(&sources, &CompilerOptions::default()).unwrap();
    assert_eq!(compiled.len(), 1);
    let norton = &compiled[0];
    assert_eq!(norton.name(), "Norton");
    assert_eq!(norton.routines.len(), 2);
    assert!(norton.routine(ModellingHypothesis::PlaneStrain).is_some());
    assert!(norton.routine(ModellingHypothesis::Tridimensional).is_some());
    for source in norton.sources().values() {
        assert!(source.contains("IntegrationResult integrate() {"));
        assert!(source.contains("error += tensile::sum_abs("));
        // p carries its own normalization factor
        assert!(source.contains(") / 0.001;"));
    }
}

#[test]
fn test_routines_serialize_to_json() {
    let sources = sources(&[("norton.mfront", NORTON)]);
    let compiled = compile(&sources, &CompilerOptions::default()).unwrap();
    let json = compiled[0].routines_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let routine = &value["Tridimensional"];
    assert_eq!(routine["behaviour"], "Norton");
    assert_eq!(routine["algorithm"], "RungeKutta42");
}

#[test]
fn test_failing_files_do_not_stop_others() {
    let sources = sources(&[
        ("bad.mfront", "@Algorithm rk45;\n"),
        ("norton.mfront", NORTON),
        ("worse.mfront", "@Epsilon 1.e-8;\n@Epsilon 1.e-6;\n"),
    ]);
    let errors = compile(&sources, &CompilerOptions::default()).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].kind, ErrorKind::UnknownAlgorithm);
    assert_eq!(errors[1].kind, ErrorKind::DuplicateAttribute);

    let text = format_errors(&errors, &sources);
    assert!(text.contains("unknown algorithm 'rk45'"), "{}", text);
    assert!(text.contains("--> bad.mfront:1:"), "{}", text);
    assert!(text.contains("--> worse.mfront:2:"), "{}", text);
}

#[test]
fn test_hypothesis_filter() {
    let sources = sources(&[("norton.mfront", NORTON)]);
    let options =
        CompilerOptions::default().with_hypotheses(vec![ModellingHypothesis::PlaneStrain]);
    let compiled = compile(&sources, &options).unwrap();
    assert_eq!(compiled[0].routines.len(), 1);
    assert!(compiled[0]
        .routine(ModellingHypothesis::PlaneStrain)
        .is_some());

    let options =
        CompilerOptions::default().with_hypotheses(vec![ModellingHypothesis::Axisymmetrical]);
    let errors = compile(&sources, &options).unwrap_err();
    assert_eq!(errors[0].kind, ErrorKind::UnsupportedHypothesis);
}
