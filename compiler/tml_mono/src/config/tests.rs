use super::*;
use pretty_assertions::assert_eq;

fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
    }
}

#[test]
fn defaults_without_environment() {
    assert_eq!(CodegenConfig::from_lookup(|_| None), CodegenConfig::default());
    assert_eq!(CodegenConfig::default().max_instantiation_rounds, 100);
}

#[test]
fn environment_overrides() {
    let config = CodegenConfig::from_lookup(lookup(&[
        ("TML_MAX_INSTANTIATION_ROUNDS", "7"),
        ("TML_STRICT_GENERICS", "TRUE"),
        ("TML_COVERAGE", "1"),
    ]));
    assert_eq!(config.max_instantiation_rounds, 7);
    assert!(config.strict_generics);
    assert!(config.coverage);
}

#[test]
fn invalid_round_limit_is_ignored() {
    let config = CodegenConfig::from_lookup(lookup(&[
        ("TML_MAX_INSTANTIATION_ROUNDS", "0"),
        ("TML_COVERAGE", "off"),
    ]));
    assert_eq!(config.max_instantiation_rounds, MAX_INSTANTIATION_ROUNDS);
    assert!(!config.coverage);
}
