use std::sync::Arc;

use study_sdk::{ProblemType, QuotaName, QuotaUnit};

use super::*;

struct FixedQuota(QuotaPolicy);

impl ProblemQuotaProcessor for FixedQuota {
    fn quota_policy(&self) -> QuotaPolicy {
        self.0
    }
}

fn registry() -> ProcessorRegistry {
    let policy = QuotaPolicy {
        size_unit: QuotaUnit::Persistent,
        size_limit: 5,
        update_unit: QuotaUnit::Day,
        update_limit: 20,
    };
    ProcessorRegistry::new().register(
        ProblemType::EnglishPhrase,
        ProcessorSet {
            quota: Some(Arc::new(FixedQuota(policy))),
            ..ProcessorSet::default()
        },
    )
}

#[test]
fn resolves_registered_roles() {
    let registry = registry();
    let policy = registry
        .quota_processor(ProblemType::EnglishPhrase)
        .unwrap()
        .quota_policy();
    assert_eq!(policy.for_name(QuotaName::Size), (QuotaUnit::Persistent, 5));
    assert_eq!(policy.for_name(QuotaName::Update), (QuotaUnit::Day, 20));
}

#[test]
fn missing_role_is_a_configuration_error() {
    let registry = registry();
    let err = registry
        .import_processor(ProblemType::EnglishPhrase)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        DomainError::ProcessorNotFound {
            problem_type: ProblemType::EnglishPhrase,
            role: "import"
        }
    ));

    let err = registry
        .add_processor(ProblemType::EnglishWord)
        .err()
        .unwrap();
    assert!(matches!(err, DomainError::ProcessorNotFound { role: "add", .. }));
}

#[test]
fn unregistered_types_are_rejected_up_front() {
    let registry = registry();
    assert!(registry.ensure_registered(ProblemType::EnglishPhrase).is_ok());
    assert!(matches!(
        registry.ensure_registered(ProblemType::EnglishSentence),
        Err(DomainError::Validation { .. })
    ));
}

#[test]
fn parameters_ignore_blank_values() {
    let param = ProblemAddParameter::new(uuid::Uuid::nil())
        .with_property("text", "  book ")
        .with_property("translated", "   ");
    assert_eq!(param.property("text"), Some("book"));
    assert_eq!(param.property("translated"), None);
    assert_eq!(param.property("pos"), None);
}
