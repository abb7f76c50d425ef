#[cfg(test)]
mod tests {
    use super::super::*;
    use chrono::Utc;
    use study_sdk::{
        AppUser, Lang2, Problem, ProblemType, Space, SpaceType, StudyRecord, WorkbookPrivilege,
        WorkbookPrivileges,
    };
    use uuid::Uuid;

    use crate::domain::error::DomainError;

    fn workbook_row(problem_type: &str, lang2: &str) -> entity::workbook::Model {
        let now = Utc::now();
        entity::workbook::Model {
            id: Uuid::new_v4(),
            version: 3,
            organization_id: Uuid::new_v4(),
            space_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            problem_type: problem_type.to_owned(),
            name: "verbs".to_owned(),
            lang2: lang2.to_owned(),
            question_text: "translate".to_owned(),
            properties: r#"{"audioEnabled":"true"}"#.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_app_user_row_decodes_json_columns() {
        let row = entity::app_user::Model {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            login_id: "alice".to_owned(),
            username: "Alice".to_owned(),
            roles: r#"["Owner","Student"]"#.to_owned(),
            properties: r#"{"locale":"ja"}"#.to_owned(),
            created_at: Utc::now(),
        };

        let user = AppUser::try_from(row).unwrap();

        assert_eq!(user.login_id, "alice");
        assert!(user.roles.contains("Owner"));
        assert!(user.roles.contains("Student"));
        assert_eq!(user.properties.get("locale").map(String::as_str), Some("ja"));
    }

    #[test]
    fn test_app_user_with_broken_roles_is_a_database_error() {
        let row = entity::app_user::Model {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            login_id: "alice".to_owned(),
            username: "Alice".to_owned(),
            roles: "Owner".to_owned(),
            properties: "{}".to_owned(),
            created_at: Utc::now(),
        };

        let err = AppUser::try_from(row).unwrap_err();
        assert!(matches!(err, DomainError::Database { ref message } if message.contains("roles")));
    }

    #[test]
    fn test_space_type_is_parsed() {
        let row = entity::space::Model {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            space_type: "personal".to_owned(),
            key: "k".to_owned(),
            name: "Personal".to_owned(),
            description: String::new(),
        };
        assert_eq!(Space::try_from(row).unwrap().space_type, SpaceType::Personal);
    }

    #[test]
    fn test_workbook_carries_caller_privileges() {
        let privileges = WorkbookPrivileges::new([WorkbookPrivilege::Read]);
        let workbook =
            mapper::workbook_from_model(workbook_row("english_word", "ja"), privileges).unwrap();

        assert_eq!(workbook.problem_type, ProblemType::EnglishWord);
        assert_eq!(workbook.lang2, Lang2::JA);
        assert_eq!(workbook.version, 3);
        assert!(workbook.audio_enabled());
        assert!(workbook.has_privilege(WorkbookPrivilege::Read));
        assert!(!workbook.has_privilege(WorkbookPrivilege::Update));
    }

    #[test]
    fn test_workbook_with_unknown_problem_type_is_rejected() {
        let err = mapper::workbook_from_model(
            workbook_row("klingon_word", "ja"),
            WorkbookPrivileges::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Database { ref message } if message.contains("problem_type")));
    }

    #[test]
    fn test_problem_properties_are_json_object() {
        let now = Utc::now();
        let row = entity::problem::Model {
            id: Uuid::new_v4(),
            version: 1,
            organization_id: Uuid::new_v4(),
            workbook_id: Uuid::new_v4(),
            problem_type: "english_phrase".to_owned(),
            number: 4,
            properties: r#"{"text":"good morning","translated":"おはよう"}"#.to_owned(),
            created_at: now,
            updated_at: now,
        };

        let problem = Problem::try_from(row).unwrap();
        assert_eq!(problem.number, 4);
        assert_eq!(problem.property_str("text"), Some("good morning"));
        assert_eq!(problem.property_str("missing"), None);
    }

    #[test]
    fn test_study_record_level_is_clamped() {
        let row = entity::study_record::Model {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            app_user_id: Uuid::new_v4(),
            workbook_id: Uuid::new_v4(),
            problem_type: "english_word".to_owned(),
            problem_id: Uuid::new_v4(),
            study_type: "memorization".to_owned(),
            level: 42,
            result_prev1: true,
            memorized: false,
            last_answered_at: None,
        };

        let record = StudyRecord::from(row);
        assert_eq!(record.level, StudyRecord::MAX_LEVEL);
        assert!(record.result_prev1);
    }
}
