#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    use study_sdk::{
        ProblemType, QuotaUnit, SecurityContext, SpaceType, StudyType, WorkbookPrivilege,
        WorkbookUpdate,
    };

    use crate::domain::error::DomainError;
    use crate::domain::model::{NewProblem, ProblemSelector, StudentModel};
    use crate::domain::rbac::{self, RbacAction, RbacEnforcer};
    use crate::domain::repos::{RepositoryFactory, UserRepositoryFactory};
    use crate::domain::space::DEFAULT_SPACE_KEY;
    use crate::infra::storage::entity::user_quota;
    use crate::test_support::{new_workbook, TestEnv};

    async fn student(env: &TestEnv, ctx: &SecurityContext) -> StudentModel {
        let user = env
            .repos()
            .app_user_repository()
            .find_by_id(ctx.organization_id(), ctx.app_user_id())
            .await
            .unwrap();
        StudentModel::new(user).unwrap()
    }

    #[tokio::test]
    async fn test_new_member_writes_personal_space_and_reads_default_space() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let repos = env.repos();

        let personal = repos
            .space_repository()
            .find_by_key(
                env.organization_id,
                SpaceType::Personal,
                &ctx.app_user_id().to_string(),
            )
            .await
            .unwrap();
        let default = repos
            .space_repository()
            .find_by_key(env.organization_id, SpaceType::Default, DEFAULT_SPACE_KEY)
            .await
            .unwrap();

        let rbac_repo = repos.rbac_repository();
        let enforcer = RbacEnforcer::new(&*rbac_repo, env.organization_id);
        let subject = rbac::user_subject(ctx.app_user_id());

        let on_personal = enforcer
            .allowed_actions(&subject, &rbac::space_object(personal.id))
            .await
            .unwrap();
        assert_eq!(on_personal, vec![RbacAction::Read, RbacAction::Write]);

        let on_default = enforcer
            .allowed_actions(&subject, &rbac::space_object(default.id))
            .await
            .unwrap();
        assert_eq!(on_default, vec![RbacAction::Read]);
    }

    #[tokio::test]
    async fn test_other_members_cannot_read_a_personal_workbook() {
        let env = TestEnv::new().await;
        let alice_ctx = env.add_student("alice").await;
        let bob_ctx = env.add_student("bob").await;
        let wb = env
            .add_workbook(&alice_ctx, ProblemType::EnglishWord, "words")
            .await;

        let bob = student(&env, &bob_ctx).await;
        let err = env
            .repos()
            .workbook_repository()
            .find_by_id(&bob, wb)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied { .. }));

        let alice = student(&env, &alice_ctx).await;
        let workbook = env
            .repos()
            .workbook_repository()
            .find_by_id(&alice, wb)
            .await
            .unwrap();
        assert!(workbook.has_privilege(WorkbookPrivilege::Remove));
    }

    #[tokio::test]
    async fn test_stale_workbook_version_leaves_row_untouched() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let alice = student(&env, &ctx).await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;
        let repos = env.repos();
        let workbooks = repos.workbook_repository();

        let rename = |name: &str| WorkbookUpdate {
            name: name.to_owned(),
            question_text: String::new(),
            properties: BTreeMap::new(),
        };
        workbooks.update(&alice, wb, 1, rename("first")).await.unwrap();

        let err = workbooks
            .update(&alice, wb, 1, rename("second"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { version: 1, .. }));

        let stored = workbooks.find_by_id(&alice, wb).await.unwrap();
        assert_eq!(stored.name, "first");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_duplicate_workbook_name_in_space_is_rejected() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        let err = env
            .service
            .add_workbook(&ctx, new_workbook(ProblemType::EnglishPhrase, "words"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_problem_removal_checks_version() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let alice = student(&env, &ctx).await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishPhrase, "phrases").await;
        let repos = env.repos();
        let problems = repos.problem_repository(ProblemType::EnglishPhrase);

        let mut properties = serde_json::Map::new();
        properties.insert("text".to_owned(), "hello".into());
        let id = problems
            .add_problem(
                &alice,
                wb,
                NewProblem {
                    number: None,
                    properties,
                },
            )
            .await
            .unwrap();

        let stale = ProblemSelector {
            workbook_id: wb,
            problem_id: id,
            version: 7,
        };
        let err = problems.remove_problem(&alice, &stale).await.unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { .. }));
        assert_eq!(problems.count_problems(&alice, wb).await.unwrap(), 1);

        problems
            .remove_problem(&alice, &ProblemSelector { version: 1, ..stale })
            .await
            .unwrap();
        assert_eq!(problems.count_problems(&alice, wb).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_day_quota_resets_on_the_next_day() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let alice = student(&env, &ctx).await;
        let repos = env.repos();
        let quotas = repos.user_quota_repository();
        let key = "english_word_update";

        for _ in 0..3 {
            let over = quotas
                .increment(&alice, key, QuotaUnit::Day, 3, 1)
                .await
                .unwrap();
            assert!(!over);
        }
        assert!(quotas.is_exceeded(&alice, key, QuotaUnit::Day, 3).await.unwrap());
        assert!(quotas.increment(&alice, key, QuotaUnit::Day, 3, 1).await.unwrap());

        env.clock.advance_days(1);
        assert!(!quotas.is_exceeded(&alice, key, QuotaUnit::Day, 3).await.unwrap());
        quotas
            .increment(&alice, key, QuotaUnit::Day, 3, 1)
            .await
            .unwrap();
        assert_eq!(env.quota_count(&ctx, key).await, 1);
    }

    #[tokio::test]
    async fn test_persistent_quota_survives_days_and_never_goes_negative() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let alice = student(&env, &ctx).await;
        let repos = env.repos();
        let quotas = repos.user_quota_repository();
        let key = "english_word_size";

        quotas
            .increment(&alice, key, QuotaUnit::Persistent, 10, 2)
            .await
            .unwrap();
        env.clock.advance_days(30);
        assert_eq!(env.quota_count(&ctx, key).await, 2);

        quotas
            .decrement(&alice, key, QuotaUnit::Persistent, 10, 5)
            .await
            .unwrap();
        assert_eq!(env.quota_count(&ctx, key).await, 0);

        quotas
            .decrement(&alice, "english_phrase_size", QuotaUnit::Persistent, 10, 1)
            .await
            .unwrap();
        assert_eq!(env.quota_count(&ctx, "english_phrase_size").await, 0);
    }

    #[tokio::test]
    async fn test_first_quota_use_creates_a_single_zero_row() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let alice = student(&env, &ctx).await;
        let repos = env.repos();
        let quotas = repos.user_quota_repository();
        let key = "english_sentence_size";

        assert!(!quotas.is_exceeded(&alice, key, QuotaUnit::Persistent, 2).await.unwrap());
        assert!(!quotas.is_exceeded(&alice, key, QuotaUnit::Persistent, 2).await.unwrap());
        quotas
            .increment(&alice, key, QuotaUnit::Persistent, 2, 1)
            .await
            .unwrap();

        let rows = user_quota::Entity::find()
            .filter(user_quota::Column::AppUserId.eq(ctx.app_user_id()))
            .filter(user_quota::Column::QuotaKey.eq(key))
            .all(&env.db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
    }

    #[tokio::test]
    async fn test_study_record_levels_follow_answers() {
        let env = TestEnv::new().await;
        let ctx = env.add_student("alice").await;
        let alice = &student(&env, &ctx).await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;
        let repos = env.repos();
        let records = repos.study_record_repository();
        let problem_id = uuid::Uuid::now_v7();

        let records = &*records;
        let answer = |result, memorized| async move {
            records
                .set_result(
                    alice,
                    wb,
                    StudyType::Memorization,
                    ProblemType::EnglishWord,
                    problem_id,
                    result,
                    memorized,
                )
                .await
                .unwrap()
        };

        assert_eq!(answer(true, false).await.level, 1);
        assert_eq!(answer(true, false).await.level, 3);
        let reset = answer(false, false).await;
        assert_eq!(reset.level, 0);
        assert!(!reset.result_prev1);
        assert!(reset.last_answered_at.is_some());

        let memorized = answer(true, true).await;
        assert_eq!(memorized.level, 10);

        let stored = records
            .find_study_records(alice, wb, StudyType::Memorization)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(records
            .find_study_records(alice, wb, StudyType::Dictation)
            .await
            .unwrap()
            .is_empty());

        let counts = records.count_memorized_problems(alice, wb).await.unwrap();
        assert_eq!(counts.get(&StudyType::Memorization), Some(&1));
        assert_eq!(counts.get(&StudyType::Dictation), None);
    }
}
