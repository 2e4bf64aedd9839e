mod common;

use chrono::Duration;
use common::{harness, identity, ImageMode, QuestionMode};
use reading_rewards_core::controller::{
    AdminSkinDraft, ControllerError, PreviewOutcome, ProgressUpdate,
};
use reading_rewards_core::eligibility::Denial;
use reading_rewards_core::rewards::RewardError;
use reading_rewards_core::{Rarity, ReadingLevel, StoryLength, View};

#[tokio::test]
async fn test_open_session_creates_default_record_once() {
    let h = harness();
    let id = identity();

    let session = h.controller.open_session(id.clone()).await.unwrap();
    assert_eq!(session.progress.username, "reader");
    assert_eq!(session.progress.points, 500);
    assert!(session.progress.owns("skin_default"));
    assert_eq!(*h.store.saves.lock().unwrap(), 1);

    let again = h.controller.open_session(id).await.unwrap();
    assert_eq!(again.progress, session.progress);
    assert_eq!(*h.store.saves.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_full_reading_flow_with_correct_answer() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    let story = h
        .controller
        .generate_story(&mut session, ReadingLevel::Grade4, StoryLength::Medium, "dragons")
        .await
        .unwrap();
    assert_eq!(story.title, "A dragons tale");
    assert_eq!(session.view(), View::Reading);

    h.clock.advance(Duration::seconds(100));
    let question = h.controller.finish_reading(&mut session, 100).await.unwrap();
    assert_eq!(question.correct_option_index, 2);
    assert_eq!(session.view(), View::Question);

    let outcome = h.controller.answer_question(&mut session, 2).await.unwrap();
    assert!(outcome.question_correct);
    assert_eq!(outcome.reward.credited_seconds, 100);
    assert_eq!(outcome.reward.points, 238);
    assert_eq!(outcome.points_balance, 738);
    assert_eq!(outcome.validation_note, None);
    assert_eq!(session.view(), View::Results);

    let stored = h.store.records.lock().unwrap()[&session.identity.user_id].clone();
    assert_eq!(stored.points, 738);
    assert_eq!(stored.total_validated_seconds, 100);
    assert_eq!(stored.daily_stats.session_history.len(), 1);

    h.controller.return_home(&mut session);
    assert_eq!(session.view(), View::Generator);
    assert!(session.current_story().is_none());
    assert!(session.last_outcome().is_none());
}

#[tokio::test]
async fn test_wrong_answer_halves_credit() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    h.controller
        .generate_story(&mut session, ReadingLevel::Grade1, StoryLength::Medium, "owls")
        .await
        .unwrap();
    h.controller.finish_reading(&mut session, 101).await.unwrap();
    let outcome = h.controller.answer_question(&mut session, 0).await.unwrap();

    assert!(!outcome.question_correct);
    assert_eq!(outcome.reward.credited_seconds, 50);
    assert_eq!(outcome.reward.points, 75);
    assert!(outcome.validation_note.unwrap().contains("half"));
    assert_eq!(session.progress.total_validated_seconds, 50);
    assert_eq!(session.progress.daily_stats.session_history[0].questions_correct, 0);
}

#[tokio::test]
async fn test_reading_time_capped_by_story_length() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    h.controller
        .generate_story(&mut session, ReadingLevel::Grade4, StoryLength::Short, "robots")
        .await
        .unwrap();
    h.controller.finish_reading(&mut session, 300).await.unwrap();
    let outcome = h.controller.answer_question(&mut session, 2).await.unwrap();

    assert_eq!(outcome.raw_seconds, 300);
    assert_eq!(outcome.counted_seconds, 120);
    assert_eq!(outcome.reward.points, 120 + 125 + 13);
    assert!(outcome.validation_note.unwrap().contains("capped at 120 seconds"));
}

#[tokio::test]
async fn test_question_fallbacks() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    *h.content.question.lock().unwrap() = QuestionMode::Failing;
    h.controller
        .generate_story(&mut session, ReadingLevel::Grade2, StoryLength::Medium, "pirates")
        .await
        .unwrap();
    let question = h.controller.finish_reading(&mut session, 60).await.unwrap();
    assert!(question.question.contains("A pirates tale"));
    assert_eq!(question.correct_option_index, 0);
    let outcome = h.controller.answer_question(&mut session, 0).await.unwrap();
    assert!(outcome.question_correct);

    h.controller.return_home(&mut session);
    *h.content.question.lock().unwrap() = QuestionMode::Malformed;
    h.controller
        .generate_story(&mut session, ReadingLevel::Grade2, StoryLength::Medium, "pirates")
        .await
        .unwrap();
    let question = h.controller.finish_reading(&mut session, 60).await.unwrap();
    assert!(question.is_well_formed());
    assert_eq!(question.options.len(), 4);
}

#[tokio::test]
async fn test_story_failure_keeps_user_on_generator() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    *h.content.fail_story.lock().unwrap() = true;

    let err = h
        .controller
        .generate_story(&mut session, ReadingLevel::Grade3, StoryLength::Long, "castles")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Content(_)));
    assert!(err.is_retryable());
    assert_eq!(session.view(), View::Generator);

    let err = h
        .controller
        .generate_story(&mut session, ReadingLevel::Grade3, StoryLength::Long, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::EmptyTopic));
}

#[tokio::test]
async fn test_reading_actions_require_matching_view() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    let err = h.controller.finish_reading(&mut session, 10).await.unwrap_err();
    assert!(matches!(err, ControllerError::WrongView(View::Generator)));
    let err = h.controller.answer_question(&mut session, 0).await.unwrap_err();
    assert!(matches!(err, ControllerError::WrongView(View::Generator)));
    let err = h.controller.navigate(&mut session, View::Results).unwrap_err();
    assert!(matches!(err, ControllerError::WrongView(View::Generator)));

    h.controller
        .generate_story(&mut session, ReadingLevel::Grade1, StoryLength::Short, "cats")
        .await
        .unwrap();
    let err = h.controller.finish_reading(&mut session, -5).await.unwrap_err();
    assert!(matches!(err, ControllerError::Reward(RewardError::NegativeDuration(-5))));
    assert_eq!(session.view(), View::Reading);

    h.controller.finish_reading(&mut session, 30).await.unwrap();
    let err = h.controller.answer_question(&mut session, 4).await.unwrap_err();
    assert!(matches!(err, ControllerError::InvalidOption(4)));
}

#[tokio::test]
async fn test_reading_save_failure_is_flagged_and_retryable() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    *h.store.fail_saves.lock().unwrap() = true;

    h.controller
        .generate_story(&mut session, ReadingLevel::Grade1, StoryLength::Short, "frogs")
        .await
        .unwrap();
    h.controller.finish_reading(&mut session, 60).await.unwrap();
    let outcome = h.controller.answer_question(&mut session, 2).await.unwrap();
    assert!(session.has_unsaved_changes());
    assert_eq!(session.progress.points, outcome.points_balance);

    let err = h.controller.retry_save(&mut session).await.unwrap_err();
    assert!(matches!(err, ControllerError::Persistence(_)));

    *h.store.fail_saves.lock().unwrap() = false;
    h.controller.retry_save(&mut session).await.unwrap();
    assert!(!session.has_unsaved_changes());
    let stored = h.store.records.lock().unwrap()[&session.identity.user_id].clone();
    assert_eq!(stored.points, outcome.points_balance);
}

#[tokio::test]
async fn test_buying_and_equipping_skins() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    let shop = h.controller.shop(&session).await.unwrap();
    assert_eq!(shop.len(), 6);

    let skin = h.controller.buy_skin(&mut session, "skin_time_tinkerer").await.unwrap();
    assert_eq!(skin.cost, 250);
    assert_eq!(session.progress.points, 250);
    assert!(session.progress.owns("skin_time_tinkerer"));
    assert_eq!(h.controller.shop(&session).await.unwrap().len(), 5);

    let err = h.controller.buy_skin(&mut session, "skin_time_tinkerer").await.unwrap_err();
    assert!(matches!(err, ControllerError::AlreadyOwned(_)));

    let err = h.controller.buy_skin(&mut session, "skin_abyssal_diver").await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::InsufficientPoints { needed: 5000, available: 250 }
    ));

    let err = h.controller.buy_skin(&mut session, "skin_nope").await.unwrap_err();
    assert!(matches!(err, ControllerError::UnknownSkin(_)));

    let err = h.controller.equip_skin(&mut session, "skin_cyber_runner").await.unwrap_err();
    assert!(matches!(err, ControllerError::NotOwned(_)));

    h.controller.equip_skin(&mut session, "skin_time_tinkerer").await.unwrap();
    let equipped = h.controller.equipped_skin(&session).await.unwrap().unwrap();
    assert_eq!(equipped.name, "Time Tinkerer");

    let locker = h.controller.locker(&session).await.unwrap();
    let ids: Vec<&str> = locker.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["skin_default", "skin_time_tinkerer"]);
}

#[tokio::test]
async fn test_purchase_save_failure_is_reported_without_rollback() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    *h.store.fail_saves.lock().unwrap() = true;

    let err = h.controller.buy_skin(&mut session, "skin_time_tinkerer").await.unwrap_err();
    assert!(matches!(err, ControllerError::Persistence(_)));
    assert!(err.is_retryable());
    assert_eq!(session.progress.points, 250);
    assert!(session.progress.owns("skin_time_tinkerer"));
    assert!(session.has_unsaved_changes());
}

#[tokio::test]
async fn test_skin_generation_preview_and_claim() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    session.progress.points = 2000;
    session.progress.total_validated_seconds = 1450;

    let outcome = h
        .controller
        .generate_skin_preview(&mut session, "Lava Knight", "a knight made of lava")
        .await
        .unwrap();
    let preview = match outcome {
        PreviewOutcome::Ready(preview) => preview,
        PreviewOutcome::Denied(e) => panic!("unexpected denial: {:?}", e),
    };
    assert_eq!(preview.image_url, "https://img.test/skin.png");
    assert_eq!(session.view(), View::Creator);
    assert_eq!(session.progress.points, 2000);

    let state = &session.progress.generation_state;
    assert_eq!(state.generations_used_today, 1);
    assert_eq!(state.seconds_spent_on_generations, 600);
    assert_eq!(h.controller.check_generation(&session).available, 1);

    let skin = h.controller.claim_skin(&mut session).await.unwrap();
    assert!(skin.id.starts_with("skin_custom_"));
    assert_eq!(skin.rarity, Rarity::Custom);
    assert_eq!(session.progress.points, 500);
    assert_eq!(session.view(), View::Locker);
    assert!(session.preview().is_none());

    let locker = h.controller.locker(&session).await.unwrap();
    assert!(locker.iter().any(|s| s.name == "Lava Knight"));

    let err = h.controller.claim_skin(&mut session).await.unwrap_err();
    assert!(matches!(err, ControllerError::NoPreview));
}

#[tokio::test]
async fn test_skin_generation_denied_without_reading_time() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    session.progress.points = 5000;
    session.progress.total_validated_seconds = 500;

    let outcome = h
        .controller
        .generate_skin_preview(&mut session, "Ice Queen", "frozen crown")
        .await
        .unwrap();
    match outcome {
        PreviewOutcome::Denied(eligibility) => {
            assert_eq!(eligibility.denial, Some(Denial::InsufficientReadingTime));
            assert_eq!(eligibility.shortfall_seconds, 100);
        }
        PreviewOutcome::Ready(_) => panic!("preview should be denied"),
    }
    assert_eq!(session.progress.generation_state.generations_used_today, 0);
    assert!(h.blobs.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_skin_generation_requires_points() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    session.progress.total_validated_seconds = 6000;

    let err = h
        .controller
        .generate_skin_preview(&mut session, "Ice Queen", "frozen crown")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ControllerError::InsufficientPoints { needed: 1500, available: 500 }
    ));
    assert_eq!(session.progress.generation_state.generations_used_today, 0);
}

#[tokio::test]
async fn test_generated_image_storage_fallbacks() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    session.progress.points = 10_000;
    session.progress.total_validated_seconds = 6000;

    *h.content.image.lock().unwrap() = ImageMode::Png;
    let outcome = h
        .controller
        .generate_skin_preview(&mut session, "Sky Pirate", "airship captain")
        .await
        .unwrap();
    let PreviewOutcome::Ready(preview) = outcome else {
        panic!("expected a preview");
    };
    assert!(preview.image_url.starts_with("https://blobs.test/generated-skins/"));
    assert!(preview.image_url.ends_with("-Sky_Pirate.png"));

    *h.blobs.fail.lock().unwrap() = true;
    let PreviewOutcome::Ready(preview) = h
        .controller
        .generate_skin_preview(&mut session, "Sky Pirate", "airship captain")
        .await
        .unwrap()
    else {
        panic!("expected a preview");
    };
    assert!(preview.image_url.starts_with("data:image/png;base64,"));

    *h.content.image.lock().unwrap() = ImageMode::Failing;
    let PreviewOutcome::Ready(preview) = h
        .controller
        .generate_skin_preview(&mut session, "Sky Pirate", "airship captain")
        .await
        .unwrap()
    else {
        panic!("expected a preview");
    };
    assert!(preview.image_url.starts_with("data:image/svg+xml;base64,"));
    assert_eq!(session.progress.generation_state.generations_used_today, 3);
}

#[tokio::test]
async fn test_generation_window_rolls_over_next_day() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    session.progress.points = 10_000;
    session.progress.total_validated_seconds = 1450;

    h.controller
        .generate_skin_preview(&mut session, "Comet", "a streak of light")
        .await
        .unwrap();
    h.controller
        .generate_skin_preview(&mut session, "Comet", "a streak of light")
        .await
        .unwrap();
    let today = h.controller.check_generation(&session);
    assert!(!today.allowed);
    assert_eq!(today.denial, Some(Denial::InsufficientReadingTime));

    h.clock.advance(Duration::days(1));
    let tomorrow = h.controller.check_generation(&session);
    assert!(tomorrow.allowed);
    assert_eq!(tomorrow.available, 2);
    assert_eq!(session.progress.generation_state.generations_used_today, 2);
}

#[tokio::test]
async fn test_leaving_creator_discards_preview() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();
    session.progress.points = 2000;
    session.progress.total_validated_seconds = 600;

    h.controller
        .generate_skin_preview(&mut session, "Moss", "a mossy golem")
        .await
        .unwrap();
    assert!(session.preview().is_some());

    h.controller.navigate(&mut session, View::Shop).unwrap();
    assert!(session.preview().is_none());
    let err = h.controller.claim_skin(&mut session).await.unwrap_err();
    assert!(matches!(err, ControllerError::NoPreview));
}

#[tokio::test]
async fn test_daily_goal_and_summary() {
    let h = harness();
    let mut session = h.controller.open_session(identity()).await.unwrap();

    let err = h.controller.set_daily_goal(&mut session, 0).await.unwrap_err();
    assert!(matches!(err, ControllerError::Goal(_)));

    h.controller.set_daily_goal(&mut session, 2).await.unwrap();
    h.controller
        .generate_story(&mut session, ReadingLevel::Grade5, StoryLength::Medium, "volcanoes")
        .await
        .unwrap();
    h.controller.finish_reading(&mut session, 150).await.unwrap();
    h.controller.answer_question(&mut session, 2).await.unwrap();

    let summary = h.controller.reading_summary(&session);
    assert_eq!(summary.today_seconds, 150);
    assert_eq!(summary.goal_minutes, 2);
    assert!(summary.goal_met);
    assert_eq!(summary.streak, 1);

    h.clock.advance(Duration::days(1));
    let summary = h.controller.reading_summary(&session);
    assert_eq!(summary.today_seconds, 0);
    assert_eq!(summary.streak, 0);
}

#[tokio::test]
async fn test_admin_skin_management() {
    let h = harness();
    let mut player = h.controller.open_session(identity()).await.unwrap();
    let admin = h
        .controller
        .create_account(identity(), "boss", None, true)
        .await
        .unwrap();
    assert_eq!(admin.progress.points, 50_000);

    let err = h.controller.list_admin_skins(&player).await.unwrap_err();
    assert!(matches!(err, ControllerError::NotAdmin));
    let err = h.controller.navigate(&mut player, View::Admin).unwrap_err();
    assert!(matches!(err, ControllerError::NotAdmin));

    let saved = h
        .controller
        .save_admin_skin(
            &admin,
            AdminSkinDraft {
                id: None,
                name: "Thunder Cat".to_string(),
                description: Some("a cat with lightning whiskers".to_string()),
                rarity: Rarity::Rare,
                cost: 300,
                image_url: "https://img.test/cat.png".to_string(),
                is_active: true,
            },
        )
        .await
        .unwrap();
    assert!(saved.id.starts_with("admin_skin_"));

    let shop = h.controller.shop(&player).await.unwrap();
    assert!(shop.iter().any(|s| s.id == saved.id && s.prompt == "a cat with lightning whiskers"));

    h.controller.buy_skin(&mut player, &saved.id).await.unwrap();
    assert_eq!(player.progress.points, 200);

    let toggled = h.controller.toggle_admin_skin(&admin, &saved.id).await.unwrap();
    assert!(!toggled.is_active);
    assert_eq!(toggled.created_at, saved.created_at);
    assert!(!h.controller.shop(&admin).await.unwrap().iter().any(|s| s.id == saved.id));

    let locker = h.controller.locker(&player).await.unwrap();
    assert!(locker.iter().any(|s| s.id == saved.id));

    let url = h
        .controller
        .upload_admin_image(&admin, "cat photo.png", "image/png", bytes::Bytes::from_static(b"png"))
        .await
        .unwrap();
    assert!(url.starts_with("https://blobs.test/admin-skins/"));
    assert!(url.ends_with("-cat_photo.png"));

    h.controller.delete_admin_skin(&admin, &saved.id).await.unwrap();
    assert!(h.controller.list_admin_skins(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_sees_owned_skins_in_shop() {
    let h = harness();
    let mut admin = h
        .controller
        .create_account(identity(), "boss", None, true)
        .await
        .unwrap();
    h.controller.buy_skin(&mut admin, "skin_cosmic_knight").await.unwrap();

    let shop = h.controller.shop(&admin).await.unwrap();
    assert_eq!(shop.len(), 6);
}

#[tokio::test]
async fn test_admin_uploads_are_stored_by_image_type() {
    let h = harness();
    let player = h.controller.open_session(identity()).await.unwrap();
    let admin = h
        .controller
        .create_account(identity(), "boss", None, true)
        .await
        .unwrap();
    let bytes = bytes::Bytes::from_static(b"<script>alert(1)</script>");

    let err = h
        .controller
        .upload_admin_image(&player, "x.png", "image/png", bytes.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::NotAdmin));

    for content_type in ["text/html", "image/svg+xml", "application/octet-stream"] {
        let err = h
            .controller
            .upload_admin_image(&admin, "x.html", content_type, bytes.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::UnsupportedImage(_)));
    }
    assert!(h.blobs.uploads.lock().unwrap().is_empty());

    let url = h
        .controller
        .upload_admin_image(&admin, "evil.html", "image/png", bytes.clone())
        .await
        .unwrap();
    assert!(url.ends_with("-evil.png"));

    let url = h
        .controller
        .upload_admin_image(&admin, "page.svg.html", "image/jpeg", bytes)
        .await
        .unwrap();
    assert!(url.ends_with("-page_svg.jpg"));
}

#[tokio::test]
async fn test_admin_user_management() {
    let h = harness();
    let mut player = h
        .controller
        .create_account(identity(), "maya", None, false)
        .await
        .unwrap();
    let admin = h
        .controller
        .create_account(identity(), "boss", None, true)
        .await
        .unwrap();

    let err = h.controller.list_users(&player).await.unwrap_err();
    assert!(matches!(err, ControllerError::NotAdmin));

    let users = h.controller.list_users(&admin).await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, ["boss", "maya"]);
    assert!(users[0].is_admin);
    assert_eq!(users[1].points, 500);

    // Yesterday's generation window is stale; overriding today's count starts
    // a fresh window.
    player.progress.generation_state.generations_used_today = 2;
    player.progress.generation_state.seconds_spent_on_generations = 1_200;
    player.progress.generation_state.daily_window_start =
        *h.clock.now.lock().unwrap() - Duration::days(1);

    let update = ProgressUpdate {
        points: Some(10),
        total_validated_seconds: Some(900),
        generations_used_today: Some(1),
        goal_minutes: Some(30),
    };
    let summary = h
        .controller
        .apply_progress_update(&mut player, &update)
        .await
        .unwrap();
    assert_eq!(summary.points, 10);
    assert_eq!(summary.total_validated_seconds, 900);
    assert_eq!(summary.generations_used_today, 1);
    assert_eq!(summary.goal_minutes, 30);
    assert_eq!(player.progress.generation_state.seconds_spent_on_generations, 0);

    let eligibility = h.controller.check_generation(&player);
    assert_eq!(eligibility.generations_used_today, 1);
    assert_eq!(eligibility.available, 1);

    let stored = h.store.records.lock().unwrap()[&player.identity.user_id].clone();
    assert_eq!(stored, player.progress);

    let err = h
        .controller
        .apply_progress_update(
            &mut player,
            &ProgressUpdate {
                goal_minutes: Some(0),
                ..ProgressUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Goal(_)));
    assert_eq!(player.progress.daily_stats.goal_minutes, 30);
}
