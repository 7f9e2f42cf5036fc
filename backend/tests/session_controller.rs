use chrono::Duration;
use rollcall_backend::{
    error::{SessionError, TokenRejection},
    models::{
        redemption::RedemptionMethod,
        session::{CreateSessionRequest, Session, SessionStatus},
        user::{CurrentUser, User, UserRole},
    },
    services::{RedeemAttempt, SessionController},
};

mod support;

use support::{memory_app, seed_user, TestApp};

struct Fixture {
    app: TestApp,
    teacher: User,
    alice: User,
    bob: User,
}

impl Fixture {
    async fn new() -> Self {
        let app = memory_app();
        let teacher = seed_user(&app.state.repos, UserRole::Teacher, "Ms Mori").await;
        let alice = seed_user(&app.state.repos, UserRole::Student, "Alice").await;
        let bob = seed_user(&app.state.repos, UserRole::Student, "Bob").await;
        Self {
            app,
            teacher,
            alice,
            bob,
        }
    }

    fn controller(&self) -> &SessionController {
        &self.app.state.controller
    }

    fn owner(&self) -> CurrentUser {
        CurrentUser::new(self.teacher.id, UserRole::Teacher)
    }

    async fn session(&self, expected_count: i32) -> Session {
        self.controller()
            .create(
                self.owner(),
                CreateSessionRequest {
                    title: "Period 1".into(),
                    class_id: None,
                    scheduled_date: None,
                    expected_count: Some(expected_count),
                },
            )
            .await
            .expect("create session")
    }

    async fn start(&self, session: &Session, ttl_minutes: i64) -> String {
        self.controller()
            .start(self.owner(), session.id, Some(ttl_minutes))
            .await
            .expect("start session")
            .active_token
            .expect("token after start")
    }

    async fn redeem(
        &self,
        session: &Session,
        subject: &User,
        token: &str,
    ) -> Result<rollcall_backend::models::redemption::RedemptionResponse, SessionError> {
        self.controller()
            .redeem(
                session.id,
                RedeemAttempt {
                    subject_id: subject.id,
                    candidate: token,
                    occurred_at: self.controller().now(),
                    geo: None,
                    notes: None,
                },
            )
            .await
    }
}

#[tokio::test]
async fn rotation_scenario_counts_each_subject_once() {
    let fx = Fixture::new().await;
    let session = fx.session(3).await;

    let t1 = fx.start(&session, 30).await;
    let first = fx.redeem(&session, &fx.alice, &t1).await.unwrap();
    assert!(first.redemption.present);
    assert_eq!(first.redemption.method, RedemptionMethod::Qr);
    assert_eq!(first.redeemed_count, 1);

    fx.app.clock.advance(Duration::minutes(2));
    let again = fx.redeem(&session, &fx.alice, &t1).await.unwrap();
    assert_eq!(again.redemption.id, first.redemption.id);
    assert!(again.redemption.redeemed_at > first.redemption.redeemed_at);
    assert!(!again.created);
    assert_eq!(again.redeemed_count, 1);

    let t2 = fx.start(&session, 30).await;
    assert_ne!(t1, t2);
    let stale = fx.redeem(&session, &fx.bob, &t1).await.unwrap_err();
    assert!(matches!(
        stale,
        SessionError::TokenInvalid(TokenRejection::Mismatch)
    ));

    let fresh = fx.redeem(&session, &fx.bob, &t2).await.unwrap();
    assert_eq!(fresh.redeemed_count, 2);

    let stored = fx.controller().get(session.id).await.unwrap();
    assert_eq!(stored.redeemed_count, 2);
    assert_eq!(stored.expected_count, 3);
}

#[tokio::test]
async fn repeated_redemption_keeps_one_record_with_latest_timestamp() {
    let fx = Fixture::new().await;
    let session = fx.session(1).await;
    let token = fx.start(&session, 30).await;

    let mut last_at = None;
    for _ in 0..4 {
        fx.app.clock.advance(Duration::seconds(30));
        let response = fx.redeem(&session, &fx.alice, &token).await.unwrap();
        last_at = Some(response.redemption.redeemed_at);
    }

    let records = fx
        .controller()
        .redemptions(fx.owner(), session.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(Some(records[0].redeemed_at), last_at);
    assert_eq!(records[0].redeemed_at, fx.controller().now());
}

#[tokio::test]
async fn expired_token_is_rejected_while_session_is_still_active() {
    let fx = Fixture::new().await;
    let session = fx.session(2).await;
    let token = fx.start(&session, 5).await;

    fx.app.clock.advance(Duration::minutes(5));
    let err = fx.redeem(&session, &fx.alice, &token).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::TokenInvalid(TokenRejection::Expired)
    ));

    let stored = fx.controller().get(session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
    assert_eq!(stored.redeemed_count, 0);
}

#[tokio::test]
async fn scheduled_and_stopped_sessions_reject_redemption() {
    let fx = Fixture::new().await;
    let session = fx.session(2).await;

    let err = fx.redeem(&session, &fx.alice, "anything").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));

    let token = fx.start(&session, 30).await;
    let stopped = fx.controller().stop(fx.owner(), session.id).await.unwrap();
    assert_eq!(stopped.status, SessionStatus::Closed);
    assert!(stopped.active_token.is_none());
    assert!(stopped.token_expires_at.is_none());

    let err = fx.redeem(&session, &fx.alice, &token).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
}

#[tokio::test]
async fn stop_is_idempotent_and_restart_issues_a_new_token() {
    let fx = Fixture::new().await;
    let session = fx.session(2).await;
    let first = fx.start(&session, 30).await;

    fx.controller().stop(fx.owner(), session.id).await.unwrap();
    let again = fx.controller().stop(fx.owner(), session.id).await.unwrap();
    assert_eq!(again.status, SessionStatus::Closed);

    let second = fx.start(&session, 30).await;
    assert_ne!(first, second);
    assert!(fx.redeem(&session, &fx.alice, &second).await.is_ok());
    assert!(matches!(
        fx.redeem(&session, &fx.bob, &first).await,
        Err(SessionError::TokenInvalid(TokenRejection::Mismatch))
    ));
}

#[tokio::test]
async fn manual_override_sets_presence_regardless_of_prior_state() {
    let fx = Fixture::new().await;
    let session = fx.session(2).await;

    // Works before the session was ever started.
    let absent = fx
        .controller()
        .manual_override(fx.owner(), session.id, fx.alice.id, false, Some("sick".into()))
        .await
        .unwrap();
    assert!(!absent.redemption.present);
    assert_eq!(absent.redemption.method, RedemptionMethod::Manual);
    assert_eq!(absent.redeemed_count, 0);

    let token = fx.start(&session, 30).await;
    fx.redeem(&session, &fx.bob, &token).await.unwrap();
    fx.app.clock.advance(Duration::minutes(1));
    let overridden = fx
        .controller()
        .manual_override(fx.owner(), session.id, fx.bob.id, false, None)
        .await
        .unwrap();
    assert!(!overridden.redemption.present);
    assert_eq!(overridden.redemption.method, RedemptionMethod::Manual);
    assert_eq!(overridden.redemption.redeemed_at, fx.controller().now());
    // Counter is monotonic.
    assert_eq!(overridden.redeemed_count, 1);
}

#[tokio::test]
async fn subject_marked_absent_first_is_counted_once_present() {
    let fx = Fixture::new().await;
    let session = fx.session(2).await;

    fx.controller()
        .manual_override(fx.owner(), session.id, fx.alice.id, false, None)
        .await
        .unwrap();
    let token = fx.start(&session, 30).await;
    let redeemed = fx.redeem(&session, &fx.alice, &token).await.unwrap();
    assert!(!redeemed.created);
    assert!(redeemed.redemption.present);
    assert_eq!(redeemed.redeemed_count, 1);

    // Toggling the same subject again never counts twice.
    fx.controller()
        .manual_override(fx.owner(), session.id, fx.alice.id, false, None)
        .await
        .unwrap();
    let flipped = fx
        .controller()
        .manual_override(fx.owner(), session.id, fx.alice.id, true, None)
        .await
        .unwrap();
    assert_eq!(flipped.redeemed_count, 1);

    // Owner marking a fresh absentee present counts them too.
    fx.controller()
        .manual_override(fx.owner(), session.id, fx.bob.id, false, None)
        .await
        .unwrap();
    let bob = fx
        .controller()
        .manual_override(fx.owner(), session.id, fx.bob.id, true, None)
        .await
        .unwrap();
    assert_eq!(bob.redeemed_count, 2);
    assert_eq!(fx.controller().get(session.id).await.unwrap().redeemed_count, 2);
}

#[tokio::test]
async fn manual_override_by_non_owner_is_unauthorized() {
    let fx = Fixture::new().await;
    let session = fx.session(1).await;
    let other = seed_user(&fx.app.state.repos, UserRole::Teacher, "Mr Abe").await;

    let err = fx
        .controller()
        .manual_override(
            CurrentUser::new(other.id, UserRole::Teacher),
            session.id,
            fx.alice.id,
            true,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Unauthorized(_)));
}

#[tokio::test]
async fn only_the_owner_starts_and_stops() {
    let fx = Fixture::new().await;
    let session = fx.session(1).await;
    let other = CurrentUser::new(
        seed_user(&fx.app.state.repos, UserRole::Teacher, "Mr Abe").await.id,
        UserRole::Teacher,
    );

    assert!(matches!(
        fx.controller().start(other, session.id, None).await,
        Err(SessionError::Unauthorized(_))
    ));
    assert!(matches!(
        fx.controller().stop(other, session.id).await,
        Err(SessionError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn unknown_session_and_subject_are_not_found() {
    let fx = Fixture::new().await;
    let missing = rollcall_backend::types::SessionId::new();
    assert!(matches!(
        fx.controller().get(missing).await,
        Err(SessionError::NotFound(_))
    ));

    let session = fx.session(1).await;
    let token = fx.start(&session, 30).await;
    let ghost = User::new(
        rollcall_backend::models::user::CreateUser {
            full_name: "Ghost".into(),
            roll_number: None,
            role: UserRole::Student,
        },
        fx.controller().now(),
    );
    assert!(matches!(
        fx.redeem(&session, &ghost, &token).await,
        Err(SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn ttl_outside_configured_bounds_is_a_validation_error() {
    let fx = Fixture::new().await;
    let session = fx.session(1).await;
    for ttl in [0, -10, 241] {
        assert!(matches!(
            fx.controller().start(fx.owner(), session.id, Some(ttl)).await,
            Err(SessionError::Validation(_))
        ));
    }
    let started = fx
        .controller()
        .start(fx.owner(), session.id, None)
        .await
        .unwrap();
    assert_eq!(
        started.token_expires_at,
        Some(fx.controller().now() + Duration::minutes(30))
    );
}

#[tokio::test]
async fn export_lists_subjects_in_roll_order() {
    let fx = Fixture::new().await;
    let session = fx.session(2).await;
    let token = fx.start(&session, 30).await;
    fx.redeem(&session, &fx.bob, &token).await.unwrap();
    fx.redeem(&session, &fx.alice, &token).await.unwrap();

    let export = fx.controller().export(fx.owner(), session.id).await.unwrap();
    let lines: Vec<&str> = export.csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("\"name\""));
    let mut rolls = vec![
        fx.alice.roll_number.clone().unwrap(),
        fx.bob.roll_number.clone().unwrap(),
    ];
    rolls.sort();
    assert!(lines[1].contains(&rolls[0]));
    assert!(lines[2].contains(&rolls[1]));
    assert!(lines.iter().skip(1).all(|l| l.contains("\"qr\"")));
}

#[tokio::test]
async fn sweeper_closes_only_lapsed_sessions() {
    let fx = Fixture::new().await;
    let short = fx.session(1).await;
    let long = fx.session(1).await;
    fx.start(&short, 10).await;
    fx.start(&long, 60).await;

    fx.app.clock.advance(Duration::minutes(15));
    let closed = fx.controller().registry().close_expired().await.unwrap();
    assert_eq!(closed, 1);
    assert_eq!(
        fx.controller().get(short.id).await.unwrap().status,
        SessionStatus::Closed
    );
    assert_eq!(
        fx.controller().get(long.id).await.unwrap().status,
        SessionStatus::Active
    );
}

#[tokio::test]
async fn redeem_after_sweep_is_invalid_state() {
    let fx = Fixture::new().await;
    let session = fx.session(1).await;
    let token = fx.start(&session, 10).await;

    fx.app.clock.advance(Duration::minutes(11));
    assert!(matches!(
        fx.redeem(&session, &fx.alice, &token).await,
        Err(SessionError::TokenInvalid(TokenRejection::Expired))
    ));

    fx.controller().registry().close_expired().await.unwrap();
    assert!(matches!(
        fx.redeem(&session, &fx.alice, &token).await,
        Err(SessionError::InvalidState(_))
    ));
}
