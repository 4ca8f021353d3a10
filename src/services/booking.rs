use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::models::{
    payment::Payment,
    profile::{Profile, Role},
    subject::Subject,
    tutoring_session::{CreateSessionData, PaymentStatus, SessionStatus, TutoringSession},
};
use crate::services::payment_gateway::{GatewayError, PaymentGateway};

/// Bookable start times, on the hour.
pub const AVAILABLE_TIMES: [&str; 10] = [
    "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00",
];

pub const SESSION_LENGTH_HOURS: i64 = 1;

#[derive(thiserror::Error, Debug)]
pub enum BookingError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Refund failed: {0}")]
    RefundFailed(#[from] GatewayError),

    #[error("Tutor not found")]
    TutorNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Only students can book sessions")]
    NotAStudent,

    #[error("You cannot book a session with yourself")]
    SelfBooking,

    #[error("The tutor does not offer this subject")]
    SubjectNotOffered,

    #[error("The tutor has not published any subjects yet")]
    NoSubjects,

    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("{0} is not a bookable time slot")]
    NotASlot(String),

    #[error("Sessions must be booked in the future")]
    InPast,

    #[error("This time slot is no longer available")]
    SlotTaken,

    #[error("Cannot {action} a {from} session")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    #[error("Only the {0} can do this")]
    NotAllowed(&'static str),

    #[error("A session cannot be completed before it starts")]
    NotStarted,
}

/// Parses `H:MM` or `HH:MM` and checks it against the slot list.
pub fn parse_slot(time: &str) -> Result<NaiveTime, BookingError> {
    let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| BookingError::InvalidTime(time.to_string()))?;

    let canonical = parsed.format("%H:%M").to_string();
    if !AVAILABLE_TIMES.contains(&canonical.as_str()) {
        return Err(BookingError::NotASlot(canonical));
    }

    Ok(parsed)
}

/// The UTC window `[start, end)` of the slot `time` on `date`.
pub fn slot_window(
    date: NaiveDate,
    time: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>), BookingError> {
    let start = date.and_time(parse_slot(time)?).and_utc();
    let end = start + Duration::hours(SESSION_LENGTH_HOURS);

    Ok((start, end))
}

pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Slots on `date` that are in the future and overlap no live session.
pub fn free_slots(date: NaiveDate, booked: &[TutoringSession], now: DateTime<Utc>) -> Vec<String> {
    AVAILABLE_TIMES
        .iter()
        .filter_map(|time| {
            let (start, end) = slot_window(date, time).ok()?;
            if start <= now {
                return None;
            }
            let taken = booked.iter().any(|s| {
                s.status != SessionStatus::Cancelled && overlaps(start, end, s.start_time, s.end_time)
            });
            (!taken).then(|| time.to_string())
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Accept,
    Decline,
    Complete { feedback: Option<String> },
    Cancel,
}

impl SessionAction {
    pub fn verb(&self) -> &'static str {
        match self {
            SessionAction::Accept => "accept",
            SessionAction::Decline => "decline",
            SessionAction::Complete { .. } => "complete",
            SessionAction::Cancel => "cancel",
        }
    }

    /// Whether a participant acting as `actor` may perform this action
    pub fn allowed_for(&self, actor: Role) -> bool {
        match self {
            SessionAction::Cancel => true,
            _ => actor == Role::Tutor,
        }
    }
}

/// Transition table of a session's status.
pub fn next_status(
    current: SessionStatus,
    action: &SessionAction,
) -> Result<SessionStatus, BookingError> {
    let next = match (current, action) {
        (SessionStatus::Pending, SessionAction::Accept) => SessionStatus::Confirmed,
        (SessionStatus::Pending, SessionAction::Decline) => SessionStatus::Cancelled,
        (SessionStatus::Confirmed, SessionAction::Complete { .. }) => SessionStatus::Completed,
        (SessionStatus::Pending | SessionStatus::Confirmed, SessionAction::Cancel) => {
            SessionStatus::Cancelled
        }
        (from, action) => {
            return Err(BookingError::InvalidTransition {
                from,
                action: action.verb(),
            })
        }
    };

    Ok(next)
}

pub struct BookSessionRequest {
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: String,
}

/// Books a one-hour session in `pending` state.
///
/// The tutor's profile row is locked for the duration of the transaction, so
/// two requests for the same tutor cannot both pass the overlap check.
#[tracing::instrument(skip(pool, request), fields(tutor_id = %request.tutor_id, student_id = %request.student_id))]
pub async fn book_session(
    pool: &PgPool,
    request: BookSessionRequest,
    now: DateTime<Utc>,
) -> Result<TutoringSession, BookingError> {
    if request.student_id == request.tutor_id {
        return Err(BookingError::SelfBooking);
    }

    let (start_time, end_time) = slot_window(request.date, &request.time)?;
    if start_time <= now {
        return Err(BookingError::InPast);
    }

    let mut tx = pool.begin().await?;

    let student = Profile::lock_by_user_id(&mut tx, request.student_id)
        .await?
        .ok_or(BookingError::NotAStudent)?;
    if student.role != Role::Student {
        return Err(BookingError::NotAStudent);
    }

    let tutor = Profile::lock_by_user_id(&mut tx, request.tutor_id)
        .await?
        .ok_or(BookingError::TutorNotFound)?;
    if tutor.role != Role::Tutor {
        return Err(BookingError::TutorNotFound);
    }

    let subject = match request.subject_id {
        Some(subject_id) => Subject::find_by_id_on(&mut tx, subject_id)
            .await?
            .filter(|s| s.tutor_id == tutor.user_id)
            .ok_or(BookingError::SubjectNotOffered)?,
        None => Subject::first_for_tutor(&mut tx, tutor.user_id)
            .await?
            .ok_or(BookingError::NoSubjects)?,
    };

    let conflicts = TutoringSession::count_overlapping(
        &mut tx,
        tutor.user_id,
        student.user_id,
        start_time,
        end_time,
    )
    .await?;
    if conflicts > 0 {
        return Err(BookingError::SlotTaken);
    }

    let session = TutoringSession::create(
        &mut tx,
        CreateSessionData {
            student_id: student.user_id,
            tutor_id: tutor.user_id,
            subject_id: subject.id,
            start_time,
            end_time,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            BookingError::SlotTaken
        } else {
            BookingError::DatabaseError(e)
        }
    })?;

    tx.commit().await?;

    tracing::info!(
        session_id = %session.id,
        subject_id = %subject.id,
        start_time = %session.start_time,
        "Session requested"
    );

    Ok(session)
}

/// Applies a status change requested by one of the session's participants.
/// Cancelling a paid session refunds it through the payment gateway.
#[tracing::instrument(skip(pool, gateway, action), fields(action = action.verb()))]
pub async fn apply_action(
    pool: &PgPool,
    gateway: &PaymentGateway,
    actor_id: Uuid,
    session_id: Uuid,
    action: SessionAction,
    now: DateTime<Utc>,
) -> Result<TutoringSession, BookingError> {
    let mut tx = pool.begin().await?;

    let session = TutoringSession::lock_by_id(&mut tx, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;

    let actor = if session.tutor_id == actor_id {
        Role::Tutor
    } else if session.student_id == actor_id {
        Role::Student
    } else {
        return Err(BookingError::SessionNotFound);
    };

    if !action.allowed_for(actor) {
        return Err(BookingError::NotAllowed("tutor"));
    }

    let next = next_status(session.status, &action)?;

    let (completed_at, feedback) = match &action {
        SessionAction::Complete { feedback } => {
            if session.start_time > now {
                return Err(BookingError::NotStarted);
            }
            let feedback = feedback
                .as_ref()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty());
            (Some(now), feedback)
        }
        _ => (None, None),
    };

    let mut updated =
        TutoringSession::set_status(&mut tx, session.id, next, completed_at, feedback).await?;

    let refunded =
        if next == SessionStatus::Cancelled && session.payment_status == PaymentStatus::Paid {
            let payment = refund_session_payment(&mut tx, gateway, session.id).await?;
            updated.payment_status = PaymentStatus::Refunded;
            payment
        } else {
            None
        };

    commit_refunded(tx, session.id, refunded.as_ref()).await?;

    tracing::info!(
        session_id = %updated.id,
        from = %session.status,
        to = %updated.status,
        "Session status changed"
    );

    Ok(updated)
}

/// Refunds the settled payment of a session being cancelled and marks the
/// payment and the session refunded, inside the caller's transaction.
async fn refund_session_payment(
    conn: &mut PgConnection,
    gateway: &PaymentGateway,
    session_id: Uuid,
) -> Result<Option<Payment>, BookingError> {
    let payment = Payment::find_paid_for_session(&mut *conn, session_id).await?;

    if let Some(payment) = &payment {
        if let Some(transaction_id) = payment.transaction_id.as_deref() {
            gateway
                .refund(transaction_id, payment.amount_cents, &payment.currency)
                .await?;
        }
        Payment::mark_refunded(&mut *conn, payment.id).await?;

        tracing::info!(
            session_id = %session_id,
            payment_id = %payment.id,
            amount_cents = payment.amount_cents,
            "Payment refunded"
        );
    }
    TutoringSession::set_payment_status(&mut *conn, session_id, PaymentStatus::Refunded).await?;

    Ok(payment)
}

/// Commits a cancellation. The processor has already returned the money of
/// `refunded`, so a failed commit is logged with its transaction id.
async fn commit_refunded(
    tx: Transaction<'_, Postgres>,
    session_id: Uuid,
    refunded: Option<&Payment>,
) -> Result<(), BookingError> {
    if let Err(e) = tx.commit().await {
        if let Some(payment) = refunded {
            tracing::error!(
                error = %e,
                session_id = %session_id,
                payment_id = %payment.id,
                transaction_id = ?payment.transaction_id,
                "Refund issued but cancellation was not saved, needs manual reconciliation"
            );
        }
        return Err(e.into());
    }

    Ok(())
}

/// Cancels one unanswered request that was already paid for, refunding it.
/// Returns `false` when the session no longer qualifies.
#[tracing::instrument(skip(pool, gateway))]
pub async fn expire_paid_request(
    pool: &PgPool,
    gateway: &PaymentGateway,
    session_id: Uuid,
    now: DateTime<Utc>,
    created_before: DateTime<Utc>,
) -> Result<bool, BookingError> {
    let mut tx = pool.begin().await?;

    let session = match TutoringSession::lock_by_id(&mut tx, session_id).await? {
        Some(session) => session,
        None => return Ok(false),
    };
    let stale = session.start_time <= now || session.created_at < created_before;
    if session.status != SessionStatus::Pending
        || session.payment_status != PaymentStatus::Paid
        || !stale
    {
        return Ok(false);
    }

    TutoringSession::set_status(&mut tx, session.id, SessionStatus::Cancelled, None, None).await?;
    let refunded = refund_session_payment(&mut tx, gateway, session.id).await?;
    commit_refunded(tx, session.id, refunded.as_ref()).await?;

    tracing::info!(session_id = %session.id, "Paid request expired and refunded");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::services::checkout::{pay_for_session, PayForSessionRequest, PaymentMethod};
    use crate::services::payment_gateway::RemoteGateway;
    use crate::test_support::{create_account, create_subject, days_from_now, test_pool};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 14).unwrap()
    }

    fn session_at(hour: u32, status: SessionStatus) -> TutoringSession {
        let start = Utc.with_ymd_and_hms(2030, 5, 14, hour, 0, 0).unwrap();
        TutoringSession {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            start_time: start,
            end_time: start + Duration::hours(1),
            status,
            payment_status: PaymentStatus::Pending,
            tutor_feedback: None,
            completed_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_parse_slot_accepts_short_and_padded_hours() {
        assert_eq!(parse_slot("9:00").unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(parse_slot("09:00").unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(parse_slot("18:00").unwrap(), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_slot_rejects_outside_schedule() {
        assert!(matches!(parse_slot("8:00"), Err(BookingError::NotASlot(_))));
        assert!(matches!(parse_slot("19:00"), Err(BookingError::NotASlot(_))));
        assert!(matches!(parse_slot("10:30"), Err(BookingError::NotASlot(_))));
        assert!(matches!(parse_slot("noon"), Err(BookingError::InvalidTime(_))));
    }

    #[test]
    fn test_slot_window_is_one_hour() {
        let (start, end) = slot_window(date(), "14:00").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2030, 5, 14, 14, 0, 0).unwrap());
        assert_eq!(end - start, Duration::hours(1));
    }

    #[test]
    fn test_overlaps_is_half_open() {
        let (a_start, a_end) = slot_window(date(), "10:00").unwrap();
        let (b_start, b_end) = slot_window(date(), "11:00").unwrap();

        assert!(!overlaps(a_start, a_end, b_start, b_end));
        assert!(overlaps(a_start, a_end, a_start, a_end));
        assert!(overlaps(
            a_start,
            a_end,
            a_start + Duration::minutes(30),
            b_end
        ));
    }

    #[test]
    fn test_free_slots_skips_booked_and_ignores_cancelled() {
        let now = Utc.with_ymd_and_hms(2030, 5, 1, 0, 0, 0).unwrap();
        let booked = vec![
            session_at(10, SessionStatus::Pending),
            session_at(12, SessionStatus::Confirmed),
            session_at(14, SessionStatus::Cancelled),
        ];

        let free = free_slots(date(), &booked, now);

        assert_eq!(free.len(), 8);
        assert!(!free.contains(&"10:00".to_string()));
        assert!(!free.contains(&"12:00".to_string()));
        assert!(free.contains(&"14:00".to_string()));
    }

    #[test]
    fn test_free_slots_drops_past_times() {
        let now = Utc.with_ymd_and_hms(2030, 5, 14, 15, 30, 0).unwrap();
        let free = free_slots(date(), &[], now);

        assert_eq!(free, vec!["16:00", "17:00", "18:00"]);
    }

    #[test]
    fn test_transition_table() {
        use SessionStatus::*;

        assert_eq!(next_status(Pending, &SessionAction::Accept).unwrap(), Confirmed);
        assert_eq!(next_status(Pending, &SessionAction::Decline).unwrap(), Cancelled);
        assert_eq!(next_status(Pending, &SessionAction::Cancel).unwrap(), Cancelled);
        assert_eq!(next_status(Confirmed, &SessionAction::Cancel).unwrap(), Cancelled);
        assert_eq!(
            next_status(Confirmed, &SessionAction::Complete { feedback: None }).unwrap(),
            Completed
        );
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        use SessionStatus::*;

        let complete = SessionAction::Complete { feedback: None };
        for (from, action) in [
            (Pending, &complete),
            (Confirmed, &SessionAction::Accept),
            (Confirmed, &SessionAction::Decline),
            (Completed, &SessionAction::Cancel),
            (Cancelled, &SessionAction::Accept),
            (Cancelled, &SessionAction::Cancel),
        ] {
            assert!(
                matches!(
                    next_status(from, action),
                    Err(BookingError::InvalidTransition { .. })
                ),
                "{} -> {} should be rejected",
                from,
                action.verb()
            );
        }
    }

    #[test]
    fn test_only_cancel_is_open_to_students() {
        assert!(SessionAction::Cancel.allowed_for(Role::Student));
        assert!(SessionAction::Cancel.allowed_for(Role::Tutor));
        assert!(!SessionAction::Accept.allowed_for(Role::Student));
        assert!(!SessionAction::Decline.allowed_for(Role::Student));
        assert!(SessionAction::Accept.allowed_for(Role::Tutor));
    }

    async fn book(
        pool: &PgPool,
        student_id: Uuid,
        tutor_id: Uuid,
        date: NaiveDate,
        time: &str,
    ) -> Result<TutoringSession, BookingError> {
        book_session(
            pool,
            BookSessionRequest {
                student_id,
                tutor_id,
                subject_id: None,
                date,
                time: time.to_string(),
            },
            Utc::now(),
        )
        .await
    }

    async fn tutor_with_subject(pool: &PgPool) -> Uuid {
        let tutor = create_account(pool, Role::Tutor).await;
        create_subject(pool, tutor, 4500).await;
        tutor
    }

    /// A confirmed session the student has paid for through the mock processor
    async fn paid_session(pool: &PgPool) -> (TutoringSession, Payment) {
        let tutor = tutor_with_subject(pool).await;
        let student = create_account(pool, Role::Student).await;
        let session = book(pool, student, tutor, days_from_now(5), "15:00").await.unwrap();
        apply_action(
            pool,
            &PaymentGateway::Mock,
            tutor,
            session.id,
            SessionAction::Accept,
            Utc::now(),
        )
        .await
        .unwrap();

        let payment = pay_for_session(
            pool,
            &PaymentGateway::Mock,
            "USD",
            PayForSessionRequest {
                student_id: student,
                session_id: session.id,
                method: PaymentMethod::Paypal,
                card: None,
            },
        )
        .await
        .unwrap();

        (session, payment)
    }

    #[tokio::test]
    #[serial]
    async fn test_tutor_slot_cannot_be_booked_twice() {
        let Some(pool) = test_pool().await else { return };
        let tutor = tutor_with_subject(&pool).await;
        let first = create_account(&pool, Role::Student).await;
        let second = create_account(&pool, Role::Student).await;
        let date = days_from_now(5);

        let booked = book(&pool, first, tutor, date, "10:00").await.unwrap();
        assert_eq!(booked.status, SessionStatus::Pending);
        assert_eq!(booked.payment_status, PaymentStatus::Pending);

        let result = book(&pool, second, tutor, date, "10:00").await;
        assert!(matches!(result, Err(BookingError::SlotTaken)));

        book(&pool, second, tutor, date, "11:00").await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_student_cannot_be_in_two_sessions_at_once() {
        let Some(pool) = test_pool().await else { return };
        let student = create_account(&pool, Role::Student).await;
        let first_tutor = tutor_with_subject(&pool).await;
        let second_tutor = tutor_with_subject(&pool).await;
        let date = days_from_now(6);

        book(&pool, student, first_tutor, date, "13:00").await.unwrap();
        let result = book(&pool, student, second_tutor, date, "13:00").await;

        assert!(matches!(result, Err(BookingError::SlotTaken)));
    }

    #[tokio::test]
    #[serial]
    async fn test_declined_slot_can_be_booked_again() {
        let Some(pool) = test_pool().await else { return };
        let tutor = tutor_with_subject(&pool).await;
        let first = create_account(&pool, Role::Student).await;
        let second = create_account(&pool, Role::Student).await;
        let date = days_from_now(7);

        let session = book(&pool, first, tutor, date, "09:00").await.unwrap();
        apply_action(
            &pool,
            &PaymentGateway::Mock,
            tutor,
            session.id,
            SessionAction::Decline,
            Utc::now(),
        )
        .await
        .unwrap();

        book(&pool, second, tutor, date, "09:00").await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_unique_index_rejects_second_live_session_in_slot() {
        let Some(pool) = test_pool().await else { return };
        let tutor = create_account(&pool, Role::Tutor).await;
        let subject = create_subject(&pool, tutor, 4500).await;
        let first = create_account(&pool, Role::Student).await;
        let second = create_account(&pool, Role::Student).await;
        let (start_time, end_time) = slot_window(days_from_now(8), "14:00").unwrap();

        let data = |student_id| CreateSessionData {
            student_id,
            tutor_id: tutor,
            subject_id: subject.id,
            start_time,
            end_time,
        };

        let mut conn = pool.acquire().await.unwrap();
        TutoringSession::create(&mut conn, data(first)).await.unwrap();
        let err = TutoringSession::create(&mut conn, data(second))
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    #[serial]
    async fn test_cancelling_paid_session_refunds_it() {
        let Some(pool) = test_pool().await else { return };
        let (session, payment) = paid_session(&pool).await;
        let transaction_id = payment.transaction_id.clone().unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refunds"))
            .and(body_partial_json(serde_json::json!({
                "transaction_id": transaction_id,
                "amount_cents": 4500
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transaction_id": transaction_id,
                "status": "refunded"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let gateway = PaymentGateway::Remote(RemoteGateway::new(&server.uri(), None).unwrap());

        let cancelled = apply_action(
            &pool,
            &gateway,
            session.student_id,
            session.id,
            SessionAction::Cancel,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);

        let stored = TutoringSession::find_by_id(&pool, session.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Refunded);
        let payments = Payment::list_by_student(&pool, session.student_id).await.unwrap();
        assert_eq!(payments[0].payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    #[serial]
    async fn test_failed_refund_keeps_session_booked() {
        let Some(pool) = test_pool().await else { return };
        let (session, _) = paid_session(&pool).await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refunds"))
            .respond_with(ResponseTemplate::new(500).set_body_string("processor down"))
            .mount(&server)
            .await;
        let gateway = PaymentGateway::Remote(RemoteGateway::new(&server.uri(), None).unwrap());

        let result = apply_action(
            &pool,
            &gateway,
            session.tutor_id,
            session.id,
            SessionAction::Cancel,
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(BookingError::RefundFailed(_))));

        let stored = TutoringSession::find_by_id(&pool, session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Confirmed);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    #[serial]
    async fn test_outsiders_and_early_completion_are_rejected() {
        let Some(pool) = test_pool().await else { return };
        let tutor = tutor_with_subject(&pool).await;
        let student = create_account(&pool, Role::Student).await;
        let stranger = create_account(&pool, Role::Student).await;
        let session = book(&pool, student, tutor, days_from_now(9), "16:00").await.unwrap();

        let result = apply_action(
            &pool,
            &PaymentGateway::Mock,
            stranger,
            session.id,
            SessionAction::Cancel,
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(BookingError::SessionNotFound)));

        apply_action(
            &pool,
            &PaymentGateway::Mock,
            tutor,
            session.id,
            SessionAction::Accept,
            Utc::now(),
        )
        .await
        .unwrap();
        let result = apply_action(
            &pool,
            &PaymentGateway::Mock,
            tutor,
            session.id,
            SessionAction::Complete { feedback: None },
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(BookingError::NotStarted)));
    }
}
