use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    payment::{CreatePaymentData, Payment},
    subject::Subject,
    tutoring_session::{PaymentStatus, SessionStatus, TutoringSession},
};
use crate::services::payment_gateway::{GatewayError, PaymentGateway};

#[derive(thiserror::Error, Debug)]
pub enum CheckoutError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Only the student of a session can pay for it")]
    NotTheStudent,

    #[error("Session is {0} and cannot be paid")]
    NotPayable(SessionStatus),

    #[error("Session is already paid")]
    AlreadyPaid,

    #[error("Card details are required for card payments")]
    MissingCard,

    #[error("Invalid card details: {0}")]
    InvalidCard(&'static str),

    #[error("Session price cannot be charged")]
    InvalidAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Paypal,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Paypal => "paypal",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub expiration: String,
    pub cvc: String,
    pub name: String,
}

/// Format checks only; the processor decides whether the card is good.
pub fn validate_card(card: &CardDetails) -> Result<(), CheckoutError> {
    let number: String = card.card_number.chars().filter(|c| !c.is_whitespace()).collect();
    if !(12..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(CheckoutError::InvalidCard("card number must have 12 to 19 digits"));
    }

    let (month, year) = card
        .expiration
        .trim()
        .split_once('/')
        .ok_or(CheckoutError::InvalidCard("expiration must be MM/YY"))?;
    let valid_month = month.len() == 2
        && month
            .parse::<u8>()
            .map(|m| (1..=12).contains(&m))
            .unwrap_or(false);
    let valid_year = year.len() == 2 && year.chars().all(|c| c.is_ascii_digit());
    if !valid_month || !valid_year {
        return Err(CheckoutError::InvalidCard("expiration must be MM/YY"));
    }

    let cvc = card.cvc.trim();
    if !(3..=4).contains(&cvc.len()) || !cvc.chars().all(|c| c.is_ascii_digit()) {
        return Err(CheckoutError::InvalidCard("CVC must have 3 or 4 digits"));
    }

    if card.name.trim().is_empty() {
        return Err(CheckoutError::InvalidCard("cardholder name is required"));
    }

    Ok(())
}

/// Hourly price times session length, by the minute. `None` on overflow.
pub fn session_amount_cents(
    price_cents: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Option<i64> {
    let minutes = (end_time - start_time).num_minutes().max(0);
    price_cents.checked_mul(minutes).map(|total| total / 60)
}

pub struct PayForSessionRequest {
    pub student_id: Uuid,
    pub session_id: Uuid,
    pub method: PaymentMethod,
    pub card: Option<CardDetails>,
}

/// Charges the student for a session and records the payment.
#[tracing::instrument(skip(pool, gateway, request), fields(session_id = %request.session_id, method = request.method.as_str()))]
pub async fn pay_for_session(
    pool: &PgPool,
    gateway: &PaymentGateway,
    currency: &str,
    request: PayForSessionRequest,
) -> Result<Payment, CheckoutError> {
    // Step 1: Validate payment details
    if request.method == PaymentMethod::Card {
        let card = request.card.as_ref().ok_or(CheckoutError::MissingCard)?;
        validate_card(card)?;
    }

    let mut tx = pool.begin().await?;

    // Step 2: Lock the session and check it can be paid
    let session = TutoringSession::lock_by_id(&mut tx, request.session_id)
        .await?
        .ok_or(CheckoutError::SessionNotFound)?;

    if session.student_id != request.student_id {
        if session.tutor_id == request.student_id {
            return Err(CheckoutError::NotTheStudent);
        }
        return Err(CheckoutError::SessionNotFound);
    }
    if session.status == SessionStatus::Cancelled {
        return Err(CheckoutError::NotPayable(session.status));
    }
    if session.payment_status != PaymentStatus::Pending {
        return Err(CheckoutError::AlreadyPaid);
    }

    // Step 3: Price it from the subject
    let subject = Subject::find_by_id_on(&mut tx, session.subject_id)
        .await?
        .ok_or(CheckoutError::SessionNotFound)?;
    let amount_cents =
        session_amount_cents(subject.price_cents, session.start_time, session.end_time)
            .filter(|amount| *amount > 0)
            .ok_or(CheckoutError::InvalidAmount)?;

    // Step 4: Charge
    let receipt = gateway
        .charge(session.id, amount_cents, currency, request.method.as_str())
        .await?;

    // Step 5: Record payment
    let recorded = record_payment(
        tx,
        CreatePaymentData {
            session_id: session.id,
            student_id: session.student_id,
            amount_cents,
            currency: currency.to_string(),
            payment_method: request.method.as_str().to_string(),
            transaction_id: receipt.transaction_id.clone(),
        },
    )
    .await;
    let payment = refund_unrecorded_charge(
        gateway,
        &receipt.transaction_id,
        amount_cents,
        currency,
        recorded,
    )
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        amount_cents = payment.amount_cents,
        "Session paid"
    );

    Ok(payment)
}

async fn record_payment(
    mut tx: Transaction<'_, Postgres>,
    data: CreatePaymentData,
) -> Result<Payment, sqlx::Error> {
    let session_id = data.session_id;
    let payment = Payment::create_paid(&mut tx, data).await?;
    TutoringSession::set_payment_status(&mut tx, session_id, PaymentStatus::Paid).await?;
    tx.commit().await?;

    Ok(payment)
}

/// A charge that could not be recorded is handed back to the processor.
/// When that fails too, the transaction id is logged for reconciliation.
async fn refund_unrecorded_charge<T>(
    gateway: &PaymentGateway,
    transaction_id: &str,
    amount_cents: i64,
    currency: &str,
    recorded: Result<T, sqlx::Error>,
) -> Result<T, CheckoutError> {
    let error = match recorded {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    tracing::error!(
        error = %error,
        transaction_id = %transaction_id,
        amount_cents,
        "Charge succeeded but could not be recorded, refunding"
    );

    if let Err(refund_error) = gateway.refund(transaction_id, amount_cents, currency).await {
        tracing::error!(
            error = %refund_error,
            transaction_id = %transaction_id,
            amount_cents,
            "Refund of unrecorded charge failed, needs manual reconciliation"
        );
    }

    Err(CheckoutError::DatabaseError(error))
}
