use crate::auth::Caller;
use crate::error::{AppError, Result};
use crate::schemas::{CreditId, PaymentObligation, PaymentStatus, UserId};
use crate::store::{CreditStore, ParticipantDirectory};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayment {
    pub credit_id: CreditId,
    pub user_id: UserId,
    pub month: u32,
    pub year: i32,
}

pub fn check_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(AppError::validation("Le mois doit être compris entre 1 et 12"))
    }
}

/// Marks one (credit, participant, month, year) cell as paid. Confirming
/// twice is a no-op success.
pub async fn confirm<S>(
    store: &S,
    caller: Caller,
    request: ConfirmPayment,
) -> Result<PaymentObligation>
where
    S: CreditStore + ?Sized,
{
    if caller.user_id != request.user_id {
        return Err(AppError::forbidden(
            "Vous ne pouvez confirmer que vos propres paiements",
        ));
    }
    check_month(request.month)?;
    let credit = store
        .find_credit(request.credit_id)
        .await?
        .ok_or_else(|| AppError::not_found("Crédit introuvable"))?;
    if !credit.participant_ids.contains(&request.user_id) {
        return Err(AppError::forbidden("Vous ne participez pas à ce crédit"));
    }
    let payment = store
        .confirm_payment(
            request.credit_id,
            request.user_id,
            request.month,
            request.year,
        )
        .await?;
    log::info!(
        "user {} confirmed credit {} for {:02}/{}",
        payment.user_id,
        payment.credit_id,
        payment.month,
        payment.year
    );
    Ok(payment)
}

/// Rows stored for the exact (credit, month, year), each with its
/// participant. A participant without a row simply does not appear.
pub async fn status_for<S>(
    store: &S,
    credit_id: CreditId,
    month: u32,
    year: i32,
) -> Result<Vec<PaymentStatus>>
where
    S: CreditStore + ParticipantDirectory + ?Sized,
{
    let payments = store.payments_for_month(credit_id, month, year).await?;
    let ids: Vec<UserId> = payments.iter().map(|p| p.user_id).collect();
    let mut users: HashMap<UserId, _> = store
        .find_participants(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    Ok(payments
        .into_iter()
        .map(|payment| PaymentStatus {
            user: users.remove(&payment.user_id),
            payment,
        })
        .collect())
}
