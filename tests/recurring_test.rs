mod common;

use anyhow::Result;
use common::{ACCT1, ALICE, assert_kind, parse_date, test_service};
use tally::application::ErrorKind;
use tally::domain::{Frequency, NewRecurringPayment};
use uuid::Uuid;

#[tokio::test]
async fn test_create_and_list_recurring_payments() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let rent = service
        .create_recurring_payment(
            ALICE,
            ACCT1,
            NewRecurringPayment::new(-120000, "rent", parse_date("2024-02-01"), Frequency::Monthly)
                .with_description("flat")
                .with_payment_type("transfer"),
        )
        .await?;
    service
        .create_recurring_payment(
            ALICE,
            ACCT1,
            NewRecurringPayment::new(-999, "streaming", parse_date("2024-01-15"), Frequency::Monthly),
        )
        .await?;

    let payments = service.list_recurring_payments(ALICE, ACCT1).await?;
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].name, "streaming");

    let stored = payments.iter().find(|p| p.id == rent.id).unwrap();
    assert_eq!(stored.amount_cents, -120000);
    assert_eq!(stored.description, "flat");
    assert_eq!(stored.payment_type, "transfer");
    assert_eq!(stored.frequency, Frequency::Monthly);
    assert_eq!(stored.payment_date, parse_date("2024-02-01"));

    // templates never move money
    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_list_all_recurring_payments_spans_users() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service
        .create_recurring_payment(
            ALICE,
            ACCT1,
            NewRecurringPayment::new(-1000, "gym", parse_date("2024-03-01"), Frequency::Monthly),
        )
        .await?;
    service
        .create_recurring_payment(
            "bob",
            "savings",
            NewRecurringPayment::new(5000, "pocket money", parse_date("2024-03-02"), Frequency::Weekly),
        )
        .await?;

    assert_eq!(service.list_recurring_payments(ALICE, ACCT1).await?.len(), 1);
    assert!(service.list_recurring_payments("bob", ACCT1).await?.is_empty());
    assert_eq!(service.list_all_recurring_payments().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_zero_recurring_amount_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_kind(
        service
            .create_recurring_payment(
                ALICE,
                ACCT1,
                NewRecurringPayment::new(0, "nothing", parse_date("2024-03-01"), Frequency::Daily),
            )
            .await,
        ErrorKind::InvalidOperation,
    );
    assert!(service.list_all_recurring_payments().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_payment_history_starts_empty_then_records_in_date_order() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let rent = service
        .create_recurring_payment(
            ALICE,
            ACCT1,
            NewRecurringPayment::new(-120000, "rent", parse_date("2024-01-01"), Frequency::Monthly),
        )
        .await?;

    assert!(service.get_payment_history(rent.id).await?.is_empty());

    service
        .record_payment_history(rent.id, parse_date("2024-02-01"), false)
        .await?;
    service
        .record_payment_history(rent.id, parse_date("2024-01-01"), true)
        .await?;

    let history = service.get_payment_history(rent.id).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].date, parse_date("2024-01-01"));
    assert!(history[0].status);
    assert_eq!(history[1].date, parse_date("2024-02-01"));
    assert!(!history[1].status);
    assert!(history.iter().all(|h| h.payment_id == rent.id));

    Ok(())
}

#[tokio::test]
async fn test_history_of_unknown_payment() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let unknown = Uuid::new_v4();

    assert!(service.get_payment_history(unknown).await?.is_empty());
    assert_kind(
        service
            .record_payment_history(unknown, parse_date("2024-01-01"), true)
            .await,
        ErrorKind::NotFound,
    );

    Ok(())
}
