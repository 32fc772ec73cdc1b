mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{ACCT1, ALICE, alice_with_seventy, assert_kind, post, test_service};
use tally::application::ErrorKind;
use tally::domain::{NewTransaction, compute_balance};

#[tokio::test]
async fn test_fresh_account_has_zero_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 0);
    assert!(service.list_transactions(ALICE, ACCT1).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_salary_then_rent_leaves_seventy() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_eq!(post(&service, ALICE, ACCT1, 10000, "salary").await?, 10000);
    assert_eq!(post(&service, ALICE, ACCT1, -3000, "rent").await?, 7000);
    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 7000);

    Ok(())
}

#[tokio::test]
async fn test_overdraw_is_rejected_without_writing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    alice_with_seventy(&service).await?;

    let result = post(&service, ALICE, ACCT1, -10000, "too much").await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert!(err.to_string().to_lowercase().contains("insufficient balance"));

    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 7000);
    assert_eq!(service.list_transactions(ALICE, ACCT1).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_balance_may_reach_exactly_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    alice_with_seventy(&service).await?;

    assert_eq!(post(&service, ALICE, ACCT1, -7000, "empty it").await?, 0);
    assert_kind(post(&service, ALICE, ACCT1, -1, "one cent").await, ErrorKind::InvalidOperation);

    Ok(())
}

#[tokio::test]
async fn test_first_transaction_cannot_be_a_debit() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_kind(post(&service, ALICE, ACCT1, -1, "nothing there").await, ErrorKind::InvalidOperation);
    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_zero_amount_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_kind(post(&service, ALICE, ACCT1, 0, "nothing").await, ErrorKind::InvalidOperation);
    assert!(service.list_transactions(ALICE, ACCT1).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_credit_past_max_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert_eq!(post(&service, ALICE, ACCT1, i64::MAX, "jackpot").await?, i64::MAX);

    let err = post(&service, ALICE, ACCT1, 1, "one more cent").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    assert_eq!(service.get_balance(ALICE, ACCT1).await?, i64::MAX);
    assert_eq!(service.list_transactions(ALICE, ACCT1).await?.len(), 1);

    // Debits still work from the top of the range
    assert_eq!(post(&service, ALICE, ACCT1, -1, "spend").await?, i64::MAX - 1);
    assert_eq!(post(&service, ALICE, ACCT1, 1, "refill").await?, i64::MAX);

    Ok(())
}

#[tokio::test]
async fn test_balances_are_per_user_and_account() -> Result<()> {
    let (service, _temp) = test_service().await?;
    alice_with_seventy(&service).await?;

    post(&service, ALICE, "savings", 50000, "transfer in").await?;
    post(&service, "bob", ACCT1, 2500, "gift").await?;

    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 7000);
    assert_eq!(service.get_balance(ALICE, "savings").await?, 50000);
    assert_eq!(service.get_balance("bob", ACCT1).await?, 2500);

    // bob's balance does not cover alice's account
    assert_kind(post(&service, "bob", ACCT1, -5000, "rent").await, ErrorKind::InvalidOperation);

    Ok(())
}

#[tokio::test]
async fn test_balance_always_equals_sum_of_applied_amounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let amounts = [5000, -2000, -4000, 1500, -4500, -1, 30000, -29999, -2];

    let mut expected = 0;
    for amount in amounts {
        match post(&service, ALICE, ACCT1, amount, "step").await {
            Ok(balance) => {
                expected += amount;
                assert_eq!(balance, expected);
            }
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InvalidOperation);
                assert!(expected + amount < 0);
            }
        }
        let balance = service.get_balance(ALICE, ACCT1).await?;
        assert_eq!(balance, expected);
        assert!(balance >= 0);
    }

    let transactions = service.list_transactions(ALICE, ACCT1).await?;
    assert_eq!(compute_balance(&transactions), expected);
    assert_eq!(expected, 1);

    Ok(())
}

#[tokio::test]
async fn test_posted_transaction_keeps_its_fields() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let posted = service
        .post_transaction(
            ALICE,
            ACCT1,
            NewTransaction::new(10000, "salary")
                .with_description("October pay")
                .with_category("Income"),
        )
        .await?;

    let stored = service.list_transactions(ALICE, ACCT1).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, posted.transaction.id);
    assert_eq!(stored[0].name, "salary");
    assert_eq!(stored[0].description, "October pay");
    assert_eq!(stored[0].category, "Income");
    assert_eq!(stored[0].amount_cents, 10000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_cannot_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    post(&service, ALICE, ACCT1, 6000, "opening").await?;

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                post(&service, ALICE, ACCT1, -5000, &format!("debit {}", i)).await
            })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => committed += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidOperation),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 1000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_debits_never_go_negative() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    post(&service, ALICE, ACCT1, 10000, "opening").await?;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { post(&service, ALICE, ACCT1, -700, "coffee").await })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            committed += 1;
        }
    }

    // 10000 / 700 = 14 debits fit
    assert_eq!(committed, 14);
    assert_eq!(service.get_balance(ALICE, ACCT1).await?, 10000 - 14 * 700);

    Ok(())
}
