//! Handler tests
//!
//! Every handler runs against the in-memory store, which applies the same
//! domain rules inside the same kind of atomic unit as the PostgreSQL store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    use crate::domain::{
        Account, AccountType, Balance, Branch, CardType, ErrorKind, LoanAction, LoanStatus,
        OperationContext, PaymentStatus, Principal, User,
    };
    use crate::error::AppError;
    use crate::handlers::{
        AccountHandler, CardHandler, IssueCardCommand, LoanFilter, LoanHandler,
        LoanTransitionCommand, OpenAccountCommand, PayBillCommand, PaymentHandler,
        RequestLoanCommand, TransferCommand, TransferHandler, UpdateAddressCommand,
        UpdateAddressHandler, UserHandler,
    };
    use crate::identifiers::{IdentifierGenerator, SequenceSource};
    use crate::ledger::{BankStore, MemoryBankStore};

    // =========================================================================
    // Fixtures
    // =========================================================================

    struct Bank {
        memory: MemoryBankStore,
        store: Arc<dyn BankStore>,
        ids: Arc<IdentifierGenerator>,
        branch: Branch,
    }

    impl Bank {
        async fn new() -> Self {
            Self::with_ids(IdentifierGenerator::random()).await
        }

        async fn with_ids(ids: IdentifierGenerator) -> Self {
            let memory = MemoryBankStore::new();
            let branch = memory
                .insert_branch(Branch::new("Centro", "Av. Corrientes 1234", None))
                .await
                .unwrap();
            Self {
                store: Arc::new(memory.clone()),
                memory,
                ids: Arc::new(ids),
                branch,
            }
        }

        async fn customer(&self, username: &str) -> OperationContext {
            let user = self
                .memory
                .insert_user(User::customer(username, Some(self.branch.id)))
                .await
                .unwrap();
            OperationContext::new(Principal::from(&user))
        }

        async fn employee(&self, username: &str, branch_id: Uuid) -> OperationContext {
            let user = self
                .memory
                .insert_user(User::employee(username, branch_id))
                .await
                .unwrap();
            OperationContext::new(Principal::from(&user))
        }

        async fn open_account(&self, context: &OperationContext, pesos: Decimal) -> Account {
            let account = self
                .accounts()
                .open(OpenAccountCommand::new(AccountType::Savings), context)
                .await
                .unwrap();
            self.memory
                .set_balances(account.id, Balance::new(pesos).unwrap(), Balance::zero())
                .await
                .unwrap()
        }

        async fn pesos(&self, account_id: Uuid) -> Decimal {
            self.store
                .find_account(account_id)
                .await
                .unwrap()
                .unwrap()
                .balance_pesos
                .value()
        }

        fn accounts(&self) -> AccountHandler {
            AccountHandler::new(self.store.clone(), self.ids.clone())
        }

        fn cards(&self) -> CardHandler {
            CardHandler::new(self.store.clone(), self.ids.clone())
        }

        fn transfers(&self) -> TransferHandler {
            TransferHandler::new(self.store.clone())
        }

        fn loans(&self) -> LoanHandler {
            LoanHandler::new(self.store.clone())
        }

        fn payments(&self) -> PaymentHandler {
            PaymentHandler::new(self.store.clone())
        }
    }

    fn kind(err: &AppError) -> Option<ErrorKind> {
        err.kind()
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    #[tokio::test]
    async fn test_transfer_moves_money_and_records_once() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let a = bank.open_account(&alice, dec!(500)).await;
        let b = bank.open_account(&bob, dec!(25)).await;

        let transfer = bank
            .transfers()
            .execute(
                TransferCommand::new(b.number.clone(), dec!(125.50)).from_account(a.id),
                &alice,
            )
            .await
            .unwrap();

        assert_eq!(bank.pesos(a.id).await, dec!(374.50));
        assert_eq!(bank.pesos(b.id).await, dec!(150.50));
        assert_eq!(transfer.sender_username, "alice");
        assert_eq!(transfer.receiver_username, "bob");

        let sent = bank.transfers().list(&alice).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].origin_account_id, a.id);
        assert_eq!(sent[0].destination_account_id, b.id);
        assert_eq!(sent[0].amount.value(), dec!(125.50));
        assert!(bank.transfers().list(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_to_username_uses_oldest_account() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let a = bank.open_account(&alice, dec!(100)).await;
        let first = bank.open_account(&bob, dec!(0)).await;
        let second = bank.open_account(&bob, dec!(0)).await;

        bank.transfers()
            .execute(TransferCommand::new("bob", dec!(10)), &alice)
            .await
            .unwrap();

        assert_eq!(bank.pesos(a.id).await, dec!(90));
        assert_eq!(bank.pesos(first.id).await, dec!(10));
        assert_eq!(bank.pesos(second.id).await, dec!(0));
    }

    #[tokio::test]
    async fn test_transfer_to_same_account_fails() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(100)).await;

        let err = bank
            .transfers()
            .execute(TransferCommand::new(a.number.clone(), dec!(1)).from_account(a.id), &alice)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::Validation));
        assert_eq!(bank.pesos(a.id).await, dec!(100));
        assert!(bank.transfers().list(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_non_positive_amount_fails() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let a = bank.open_account(&alice, dec!(100)).await;
        let b = bank.open_account(&bob, dec!(0)).await;

        for amount in [dec!(0), dec!(-5), dec!(0.001)] {
            let err = bank
                .transfers()
                .execute(TransferCommand::new(b.number.clone(), amount), &alice)
                .await
                .unwrap_err();
            assert_eq!(kind(&err), Some(ErrorKind::Validation), "amount {amount}");
        }

        assert_eq!(bank.pesos(a.id).await, dec!(100));
        assert_eq!(bank.pesos(b.id).await, dec!(0));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_changes_nothing() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let a = bank.open_account(&alice, dec!(50)).await;
        let b = bank.open_account(&bob, dec!(0)).await;

        let err = bank
            .transfers()
            .execute(TransferCommand::new(b.number.clone(), dec!(50.01)), &alice)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::InsufficientFunds));
        assert_eq!(bank.pesos(a.id).await, dec!(50));
        assert_eq!(bank.pesos(b.id).await, dec!(0));
    }

    #[tokio::test]
    async fn test_transfer_unknown_recipient_is_not_found() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        bank.open_account(&alice, dec!(50)).await;

        let by_number = bank
            .transfers()
            .execute(TransferCommand::new("999-99999", dec!(1)), &alice)
            .await
            .unwrap_err();
        let by_name = bank
            .transfers()
            .execute(TransferCommand::new("nobody", dec!(1)), &alice)
            .await
            .unwrap_err();

        assert_eq!(kind(&by_number), Some(ErrorKind::NotFound));
        assert_eq!(kind(&by_name), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_transfer_from_someone_elses_account_is_denied() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let mallory = bank.customer("mallory").await;
        let a = bank.open_account(&alice, dec!(100)).await;
        bank.open_account(&mallory, dec!(0)).await;

        let err = bank
            .transfers()
            .execute(TransferCommand::new("mallory", dec!(100)).from_account(a.id), &mallory)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));
        assert_eq!(bank.pesos(a.id).await, dec!(100));
    }

    #[tokio::test]
    async fn test_concurrent_transfers_exceeding_balance_exactly_one_succeeds() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let carol = bank.customer("carol").await;
        let a = bank.open_account(&alice, dec!(100)).await;
        let b = bank.open_account(&bob, dec!(0)).await;
        let c = bank.open_account(&carol, dec!(0)).await;

        let to_bob = bank.transfers();
        let to_carol = bank.transfers();
        let (first, second) = tokio::join!(
            to_bob.execute(TransferCommand::new(b.number.clone(), dec!(60)), &alice),
            to_carol.execute(TransferCommand::new(c.number.clone(), dec!(60)), &alice),
        );

        let outcomes = [first, second];
        let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
        let failed: Vec<&AppError> = outcomes.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(succeeded, 1);
        assert_eq!(failed.len(), 1);
        assert_eq!(kind(failed[0]), Some(ErrorKind::InsufficientFunds));
        assert_eq!(bank.pesos(a.id).await, dec!(40));
        assert_eq!(bank.pesos(b.id).await + bank.pesos(c.id).await, dec!(60));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_transfers_never_overdraw() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let a = bank.open_account(&alice, dec!(100)).await;
        let b = bank.open_account(&bob, dec!(0)).await;

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let handler = bank.transfers();
            let context = alice.clone();
            let number = b.number.clone();
            tasks.push(tokio::spawn(async move {
                handler
                    .execute(TransferCommand::new(number, dec!(7)), &context)
                    .await
            }));
        }

        let mut succeeded = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert_eq!(kind(&err), Some(ErrorKind::InsufficientFunds)),
            }
        }

        // 14 * 7 = 98 fits, a 15th would need 105
        assert_eq!(succeeded, 14);
        assert_eq!(bank.pesos(a.id).await, dec!(2));
        assert_eq!(bank.pesos(b.id).await, dec!(98));
    }

    // =========================================================================
    // Loans
    // =========================================================================

    #[tokio::test]
    async fn test_loan_request_computes_terms_without_moving_money() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(0)).await;

        let loan = bank
            .loans()
            .request(RequestLoanCommand::new(a.id, dec!(1000), dec!(10), 10), &alice)
            .await
            .unwrap();

        assert_eq!(loan.total_repayment, dec!(1100));
        assert_eq!(loan.monthly_installment, dec!(110));
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(bank.pesos(a.id).await, dec!(0));
    }

    #[tokio::test]
    async fn test_loan_on_foreign_account_is_denied() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let b = bank.open_account(&bob, dec!(0)).await;

        let err = bank
            .loans()
            .request(RequestLoanCommand::new(b.id, dec!(1000), dec!(10), 10), &alice)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));
    }

    #[tokio::test]
    async fn test_loan_duration_bounds() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(0)).await;

        for months in [0, 61] {
            let err = bank
                .loans()
                .request(RequestLoanCommand::new(a.id, dec!(1000), dec!(10), months), &alice)
                .await
                .unwrap_err();
            assert_eq!(kind(&err), Some(ErrorKind::Validation));
        }
    }

    #[tokio::test]
    async fn test_loan_lifecycle_by_branch_employee() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let clerk = bank.employee("clerk", bank.branch.id).await;
        let a = bank.open_account(&alice, dec!(0)).await;
        let loan = bank
            .loans()
            .request(RequestLoanCommand::new(a.id, dec!(1000), dec!(10), 10), &alice)
            .await
            .unwrap();

        let approved = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Approve), &clerk)
            .await
            .unwrap();
        assert_eq!(approved.status, LoanStatus::Approved);
        assert_eq!(bank.pesos(a.id).await, dec!(1000));

        let active = bank.loans().list(LoanFilter::Active, &alice).await.unwrap();
        assert_eq!(active.len(), 1);
        let branch_view = bank.loans().list(LoanFilter::All, &clerk).await.unwrap();
        assert_eq!(branch_view.len(), 1);

        let annulled = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Annul), &clerk)
            .await
            .unwrap();
        assert_eq!(annulled.status, LoanStatus::Annulled);
        assert_eq!(bank.pesos(a.id).await, dec!(0));

        let err = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Annul), &clerk)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::IllegalStateTransition));
        assert_eq!(bank.pesos(a.id).await, dec!(0));
    }

    #[tokio::test]
    async fn test_annulling_pending_loan_fails() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let clerk = bank.employee("clerk", bank.branch.id).await;
        let a = bank.open_account(&alice, dec!(0)).await;
        let loan = bank
            .loans()
            .request(RequestLoanCommand::new(a.id, dec!(500), dec!(0), 5), &alice)
            .await
            .unwrap();

        let err = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Annul), &clerk)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::IllegalStateTransition));
        let stored = bank.store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LoanStatus::Pending);
    }

    #[tokio::test]
    async fn test_only_employees_of_the_owner_branch_may_approve() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(0)).await;
        let other_branch = bank
            .memory
            .insert_branch(Branch::new("Sur", "Calle Falsa 123", None))
            .await
            .unwrap();
        let outsider = bank.employee("outsider", other_branch.id).await;
        let loan = bank
            .loans()
            .request(RequestLoanCommand::new(a.id, dec!(1000), dec!(10), 10), &alice)
            .await
            .unwrap();

        let by_customer = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Approve), &alice)
            .await
            .unwrap_err();
        let by_outsider = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Approve), &outsider)
            .await
            .unwrap_err();

        assert_eq!(kind(&by_customer), Some(ErrorKind::PermissionDenied));
        assert_eq!(kind(&by_outsider), Some(ErrorKind::PermissionDenied));
        assert_eq!(bank.pesos(a.id).await, dec!(0));
        assert!(bank.loans().list(LoanFilter::All, &outsider).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_annul_after_spending_is_insufficient_funds() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let clerk = bank.employee("clerk", bank.branch.id).await;
        let a = bank.open_account(&alice, dec!(0)).await;
        let b = bank.open_account(&bob, dec!(0)).await;
        let loan = bank
            .loans()
            .request(RequestLoanCommand::new(a.id, dec!(1000), dec!(10), 10), &alice)
            .await
            .unwrap();
        bank.loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Approve), &clerk)
            .await
            .unwrap();
        bank.transfers()
            .execute(TransferCommand::new(b.number.clone(), dec!(1)), &alice)
            .await
            .unwrap();

        let err = bank
            .loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Annul), &clerk)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::InsufficientFunds));
        assert_eq!(bank.pesos(a.id).await, dec!(999));
        let stored = bank.store.find_loan(loan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LoanStatus::Approved);
    }

    // =========================================================================
    // Payments
    // =========================================================================

    #[tokio::test]
    async fn test_bill_payment_debits_and_defaults_to_pending() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(80)).await;

        let payment = bank
            .payments()
            .pay(PayBillCommand::new(a.id, "electricity", dec!(30)), &alice)
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(bank.pesos(a.id).await, dec!(50));

        let err = bank
            .payments()
            .pay(PayBillCommand::new(a.id, "gas", dec!(50.01)), &alice)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::InsufficientFunds));
        assert_eq!(bank.payments().list(&alice).await.unwrap().len(), 1);
    }

    // =========================================================================
    // Accounts & cards
    // =========================================================================

    #[tokio::test]
    async fn test_account_deletion_rules() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;

        let empty = bank.open_account(&alice, dec!(0)).await;
        assert_ok!(bank.accounts().close(empty.id, &alice).await);
        assert!(bank.store.find_account(empty.id).await.unwrap().is_none());

        let funded = bank.open_account(&alice, dec!(0.01)).await;
        let err = bank.accounts().close(funded.id, &alice).await.unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::Validation));

        let carded = bank.open_account(&alice, dec!(0)).await;
        bank.cards()
            .issue(IssueCardCommand::new(carded.id, CardType::Debit), &alice)
            .await
            .unwrap();
        let err = bank.accounts().close(carded.id, &alice).await.unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_foreign_account_is_invisible() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let b = bank.open_account(&bob, dec!(0)).await;

        let get = bank.accounts().get(b.id, &alice).await.unwrap_err();
        let close = bank.accounts().close(b.id, &alice).await.unwrap_err();

        assert_eq!(kind(&get), Some(ErrorKind::NotFound));
        assert_eq!(kind(&close), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_card_identifiers_are_generated_once() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(0)).await;

        let card = bank
            .cards()
            .issue(IssueCardCommand::new(a.id, CardType::Credit), &alice)
            .await
            .unwrap();

        assert_eq!(card.number.len(), 16);
        assert_eq!(card.cvv.len(), 3);
        assert_eq!(
            card.expiration,
            card.created_at.date_naive() + chrono::Duration::days(1095)
        );
        assert_eq!(bank.cards().list(&alice).await.unwrap(), vec![card]);
    }

    #[tokio::test]
    async fn test_card_number_collision_is_retried() {
        let taken = "4000000000000001";
        let bank = Bank::with_ids(IdentifierGenerator::new(SequenceSource::new([
            "100-00001",
            taken,
            "123",
            taken,
            "4000000000000002",
            "456",
        ])))
        .await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(0)).await;

        let first = bank
            .cards()
            .issue(IssueCardCommand::new(a.id, CardType::Debit), &alice)
            .await
            .unwrap();
        let second = bank
            .cards()
            .issue(IssueCardCommand::new(a.id, CardType::Debit), &alice)
            .await
            .unwrap();

        assert_eq!(first.number, taken);
        assert_eq!(second.number, "4000000000000002");
    }

    #[tokio::test]
    async fn test_supplied_card_number_must_be_unique() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let a = bank.open_account(&alice, dec!(0)).await;
        let number = "5500000000000004".to_string();

        bank.cards()
            .issue(
                IssueCardCommand::new(a.id, CardType::Debit).with_number(number.clone()),
                &alice,
            )
            .await
            .unwrap();
        let err = bank
            .cards()
            .issue(IssueCardCommand::new(a.id, CardType::Debit).with_number(number), &alice)
            .await
            .unwrap_err();

        assert_eq!(kind(&err), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_employee_card_lookup_is_branch_scoped() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let clerk = bank.employee("clerk", bank.branch.id).await;
        let a = bank.open_account(&alice, dec!(0)).await;
        bank.cards()
            .issue(IssueCardCommand::new(a.id, CardType::Debit), &alice)
            .await
            .unwrap();

        let cards = bank.cards().for_customer(alice.user_id(), &clerk).await.unwrap();
        assert_eq!(cards.len(), 1);

        let err = bank
            .cards()
            .for_customer(alice.user_id(), &alice)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));
    }

    // =========================================================================
    // Users & summary
    // =========================================================================

    #[tokio::test]
    async fn test_employee_updates_address_in_own_branch_only() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let clerk = bank.employee("clerk", bank.branch.id).await;
        let other_branch = bank
            .memory
            .insert_branch(Branch::new("Oeste", "Ruta 8 km 20", None))
            .await
            .unwrap();
        let outsider = bank.employee("outsider", other_branch.id).await;
        let handler = UpdateAddressHandler::new(bank.store.clone());

        let updated = handler
            .execute(UpdateAddressCommand::new("alice", "San Martin 55"), &clerk)
            .await
            .unwrap();
        assert_eq!(updated.address.as_deref(), Some("San Martin 55"));

        let err = handler
            .execute(UpdateAddressCommand::new("alice", "Elsewhere 1"), &outsider)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));

        let err = handler
            .execute(UpdateAddressCommand::new("alice", "Mine 2"), &alice)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));

        let stored = UserHandler::new(bank.store.clone()).current(&alice).await.unwrap();
        assert_eq!(stored.address.as_deref(), Some("San Martin 55"));
    }

    #[tokio::test]
    async fn test_summary_aggregates_the_callers_records() {
        let bank = Bank::new().await;
        let alice = bank.customer("alice").await;
        let bob = bank.customer("bob").await;
        let clerk = bank.employee("clerk", bank.branch.id).await;
        let a = bank.open_account(&alice, dec!(300)).await;
        let b = bank.open_account(&bob, dec!(0)).await;

        bank.transfers()
            .execute(TransferCommand::new(b.number.clone(), dec!(100)), &alice)
            .await
            .unwrap();
        bank.payments()
            .pay(PayBillCommand::new(a.id, "water", dec!(20)), &alice)
            .await
            .unwrap();
        let loan = bank
            .loans()
            .request(RequestLoanCommand::new(a.id, dec!(1000), dec!(10), 10), &alice)
            .await
            .unwrap();
        bank.loans()
            .transition(LoanTransitionCommand::new(loan.id, LoanAction::Approve), &clerk)
            .await
            .unwrap();

        let summary = UserHandler::new(bank.store.clone()).summary(&alice).await.unwrap();

        assert_eq!(summary.total_pesos, dec!(1180));
        assert_eq!(summary.loans.outstanding, dec!(1100));
        assert_eq!(summary.loans.next_installment, dec!(110));
        assert_eq!(summary.loans.active_count, 1);
        assert_eq!(summary.recent_transfers.len(), 1);
        assert_eq!(summary.recent_payments.len(), 1);
    }

    #[tokio::test]
    async fn test_branch_employee_listing() {
        let bank = Bank::new().await;
        bank.customer("alice").await;
        bank.employee("clerk", bank.branch.id).await;
        let users = UserHandler::new(bank.store.clone());

        let employees = users.branch_employees(bank.branch.id).await.unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].username, "clerk");

        let err = users.branch_employees(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(kind(&err), Some(ErrorKind::NotFound));
    }
}
