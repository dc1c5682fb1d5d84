//! API Routes
//!
//! HTTP endpoint definitions. Request and response bodies use the field names
//! the bank's front office already speaks (`numero_cuenta`, `monto`, ...).

use std::sync::Arc;

use axum::{
    extract::{Extension, FromRequest, FromRequestParts, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Branch, Card, CardProvider, CardType, FinancialSummary, Loan,
    LoanAction, LoanStatus, OperationContext, Payment, PaymentStatus, Transfer, User,
};
use crate::error::AppError;
use crate::handlers::{
    AccountHandler, CardHandler, IssueCardCommand, LoanFilter, LoanHandler,
    LoanTransitionCommand, OpenAccountCommand, PayBillCommand, PaymentHandler,
    RequestLoanCommand, TransferCommand, TransferHandler, UpdateAddressCommand,
    UpdateAddressHandler, UserHandler,
};
use crate::identifiers::IdentifierGenerator;
use crate::ledger::BankStore;

/// Shared state of every route
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BankStore>,
    pub identifiers: Arc<IdentifierGenerator>,
}

impl AppState {
    pub fn new(store: Arc<dyn BankStore>, identifiers: IdentifierGenerator) -> Self {
        Self {
            store,
            identifiers: Arc::new(identifiers),
        }
    }
}

/// JSON body extractor whose rejections use the API error body
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the API error body
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct BranchResponse {
    pub id: Uuid,
    pub nombre: String,
    pub direccion: String,
    pub telefono: Option<String>,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            nombre: branch.name,
            direccion: branch.address,
            telefono: branch.phone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmployeesResponse {
    pub empleados: Vec<EmployeeResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDetailResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub es_empleado: bool,
    pub sucursal: Option<Uuid>,
}

impl From<User> for UserDetailResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            telefono: user.phone,
            direccion: user.address,
            es_empleado: user.is_employee,
            sucursal: user.branch_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateAddressRequest {
    pub username_or_id: String,
    pub direccion: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub tipo_cuenta: AccountType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub numero_cuenta: String,
    pub tipo_cuenta: AccountType,
    pub balance_pesos: Decimal,
    pub balance_dolares: Decimal,
    pub fecha_creacion: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            numero_cuenta: account.number,
            tipo_cuenta: account.account_type,
            balance_pesos: account.balance_pesos.value(),
            balance_dolares: account.balance_dolares.value(),
            fecha_creacion: account.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCardRequest {
    pub cuenta: Uuid,
    pub tipo_tarjeta: CardType,
    #[serde(default)]
    pub proveedor: Option<CardProvider>,
    #[serde(default)]
    pub numero_tarjeta: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardResponse {
    pub id: Uuid,
    pub cuenta: Uuid,
    pub numero_tarjeta: String,
    pub tipo_tarjeta: CardType,
    pub cvv: String,
    pub expiracion: NaiveDate,
    pub proveedor: Option<CardProvider>,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            cuenta: card.account_id,
            numero_tarjeta: card.number,
            tipo_tarjeta: card.card_type,
            cvv: card.cvv,
            expiracion: card.expiration,
            proveedor: card.provider,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CardLookupQuery {
    pub usuario_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Account number or username
    pub destinatario: String,
    pub monto: Decimal,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub cuenta_origen: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub id: Uuid,
    pub cuenta_origen: Uuid,
    pub cuenta_destino: Uuid,
    pub monto: Decimal,
    pub descripcion: Option<String>,
    pub fecha: DateTime<Utc>,
    pub username_emisor: String,
    pub username_receptor: String,
}

impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            id: transfer.id,
            cuenta_origen: transfer.origin_account_id,
            cuenta_destino: transfer.destination_account_id,
            monto: transfer.amount.value(),
            descripcion: transfer.description,
            fecha: transfer.created_at,
            username_emisor: transfer.sender_username,
            username_receptor: transfer.receiver_username,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoanRequest {
    pub cuenta: Uuid,
    pub monto_prestado: Decimal,
    pub interes: Decimal,
    pub meses_duracion: i32,
    #[serde(default)]
    pub fecha_inicio: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoanResponse {
    pub id: Uuid,
    pub cuenta: Uuid,
    pub monto_prestado: Decimal,
    pub interes: Decimal,
    pub pago_total: Decimal,
    pub cuota_mensual: Decimal,
    pub fecha_inicio: NaiveDate,
    pub meses_duracion: i32,
    pub estado: LoanStatus,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            id: loan.id,
            cuenta: loan.account_id,
            monto_prestado: loan.principal.value(),
            interes: loan.interest_rate,
            pago_total: loan.total_repayment,
            cuota_mensual: loan.monthly_installment,
            fecha_inicio: loan.start_date,
            meses_duracion: loan.duration_months,
            estado: loan.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub cuenta: Uuid,
    pub servicio: String,
    pub monto: Decimal,
    #[serde(default)]
    pub estado: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub cuenta: Uuid,
    pub servicio: String,
    pub monto: Decimal,
    pub estado: PaymentStatus,
    pub fecha_pago: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            cuenta: payment.account_id,
            servicio: payment.service,
            monto: payment.amount.value(),
            estado: payment.status,
            fecha_pago: payment.paid_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceTotals {
    pub pesos: Decimal,
    pub dolares: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoanTotalsResponse {
    pub total_pendiente: Decimal,
    pub proxima_cuota: Decimal,
    pub cantidad_activos: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentTransfer {
    pub cuenta_origen: Uuid,
    pub cuenta_destino: Uuid,
    pub monto: Decimal,
    pub fecha: DateTime<Utc>,
    pub descripcion: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentPayment {
    pub servicio: String,
    pub monto: Decimal,
    pub estado: PaymentStatus,
    pub fecha_pago: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub balances_totales: BalanceTotals,
    pub prestamos: LoanTotalsResponse,
    pub transferencias_recientes: Vec<RecentTransfer>,
    pub pagos_recientes: Vec<RecentPayment>,
}

impl From<FinancialSummary> for SummaryResponse {
    fn from(summary: FinancialSummary) -> Self {
        Self {
            balances_totales: BalanceTotals {
                pesos: summary.total_pesos,
                dolares: summary.total_dollars,
            },
            prestamos: LoanTotalsResponse {
                total_pendiente: summary.loans.outstanding,
                proxima_cuota: summary.loans.next_installment,
                cantidad_activos: summary.loans.active_count,
            },
            transferencias_recientes: summary
                .recent_transfers
                .into_iter()
                .map(|t| RecentTransfer {
                    cuenta_origen: t.origin_account_id,
                    cuenta_destino: t.destination_account_id,
                    monto: t.amount.value(),
                    fecha: t.created_at,
                    descripcion: t.description,
                })
                .collect(),
            pagos_recientes: summary
                .recent_payments
                .into_iter()
                .map(|p| RecentPayment {
                    servicio: p.service,
                    monto: p.amount.value(),
                    estado: p.status,
                    fecha_pago: p.paid_at,
                })
                .collect(),
        }
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Routes reachable without a bearer token
pub fn public_router() -> Router<AppState> {
    Router::new().route("/sucursales/", get(list_branches))
}

/// Routes behind the auth middleware
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Branches & users
        .route("/sucursales/:branch_id/empleados/", get(list_branch_employees))
        .route("/usuarios/detalle/", get(current_user))
        .route("/usuarios/actualizar-direccion/", put(update_address))
        // Accounts
        .route("/cuentas/", get(list_accounts).post(open_account))
        .route("/cuentas/:account_id/", get(get_account).delete(close_account))
        // Cards
        .route("/tarjetas/", get(list_cards).post(issue_card))
        .route("/tarjetas/buscar_por_usuario/", get(cards_by_customer))
        .route("/tarjetas/:card_id/", delete(delete_card))
        // Transfers
        .route("/transferencias/", get(list_transfers).post(transfer))
        // Loans
        .route("/prestamos/", get(list_loans).post(request_loan))
        .route("/prestamos/activos/", get(list_active_loans))
        .route("/prestamos/pagados/", get(list_paid_loans))
        .route("/prestamos/:loan_id/aprobar/", post(approve_loan))
        .route("/prestamos/:loan_id/rechazar/", post(reject_loan))
        .route("/prestamos/:loan_id/anular/", post(annul_loan))
        .route("/prestamos/:loan_id/liquidar/", post(settle_loan))
        // Payments
        .route("/pagos/", get(list_payments).post(pay_bill))
        // Summary
        .route("/resumen/", get(summary))
}

// =========================================================================
// Branches & users
// =========================================================================

async fn list_branches(State(state): State<AppState>) -> Result<Json<Vec<BranchResponse>>, AppError> {
    let branches = UserHandler::new(state.store).branches().await?;
    Ok(Json(branches.into_iter().map(BranchResponse::from).collect()))
}

async fn list_branch_employees(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<EmployeesResponse>, AppError> {
    let employees = UserHandler::new(state.store).branch_employees(branch_id).await?;

    Ok(Json(EmployeesResponse {
        empleados: employees
            .into_iter()
            .map(|u| EmployeeResponse {
                id: u.id,
                username: u.username,
            })
            .collect(),
    }))
}

async fn current_user(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<UserDetailResponse>, AppError> {
    let user = UserHandler::new(state.store).current(&context).await?;
    Ok(Json(user.into()))
}

/// Employee changes the address of a customer of their branch
async fn update_address(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<UpdateAddressRequest>,
) -> Result<Json<UserDetailResponse>, AppError> {
    let handler = UpdateAddressHandler::new(state.store);
    let command = UpdateAddressCommand::new(request.username_or_id, request.direccion);

    let user = handler.execute(command, &context).await?;
    Ok(Json(user.into()))
}

// =========================================================================
// Accounts
// =========================================================================

async fn list_accounts(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let accounts = AccountHandler::new(state.store, state.identifiers)
        .list(&context)
        .await?;
    Ok(Json(accounts.into_iter().map(AccountResponse::from).collect()))
}

async fn open_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let handler = AccountHandler::new(state.store, state.identifiers);
    let account = handler
        .open(OpenAccountCommand::new(request.tipo_cuenta), &context)
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn get_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = AccountHandler::new(state.store, state.identifiers)
        .get(account_id, &context)
        .await?;
    Ok(Json(account.into()))
}

/// Only empty accounts without cards can be closed
async fn close_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    AccountHandler::new(state.store, state.identifiers)
        .close(account_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Cards
// =========================================================================

async fn list_cards(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<CardResponse>>, AppError> {
    let cards = CardHandler::new(state.store, state.identifiers)
        .list(&context)
        .await?;
    Ok(Json(cards.into_iter().map(CardResponse::from).collect()))
}

async fn issue_card(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<CreateCardRequest>,
) -> Result<(StatusCode, Json<CardResponse>), AppError> {
    let handler = CardHandler::new(state.store, state.identifiers);

    let mut command = IssueCardCommand::new(request.cuenta, request.tipo_tarjeta);
    if let Some(provider) = request.proveedor {
        command = command.with_provider(provider);
    }
    if let Some(number) = request.numero_tarjeta {
        command = command.with_number(number);
    }

    let card = handler.issue(command, &context).await?;
    Ok((StatusCode::CREATED, Json(card.into())))
}

async fn delete_card(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    CardHandler::new(state.store, state.identifiers)
        .delete(card_id, &context)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Employee view of a branch customer's cards
async fn cards_by_customer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiQuery(query): ApiQuery<CardLookupQuery>,
) -> Result<Json<Vec<CardResponse>>, AppError> {
    let cards = CardHandler::new(state.store, state.identifiers)
        .for_customer(query.usuario_id, &context)
        .await?;
    Ok(Json(cards.into_iter().map(CardResponse::from).collect()))
}

// =========================================================================
// Transfers
// =========================================================================

async fn list_transfers(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<TransferResponse>>, AppError> {
    let transfers = TransferHandler::new(state.store).list(&context).await?;
    Ok(Json(transfers.into_iter().map(TransferResponse::from).collect()))
}

async fn transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let handler = TransferHandler::new(state.store);

    let mut command = TransferCommand::new(request.destinatario, request.monto);
    if let Some(description) = request.descripcion {
        command = command.with_description(description);
    }
    if let Some(origin) = request.cuenta_origen {
        command = command.from_account(origin);
    }

    let transfer = handler.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(transfer.into())))
}

// =========================================================================
// Loans
// =========================================================================

async fn loans_filtered(
    state: AppState,
    context: OperationContext,
    filter: LoanFilter,
) -> Result<Json<Vec<LoanResponse>>, AppError> {
    let loans = LoanHandler::new(state.store).list(filter, &context).await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

async fn list_loans(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<LoanResponse>>, AppError> {
    loans_filtered(state, context, LoanFilter::All).await
}

async fn list_active_loans(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<LoanResponse>>, AppError> {
    loans_filtered(state, context, LoanFilter::Active).await
}

async fn list_paid_loans(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<LoanResponse>>, AppError> {
    loans_filtered(state, context, LoanFilter::Paid).await
}

async fn request_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<LoanRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), AppError> {
    let handler = LoanHandler::new(state.store);

    let mut command = RequestLoanCommand::new(
        request.cuenta,
        request.monto_prestado,
        request.interes,
        request.meses_duracion,
    );
    if let Some(start) = request.fecha_inicio {
        command = command.starting(start);
    }

    let loan = handler.request(command, &context).await?;
    Ok((StatusCode::CREATED, Json(loan.into())))
}

async fn transition_loan(
    state: AppState,
    context: OperationContext,
    loan_id: Uuid,
    action: LoanAction,
) -> Result<Json<LoanResponse>, AppError> {
    let loan = LoanHandler::new(state.store)
        .transition(LoanTransitionCommand::new(loan_id, action), &context)
        .await?;
    Ok(Json(loan.into()))
}

async fn approve_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    transition_loan(state, context, loan_id, LoanAction::Approve).await
}

async fn reject_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    transition_loan(state, context, loan_id, LoanAction::Reject).await
}

async fn annul_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    transition_loan(state, context, loan_id, LoanAction::Annul).await
}

async fn settle_loan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, AppError> {
    transition_loan(state, context, loan_id, LoanAction::Settle).await
}

// =========================================================================
// Payments & summary
// =========================================================================

async fn list_payments(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = PaymentHandler::new(state.store).list(&context).await?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

async fn pay_bill(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let handler = PaymentHandler::new(state.store);

    let mut command = PayBillCommand::new(request.cuenta, request.servicio, request.monto);
    command.status = request.estado;

    let payment = handler.pay(command, &context).await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

async fn summary(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<SummaryResponse>, AppError> {
    let summary = UserHandler::new(state.store).summary(&context).await?;
    Ok(Json(summary.into()))
}
