//! The expense ("pago") domain: models, database access, and the submission
//! and listing endpoints.

pub mod core;
mod list_endpoint;
mod submit_endpoint;

pub use core::{
    ExpenseItem, ExpenseRecord, NewExpense, NewExpenseItem, create_expense,
    create_expense_item_table, create_expense_table, list_expenses,
};
pub use list_endpoint::{ListExpensesState, PagoListResponse, list_expenses_endpoint};
pub use submit_endpoint::{
    PagoItemInput, SubmitExpenseState, SubmitPagoRequest, SubmitPagoResponse,
    submit_expense_endpoint,
};
