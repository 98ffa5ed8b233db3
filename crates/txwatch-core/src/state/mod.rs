//! Transactions state logic: reducers, matchers and selectors.

pub mod actions;
pub mod matchers;
pub mod selectors;

pub use actions::{
	AddTransactionPayload, ClearAllChainTransactionsPayload, ConfirmOracleTransactionPayload,
	ConfirmTransactionPayload, DuplicateHashError, UpdateTransactionLastCheckedPayload,
};
