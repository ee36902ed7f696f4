pub mod transaction_store;

pub use transaction_store::{
    InMemoryTransactionStore, PgTransactionStore, TransactionFilter, TransactionRecord,
    TransactionStore,
};
