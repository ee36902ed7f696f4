pub mod errors;
pub mod rate_table;
pub mod swap_quote;
pub mod transaction_status;
pub mod wallet_session;

pub use swap_quote::SwapQuote;
pub use transaction_status::{SimulatedTransaction, TransactionStatus, TxKind};
pub use wallet_session::{ConnectionStatus, Network, WalletSession, WalletType};
