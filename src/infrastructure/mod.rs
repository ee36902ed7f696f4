pub mod db;
pub mod jwt;
pub mod logging;
pub mod password;
pub mod session_lock;
pub mod shutdown;
