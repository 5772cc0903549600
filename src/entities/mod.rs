// Entity Models
//
// Typed records for every row the store hands back. Queries never return
// positional tuples to callers; each row is mapped into one of these.

pub mod account;
pub mod loan;
pub mod transfer;

pub use account::{Account, OPENING_GRANT};
pub use loan::{Loan, LoanStatus, LoanTerms};
pub use transfer::{Direction, Transfer, TransferEntry};
