//! Game sessions, operators and read-side rollups.
//!
//! Session totals are updated in the same store transaction as each bet.
//! Operator totals are rolled up separately by [`OperatorAggregator`].

pub mod aggregation;
pub mod models;

pub use aggregation::OperatorAggregator;
pub use models::{
    GameSession, HOUSE_OPERATOR_ID, NewOperator, Operator, OperatorId, OperatorTotals, RTP_SCALE,
    SessionId, SessionStatus, StartSession, rtp_bps,
};
