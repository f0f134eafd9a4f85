//! Role agents and the bull/bear debate

pub mod analysts;
pub mod debate;
pub mod researchers;
pub mod risk;
pub mod role;
pub mod trader;

pub use analysts::{AnalystKind, AnalystReport, AnalystTeam};
pub use debate::{DebateCoordinator, DebatePhase, DebateState, DebateTurn};
pub use researchers::{Researcher, Side};
pub use risk::{RiskAssessment, RiskLevel, RiskManager};
pub use role::RoleSpec;
pub use trader::{Action, Decision, Trader};
