pub mod activity_log;
pub mod assessment;
pub mod assessment_attempt;
pub mod assessment_reset;
pub mod reset_metadata;
pub mod reset_request;
