pub mod activity_service;
pub mod attempt_listing_service;
pub mod reset_service;
pub mod time_calculation;
