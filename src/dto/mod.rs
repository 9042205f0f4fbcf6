pub mod reset_dto;
