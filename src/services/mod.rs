pub mod auth_service;
pub mod batch_service;
pub mod cookie_service;
pub mod document_service;
pub mod jwt_service;
