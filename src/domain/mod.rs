pub mod annotation;
pub mod booking;
pub mod calendar;
pub mod export;
pub mod form;
pub mod pricing;
pub mod selection;
pub mod summary;
pub mod transaction;
