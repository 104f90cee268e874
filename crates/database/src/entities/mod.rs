pub mod audit;
pub mod chat;
pub mod complaint;
pub mod evidence;
pub mod station;
pub mod user;
