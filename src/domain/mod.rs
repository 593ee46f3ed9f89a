pub mod engagement;
pub mod feed;
pub mod post;
pub mod tag;
pub mod user;
