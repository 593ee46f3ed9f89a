pub mod eligibility;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod identity;
pub mod perpetuate;
pub mod posts;
pub mod scoring;
pub mod tags;
pub mod users;
